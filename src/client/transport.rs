// ABOUTME: Dial strategy selection for registry connections.
// ABOUTME: TCP, TCP wrapped in TLS, or a unix socket, each bounded by the client timeout.

use super::endpoint::{Endpoint, TransportKind};
use super::error::{ClientError, Result};
use super::tls;
use hyper::Uri;
use hyper::rt::ReadBufCursor;
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::rt::TokioIo;
use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use std::future::Future;
use std::io::{self, IoSlice};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tokio_rustls::TlsConnector;

/// Logical base address used for unix socket endpoints. Requests are built
/// against it and the dialer connects to the socket instead.
pub const UNIX_PLACEHOLDER_BASE: &str = "http://unix.sock";

pub(crate) trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

pub(crate) type BoxedIo = Box<dyn Io>;

#[derive(Clone)]
enum Dialer {
    Tcp { tls: Option<Arc<ClientConfig>> },
    Unix { socket_path: PathBuf },
}

/// Dialer plus the base address requests are issued against.
#[derive(Clone)]
pub struct Transport {
    kind: TransportKind,
    dialer: Dialer,
    timeout: Duration,
    base_url: String,
}

impl Transport {
    /// Build the transport for an endpoint. `tls` is only used for TLS endpoints;
    /// when absent there the bundled webpki roots are trusted.
    pub fn build(
        endpoint: &Endpoint,
        tls: Option<&Arc<ClientConfig>>,
        timeout: Duration,
    ) -> Result<Self> {
        let kind = endpoint.kind();
        let (dialer, base_url) = match (kind, endpoint.socket_path(), endpoint.base_url()) {
            (TransportKind::UnixSocket, Some(socket_path), _) => (
                Dialer::Unix {
                    socket_path: socket_path.to_path_buf(),
                },
                UNIX_PLACEHOLDER_BASE.to_string(),
            ),
            (TransportKind::TcpTls, _, Some(base_url)) => {
                let config = match tls {
                    Some(config) => config.clone(),
                    None => tls::default_client_config().map_err(|e| {
                        ClientError::ConnectionFailed(format!("TLS setup failed: {e}"))
                    })?,
                };
                (Dialer::Tcp { tls: Some(config) }, base_url)
            }
            (_, _, Some(base_url)) => (Dialer::Tcp { tls: None }, base_url),
            _ => {
                return Err(ClientError::invalid_address(
                    &endpoint.to_string(),
                    "endpoint has no dialable address",
                ));
            }
        };

        Ok(Transport {
            kind,
            dialer,
            timeout,
            base_url,
        })
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn socket_path(&self) -> Option<&Path> {
        match &self.dialer {
            Dialer::Unix { socket_path } => Some(socket_path),
            Dialer::Tcp { .. } => None,
        }
    }

    /// Open a connection for a request to `uri`, giving up after the timeout.
    ///
    /// Unix transports ignore the address in `uri` entirely.
    pub(crate) async fn dial(&self, uri: &Uri) -> io::Result<BoxedIo> {
        match tokio::time::timeout(self.timeout, self.connect(uri)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("dial timed out after {:?}", self.timeout),
            )),
        }
    }

    async fn connect(&self, uri: &Uri) -> io::Result<BoxedIo> {
        match &self.dialer {
            Dialer::Unix { socket_path } => {
                tracing::debug!("dialing unix socket {:?}", socket_path);
                let stream = UnixStream::connect(socket_path).await?;
                Ok(Box::new(stream))
            }
            Dialer::Tcp { tls } => {
                let host = uri
                    .host()
                    .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
                    .ok_or_else(|| {
                        io::Error::new(io::ErrorKind::InvalidInput, "request URI has no host")
                    })?;
                let default_port = if tls.is_some() { 443 } else { 80 };
                let port = uri.port_u16().unwrap_or(default_port);

                tracing::debug!("dialing {}:{}", host, port);
                let stream = TcpStream::connect((host, port)).await?;

                match tls {
                    None => Ok(Box::new(stream)),
                    Some(config) => {
                        let server_name = ServerName::try_from(host)
                            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
                            .to_owned();
                        let stream = TlsConnector::from(config.clone())
                            .connect(server_name, stream)
                            .await?;
                        Ok(Box::new(stream))
                    }
                }
            }
        }
    }
}

/// Connector handed to the pooled HTTP client. Every new pooled connection
/// goes through [`Transport::dial`], so unix routing and the dial timeout
/// apply to it.
#[derive(Clone)]
pub(crate) struct Connector {
    transport: Arc<Transport>,
}

impl Connector {
    pub(crate) fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }
}

impl tower::Service<Uri> for Connector {
    type Response = RegistryStream;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = io::Result<RegistryStream>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let transport = self.transport.clone();
        Box::pin(async move {
            let io = transport.dial(&uri).await?;
            Ok(RegistryStream(TokioIo::new(io)))
        })
    }
}

/// A dialed connection as seen by the HTTP client.
pub(crate) struct RegistryStream(TokioIo<BoxedIo>);

impl Connection for RegistryStream {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

impl hyper::rt::Read for RegistryStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        hyper::rt::Read::poll_read(Pin::new(&mut self.0), cx, buf)
    }
}

impl hyper::rt::Write for RegistryStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        hyper::rt::Write::poll_write(Pin::new(&mut self.0), cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_flush(Pin::new(&mut self.0), cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_shutdown(Pin::new(&mut self.0), cx)
    }

    fn is_write_vectored(&self) -> bool {
        hyper::rt::Write::is_write_vectored(&self.0)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        hyper::rt::Write::poll_write_vectored(Pin::new(&mut self.0), cx, bufs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(address: &str, tls: Option<&Arc<ClientConfig>>) -> Transport {
        let endpoint = Endpoint::parse(address, tls.is_some()).unwrap();
        Transport::build(&endpoint, tls, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn unix_transport_rewrites_base_address() {
        let transport = build("unix:///run/registry.sock", None);
        assert_eq!(transport.kind(), TransportKind::UnixSocket);
        assert_eq!(transport.base_url(), UNIX_PLACEHOLDER_BASE);
        assert_eq!(
            transport.socket_path(),
            Some(Path::new("/run/registry.sock"))
        );
    }

    #[test]
    fn tcp_transport_keeps_base_address() {
        let transport = build("localhost:5000/prefix", None);
        assert_eq!(transport.kind(), TransportKind::TcpPlain);
        assert_eq!(transport.base_url(), "http://localhost:5000/prefix");
        assert_eq!(transport.socket_path(), None);
    }

    #[test]
    fn tls_transport_uses_https_base() {
        let config = tls::default_client_config().unwrap();
        let transport = build("registry.example.com", Some(&config));
        assert_eq!(transport.kind(), TransportKind::TcpTls);
        assert_eq!(transport.base_url(), "https://registry.example.com");
    }

    #[test]
    fn https_without_config_falls_back_to_default_roots() {
        let transport = build("https://registry.example.com", None);
        assert_eq!(transport.kind(), TransportKind::TcpTls);
    }

    #[test]
    fn timeout_is_kept() {
        assert_eq!(build("host", None).timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn unix_dial_ignores_requested_address() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("registry.sock");
        let listener = tokio::net::UnixListener::bind(&socket_path).unwrap();

        let address = format!("unix://{}", socket_path.display());
        let transport = build(&address, None);
        let uri: Uri = "http://somewhere-else.invalid:1234/v2/".parse().unwrap();

        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });
        transport.dial(&uri).await.expect("dial should reach the socket");
        accept.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn connector_dials_through_transport() {
        use tower::Service;

        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("registry.sock");
        let listener = tokio::net::UnixListener::bind(&socket_path).unwrap();

        let transport = build(&format!("unix://{}", socket_path.display()), None);
        let mut connector = Connector::new(Arc::new(transport));
        let uri: Uri = UNIX_PLACEHOLDER_BASE.parse().unwrap();

        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });
        connector.call(uri).await.expect("connector should reach the socket");
        accept.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn dial_to_missing_socket_fails() {
        let transport = build("unix:///nonexistent/dir/registry.sock", None);
        let uri: Uri = UNIX_PLACEHOLDER_BASE.parse().unwrap();
        assert!(transport.dial(&uri).await.is_err());
    }
}

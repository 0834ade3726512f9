// ABOUTME: Registry HTTP client: endpoint resolution, transport and request execution.
// ABOUTME: The transport kind is chosen once, when the client is built.

mod endpoint;
mod error;
mod executor;
pub mod tls;
mod transport;

pub use endpoint::{Endpoint, TransportKind};
pub use error::{ClientError, ErrorKind, Result};
pub use executor::ResponseBody;
pub use transport::{Transport, UNIX_PLACEHOLDER_BASE};
pub use hyper::{Method, StatusCode};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on how long dialing a registry may take.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options applied when building a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bounds the dial (and TLS handshake) for every request issued by the client.
    pub timeout: Duration,
    /// TLS configuration. Makes scheme-less and `tcp://` addresses use TLS.
    pub tls: Option<Arc<rustls::ClientConfig>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            tls: None,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tls(mut self, tls: Arc<rustls::ClientConfig>) -> Self {
        self.tls = Some(tls);
        self
    }
}

/// Client for a single registry.
///
/// Cheap to clone and safe to share between tasks. Clones share one
/// connection pool; idle connections are reused by later calls.
#[derive(Clone)]
pub struct Client {
    transport: Arc<Transport>,
    http: executor::HttpClient,
    tls: Option<Arc<rustls::ClientConfig>>,
}

impl Client {
    /// Connect to `address` with the default configuration.
    pub fn new(address: &str) -> Result<Self> {
        Self::with_config(address, ClientConfig::default())
    }

    pub fn with_config(address: &str, config: ClientConfig) -> Result<Self> {
        let endpoint = Endpoint::parse(address, config.tls.is_some())?;
        let transport = Arc::new(Transport::build(
            &endpoint,
            config.tls.as_ref(),
            config.timeout,
        )?);
        tracing::debug!(
            "registry client for {} using {} transport",
            endpoint,
            endpoint.kind()
        );

        Ok(Client {
            http: executor::http_client(transport.clone()),
            transport,
            tls: config.tls,
        })
    }

    /// Base address request paths are appended to.
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn timeout(&self) -> Duration {
        self.transport.timeout()
    }

    /// TLS configuration supplied at construction, if any.
    pub fn tls_config(&self) -> Option<&Arc<rustls::ClientConfig>> {
        self.tls.as_ref()
    }

    fn tls_configured(&self) -> bool {
        self.tls.is_some() || self.transport.kind() == TransportKind::TcpTls
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url())
            .field("transport", &self.transport_kind())
            .field("timeout", &self.timeout())
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

// ABOUTME: Connection string parsing for registry clients.
// ABOUTME: Resolves "[scheme://]host[:port][/path]" into a transport kind and base address.

use super::error::{ClientError, Result};
use std::fmt;
use std::path::Path;
use url::Url;

/// How the client reaches the registry. Fixed for the lifetime of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    TcpPlain,
    TcpTls,
    UnixSocket,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::TcpPlain => write!(f, "tcp-plain"),
            TransportKind::TcpTls => write!(f, "tcp-tls"),
            TransportKind::UnixSocket => write!(f, "unix-socket"),
        }
    }
}

/// A parsed connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    kind: TransportKind,
    /// `host[:port]`, empty for unix sockets.
    authority: String,
    /// Path prefix without a trailing slash, or the socket path for unix sockets.
    path: String,
}

impl Endpoint {
    /// Parse a connection string.
    ///
    /// A missing scheme or the raw `tcp` marker resolves to `https` when a TLS
    /// configuration is supplied and to `http` otherwise.
    pub fn parse(address: &str, tls_configured: bool) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ClientError::invalid_address(address, "address cannot be empty"));
        }

        let raw = if address.contains("://") {
            address.to_string()
        } else {
            format!("tcp://{address}")
        };
        let url =
            Url::parse(&raw).map_err(|e| ClientError::invalid_address(address, e.to_string()))?;

        let kind = match url.scheme() {
            "tcp" if tls_configured => TransportKind::TcpTls,
            "tcp" | "http" => TransportKind::TcpPlain,
            "https" => TransportKind::TcpTls,
            "unix" => TransportKind::UnixSocket,
            other => {
                return Err(ClientError::invalid_address(
                    address,
                    format!("unsupported scheme {other:?}"),
                ));
            }
        };

        if kind == TransportKind::UnixSocket {
            let path = url.path();
            if path.is_empty() || path == "/" {
                return Err(ClientError::invalid_address(
                    address,
                    "unix socket path cannot be empty",
                ));
            }
            return Ok(Endpoint {
                kind,
                authority: String::new(),
                path: path.to_string(),
            });
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ClientError::invalid_address(address, "host cannot be empty"))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Endpoint {
            kind,
            authority,
            path: url.path().trim_end_matches('/').to_string(),
        })
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Normalized scheme: `http`, `https` or `unix`.
    pub fn scheme(&self) -> &'static str {
        match self.kind {
            TransportKind::TcpPlain => "http",
            TransportKind::TcpTls => "https",
            TransportKind::UnixSocket => "unix",
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Filesystem path of the socket for unix endpoints.
    pub fn socket_path(&self) -> Option<&Path> {
        match self.kind {
            TransportKind::UnixSocket => Some(Path::new(&self.path)),
            _ => None,
        }
    }

    /// Base address requests are built against. Unix endpoints have none of
    /// their own; the transport substitutes a placeholder host.
    pub fn base_url(&self) -> Option<String> {
        match self.kind {
            TransportKind::UnixSocket => None,
            _ => Some(format!("{}://{}{}", self.scheme(), self.authority, self.path)),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme(), self.authority, self.path)
    }
}

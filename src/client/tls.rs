// ABOUTME: TLS client configuration helpers.
// ABOUTME: Builds rustls configs from bundled webpki roots and optional PEM CA bundles.

use rustls::pki_types::CertificateDer;
use rustls::pki_types::pem::PemObject;
use rustls::{ClientConfig, RootCertStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read CA bundle {path}: {reason}")]
    CaBundle { path: PathBuf, reason: String },

    #[error("no usable certificates found in {0}")]
    EmptyCaBundle(PathBuf),

    #[error("TLS configuration error: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Client config trusting the bundled webpki roots.
pub fn default_client_config() -> Result<Arc<ClientConfig>, TlsError> {
    build(webpki_roots())
}

/// Client config trusting the webpki roots plus every certificate in a PEM bundle.
///
/// Useful for registries signed by a private CA.
pub fn client_config_with_ca(path: &Path) -> Result<Arc<ClientConfig>, TlsError> {
    let read_error = |reason: String| TlsError::CaBundle {
        path: path.to_path_buf(),
        reason,
    };

    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| read_error(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| read_error(e.to_string()))?;

    let mut roots = webpki_roots();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if ignored > 0 {
        tracing::warn!("ignored {} unparsable certificate(s) in {:?}", ignored, path);
    }
    if added == 0 {
        return Err(TlsError::EmptyCaBundle(path.to_path_buf()));
    }

    build(roots)
}

fn webpki_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    roots
}

fn build(roots: RootCertStore) -> Result<Arc<ClientConfig>, TlsError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

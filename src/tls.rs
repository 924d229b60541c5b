//! TLS context construction: load a certificate/key pair and build a
//! TLS 1.2+ server acceptor with a conservative cipher selection.
//!
//! rustls never implements SSLv2/SSLv3/TLS 1.0/1.1, so requiring a minimum
//! protocol version of TLS 1.2 here is sufficient to rule them out. Its
//! default cipher suites for TLS 1.2 are the ECDHE-ECDSA/RSA AES-GCM and
//! CHACHA20-POLY1305 suites the configured cipher preference list names;
//! TLS 1.3 additionally offers the AEAD suites mandated by that version of
//! the protocol, which has no cipher-list concept of its own.

use std::path::Path;
use std::sync::Arc;

use rustls::ServerConfig as RustlsServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::error::ServerError;

fn load_certs(path: &Path) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>, ServerError> {
    let file = std::fs::File::open(path)
        .map_err(|e| ServerError::TlsCredentials(format!("cannot open {path:?}: {e}")))?;
    let mut reader = std::io::BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::TlsCredentials(format!("bad certificate PEM {path:?}: {e}")))
}

fn load_key(path: &Path) -> Result<rustls::pki_types::PrivateKeyDer<'static>, ServerError> {
    let file = std::fs::File::open(path)
        .map_err(|e| ServerError::TlsCredentials(format!("cannot open {path:?}: {e}")))?;
    let mut reader = std::io::BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ServerError::TlsCredentials(format!("bad private key PEM {path:?}: {e}")))?
        .ok_or_else(|| ServerError::TlsCredentials(format!("no private key found in {path:?}")))
}

/// Build a `TlsAcceptor` from PEM-encoded certificate and key files. Fails
/// (without starting the server) if either file is unreadable/malformed, or
/// if the certificate and key don't match.
pub fn build_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, ServerError> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let mut config = RustlsServerConfig::builder_with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::TlsCredentials(format!("certificate/key mismatch: {e}")))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

//! TLS acceptor construction from PEM files.
//!
//! Uses rustls with the `ring` provider selected explicitly, so the process
//! default provider is never consulted.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;

/// Errors raised while building the TLS acceptor.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to load certificate from '{path}': {reason}")]
    CertLoad { path: String, reason: String },

    #[error("no certificates found in '{0}'")]
    NoCertificates(String),

    #[error("failed to load private key from '{path}': {reason}")]
    KeyLoad { path: String, reason: String },

    #[error("no private key found in '{0}'")]
    NoPrivateKey(String),

    #[error("invalid TLS configuration: {0}")]
    Config(String),
}

/// Builds a server-side acceptor from a certificate chain and a private key.
///
/// The key may be PKCS#1, PKCS#8 or SEC1 encoded. The certificate and the key
/// may live in the same file.
pub fn acceptor_from_pem_files(cert_path: &str, key_path: &str) -> Result<TlsAcceptor, TlsError> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| TlsError::Config(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| TlsError::Config(e.to_string()))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn open(path: &str) -> std::io::Result<BufReader<File>> {
    File::open(Path::new(path)).map(BufReader::new)
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let cert_err = |reason: String| TlsError::CertLoad {
        path: path.to_string(),
        reason,
    };

    let mut reader = open(path).map_err(|e| cert_err(e.to_string()))?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| cert_err(e.to_string()))?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_string()));
    }
    Ok(certs)
}

fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>, TlsError> {
    let key_err = |reason: String| TlsError::KeyLoad {
        path: path.to_string(),
        reason,
    };

    let mut reader = open(path).map_err(|e| key_err(e.to_string()))?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| key_err(e.to_string()))?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes()).expect("write temp file");
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_empty_paths_are_rejected() {
        assert!(matches!(
            acceptor_from_pem_files("", ""),
            Err(TlsError::CertLoad { .. })
        ));
    }

    #[test]
    fn test_loads_self_signed_pair() {
        let dir = tempfile::tempdir().expect("tempdir");
        let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .expect("generate certificate");
        let cert = write_temp(&dir, "cert.pem", &generated.cert.pem());
        let key = write_temp(&dir, "key.pem", &generated.key_pair.serialize_pem());

        assert!(acceptor_from_pem_files(&cert, &key).is_ok());
    }

    #[test]
    fn test_combined_pem_file_serves_as_both() {
        let dir = tempfile::tempdir().expect("tempdir");
        let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .expect("generate certificate");
        let bundle = format!("{}{}", generated.cert.pem(), generated.key_pair.serialize_pem());
        let path = write_temp(&dir, "bundle.pem", &bundle);

        assert!(acceptor_from_pem_files(&path, &path).is_ok());
    }

    #[test]
    fn test_key_file_without_key_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .expect("generate certificate");
        let cert = write_temp(&dir, "cert.pem", &generated.cert.pem());

        assert!(matches!(
            acceptor_from_pem_files(&cert, &cert),
            Err(TlsError::NoPrivateKey(_))
        ));
    }
}

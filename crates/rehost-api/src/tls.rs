//! TLS client configuration for `https` control nodes.

use std::sync::Arc;

use rehost_core::{RehostError, RehostResult};

/// Pre-built `rustls` client configuration.
#[derive(Clone)]
pub struct TlsConfig {
    pub client_config: Arc<rustls::ClientConfig>,
}

impl TlsConfig {
    /// Verify the control node against the Mozilla root store.
    pub fn with_webpki_roots() -> RehostResult<Self> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .map_err(|e| RehostError::ApiUnavailable(format!("tls protocol version error: {e}")))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

        Ok(Self {
            client_config: Arc::new(config),
        })
    }

    /// Accept any certificate the control node presents.
    ///
    /// Stock installs generate a self-signed certificate, which no root
    /// store will verify.
    pub fn insecure() -> RehostResult<Self> {
        let config = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .map_err(|e| RehostError::ApiUnavailable(format!("tls protocol version error: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(danger::NoVerifier))
        .with_no_client_auth();

        Ok(Self {
            client_config: Arc::new(config),
        })
    }

    pub fn from_settings(insecure: bool) -> RehostResult<Self> {
        if insecure {
            Self::insecure()
        } else {
            Self::with_webpki_roots()
        }
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig").finish_non_exhaustive()
    }
}

/// Certificate verification for `tls.insecure`.
///
/// Stock control nodes serve a self-signed certificate, so reaching the
/// API over `https` on such installs means skipping verification. Only
/// `TlsConfig::insecure` installs this verifier, and only when the operator
/// asks for it.
mod danger {
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, Error, SignatureScheme};

    /// Accepts every server certificate and signature.
    #[derive(Debug)]
    pub struct NoVerifier;

    impl ServerCertVerifier for NoVerifier {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            rustls::crypto::ring::default_provider()
                .signature_verification_algorithms
                .supported_schemes()
        }
    }
}

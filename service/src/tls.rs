//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! TLS policy for listeners
//!
//! A [`TlsPolicy`] wraps a ready-to-use `rustls::ServerConfig`. Listeners
//! with a policy run the handshake after admission, before the session is
//! created; the framing layer then operates on the decrypted stream and is
//! unaware of the transport.

use crate::error::{Result, ServerError};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::danger::ClientCertVerifier;
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig as RustlsServerConfig, SupportedProtocolVersion};
use std::fmt;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// TLS acceptance policy for a server group.
#[derive(Clone)]
pub struct TlsPolicy {
    server_config: Arc<RustlsServerConfig>,
}

impl TlsPolicy {
    /// Start building a policy from PEM material.
    pub fn builder() -> TlsPolicyBuilder {
        TlsPolicyBuilder::default()
    }

    /// Wrap an externally assembled rustls configuration.
    pub fn from_server_config(config: Arc<RustlsServerConfig>) -> Self {
        Self {
            server_config: config,
        }
    }

    /// Acceptor for the listener accept path.
    pub(crate) fn acceptor(&self) -> TlsAcceptor {
        TlsAcceptor::from(self.server_config.clone())
    }
}

impl fmt::Debug for TlsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsPolicy").finish_non_exhaustive()
    }
}

/// Builder for [`TlsPolicy`]
///
/// # Example
///
/// ```no_run
/// use wireline_service::TlsPolicy;
///
/// # fn main() -> wireline_service::Result<()> {
/// let cert_pem = std::fs::read("server.crt")?;
/// let key_pem = std::fs::read("server.key")?;
/// let policy = TlsPolicy::builder()
///     .with_cert_chain_pem(cert_pem)
///     .with_private_key_pem(key_pem)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct TlsPolicyBuilder {
    cert_chain_pem: Option<Vec<u8>>,
    private_key_pem: Option<Vec<u8>>,
    client_ca_pem: Option<Vec<u8>>,
    require_client_cert: bool,
    client_cert_verifier: Option<Arc<dyn ClientCertVerifier>>,
    versions: Option<Vec<&'static SupportedProtocolVersion>>,
}

impl TlsPolicyBuilder {
    /// Server certificate chain, PEM encoded, leaf first.
    #[must_use]
    pub fn with_cert_chain_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.cert_chain_pem = Some(pem.into());
        self
    }

    /// Server private key, PEM encoded (PKCS#8, PKCS#1 or SEC1).
    #[must_use]
    pub fn with_private_key_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.private_key_pem = Some(pem.into());
        self
    }

    /// Trust anchors for client certificates, PEM encoded.
    ///
    /// Supplying a CA enables optional client authentication; combine with
    /// [`require_client_cert`](Self::require_client_cert) to make it
    /// mandatory.
    #[must_use]
    pub fn with_client_ca_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.client_ca_pem = Some(pem.into());
        self
    }

    /// Reject handshakes that do not present a client certificate.
    #[must_use]
    pub fn require_client_cert(mut self) -> Self {
        self.require_client_cert = true;
        self
    }

    /// Install a custom client-certificate verifier.
    ///
    /// Takes precedence over [`with_client_ca_pem`](Self::with_client_ca_pem)
    /// and the require flag.
    #[must_use]
    pub fn with_client_cert_verifier(mut self, verifier: Arc<dyn ClientCertVerifier>) -> Self {
        self.client_cert_verifier = Some(verifier);
        self
    }

    /// Restrict the allowed TLS protocol versions.
    ///
    /// Defaults to rustls's default version set (TLS 1.2 and 1.3).
    #[must_use]
    pub fn with_protocol_versions(
        mut self,
        versions: &[&'static SupportedProtocolVersion],
    ) -> Self {
        self.versions = Some(versions.to_vec());
        self
    }

    /// Assemble the policy.
    pub fn build(self) -> Result<TlsPolicy> {
        let cert_pem = self
            .cert_chain_pem
            .ok_or_else(|| ServerError::Tls("certificate chain not provided".to_string()))?;
        let key_pem = self
            .private_key_pem
            .ok_or_else(|| ServerError::Tls("private key not provided".to_string()))?;

        let cert_chain: Vec<CertificateDer<'static>> = CertificateDer::pem_slice_iter(&cert_pem)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| ServerError::Tls(format!("invalid certificate chain: {e:?}")))?;
        if cert_chain.is_empty() {
            return Err(ServerError::Tls("certificate chain is empty".to_string()));
        }
        let private_key = PrivateKeyDer::from_pem_slice(&key_pem)
            .map_err(|e| ServerError::Tls(format!("invalid private key: {e:?}")))?;

        let builder = match &self.versions {
            Some(versions) => RustlsServerConfig::builder_with_protocol_versions(versions),
            None => RustlsServerConfig::builder(),
        };
        let builder = if let Some(verifier) = self.client_cert_verifier {
            builder.with_client_cert_verifier(verifier)
        } else if let Some(ca_pem) = &self.client_ca_pem {
            let mut roots = RootCertStore::empty();
            for cert in CertificateDer::pem_slice_iter(ca_pem) {
                let cert =
                    cert.map_err(|e| ServerError::Tls(format!("invalid client CA: {e:?}")))?;
                roots
                    .add(cert)
                    .map_err(|e| ServerError::Tls(format!("invalid client CA: {e}")))?;
            }
            let verifier_builder = WebPkiClientVerifier::builder(Arc::new(roots));
            let verifier_builder = if self.require_client_cert {
                verifier_builder
            } else {
                verifier_builder.allow_unauthenticated()
            };
            let verifier = verifier_builder
                .build()
                .map_err(|e| ServerError::Tls(format!("client verifier: {e}")))?;
            builder.with_client_cert_verifier(verifier)
        } else {
            builder.with_no_client_auth()
        };

        let config = builder
            .with_single_cert(cert_chain, private_key)
            .map_err(|e| ServerError::Tls(format!("certificate/key mismatch: {e}")))?;

        Ok(TlsPolicy {
            server_config: Arc::new(config),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_without_cert_fails() {
        let result = TlsPolicy::builder().build();
        assert!(matches!(result, Err(ServerError::Tls(_))));
    }

    #[test]
    fn test_build_without_key_fails() {
        let result = TlsPolicy::builder()
            .with_cert_chain_pem(b"-----BEGIN CERTIFICATE-----".to_vec())
            .build();
        assert!(matches!(result, Err(ServerError::Tls(_))));
    }

    #[test]
    fn test_build_with_garbage_pem_fails() {
        let result = TlsPolicy::builder()
            .with_cert_chain_pem(b"not pem at all".to_vec())
            .with_private_key_pem(b"also not pem".to_vec())
            .build();
        assert!(matches!(result, Err(ServerError::Tls(_))));
    }
}

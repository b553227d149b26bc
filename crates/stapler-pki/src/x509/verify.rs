//! Trust store loading and X.509 certificate chain verification.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use stapler_types::PkiError;
use stapler_utils::asn1::{tags, Decoder};
use tracing::debug;

use super::{Certificate, KeyUsage};

/// Upper bound on issuer lookups, guarding against cycles among intermediates.
const MAX_CHAIN_ITERATIONS: usize = 100;

/// A set of trusted root certificates plus chain-validation settings.
///
/// Builds and validates certificate chains from a leaf certificate through
/// untrusted intermediates to a trusted self-signed root.
#[derive(Debug, Clone)]
pub struct TrustStore {
    trusted_certs: Vec<Certificate>,
    max_depth: u32,
    verification_time: Option<i64>,
}

impl Default for TrustStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustStore {
    /// Create an empty store (max depth 10, validity checked at the current time).
    pub fn new() -> Self {
        Self {
            trusted_certs: Vec::new(),
            max_depth: 10,
            verification_time: None,
        }
    }

    /// Create a store trusting exactly `certs`.
    pub fn from_certs(certs: Vec<Certificate>) -> Self {
        Self {
            trusted_certs: certs,
            ..Self::new()
        }
    }

    /// Load a store from a file holding either a PEM bundle or one DER certificate.
    ///
    /// PEM blocks other than `CERTIFICATE` and `TRUSTED CERTIFICATE` are skipped.
    /// A file that yields no certificate is an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PkiError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let certs = if stapler_utils::pem::looks_like_pem(&data) {
            let text = std::str::from_utf8(&data)
                .map_err(|_| PkiError::InvalidCert("PEM bundle is not valid UTF-8".into()))?;
            parse_certs_pem(text)?
        } else {
            vec![Certificate::from_der(&data)?]
        };
        if certs.is_empty() {
            return Err(PkiError::EmptyTrustStore);
        }
        debug!(path = %path.display(), count = certs.len(), "loaded trust store");
        Ok(Self::from_certs(certs))
    }

    /// Add a trusted root certificate to the trust store.
    pub fn add_trusted_cert(&mut self, cert: Certificate) -> &mut Self {
        self.trusted_certs.push(cert);
        self
    }

    /// Parse and add all certificates from a PEM string to the trust store.
    pub fn add_trusted_certs_pem(&mut self, pem: &str) -> Result<&mut Self, PkiError> {
        let certs = parse_certs_pem(pem)?;
        self.trusted_certs.extend(certs);
        Ok(self)
    }

    /// Set the maximum chain depth (default 10).
    pub fn set_max_depth(&mut self, depth: u32) -> &mut Self {
        self.max_depth = depth;
        self
    }

    /// Check validity at `time` (UNIX seconds) instead of the current time.
    pub fn set_verification_time(&mut self, time: i64) -> &mut Self {
        self.verification_time = Some(time);
        self
    }

    pub fn len(&self) -> usize {
        self.trusted_certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trusted_certs.is_empty()
    }

    pub fn certs(&self) -> &[Certificate] {
        &self.trusted_certs
    }

    /// Build and verify a certificate chain.
    ///
    /// Returns the built chain `[cert, intermediate..., root]` on success.
    pub fn verify_cert<'a>(
        &'a self,
        cert: &'a Certificate,
        intermediates: &[&'a Certificate],
    ) -> Result<Vec<&'a Certificate>, PkiError> {
        let mut chain = vec![cert];
        let mut current = cert;

        for _ in 0..MAX_CHAIN_ITERATIONS {
            if current.is_self_signed() {
                if !self.is_trusted(current) {
                    return Err(PkiError::UntrustedRoot(current.subject.to_string()));
                }
                self.validate_chain(&chain)?;
                debug!(depth = chain.len(), "certificate chain verified");
                return Ok(chain);
            }

            let issuer = self.find_issuer(current, intermediates)?;

            if chain.len() as u32 > self.max_depth {
                return Err(PkiError::ChainTooLong(self.max_depth));
            }

            chain.push(issuer);
            current = issuer;
        }

        Err(PkiError::ChainTooLong(self.max_depth))
    }

    fn is_trusted(&self, cert: &Certificate) -> bool {
        self.trusted_certs.iter().any(|t| t.raw == cert.raw)
    }

    /// Find the issuer of `cert`: a candidate whose subject equals the
    /// issuer name and whose key verifies the signature. The trust store is
    /// searched before the intermediates.
    fn find_issuer<'a>(
        &'a self,
        cert: &Certificate,
        intermediates: &[&'a Certificate],
    ) -> Result<&'a Certificate, PkiError> {
        let mut name_matched = false;
        let candidates = self
            .trusted_certs
            .iter()
            .chain(intermediates.iter().copied())
            .filter(|c| c.subject_raw == cert.issuer_raw && c.raw != cert.raw);
        for candidate in candidates {
            name_matched = true;
            if let Ok(true) = cert.verify_signature(candidate) {
                return Ok(candidate);
            }
        }
        if name_matched {
            Err(PkiError::SignatureInvalid)
        } else {
            Err(PkiError::IssuerNotFound)
        }
    }

    /// Validate the built chain (time, BasicConstraints, KeyUsage, pathLen).
    fn validate_chain(&self, chain: &[&Certificate]) -> Result<(), PkiError> {
        let time = self.verification_time.unwrap_or_else(now);
        for (i, cert) in chain.iter().enumerate() {
            if let Some(oid) = cert.unhandled_critical_extension() {
                return Err(PkiError::UnhandledCriticalExtension(oid));
            }
            if time < cert.not_before {
                return Err(PkiError::CertNotYetValid);
            }
            if time > cert.not_after {
                return Err(PkiError::CertExpired);
            }

            // For all certs except the leaf (i==0), check CA constraints
            if i == 0 {
                continue;
            }
            if !cert.is_ca() {
                return Err(PkiError::BasicConstraintsViolation(format!(
                    "certificate at depth {i} is not a CA"
                )));
            }
            if let Some(ku) = cert.key_usage() {
                if !ku.has(KeyUsage::KEY_CERT_SIGN) {
                    return Err(PkiError::KeyUsageViolation(format!(
                        "certificate at depth {i} lacks keyCertSign"
                    )));
                }
            }
            // chain[1..i] are the CAs between the leaf and this CA
            if let Some(path_len) = cert.basic_constraints().and_then(|bc| bc.path_len_constraint) {
                let ca_count_below = (i - 1) as u32;
                if ca_count_below > path_len {
                    return Err(PkiError::BasicConstraintsViolation(format!(
                        "pathLenConstraint {path_len} exceeded ({ca_count_below} CAs below)"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Parse every `CERTIFICATE` and `TRUSTED CERTIFICATE` block of a PEM string,
/// skipping other labels.
pub fn parse_certs_pem(pem: &str) -> Result<Vec<Certificate>, PkiError> {
    let blocks = stapler_utils::pem::parse(pem)?;
    blocks
        .iter()
        .filter_map(|block| match block.label.as_str() {
            "CERTIFICATE" => Some(Certificate::from_der(&block.data)),
            "TRUSTED CERTIFICATE" => Some(trusted_certificate(&block.data)),
            _ => None,
        })
        .collect()
}

/// A `TRUSTED CERTIFICATE` body is the certificate followed by an optional
/// `X509_CERT_AUX` SEQUENCE. The aux trust settings are not used.
fn trusted_certificate(data: &[u8]) -> Result<Certificate, PkiError> {
    let mut dec = Decoder::new(data);
    let cert = Certificate::from_der(dec.read_element()?)?;
    if !dec.is_empty() {
        dec.read_expected(tags::SEQUENCE)?;
        dec.finish()?;
    }
    Ok(cert)
}

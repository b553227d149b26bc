//! OCSP response objects (RFC 6960 §4.2).
//!
//! An [`OcspResponse`] is only ever produced by decoding DER. It can be
//! rendered as text, re-encoded, and verified against a set of trusted CAs,
//! optionally using a peer certificate chain (as collected during a TLS
//! handshake) as extra signer candidates.

mod encode;
mod parse;
mod text;
mod verify;

use std::path::Path;

use stapler_types::{HashAlgId, OcspError};
use stapler_utils::asn1::{tags, Decoder, GeneralizedTime};
use stapler_utils::oid::{known, Oid};
use tracing::{debug, warn};

use crate::x509::{
    compute_hash, hash_alg_from_oid, AlgorithmIdentifier, Certificate, DistinguishedName,
    TrustStore, X509Extension,
};

/// OCSP response status (RFC 6960 §4.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcspResponseStatus {
    Successful,
    MalformedRequest,
    InternalError,
    TryLater,
    SigRequired,
    Unauthorized,
    /// A value RFC 6960 does not assign, such as 4.
    Unassigned(u32),
}

impl OcspResponseStatus {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Successful,
            1 => Self::MalformedRequest,
            2 => Self::InternalError,
            3 => Self::TryLater,
            5 => Self::SigRequired,
            6 => Self::Unauthorized,
            other => Self::Unassigned(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Successful => 0,
            Self::MalformedRequest => 1,
            Self::InternalError => 2,
            Self::TryLater => 3,
            Self::SigRequired => 5,
            Self::Unauthorized => 6,
            Self::Unassigned(code) => code,
        }
    }

    /// RFC 6960 name of the status; `(UNKNOWN)` for unassigned values.
    pub fn name(self) -> &'static str {
        match self {
            Self::Successful => "successful",
            Self::MalformedRequest => "malformedRequest",
            Self::InternalError => "internalError",
            Self::TryLater => "tryLater",
            Self::SigRequired => "sigRequired",
            Self::Unauthorized => "unauthorized",
            Self::Unassigned(_) => "(UNKNOWN)",
        }
    }
}

/// CRLReason (RFC 5280 §5.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegeWithdrawn,
    AaCompromise,
    /// 7 or anything above 10.
    Unassigned(u32),
}

impl RevocationReason {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Unspecified,
            1 => Self::KeyCompromise,
            2 => Self::CaCompromise,
            3 => Self::AffiliationChanged,
            4 => Self::Superseded,
            5 => Self::CessationOfOperation,
            6 => Self::CertificateHold,
            8 => Self::RemoveFromCrl,
            9 => Self::PrivilegeWithdrawn,
            10 => Self::AaCompromise,
            other => Self::Unassigned(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Unspecified => 0,
            Self::KeyCompromise => 1,
            Self::CaCompromise => 2,
            Self::AffiliationChanged => 3,
            Self::Superseded => 4,
            Self::CessationOfOperation => 5,
            Self::CertificateHold => 6,
            Self::RemoveFromCrl => 8,
            Self::PrivilegeWithdrawn => 9,
            Self::AaCompromise => 10,
            Self::Unassigned(code) => code,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::KeyCompromise => "keyCompromise",
            Self::CaCompromise => "cACompromise",
            Self::AffiliationChanged => "affiliationChanged",
            Self::Superseded => "superseded",
            Self::CessationOfOperation => "cessationOfOperation",
            Self::CertificateHold => "certificateHold",
            Self::RemoveFromCrl => "removeFromCRL",
            Self::PrivilegeWithdrawn => "privilegeWithdrawn",
            Self::AaCompromise => "aACompromise",
            Self::Unassigned(_) => "(UNKNOWN)",
        }
    }
}

/// OCSP certificate identifier (RFC 6960 §4.1.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspCertId {
    pub hash_algorithm: AlgorithmIdentifier,
    /// Hash of the issuer's subject Name DER.
    pub issuer_name_hash: Vec<u8>,
    /// Hash of the issuer's subjectPublicKey BIT STRING contents.
    pub issuer_key_hash: Vec<u8>,
    pub serial_number: Vec<u8>,
}

impl OcspCertId {
    /// Build the SHA-1 CertID of `cert` as issued by `issuer`.
    pub fn new(cert: &Certificate, issuer: &Certificate) -> Result<Self, OcspError> {
        let mut hash_algorithm = AlgorithmIdentifier::new(&known::sha1())?;
        hash_algorithm.params = Some(vec![tags::NULL, 0x00]);
        Ok(OcspCertId {
            hash_algorithm,
            issuer_name_hash: compute_hash(HashAlgId::Sha1, &issuer.subject_raw),
            issuer_key_hash: compute_hash(HashAlgId::Sha1, &issuer.public_key.public_key),
            serial_number: cert.serial_number.clone(),
        })
    }

    /// Digest named by the CertID, if supported.
    pub fn hash_alg(&self) -> Option<HashAlgId> {
        hash_alg_from_oid(&self.hash_algorithm.oid().ok()?)
    }

    /// Returns true if `issuer` is the CA this CertID names.
    /// Always false for an unsupported hash algorithm.
    pub fn matches_issuer(&self, issuer: &Certificate) -> bool {
        let Some(alg) = self.hash_alg() else {
            return false;
        };
        self.issuer_key_hash.len() == alg.output_len()
            && compute_hash(alg, &issuer.subject_raw) == self.issuer_name_hash
            && compute_hash(alg, &issuer.public_key.public_key) == self.issuer_key_hash
    }

    /// Same certificate, comparing the hash algorithm by OID only.
    pub fn matches(&self, other: &OcspCertId) -> bool {
        self.hash_algorithm.oid == other.hash_algorithm.oid
            && self.issuer_name_hash == other.issuer_name_hash
            && self.issuer_key_hash == other.issuer_key_hash
            && self.serial_number == other.serial_number
    }
}

/// Certificate status in a single response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertStatus {
    Good,
    Revoked {
        revocation_time: GeneralizedTime,
        reason: Option<RevocationReason>,
    },
    Unknown,
}

impl CertStatus {
    pub fn name(&self) -> &'static str {
        match self {
            CertStatus::Good => "good",
            CertStatus::Revoked { .. } => "revoked",
            CertStatus::Unknown => "unknown",
        }
    }
}

/// OCSP responder identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderId {
    ByName {
        name: DistinguishedName,
        /// DER of the Name.
        raw: Vec<u8>,
    },
    /// SHA-1 of the responder's subjectPublicKey BIT STRING contents.
    ByKey(Vec<u8>),
}

/// A single OCSP response for one certificate.
#[derive(Debug, Clone)]
pub struct OcspSingleResponse {
    pub cert_id: OcspCertId,
    pub status: CertStatus,
    pub this_update: GeneralizedTime,
    pub next_update: Option<GeneralizedTime>,
    pub extensions: Vec<X509Extension>,
}

/// BasicOCSPResponse (RFC 6960 §4.2.1).
#[derive(Debug, Clone)]
pub struct OcspBasicResponse {
    /// DER of ResponseData, the signed bytes.
    pub tbs_raw: Vec<u8>,
    /// 0 for v1.
    pub version: u32,
    pub responder_id: ResponderId,
    pub produced_at: GeneralizedTime,
    pub responses: Vec<OcspSingleResponse>,
    pub extensions: Vec<X509Extension>,
    pub signature_algorithm: AlgorithmIdentifier,
    pub signature_unused_bits: u8,
    pub signature: Vec<u8>,
    pub certs: Vec<Certificate>,
}

impl OcspBasicResponse {
    pub fn find_extension(&self, oid: &Oid) -> Option<&X509Extension> {
        let oid_bytes = oid.to_der_value().ok()?;
        self.extensions.iter().find(|e| e.oid == oid_bytes)
    }

    /// Nonce from the response extensions, unwrapped from its OCTET STRING
    /// when it has one.
    pub fn nonce(&self) -> Option<&[u8]> {
        let ext = self.find_extension(&known::ocsp_nonce())?;
        let mut dec = Decoder::new(&ext.value);
        match dec.read_octet_string() {
            Ok(inner) if dec.is_empty() => Some(inner),
            _ => Some(&ext.value),
        }
    }

    /// Find the single response covering `cert_id`.
    pub fn find_response(&self, cert_id: &OcspCertId) -> Option<&OcspSingleResponse> {
        self.responses.iter().find(|r| r.cert_id.matches(cert_id))
    }
}

/// Contents of `responseBytes`.
#[derive(Debug, Clone)]
pub enum ResponseBody {
    Basic(OcspBasicResponse),
    /// A response type other than id-pkix-ocsp-basic, kept as raw octets.
    Other { response_type: Oid, response: Vec<u8> },
}

/// A decoded OCSP response, optionally paired with the peer certificate
/// chain it arrived with.
#[derive(Debug, Clone)]
pub struct OcspResponse<'c> {
    status: OcspResponseStatus,
    body: Option<ResponseBody>,
    peer_chain: &'c [Certificate],
}

impl OcspResponse<'static> {
    /// Always fails: a response can only be obtained by decoding DER.
    pub fn new() -> Result<Self, OcspError> {
        Err(OcspError::UnsupportedOperation(
            "OCSP responses can only be created by decoding DER bytes",
        ))
    }

    /// Decode a DER-encoded OCSPResponse with no peer chain.
    pub fn from_der(data: &[u8]) -> Result<Self, OcspError> {
        OcspResponse::from_der_with_peer_chain(data, &[])
    }
}

impl<'c> OcspResponse<'c> {
    /// Decode a DER-encoded OCSPResponse and attach the peer chain seen
    /// during the handshake. The chain is borrowed, not copied.
    pub fn from_der_with_peer_chain(
        data: &[u8],
        peer_chain: &'c [Certificate],
    ) -> Result<Self, OcspError> {
        let (status, body) = parse::parse_response(data)?;
        debug!(
            status = status.name(),
            peer_chain = peer_chain.len(),
            "decoded OCSP response"
        );
        Ok(OcspResponse {
            status,
            body,
            peer_chain,
        })
    }

    pub fn status(&self) -> OcspResponseStatus {
        self.status
    }

    pub fn body(&self) -> Option<&ResponseBody> {
        self.body.as_ref()
    }

    pub fn response_type(&self) -> Option<Oid> {
        match self.body.as_ref()? {
            ResponseBody::Basic(_) => Some(known::ocsp_basic()),
            ResponseBody::Other { response_type, .. } => Some(response_type.clone()),
        }
    }

    pub fn basic(&self) -> Option<&OcspBasicResponse> {
        match self.body.as_ref()? {
            ResponseBody::Basic(basic) => Some(basic),
            ResponseBody::Other { .. } => None,
        }
    }

    pub fn peer_chain(&self) -> &'c [Certificate] {
        self.peer_chain
    }

    /// Human-readable rendering, in the layout of `openssl ocsp -resp_text`.
    ///
    /// Every append to the output reserves first, and a failed reservation is
    /// reported as [`OcspError::OutOfMemory`].
    pub fn as_text(&self) -> Result<Vec<u8>, OcspError> {
        let mut out = text::TextBuffer::new();
        out.grow(self.text_size_hint())
            .map_err(|_| OcspError::OutOfMemory)?;
        // the output sink is the only part of rendering that can fail
        text::write_response(&mut out, self).map_err(|_| OcspError::OutOfMemory)?;
        Ok(out.into_bytes())
    }

    fn text_size_hint(&self) -> usize {
        let certs = self
            .basic()
            .map_or(0, |b| b.certs.iter().map(|c| c.raw.len() * 4).sum());
        1024 + certs
    }

    /// Canonical DER re-encoding of the decoded response.
    pub fn as_der_bytes(&self) -> Result<Vec<u8>, OcspError> {
        encode::encode_response(self.status, self.body.as_ref())
            .map_err(|e| OcspError::SerializationError(e.to_string()))
    }

    /// Verify the response signature and signer against the CA bundle at
    /// `ca_file` (PEM bundle or a single DER certificate).
    pub fn basic_verify(&self, ca_file: impl AsRef<Path>) -> Result<(), OcspError> {
        self.basic_verify_with(ca_file, |_| {})
    }

    /// Like [`basic_verify`](Self::basic_verify), letting `configure` adjust the
    /// loaded store (verification time, max depth) before it is used.
    ///
    /// The status gate runs before the store is loaded.
    pub fn basic_verify_with(
        &self,
        ca_file: impl AsRef<Path>,
        configure: impl FnOnce(&mut TrustStore),
    ) -> Result<(), OcspError> {
        self.check_status()?;
        let mut store = load_trust_store(ca_file)?;
        configure(&mut store);
        self.basic_verify_with_store(&store)
    }

    /// Like [`basic_verify`](Self::basic_verify) with a caller-configured store.
    pub fn basic_verify_with_store(&self, store: &TrustStore) -> Result<(), OcspError> {
        self.check_status()?;
        let basic = self.basic().ok_or_else(|| {
            OcspError::MalformedResponse("no basic OCSP response to verify".into())
        })?;
        verify::verify_basic(basic, self.peer_chain, store).map_err(|failure| {
            warn!(error = %failure, "OCSP response verification failed");
            OcspError::VerificationFailed(failure)
        })?;
        debug!("OCSP response verified");
        Ok(())
    }

    fn check_status(&self) -> Result<(), OcspError> {
        if self.status == OcspResponseStatus::Successful {
            return Ok(());
        }
        warn!(status = self.status.name(), "refusing to verify response");
        Err(OcspError::UnverifiableResponseStatus {
            status: self.status.name(),
            code: self.status.code(),
        })
    }
}

/// Load a trust store from `ca_file` (PEM bundle or one DER certificate),
/// reporting any failure as [`OcspError::TrustStoreLoadError`].
pub fn load_trust_store(ca_file: impl AsRef<Path>) -> Result<TrustStore, OcspError> {
    let ca_file = ca_file.as_ref();
    TrustStore::from_file(ca_file).map_err(|e| {
        warn!(path = %ca_file.display(), error = %e, "failed to load trust store");
        OcspError::TrustStoreLoadError {
            source_name: ca_file.display().to_string(),
            reason: e.to_string(),
        }
    })
}

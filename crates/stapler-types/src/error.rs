/// ASN.1, PEM and OID codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("null or empty input")]
    NullInput,
    #[error("decode: asn1 buffer failed")]
    DecodeAsn1Fail,
    #[error("decode: unexpected tag: expected {expected:#04x}, got {got:#04x}")]
    UnexpectedTag { expected: u8, got: u8 },
    #[error("decode: invalid length")]
    InvalidLength,
    #[error("decode: invalid time: {0}")]
    InvalidTime(String),
    #[error("decode: {0} trailing bytes")]
    TrailingData(usize),
    #[error("decode: invalid base64")]
    InvalidBase64,
    #[error("decode: unterminated PEM block: {0}")]
    PemUnterminated(String),
    #[error("invalid object identifier")]
    InvalidOid,
}

/// Certificate, chain and trust store errors.
#[derive(Debug, thiserror::Error)]
pub enum PkiError {
    #[error("invalid certificate: {0}")]
    InvalidCert(String),
    #[error("asn1 parse error: {0}")]
    Asn1Error(String),
    #[error("certificate expired")]
    CertExpired,
    #[error("certificate not yet valid")]
    CertNotYetValid,
    #[error("unable to get issuer certificate")]
    IssuerNotFound,
    #[error("certificate chain longer than {0}")]
    ChainTooLong(u32),
    #[error("basic constraints violation: {0}")]
    BasicConstraintsViolation(String),
    #[error("key usage violation: {0}")]
    KeyUsageViolation(String),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("certificate signature failure")]
    SignatureInvalid,
    #[error("unhandled critical extension {0}")]
    UnhandledCriticalExtension(String),
    #[error("self-signed certificate not trusted: {0}")]
    UntrustedRoot(String),
    #[error("no certificates found")]
    EmptyTrustStore,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CodecError> for PkiError {
    fn from(e: CodecError) -> Self {
        PkiError::Asn1Error(e.to_string())
    }
}

/// Why a basic OCSP response was rejected.
#[derive(Debug, thiserror::Error)]
pub enum VerifyFailure {
    #[error("signer certificate not found")]
    SignerNotFound,
    #[error("signature failure")]
    BadSignature,
    #[error("signature check error: {0}")]
    Signature(PkiError),
    #[error("signer certificate verify error: {0}")]
    Chain(PkiError),
    #[error("response contains no single responses")]
    NoResponses,
    #[error("response contains certificate status for different issuers")]
    MixedIssuers,
    #[error("unsupported CertID hash algorithm: {0}")]
    UnsupportedHash(String),
    #[error("missing ocspsigning usage")]
    MissingOcspSigningUsage,
    #[error("responder not authorized by the certificate issuer")]
    ResponderNotAuthorized,
}

/// OCSP response errors.
#[derive(Debug, thiserror::Error)]
pub enum OcspError {
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
    #[error("malformed OCSP response: {0}")]
    MalformedResponse(String),
    #[error("cannot verify an OCSP response with status {status} ({code})")]
    UnverifiableResponseStatus { status: &'static str, code: u32 },
    #[error("failed to load trust store from {source_name}: {reason}")]
    TrustStoreLoadError { source_name: String, reason: String },
    #[error("OCSP response verification failed: {0}")]
    VerificationFailed(#[from] VerifyFailure),
    #[error("memory allocation failed")]
    OutOfMemory,
    #[error("failed to encode OCSP response: {0}")]
    SerializationError(String),
}

impl From<CodecError> for OcspError {
    fn from(e: CodecError) -> Self {
        OcspError::MalformedResponse(e.to_string())
    }
}

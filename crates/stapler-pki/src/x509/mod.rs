//! X.509 certificates, trust stores and chain validation.

mod certificate;
mod extensions;
mod signing;
mod text;
mod verify;

pub use certificate::{
    AlgorithmIdentifier, Certificate, DistinguishedName, SubjectPublicKeyInfo, X509Extension,
};
pub use extensions::{BasicConstraints, ExtendedKeyUsage, KeyUsage};
pub use signing::{compute_hash, hash_alg_from_oid, hash_alg_oid};
pub use text::CertificateText;
pub use verify::{parse_certs_pem, TrustStore};

pub(crate) use certificate::{
    encode_extensions, parse_algorithm_identifier, parse_extensions, parse_name,
};
pub(crate) use signing::verify_signature;
pub(crate) use text::{
    format_extension, format_generalized_time, hex_block, oid_name, write_certificate,
};

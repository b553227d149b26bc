#![forbid(unsafe_code)]
#![doc = "Utility functions for stapler: ASN.1 DER, PEM, OID."]

#[cfg(feature = "asn1")]
pub mod asn1;

#[cfg(feature = "pem")]
pub mod pem;

#[cfg(feature = "oid")]
pub mod oid;

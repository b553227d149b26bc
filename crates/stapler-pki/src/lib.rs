#![forbid(unsafe_code)]
#![doc = "X.509 certificate handling and OCSP response verification for stapler."]

pub(crate) mod encoding;

#[cfg(feature = "x509")]
pub mod x509;

#[cfg(feature = "ocsp")]
pub mod ocsp;

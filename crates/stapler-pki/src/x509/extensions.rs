//! X.509 extension types, parsing functions, and certificate convenience methods.

use stapler_types::PkiError;
use stapler_utils::asn1::{tags, Decoder};
use stapler_utils::oid::{known, Oid};

use super::certificate::Certificate;

// ---------------------------------------------------------------------------
// Extension types
// ---------------------------------------------------------------------------

/// Parsed BasicConstraints extension (RFC 5280 §4.2.1.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub path_len_constraint: Option<u32>,
}

/// Parsed Extended Key Usage extension (RFC 5280 §4.2.1.12).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub purposes: Vec<Oid>,
}

impl ExtendedKeyUsage {
    pub fn contains(&self, purpose: &Oid) -> bool {
        self.purposes.iter().any(|p| p == purpose)
    }
}

/// Parsed KeyUsage extension (RFC 5280 §4.2.1.3) as a bit-flag mask.
///
/// The mask holds the first two octets of the BIT STRING big-endian, so
/// named bit `n` is `0x8000 >> n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub u16);

impl KeyUsage {
    pub const DIGITAL_SIGNATURE: u16 = 0x8000;
    pub const NON_REPUDIATION: u16 = 0x4000;
    pub const KEY_ENCIPHERMENT: u16 = 0x2000;
    pub const DATA_ENCIPHERMENT: u16 = 0x1000;
    pub const KEY_AGREEMENT: u16 = 0x0800;
    pub const KEY_CERT_SIGN: u16 = 0x0400;
    pub const CRL_SIGN: u16 = 0x0200;
    pub const ENCIPHER_ONLY: u16 = 0x0100;
    pub const DECIPHER_ONLY: u16 = 0x0080;

    pub fn has(&self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    /// OpenSSL-style names of the asserted bits, in bit order.
    pub fn names(&self) -> Vec<&'static str> {
        const NAMES: [(u16, &str); 9] = [
            (KeyUsage::DIGITAL_SIGNATURE, "Digital Signature"),
            (KeyUsage::NON_REPUDIATION, "Non Repudiation"),
            (KeyUsage::KEY_ENCIPHERMENT, "Key Encipherment"),
            (KeyUsage::DATA_ENCIPHERMENT, "Data Encipherment"),
            (KeyUsage::KEY_AGREEMENT, "Key Agreement"),
            (KeyUsage::KEY_CERT_SIGN, "Certificate Sign"),
            (KeyUsage::CRL_SIGN, "CRL Sign"),
            (KeyUsage::ENCIPHER_ONLY, "Encipher Only"),
            (KeyUsage::DECIPHER_ONLY, "Decipher Only"),
        ];
        NAMES
            .iter()
            .filter(|(flag, _)| self.has(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Extension parsing functions
// ---------------------------------------------------------------------------

/// `SEQUENCE { cA BOOLEAN DEFAULT FALSE, pathLenConstraint INTEGER OPTIONAL }`
pub(crate) fn parse_basic_constraints(value: &[u8]) -> Result<BasicConstraints, PkiError> {
    let mut outer = Decoder::new(value);
    let mut dec = outer.read_sequence()?;
    outer.finish()?;
    let mut is_ca = false;
    if !dec.is_empty() && dec.peek_tag()?.is(tags::BOOLEAN) {
        is_ca = dec.read_boolean()?;
    }
    let path_len_constraint = if dec.is_empty() {
        None
    } else {
        Some(dec.read_small_integer()?)
    };
    dec.finish()?;
    Ok(BasicConstraints {
        is_ca,
        path_len_constraint,
    })
}

/// `KeyUsage ::= BIT STRING`
pub(crate) fn parse_key_usage(value: &[u8]) -> Result<KeyUsage, PkiError> {
    let mut dec = Decoder::new(value);
    let (unused_bits, data) = dec.read_bit_string()?;
    dec.finish()?;
    let mut mask = match data {
        [] => 0,
        [a] => u16::from(*a) << 8,
        [a, b, ..] => u16::from_be_bytes([*a, *b]),
    };
    // unused bits only matter when they fall inside the two octets we keep
    if data.len() <= 2 && !data.is_empty() {
        let trailing = (2 - data.len()) * 8 + usize::from(unused_bits);
        mask &= u16::MAX.checked_shl(trailing as u32).unwrap_or(0);
    }
    Ok(KeyUsage(mask))
}

/// `ExtKeyUsageSyntax ::= SEQUENCE SIZE (1..MAX) OF KeyPurposeId`
pub(crate) fn parse_extended_key_usage(value: &[u8]) -> Result<ExtendedKeyUsage, PkiError> {
    let mut outer = Decoder::new(value);
    let mut dec = outer.read_sequence()?;
    outer.finish()?;
    let mut purposes = Vec::new();
    while !dec.is_empty() {
        purposes.push(Oid::from_der_value(dec.read_oid()?)?);
    }
    if purposes.is_empty() {
        return Err(PkiError::InvalidCert("empty extended key usage".into()));
    }
    Ok(ExtendedKeyUsage { purposes })
}

// ---------------------------------------------------------------------------
// Certificate extension convenience methods
// ---------------------------------------------------------------------------

impl Certificate {
    /// Reject certificates whose path-validation extensions do not decode.
    /// After this check the accessors below cannot fail.
    pub(crate) fn check_known_extensions(&self) -> Result<(), PkiError> {
        fn bc(v: &[u8]) -> Result<(), PkiError> {
            parse_basic_constraints(v).map(drop)
        }
        fn ku(v: &[u8]) -> Result<(), PkiError> {
            parse_key_usage(v).map(drop)
        }
        fn eku(v: &[u8]) -> Result<(), PkiError> {
            parse_extended_key_usage(v).map(drop)
        }
        let checks: [(Oid, fn(&[u8]) -> Result<(), PkiError>); 3] = [
            (known::basic_constraints(), bc),
            (known::key_usage(), ku),
            (known::ext_key_usage(), eku),
        ];
        for (oid, check) in checks {
            let oid_bytes = oid.to_der_value()?;
            let mut matching = self.extensions.iter().filter(|e| e.oid == oid_bytes);
            if let Some(ext) = matching.next() {
                check(&ext.value).map_err(|e| {
                    PkiError::InvalidCert(format!("bad {} extension: {e}", oid))
                })?;
            }
            if matching.next().is_some() {
                return Err(PkiError::InvalidCert(format!("duplicate extension {oid}")));
            }
        }
        Ok(())
    }

    /// OID of the first critical extension that path validation does not
    /// process (anything but basicConstraints, keyUsage, extKeyUsage).
    pub(crate) fn unhandled_critical_extension(&self) -> Option<String> {
        let handled: Vec<Vec<u8>> = [
            known::basic_constraints(),
            known::key_usage(),
            known::ext_key_usage(),
        ]
        .iter()
        .filter_map(|oid| oid.to_der_value().ok())
        .collect();
        let ext = self
            .extensions
            .iter()
            .find(|e| e.critical && !handled.contains(&e.oid))?;
        Some(match Oid::from_der_value(&ext.oid) {
            Ok(oid) => oid.to_string(),
            Err(_) => hex::encode(&ext.oid),
        })
    }

    /// Parse the BasicConstraints extension, if present.
    pub fn basic_constraints(&self) -> Option<BasicConstraints> {
        self.find_extension(&known::basic_constraints())
            .and_then(|e| parse_basic_constraints(&e.value).ok())
    }

    /// Parse the KeyUsage extension, if present.
    pub fn key_usage(&self) -> Option<KeyUsage> {
        self.find_extension(&known::key_usage())
            .and_then(|e| parse_key_usage(&e.value).ok())
    }

    /// Parse the Extended Key Usage extension, if present.
    pub fn extended_key_usage(&self) -> Option<ExtendedKeyUsage> {
        self.find_extension(&known::ext_key_usage())
            .and_then(|e| parse_extended_key_usage(&e.value).ok())
    }

    /// Returns true if this certificate is a CA (BasicConstraints present with isCA=true).
    pub fn is_ca(&self) -> bool {
        self.basic_constraints().is_some_and(|bc| bc.is_ca)
    }

    /// Returns true if the certificate lists id-kp-OCSPSigning.
    pub fn has_ocsp_signing(&self) -> bool {
        self.extended_key_usage()
            .is_some_and(|eku| eku.contains(&known::kp_ocsp_signing()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT_PEM: &str = include_str!("../../../../tests/vectors/ocsp/root.pem");
    const RESPONDER_PEM: &str = include_str!("../../../../tests/vectors/ocsp/responder.pem");
    const LEAF_PEM: &str = include_str!("../../../../tests/vectors/ocsp/leaf.pem");
    const CRIT_ROOT_PEM: &str = include_str!("../../../../tests/vectors/ocsp/crit_root.pem");
    const TESTCA_ROOT: &str = include_str!("../../../../tests/vectors/x509/testca_root.pem");
    const TESTCA_INTER: &str =
        include_str!("../../../../tests/vectors/x509/testca_intermediate.pem");

    #[test]
    fn test_basic_constraints_values() {
        let root = Certificate::from_pem(TESTCA_ROOT).unwrap();
        assert_eq!(
            root.basic_constraints(),
            Some(BasicConstraints {
                is_ca: true,
                path_len_constraint: Some(30)
            })
        );
        let inter = Certificate::from_pem(TESTCA_INTER).unwrap();
        assert!(inter.is_ca());
        assert_eq!(inter.basic_constraints().unwrap().path_len_constraint, None);
        let leaf = Certificate::from_pem(LEAF_PEM).unwrap();
        assert!(!leaf.is_ca());
    }

    #[test]
    fn test_unhandled_critical_extension() {
        let crit = Certificate::from_pem(CRIT_ROOT_PEM).unwrap();
        assert_eq!(
            crit.unhandled_critical_extension().as_deref(),
            Some("1.3.6.1.4.1.55555.1")
        );
        // critical basicConstraints and keyUsage are processed
        let root = Certificate::from_pem(ROOT_PEM).unwrap();
        assert_eq!(root.unhandled_critical_extension(), None);
    }

    #[test]
    fn test_key_usage_bits() {
        let root = Certificate::from_pem(ROOT_PEM).unwrap();
        let ku = root.key_usage().unwrap();
        assert!(ku.has(KeyUsage::KEY_CERT_SIGN));
        assert!(ku.has(KeyUsage::CRL_SIGN));
        assert!(!ku.has(KeyUsage::DIGITAL_SIGNATURE));
        assert_eq!(ku.names(), vec!["Certificate Sign", "CRL Sign"]);

        let responder = Certificate::from_pem(RESPONDER_PEM).unwrap();
        assert_eq!(responder.key_usage().unwrap().names(), vec!["Digital Signature"]);
    }

    #[test]
    fn test_parse_key_usage_raw() {
        // keyCertSign | cRLSign: 03 02 01 06
        assert_eq!(parse_key_usage(&[0x03, 0x02, 0x01, 0x06]).unwrap(), KeyUsage(0x0600));
        // decipherOnly lives in the second octet: 03 03 07 00 80
        let ku = parse_key_usage(&[0x03, 0x03, 0x07, 0x00, 0x80]).unwrap();
        assert!(ku.has(KeyUsage::DECIPHER_ONLY));
        // bits flagged unused are cleared
        assert_eq!(parse_key_usage(&[0x03, 0x02, 0x07, 0xFF]).unwrap(), KeyUsage(0x8000));
    }

    #[test]
    fn test_ocsp_signing_purpose() {
        let responder = Certificate::from_pem(RESPONDER_PEM).unwrap();
        assert!(responder.has_ocsp_signing());
        let leaf = Certificate::from_pem(LEAF_PEM).unwrap();
        assert!(!leaf.has_ocsp_signing());
        assert!(leaf
            .extended_key_usage()
            .unwrap()
            .contains(&known::kp_server_auth()));
        let root = Certificate::from_pem(ROOT_PEM).unwrap();
        assert!(root.extended_key_usage().is_none());
    }

    #[test]
    fn test_malformed_extension_rejects_cert() {
        assert!(parse_basic_constraints(&[0x30, 0x03, 0x01, 0x01, 0x42]).is_err());
        assert!(parse_extended_key_usage(&[0x30, 0x00]).is_err());
        assert!(parse_basic_constraints(&[0x30, 0x00, 0x00]).is_err());
    }
}

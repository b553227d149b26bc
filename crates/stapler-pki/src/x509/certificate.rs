//! Core X.509 types and DER/PEM parsing.

use stapler_types::{CodecError, PkiError};
use stapler_utils::asn1::{tags, Decoder};
use stapler_utils::oid::{known, Oid};

use super::signing::verify_signature;
use crate::encoding::{enc_bool, enc_octet, enc_oid, enc_raw_parts, enc_seq};

// ---------------------------------------------------------------------------
// Core type definitions
// ---------------------------------------------------------------------------

/// An X.509 certificate.
#[derive(Debug, Clone)]
pub struct Certificate {
    /// DER-encoded certificate data.
    pub raw: Vec<u8>,
    /// Certificate version (1, 2 or 3).
    pub version: u8,
    /// Serial number content bytes.
    pub serial_number: Vec<u8>,
    /// Issuer distinguished name.
    pub issuer: DistinguishedName,
    /// DER encoding of the issuer Name.
    pub issuer_raw: Vec<u8>,
    /// Subject distinguished name.
    pub subject: DistinguishedName,
    /// DER encoding of the subject Name.
    pub subject_raw: Vec<u8>,
    /// Not-before validity time (UNIX timestamp).
    pub not_before: i64,
    /// Not-after validity time (UNIX timestamp).
    pub not_after: i64,
    /// Subject public key info.
    pub public_key: SubjectPublicKeyInfo,
    /// Extensions.
    pub extensions: Vec<X509Extension>,
    /// Raw TBS certificate bytes (for signature verification).
    pub tbs_raw: Vec<u8>,
    /// Outer signatureAlgorithm.
    pub signature_algorithm: AlgorithmIdentifier,
    /// Signature value bytes.
    pub signature_value: Vec<u8>,
}

/// A distinguished name (DN).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinguishedName {
    pub entries: Vec<(String, String)>,
}

/// An AlgorithmIdentifier with its parameters kept as a complete TLV,
/// so that `NULL` and absent parameters stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmIdentifier {
    /// OID content bytes.
    pub oid: Vec<u8>,
    /// Full DER encoding of the parameters, if present.
    pub params: Option<Vec<u8>>,
}

/// Subject public key info.
#[derive(Debug, Clone)]
pub struct SubjectPublicKeyInfo {
    pub algorithm: AlgorithmIdentifier,
    /// Contents of the subjectPublicKey BIT STRING, without the unused-bits octet.
    pub public_key: Vec<u8>,
}

/// An X.509 extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509Extension {
    pub oid: Vec<u8>,
    pub critical: bool,
    pub value: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Distinguished Name helpers
// ---------------------------------------------------------------------------

impl std::fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

impl DistinguishedName {
    /// Get the value for a given attribute short name (e.g., "CN").
    pub fn get(&self, attr: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == attr)
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// AlgorithmIdentifier
// ---------------------------------------------------------------------------

impl AlgorithmIdentifier {
    /// Build an identifier with no parameters.
    pub fn new(oid: &Oid) -> Result<Self, CodecError> {
        Ok(Self {
            oid: oid.to_der_value()?,
            params: None,
        })
    }

    /// Decoded OID.
    pub fn oid(&self) -> Result<Oid, CodecError> {
        Oid::from_der_value(&self.oid)
    }

    /// Returns true if this identifier names `oid`.
    pub fn is(&self, oid: &Oid) -> bool {
        oid.to_der_value().map_or(false, |v| v == self.oid)
    }

    /// Parameters that are an OID (EC named curve), if any.
    pub fn params_oid(&self) -> Option<Oid> {
        let params = self.params.as_ref()?;
        let mut dec = Decoder::new(params);
        Oid::from_der_value(dec.read_oid().ok()?).ok()
    }

    /// DER encoding of the AlgorithmIdentifier SEQUENCE.
    pub fn to_der(&self) -> Result<Vec<u8>, CodecError> {
        let oid = enc_oid(&self.oid)?;
        let params = self.params.as_deref().unwrap_or(&[]);
        Ok(enc_seq(&enc_raw_parts(&[&oid, params])))
    }
}

pub(crate) fn parse_algorithm_identifier(
    dec: &mut Decoder,
) -> Result<AlgorithmIdentifier, PkiError> {
    let mut alg_dec = dec.read_sequence()?;
    let oid = alg_dec.read_oid()?.to_vec();
    let params = if alg_dec.is_empty() {
        None
    } else {
        Some(alg_dec.read_element()?.to_vec())
    };
    alg_dec.finish()?;
    Ok(AlgorithmIdentifier { oid, params })
}

// ---------------------------------------------------------------------------
// Name / DN parsing
// ---------------------------------------------------------------------------

/// Parse a Name, returning the decoded DN and its complete DER encoding.
pub(crate) fn parse_name<'a>(
    dec: &mut Decoder<'a>,
) -> Result<(DistinguishedName, &'a [u8]), PkiError> {
    let tlv = dec.read_expected(tags::SEQUENCE)?;
    let mut name_dec = Decoder::new(tlv.value);
    let mut entries = Vec::new();
    while !name_dec.is_empty() {
        let mut rdn_dec = name_dec.read_set()?;
        while !rdn_dec.is_empty() {
            let mut atav_dec = rdn_dec.read_sequence()?;
            let oid = Oid::from_der_value(atav_dec.read_oid()?)?;
            let attr_name = known::oid_to_dn_short_name(&oid)
                .map(|s| s.to_string())
                .unwrap_or_else(|| oid.to_dot_string());
            let raw_value = atav_dec.read_element()?;
            // RFC 4514: values that are not strings print as #hex
            let value = Decoder::new(raw_value)
                .read_string()
                .unwrap_or_else(|_| format!("#{}", hex::encode(raw_value)));
            entries.push((attr_name, value));
        }
    }
    Ok((DistinguishedName { entries }, tlv.raw))
}

// ---------------------------------------------------------------------------
// Validity parsing
// ---------------------------------------------------------------------------

fn parse_validity(dec: &mut Decoder) -> Result<(i64, i64), PkiError> {
    let mut val_dec = dec.read_sequence()?;
    let not_before = val_dec.read_time()?;
    let not_after = val_dec.read_time()?;
    val_dec.finish()?;
    Ok((not_before, not_after))
}

// ---------------------------------------------------------------------------
// SubjectPublicKeyInfo parsing
// ---------------------------------------------------------------------------

fn parse_subject_public_key_info(dec: &mut Decoder) -> Result<SubjectPublicKeyInfo, PkiError> {
    let mut spki_dec = dec.read_sequence()?;
    let algorithm = parse_algorithm_identifier(&mut spki_dec)?;
    let (unused, pub_key_bytes) = spki_dec.read_bit_string()?;
    if unused != 0 {
        return Err(PkiError::InvalidCert(
            "public key BIT STRING has unused bits".into(),
        ));
    }
    spki_dec.finish()?;
    Ok(SubjectPublicKeyInfo {
        algorithm,
        public_key: pub_key_bytes.to_vec(),
    })
}

// ---------------------------------------------------------------------------
// Extensions
// ---------------------------------------------------------------------------

/// Parse `Extensions ::= SEQUENCE SIZE (1..MAX) OF Extension`.
pub(crate) fn parse_extensions(ext_data: &[u8]) -> Result<Vec<X509Extension>, PkiError> {
    let mut outer = Decoder::new(ext_data);
    let mut ext_seq = outer.read_sequence()?;
    outer.finish()?;
    let mut extensions = Vec::new();
    while !ext_seq.is_empty() {
        let mut ext_dec = ext_seq.read_sequence()?;
        let oid = ext_dec.read_oid()?.to_vec();
        // critical BOOLEAN DEFAULT FALSE
        let critical = if ext_dec.peek_tag()?.is(tags::BOOLEAN) {
            ext_dec.read_boolean()?
        } else {
            false
        };
        let value = ext_dec.read_octet_string()?.to_vec();
        ext_dec.finish()?;
        extensions.push(X509Extension {
            oid,
            critical,
            value,
        });
    }
    Ok(extensions)
}

/// Encode `Extensions ::= SEQUENCE OF Extension`, omitting DEFAULT FALSE criticality.
pub(crate) fn encode_extensions(exts: &[X509Extension]) -> Result<Vec<u8>, CodecError> {
    let mut body = Vec::new();
    for ext in exts {
        let oid = enc_oid(&ext.oid)?;
        let crit = if ext.critical { enc_bool(true) } else { Vec::new() };
        let value = enc_octet(&ext.value);
        body.extend(enc_seq(&enc_raw_parts(&[&oid, &crit, &value])));
    }
    Ok(enc_seq(&body))
}

// ---------------------------------------------------------------------------
// Certificate implementation
// ---------------------------------------------------------------------------

impl Certificate {
    /// Parse a certificate from DER-encoded bytes.
    pub fn from_der(data: &[u8]) -> Result<Self, PkiError> {
        let mut top = Decoder::new(data);
        let mut outer = top.read_sequence()?;
        top.finish()?;

        let tbs_tlv = outer.read_expected(tags::SEQUENCE)?;
        let tbs_raw = tbs_tlv.raw.to_vec();
        let mut tbs_dec = Decoder::new(tbs_tlv.value);

        // version [0] EXPLICIT INTEGER DEFAULT v1
        let version = match tbs_dec.try_read_context_specific(0, true)? {
            Some(v_tlv) => {
                let v = Decoder::new(v_tlv.value).read_small_integer()?;
                if v > 2 {
                    return Err(PkiError::InvalidCert(format!("unknown version {v}")));
                }
                v as u8 + 1
            }
            None => 1,
        };

        let serial_number = tbs_dec.read_integer()?.to_vec();

        // signature AlgorithmIdentifier (inner, must match outer)
        let inner_sig_alg = parse_algorithm_identifier(&mut tbs_dec)?;

        let (issuer, issuer_raw) = parse_name(&mut tbs_dec)?;
        let (not_before, not_after) = parse_validity(&mut tbs_dec)?;
        let (subject, subject_raw) = parse_name(&mut tbs_dec)?;
        let public_key = parse_subject_public_key_info(&mut tbs_dec)?;

        // issuerUniqueID [1] / subjectUniqueID [2] IMPLICIT BIT STRING OPTIONAL
        tbs_dec.try_read_context_specific(1, false)?;
        tbs_dec.try_read_context_specific(2, false)?;

        // extensions [3] EXPLICIT Extensions OPTIONAL
        let extensions = match tbs_dec.try_read_context_specific(3, true)? {
            Some(ext_tlv) => parse_extensions(ext_tlv.value)?,
            None => Vec::new(),
        };
        tbs_dec.finish()?;

        let signature_algorithm = parse_algorithm_identifier(&mut outer)?;
        if signature_algorithm != inner_sig_alg {
            return Err(PkiError::InvalidCert(
                "signature algorithm mismatch between TBS and outer certificate".into(),
            ));
        }

        let (unused, sig_bytes) = outer.read_bit_string()?;
        if unused != 0 {
            return Err(PkiError::InvalidCert("signature has unused bits".into()));
        }
        outer.finish()?;

        let cert = Certificate {
            raw: data.to_vec(),
            version,
            serial_number,
            issuer,
            issuer_raw: issuer_raw.to_vec(),
            subject,
            subject_raw: subject_raw.to_vec(),
            not_before,
            not_after,
            public_key,
            extensions,
            tbs_raw,
            signature_algorithm,
            signature_value: sig_bytes.to_vec(),
        };
        cert.check_known_extensions()?;
        Ok(cert)
    }

    /// Parse a certificate from PEM-encoded string.
    pub fn from_pem(pem: &str) -> Result<Self, PkiError> {
        let blocks = stapler_utils::pem::parse(pem)?;
        let cert_block = blocks
            .iter()
            .find(|b| b.label == "CERTIFICATE")
            .ok_or_else(|| PkiError::InvalidCert("no CERTIFICATE block found".into()))?;
        Self::from_der(&cert_block.data)
    }

    /// Encode this certificate to DER format.
    pub fn to_der(&self) -> &[u8] {
        &self.raw
    }

    /// Verify the certificate signature against an issuer's public key.
    pub fn verify_signature(&self, issuer: &Certificate) -> Result<bool, PkiError> {
        verify_signature(
            &self.signature_algorithm,
            &self.tbs_raw,
            &self.signature_value,
            &issuer.public_key,
        )
    }

    /// Returns true if issuer and subject names are identical.
    pub fn is_self_signed(&self) -> bool {
        self.issuer_raw == self.subject_raw
    }

    /// Find an extension by OID.
    pub fn find_extension(&self, oid: &Oid) -> Option<&X509Extension> {
        let oid_bytes = oid.to_der_value().ok()?;
        self.extensions.iter().find(|e| e.oid == oid_bytes)
    }
}

//! OID (Object Identifier) management.

use stapler_types::CodecError;

/// A parsed OID represented as a sequence of arc values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: Vec<u32>,
}

impl Oid {
    /// Create an OID from a slice of arc values.
    pub fn new(arcs: &[u32]) -> Self {
        Self {
            arcs: arcs.to_vec(),
        }
    }

    /// Return the arc values.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Encode this OID to DER bytes (just the value, no tag/length).
    pub fn to_der_value(&self) -> Result<Vec<u8>, CodecError> {
        let (first, second) = match self.arcs.as_slice() {
            [a, b, ..] if *a <= 2 && (*a == 2 || *b < 40) => (*a, *b),
            _ => return Err(CodecError::InvalidOid),
        };
        let lead = first
            .checked_mul(40)
            .and_then(|v| v.checked_add(second))
            .ok_or(CodecError::InvalidOid)?;
        let mut buf = Vec::new();
        encode_arc(&mut buf, lead);
        for &arc in &self.arcs[2..] {
            encode_arc(&mut buf, arc);
        }
        Ok(buf)
    }

    /// Parse an OID from DER value bytes.
    pub fn from_der_value(data: &[u8]) -> Result<Self, CodecError> {
        if data.is_empty() {
            return Err(CodecError::InvalidOid);
        }
        let (lead, mut i) = decode_arc(data)?;
        let mut arcs = match lead {
            0..=39 => vec![0, lead],
            40..=79 => vec![1, lead - 40],
            _ => vec![2, lead - 80],
        };
        while i < data.len() {
            let (arc, consumed) = decode_arc(&data[i..])?;
            arcs.push(arc);
            i += consumed;
        }
        Ok(Self { arcs })
    }

    /// Return the dotted-string representation (e.g., "1.2.840.113549.1.1.1").
    pub fn to_dot_string(&self) -> String {
        self.arcs
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_dot_string())
    }
}

fn encode_arc(buf: &mut Vec<u8>, mut value: u32) {
    let mut groups = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        groups.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    buf.extend(groups.iter().rev());
}

fn decode_arc(data: &[u8]) -> Result<(u32, usize), CodecError> {
    if data.first() == Some(&0x80) {
        // non-minimal
        return Err(CodecError::InvalidOid);
    }
    let mut value: u32 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if value > (u32::MAX >> 7) {
            return Err(CodecError::InvalidOid);
        }
        value = (value << 7) | (byte & 0x7F) as u32;
        if (byte & 0x80) == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(CodecError::InvalidOid)
}

/// Well-known OIDs.
pub mod known {
    use super::Oid;

    // RSA
    pub fn rsa_encryption() -> Oid {
        Oid::new(&[1, 2, 840, 113549, 1, 1, 1])
    }
    pub fn sha1_with_rsa_encryption() -> Oid {
        Oid::new(&[1, 2, 840, 113549, 1, 1, 5])
    }
    pub fn sha256_with_rsa_encryption() -> Oid {
        Oid::new(&[1, 2, 840, 113549, 1, 1, 11])
    }
    pub fn sha384_with_rsa_encryption() -> Oid {
        Oid::new(&[1, 2, 840, 113549, 1, 1, 12])
    }
    pub fn sha512_with_rsa_encryption() -> Oid {
        Oid::new(&[1, 2, 840, 113549, 1, 1, 13])
    }
    pub fn rsassa_pss() -> Oid {
        Oid::new(&[1, 2, 840, 113549, 1, 1, 10])
    }
    pub fn mgf1() -> Oid {
        Oid::new(&[1, 2, 840, 113549, 1, 1, 8])
    }

    // EC
    pub fn ec_public_key() -> Oid {
        Oid::new(&[1, 2, 840, 10045, 2, 1])
    }
    pub fn ecdsa_with_sha256() -> Oid {
        Oid::new(&[1, 2, 840, 10045, 4, 3, 2])
    }
    pub fn ecdsa_with_sha384() -> Oid {
        Oid::new(&[1, 2, 840, 10045, 4, 3, 3])
    }
    pub fn ecdsa_with_sha512() -> Oid {
        Oid::new(&[1, 2, 840, 10045, 4, 3, 4])
    }
    pub fn prime256v1() -> Oid {
        Oid::new(&[1, 2, 840, 10045, 3, 1, 7])
    }
    pub fn secp384r1() -> Oid {
        Oid::new(&[1, 3, 132, 0, 34])
    }
    pub fn ed25519() -> Oid {
        Oid::new(&[1, 3, 101, 112])
    }

    // Hash algorithms
    pub fn sha1() -> Oid {
        Oid::new(&[1, 3, 14, 3, 2, 26])
    }
    pub fn sha256() -> Oid {
        Oid::new(&[2, 16, 840, 1, 101, 3, 4, 2, 1])
    }
    pub fn sha384() -> Oid {
        Oid::new(&[2, 16, 840, 1, 101, 3, 4, 2, 2])
    }
    pub fn sha512() -> Oid {
        Oid::new(&[2, 16, 840, 1, 101, 3, 4, 2, 3])
    }

    // X.509 extensions (RFC 5280)
    pub fn key_usage() -> Oid {
        Oid::new(&[2, 5, 29, 15])
    }
    pub fn basic_constraints() -> Oid {
        Oid::new(&[2, 5, 29, 19])
    }
    pub fn ext_key_usage() -> Oid {
        Oid::new(&[2, 5, 29, 37])
    }

    // Extended key usage purposes
    pub fn kp_server_auth() -> Oid {
        Oid::new(&[1, 3, 6, 1, 5, 5, 7, 3, 1])
    }
    pub fn kp_ocsp_signing() -> Oid {
        Oid::new(&[1, 3, 6, 1, 5, 5, 7, 3, 9])
    }

    // OCSP (RFC 6960)
    pub fn ocsp() -> Oid {
        Oid::new(&[1, 3, 6, 1, 5, 5, 7, 48, 1])
    }
    pub fn ocsp_basic() -> Oid {
        Oid::new(&[1, 3, 6, 1, 5, 5, 7, 48, 1, 1])
    }
    pub fn ocsp_nonce() -> Oid {
        Oid::new(&[1, 3, 6, 1, 5, 5, 7, 48, 1, 2])
    }

    // DN attributes
    pub fn common_name() -> Oid {
        Oid::new(&[2, 5, 4, 3])
    }
    pub fn country_name() -> Oid {
        Oid::new(&[2, 5, 4, 6])
    }

    /// Short name (`CN`, `O`, ...) for a distinguished-name attribute.
    pub fn oid_to_dn_short_name(oid: &Oid) -> Option<&'static str> {
        let name = match oid.arcs() {
            [2, 5, 4, 3] => "CN",
            [2, 5, 4, 4] => "SN",
            [2, 5, 4, 5] => "serialNumber",
            [2, 5, 4, 6] => "C",
            [2, 5, 4, 7] => "L",
            [2, 5, 4, 8] => "ST",
            [2, 5, 4, 9] => "street",
            [2, 5, 4, 10] => "O",
            [2, 5, 4, 11] => "OU",
            [2, 5, 4, 12] => "title",
            [2, 5, 4, 42] => "GN",
            [1, 2, 840, 113549, 1, 9, 1] => "emailAddress",
            [0, 9, 2342, 19200300, 100, 1, 25] => "DC",
            [0, 9, 2342, 19200300, 100, 1, 1] => "UID",
            _ => return None,
        };
        Some(name)
    }
}

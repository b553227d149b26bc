/// Hash algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgId {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgId {
    /// Digest length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            HashAlgId::Sha1 => 20,
            HashAlgId::Sha256 => 32,
            HashAlgId::Sha384 => 48,
            HashAlgId::Sha512 => 64,
        }
    }

    /// Short name as printed by OpenSSL (`sha1`, `sha256`, ...).
    pub fn name(self) -> &'static str {
        match self {
            HashAlgId::Sha1 => "sha1",
            HashAlgId::Sha256 => "sha256",
            HashAlgId::Sha384 => "sha384",
            HashAlgId::Sha512 => "sha512",
        }
    }
}

/// Elliptic curve identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EccCurveId {
    NistP256,
    NistP384,
}

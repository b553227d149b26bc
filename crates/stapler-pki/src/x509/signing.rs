//! Digest and signature verification helpers backed by `ring`.

use ring::{digest, signature};
use stapler_types::{EccCurveId, HashAlgId, PkiError};
use stapler_utils::asn1::Decoder;
use stapler_utils::oid::{known, Oid};

use super::certificate::{AlgorithmIdentifier, SubjectPublicKeyInfo};

// ---------------------------------------------------------------------------
// Hash algorithm dispatch
// ---------------------------------------------------------------------------

/// Digest `data` with the given hash algorithm.
pub fn compute_hash(alg: HashAlgId, data: &[u8]) -> Vec<u8> {
    let algorithm = match alg {
        HashAlgId::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
        HashAlgId::Sha256 => &digest::SHA256,
        HashAlgId::Sha384 => &digest::SHA384,
        HashAlgId::Sha512 => &digest::SHA512,
    };
    digest::digest(algorithm, data).as_ref().to_vec()
}

/// Map a digest OID (as used in a CertID) to a hash algorithm.
pub fn hash_alg_from_oid(oid: &Oid) -> Option<HashAlgId> {
    if *oid == known::sha1() {
        Some(HashAlgId::Sha1)
    } else if *oid == known::sha256() {
        Some(HashAlgId::Sha256)
    } else if *oid == known::sha384() {
        Some(HashAlgId::Sha384)
    } else if *oid == known::sha512() {
        Some(HashAlgId::Sha512)
    } else {
        None
    }
}

/// Digest OID for a hash algorithm.
pub fn hash_alg_oid(alg: HashAlgId) -> Oid {
    match alg {
        HashAlgId::Sha1 => known::sha1(),
        HashAlgId::Sha256 => known::sha256(),
        HashAlgId::Sha384 => known::sha384(),
        HashAlgId::Sha512 => known::sha512(),
    }
}

// ---------------------------------------------------------------------------
// Signature verification functions
// ---------------------------------------------------------------------------

fn unsupported(what: impl std::fmt::Display) -> PkiError {
    PkiError::UnsupportedAlgorithm(what.to_string())
}

pub(crate) fn rsa_modulus_bits(spki: &SubjectPublicKeyInfo) -> Result<usize, PkiError> {
    // RSA SPKI public_key is DER: SEQUENCE { modulus INTEGER, exponent INTEGER }
    let mut key_dec = Decoder::new(&spki.public_key);
    let mut seq = key_dec.read_sequence()?;
    let n = seq.read_integer()?;
    seq.read_integer()?;
    seq.finish()?;
    let n = match n {
        [0x00, rest @ ..] => rest,
        _ => n,
    };
    Ok(match n.first() {
        Some(b) => (n.len() - 1) * 8 + (8 - b.leading_zeros() as usize),
        None => 0,
    })
}

fn verify_rsa(
    tbs: &[u8],
    sig: &[u8],
    spki: &SubjectPublicKeyInfo,
    hash_alg: HashAlgId,
) -> Result<bool, PkiError> {
    if !spki.algorithm.is(&known::rsa_encryption()) {
        return Err(PkiError::InvalidCert("RSA signature with a non-RSA key".into()));
    }
    let bits = rsa_modulus_bits(spki)?;
    if !(1024..=8192).contains(&bits) {
        return Err(unsupported(format_args!("{bits}-bit RSA key")));
    }
    // keys under 2048 bits need ring's legacy verifiers
    let params: &'static signature::RsaParameters = match (hash_alg, bits >= 2048) {
        (HashAlgId::Sha1, true) => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        (HashAlgId::Sha1, false) => &signature::RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY,
        (HashAlgId::Sha256, true) => &signature::RSA_PKCS1_2048_8192_SHA256,
        (HashAlgId::Sha256, false) => &signature::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY,
        (HashAlgId::Sha384, true) => &signature::RSA_PKCS1_2048_8192_SHA384,
        (HashAlgId::Sha512, true) => &signature::RSA_PKCS1_2048_8192_SHA512,
        (HashAlgId::Sha512, false) => &signature::RSA_PKCS1_1024_8192_SHA512_FOR_LEGACY_USE_ONLY,
        (HashAlgId::Sha384, false) => {
            return Err(unsupported(format_args!("{bits}-bit RSA key with sha384")))
        }
    };
    Ok(signature::UnparsedPublicKey::new(params, &spki.public_key)
        .verify(tbs, sig)
        .is_ok())
}

/// Decoded RSASSA-PSS-params (RFC 4055 §3.1), with the DER defaults applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PssParams {
    pub hash: HashAlgId,
    pub mgf1_hash: HashAlgId,
    pub salt_len: u32,
    pub trailer: u32,
}

/// Hash named by a DER AlgorithmIdentifier whose parameters are absent or NULL.
fn digest_alg_from_der(der: &[u8]) -> Result<HashAlgId, PkiError> {
    let mut dec = Decoder::new(der);
    let mut alg = dec.read_sequence()?;
    dec.finish()?;
    let oid = Oid::from_der_value(alg.read_oid()?)?;
    if !alg.is_empty() {
        alg.read_null()?;
    }
    alg.finish()?;
    hash_alg_from_oid(&oid).ok_or_else(|| unsupported(format_args!("digest {oid}")))
}

fn explicit_small_int(value: &[u8]) -> Result<u32, PkiError> {
    let mut dec = Decoder::new(value);
    let n = dec.read_small_integer()?;
    dec.finish()?;
    Ok(n)
}

pub(crate) fn parse_pss_params(params: Option<&[u8]>) -> Result<PssParams, PkiError> {
    let params = params.ok_or_else(|| unsupported("RSASSA-PSS without parameters"))?;
    let mut outer = Decoder::new(params);
    let mut seq = outer.read_sequence()?;
    outer.finish()?;

    let hash = match seq.try_read_context_specific(0, true)? {
        Some(tlv) => digest_alg_from_der(tlv.value)?,
        None => HashAlgId::Sha1,
    };
    let mgf1_hash = match seq.try_read_context_specific(1, true)? {
        Some(tlv) => {
            let mut dec = Decoder::new(tlv.value);
            let mut mgf = dec.read_sequence()?;
            dec.finish()?;
            let oid = Oid::from_der_value(mgf.read_oid()?)?;
            if oid != known::mgf1() {
                return Err(unsupported(format_args!("mask generation function {oid}")));
            }
            let mgf_hash = digest_alg_from_der(mgf.read_element()?)?;
            mgf.finish()?;
            mgf_hash
        }
        None => HashAlgId::Sha1,
    };
    let salt_len = match seq.try_read_context_specific(2, true)? {
        Some(tlv) => explicit_small_int(tlv.value)?,
        None => 20,
    };
    let trailer = match seq.try_read_context_specific(3, true)? {
        Some(tlv) => explicit_small_int(tlv.value)?,
        None => 1,
    };
    seq.finish()?;
    Ok(PssParams {
        hash,
        mgf1_hash,
        salt_len,
        trailer,
    })
}

fn verify_rsa_pss(
    tbs: &[u8],
    sig: &[u8],
    spki: &SubjectPublicKeyInfo,
    alg: &AlgorithmIdentifier,
) -> Result<bool, PkiError> {
    if !spki.algorithm.is(&known::rsa_encryption()) && !spki.algorithm.is(&known::rsassa_pss()) {
        return Err(PkiError::InvalidCert("RSA-PSS signature with a non-RSA key".into()));
    }
    let pss = parse_pss_params(alg.params.as_deref())?;
    // ring fixes MGF1 to the message hash and the salt to the hash length
    if pss.mgf1_hash != pss.hash
        || pss.salt_len as usize != pss.hash.output_len()
        || pss.trailer != 1
    {
        return Err(unsupported(format_args!(
            "RSASSA-PSS with {}, MGF1 {}, salt {}, trailer {}",
            pss.hash.name(),
            pss.mgf1_hash.name(),
            pss.salt_len,
            pss.trailer
        )));
    }
    let params: &'static signature::RsaParameters = match pss.hash {
        HashAlgId::Sha256 => &signature::RSA_PSS_2048_8192_SHA256,
        HashAlgId::Sha384 => &signature::RSA_PSS_2048_8192_SHA384,
        HashAlgId::Sha512 => &signature::RSA_PSS_2048_8192_SHA512,
        HashAlgId::Sha1 => return Err(unsupported("RSASSA-PSS with sha1")),
    };
    let bits = rsa_modulus_bits(spki)?;
    if !(2048..=8192).contains(&bits) {
        return Err(unsupported(format_args!("{bits}-bit RSA-PSS key")));
    }
    Ok(signature::UnparsedPublicKey::new(params, &spki.public_key)
        .verify(tbs, sig)
        .is_ok())
}

pub(crate) fn oid_to_curve_id(oid: &Oid) -> Option<EccCurveId> {
    if *oid == known::prime256v1() {
        Some(EccCurveId::NistP256)
    } else if *oid == known::secp384r1() {
        Some(EccCurveId::NistP384)
    } else {
        None
    }
}

fn verify_ecdsa(
    tbs: &[u8],
    sig: &[u8],
    spki: &SubjectPublicKeyInfo,
    hash_alg: HashAlgId,
) -> Result<bool, PkiError> {
    if !spki.algorithm.is(&known::ec_public_key()) {
        return Err(PkiError::InvalidCert("ECDSA signature with a non-EC key".into()));
    }
    let curve_oid = spki
        .algorithm
        .params_oid()
        .ok_or_else(|| PkiError::InvalidCert("missing EC curve OID in algorithm params".into()))?;
    let curve = oid_to_curve_id(&curve_oid)
        .ok_or_else(|| unsupported(format_args!("EC curve {curve_oid}")))?;
    let alg: &'static signature::EcdsaVerificationAlgorithm = match (curve, hash_alg) {
        (EccCurveId::NistP256, HashAlgId::Sha256) => &signature::ECDSA_P256_SHA256_ASN1,
        (EccCurveId::NistP256, HashAlgId::Sha384) => &signature::ECDSA_P256_SHA384_ASN1,
        (EccCurveId::NistP384, HashAlgId::Sha256) => &signature::ECDSA_P384_SHA256_ASN1,
        (EccCurveId::NistP384, HashAlgId::Sha384) => &signature::ECDSA_P384_SHA384_ASN1,
        (curve, hash) => {
            return Err(unsupported(format_args!("ECDSA {curve:?} with {}", hash.name())))
        }
    };
    Ok(signature::UnparsedPublicKey::new(alg, &spki.public_key)
        .verify(tbs, sig)
        .is_ok())
}

fn verify_ed25519(tbs: &[u8], sig: &[u8], spki: &SubjectPublicKeyInfo) -> Result<bool, PkiError> {
    if !spki.algorithm.is(&known::ed25519()) {
        return Err(PkiError::InvalidCert("Ed25519 signature with a non-Ed25519 key".into()));
    }
    // Ed25519 takes the raw message (not pre-hashed)
    Ok(signature::UnparsedPublicKey::new(&signature::ED25519, &spki.public_key)
        .verify(tbs, sig)
        .is_ok())
}

/// Verify `sig` over `tbs` with the key in `spki`.
///
/// `Ok(false)` means the signature does not match; errors mean the
/// algorithm or key cannot be used at all.
pub(crate) fn verify_signature(
    alg: &AlgorithmIdentifier,
    tbs: &[u8],
    sig: &[u8],
    spki: &SubjectPublicKeyInfo,
) -> Result<bool, PkiError> {
    let sig_oid = alg.oid()?;
    if sig_oid == known::sha256_with_rsa_encryption() {
        verify_rsa(tbs, sig, spki, HashAlgId::Sha256)
    } else if sig_oid == known::sha384_with_rsa_encryption() {
        verify_rsa(tbs, sig, spki, HashAlgId::Sha384)
    } else if sig_oid == known::sha512_with_rsa_encryption() {
        verify_rsa(tbs, sig, spki, HashAlgId::Sha512)
    } else if sig_oid == known::sha1_with_rsa_encryption() {
        verify_rsa(tbs, sig, spki, HashAlgId::Sha1)
    } else if sig_oid == known::rsassa_pss() {
        verify_rsa_pss(tbs, sig, spki, alg)
    } else if sig_oid == known::ecdsa_with_sha256() {
        verify_ecdsa(tbs, sig, spki, HashAlgId::Sha256)
    } else if sig_oid == known::ecdsa_with_sha384() {
        verify_ecdsa(tbs, sig, spki, HashAlgId::Sha384)
    } else if sig_oid == known::ecdsa_with_sha512() {
        verify_ecdsa(tbs, sig, spki, HashAlgId::Sha512)
    } else if sig_oid == known::ed25519() {
        verify_ed25519(tbs, sig, spki)
    } else {
        Err(unsupported(format_args!("signature algorithm {sig_oid}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(feature = "ocsp")]
    use crate::ocsp::OcspResponse;
    use crate::x509::Certificate;

    const ROOT_PEM: &str = include_str!("../../../../tests/vectors/ocsp/root.pem");
    const LEGACY_ROOT_PEM: &str = include_str!("../../../../tests/vectors/ocsp/legacy_root.pem");
    #[cfg(feature = "ocsp")]
    const PSS: &[u8] = include_bytes!("../../../../tests/vectors/ocsp/pss.der");
    const RESPONDER_PEM: &str = include_str!("../../../../tests/vectors/ocsp/responder.pem");
    const UNRELATED_PEM: &str = include_str!("../../../../tests/vectors/ocsp/unrelated.pem");

    #[test]
    fn test_compute_hash_lengths() {
        for alg in [
            HashAlgId::Sha1,
            HashAlgId::Sha256,
            HashAlgId::Sha384,
            HashAlgId::Sha512,
        ] {
            assert_eq!(compute_hash(alg, b"abc").len(), alg.output_len());
        }
        assert_eq!(
            hex::encode(compute_hash(HashAlgId::Sha1, b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_hash_oid_mapping() {
        for alg in [
            HashAlgId::Sha1,
            HashAlgId::Sha256,
            HashAlgId::Sha384,
            HashAlgId::Sha512,
        ] {
            assert_eq!(hash_alg_from_oid(&hash_alg_oid(alg)), Some(alg));
        }
        assert_eq!(hash_alg_from_oid(&known::rsa_encryption()), None);
    }

    #[test]
    fn test_rsa_signature_checks() {
        let root = Certificate::from_pem(ROOT_PEM).unwrap();
        assert_eq!(rsa_modulus_bits(&root.public_key).unwrap(), 2048);
        assert!(verify_signature(
            &root.signature_algorithm,
            &root.tbs_raw,
            &root.signature_value,
            &root.public_key
        )
        .unwrap());

        let mut tampered = root.tbs_raw.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        assert!(!verify_signature(
            &root.signature_algorithm,
            &tampered,
            &root.signature_value,
            &root.public_key
        )
        .unwrap());
    }

    #[test]
    fn test_ecdsa_self_signature() {
        let unrelated = Certificate::from_pem(UNRELATED_PEM).unwrap();
        assert!(unrelated.verify_signature(&unrelated).unwrap());
    }

    #[test]
    fn test_key_type_mismatch_is_error() {
        let root = Certificate::from_pem(ROOT_PEM).unwrap();
        let responder = Certificate::from_pem(RESPONDER_PEM).unwrap();
        // RSA-signed root checked against an EC key
        assert!(root.verify_signature(&responder).is_err());
    }

    #[test]
    fn test_unknown_signature_algorithm() {
        let root = Certificate::from_pem(ROOT_PEM).unwrap();
        let alg = AlgorithmIdentifier::new(&Oid::new(&[1, 2, 3, 4])).unwrap();
        assert!(matches!(
            verify_signature(&alg, b"", b"", &root.public_key),
            Err(PkiError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_legacy_rsa_key() {
        let legacy = Certificate::from_pem(LEGACY_ROOT_PEM).unwrap();
        assert_eq!(rsa_modulus_bits(&legacy.public_key).unwrap(), 1024);
        assert!(legacy.verify_signature(&legacy).unwrap());

        // ring has no sha384 verifier for keys under 2048 bits
        let alg = AlgorithmIdentifier::new(&known::sha384_with_rsa_encryption()).unwrap();
        assert!(matches!(
            verify_signature(&alg, &legacy.tbs_raw, &legacy.signature_value, &legacy.public_key),
            Err(PkiError::UnsupportedAlgorithm(_))
        ));
    }

    #[cfg(feature = "ocsp")]
    #[test]
    fn test_rsa_pss_response_signature() {
        let resp = OcspResponse::from_der(PSS).unwrap();
        let basic = resp.basic().unwrap();
        assert_eq!(
            parse_pss_params(basic.signature_algorithm.params.as_deref()).unwrap(),
            PssParams {
                hash: HashAlgId::Sha256,
                mgf1_hash: HashAlgId::Sha256,
                salt_len: 32,
                trailer: 1,
            }
        );
        let root = Certificate::from_pem(ROOT_PEM).unwrap();
        assert!(verify_signature(
            &basic.signature_algorithm,
            &basic.tbs_raw,
            &basic.signature,
            &root.public_key
        )
        .unwrap());

        let mut tampered = basic.tbs_raw.clone();
        tampered[10] ^= 0x01;
        assert!(!verify_signature(
            &basic.signature_algorithm,
            &tampered,
            &basic.signature,
            &root.public_key
        )
        .unwrap());
    }

    #[test]
    fn test_pss_params_outside_ring_profile() {
        let root = Certificate::from_pem(ROOT_PEM).unwrap();
        let pss_alg = |params: &str| AlgorithmIdentifier {
            oid: known::rsassa_pss().to_der_value().unwrap(),
            params: Some(hex::decode(params).unwrap()),
        };

        // all defaults: sha1 with MGF1-sha1, salt 20
        let defaults = pss_alg("3000");
        assert_eq!(
            parse_pss_params(defaults.params.as_deref()).unwrap(),
            PssParams {
                hash: HashAlgId::Sha1,
                mgf1_hash: HashAlgId::Sha1,
                salt_len: 20,
                trailer: 1,
            }
        );
        assert!(matches!(
            verify_signature(&defaults, b"", b"", &root.public_key),
            Err(PkiError::UnsupportedAlgorithm(_))
        ));

        // sha256 with MGF1-sha256 but a 20-byte salt
        let short_salt = pss_alg(concat!(
            "3034",
            "a00f300d06096086480165030402010500",
            "a11c301a06092a864886f70d010108300d06096086480165030402010500",
            "a203020114",
        ));
        assert_eq!(
            parse_pss_params(short_salt.params.as_deref()).unwrap().salt_len,
            20
        );
        assert!(matches!(
            verify_signature(&short_salt, b"", b"", &root.public_key),
            Err(PkiError::UnsupportedAlgorithm(_))
        ));

        let missing = AlgorithmIdentifier::new(&known::rsassa_pss()).unwrap();
        assert!(matches!(
            verify_signature(&missing, b"", b"", &root.public_key),
            Err(PkiError::UnsupportedAlgorithm(_))
        ));
    }
}

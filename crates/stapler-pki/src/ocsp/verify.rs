//! Basic OCSP response verification.
//!
//! Follows the checks of OpenSSL's `OCSP_basic_verify` with no flags:
//! locate the signer, check the signature, validate the signer's chain,
//! then confirm the signer may speak for the CA named in the CertIDs.

use stapler_types::{HashAlgId, VerifyFailure};
use tracing::debug;

use crate::x509::{compute_hash, verify_signature, Certificate, TrustStore};

use super::{OcspBasicResponse, OcspCertId, OcspSingleResponse, ResponderId};

pub(super) fn verify_basic(
    basic: &OcspBasicResponse,
    peer_chain: &[Certificate],
    store: &TrustStore,
) -> Result<(), VerifyFailure> {
    // Peer-chain certificates join the embedded ones unconditionally.
    let candidates: Vec<&Certificate> = basic.certs.iter().chain(peer_chain).collect();
    debug!(
        embedded = basic.certs.len(),
        peer_chain = peer_chain.len(),
        "collected OCSP signer candidates"
    );

    let signer = find_signer(&basic.responder_id, &candidates)?;
    debug!(signer = %signer.subject, "found OCSP signer");

    let valid = verify_signature(
        &basic.signature_algorithm,
        &basic.tbs_raw,
        &basic.signature,
        &signer.public_key,
    )
    .map_err(VerifyFailure::Signature)?;
    if !valid || basic.signature_unused_bits != 0 {
        return Err(VerifyFailure::BadSignature);
    }

    let chain = store
        .verify_cert(signer, &candidates)
        .map_err(VerifyFailure::Chain)?;
    debug!(depth = chain.len(), "signer chain verified");

    check_issuer(basic, &chain)
}

/// Look the responder up among the candidates by name or by key hash.
fn find_signer<'a>(
    responder_id: &ResponderId,
    candidates: &[&'a Certificate],
) -> Result<&'a Certificate, VerifyFailure> {
    let found = match responder_id {
        ResponderId::ByName { raw, .. } => {
            candidates.iter().find(|c| c.subject_raw == *raw).copied()
        }
        ResponderId::ByKey(hash) if hash.len() == HashAlgId::Sha1.output_len() => candidates
            .iter()
            .find(|c| compute_hash(HashAlgId::Sha1, &c.public_key.public_key) == *hash)
            .copied(),
        ResponderId::ByKey(_) => None,
    };
    found.ok_or(VerifyFailure::SignerNotFound)
}

/// The issuer every single response is about.
enum IssuerIds<'r> {
    /// All CertIDs share a hash algorithm; the first stands for them all.
    Common(&'r OcspCertId),
    /// Hash algorithms differ, so each CertID is checked on its own.
    Each(&'r [OcspSingleResponse]),
}

impl IssuerIds<'_> {
    fn matches(&self, cert: &Certificate) -> Result<bool, VerifyFailure> {
        match self {
            IssuerIds::Common(id) => matches_issuer(id, cert),
            IssuerIds::Each(responses) => {
                for single in responses.iter() {
                    if !matches_issuer(&single.cert_id, cert)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

fn matches_issuer(id: &OcspCertId, cert: &Certificate) -> Result<bool, VerifyFailure> {
    if id.hash_alg().is_none() {
        return Err(VerifyFailure::UnsupportedHash(
            id.hash_algorithm
                .oid()
                .map(|o| o.to_string())
                .unwrap_or_else(|_| hex::encode(&id.hash_algorithm.oid)),
        ));
    }
    Ok(id.matches_issuer(cert))
}

fn common_issuer(basic: &OcspBasicResponse) -> Result<IssuerIds<'_>, VerifyFailure> {
    let (first, rest) = basic
        .responses
        .split_first()
        .ok_or(VerifyFailure::NoResponses)?;
    let first_id = &first.cert_id;
    if rest
        .iter()
        .any(|r| r.cert_id.hash_algorithm.oid != first_id.hash_algorithm.oid)
    {
        return Ok(IssuerIds::Each(&basic.responses));
    }
    let same_issuer = rest.iter().all(|r| {
        r.cert_id.issuer_name_hash == first_id.issuer_name_hash
            && r.cert_id.issuer_key_hash == first_id.issuer_key_hash
    });
    if !same_issuer {
        return Err(VerifyFailure::MixedIssuers);
    }
    Ok(IssuerIds::Common(first_id))
}

/// `chain[0]` is the signer; `chain[1]`, if any, its issuer.
fn check_issuer(basic: &OcspBasicResponse, chain: &[&Certificate]) -> Result<(), VerifyFailure> {
    let ids = common_issuer(basic)?;
    let Some(signer) = chain.first() else {
        return Err(VerifyFailure::ResponderNotAuthorized);
    };

    if let Some(ca) = chain.get(1) {
        if ids.matches(ca)? {
            // delegated responder
            if signer.has_ocsp_signing() {
                debug!("signer is a delegated OCSP responder");
                return Ok(());
            }
            return Err(VerifyFailure::MissingOcspSigningUsage);
        }
    }

    if ids.matches(signer)? {
        debug!("signer is the issuing CA");
        Ok(())
    } else {
        Err(VerifyFailure::ResponderNotAuthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocsp::OcspResponse;
    use crate::x509::{hash_alg_oid, AlgorithmIdentifier};
    use stapler_types::PkiError;
    use stapler_utils::oid::Oid;

    const DIRECT_GOOD: &[u8] = include_bytes!("../../../../tests/vectors/ocsp/direct_good.der");
    const DIRECT_MULTI: &[u8] = include_bytes!("../../../../tests/vectors/ocsp/direct_multi.der");
    const DELEGATED_EMBEDDED: &[u8] =
        include_bytes!("../../../../tests/vectors/ocsp/delegated_embedded.der");
    const DELEGATED_NOCERTS: &[u8] =
        include_bytes!("../../../../tests/vectors/ocsp/delegated_nocerts.der");
    const UNAUTHORIZED: &[u8] = include_bytes!("../../../../tests/vectors/ocsp/unauthorized.der");
    const ROOT_PEM: &str = include_str!("../../../../tests/vectors/ocsp/root.pem");
    const RESPONDER_PEM: &str = include_str!("../../../../tests/vectors/ocsp/responder.pem");
    const LEAF_PEM: &str = include_str!("../../../../tests/vectors/ocsp/leaf.pem");
    const UNRELATED_PEM: &str = include_str!("../../../../tests/vectors/ocsp/unrelated.pem");

    fn cert(pem: &str) -> Certificate {
        Certificate::from_pem(pem).unwrap()
    }

    fn root_store() -> TrustStore {
        TrustStore::from_certs(vec![cert(ROOT_PEM)])
    }

    fn basic_of(der: &[u8]) -> OcspBasicResponse {
        OcspResponse::from_der(der).unwrap().basic().unwrap().clone()
    }

    #[test]
    fn test_direct_response_verifies() {
        verify_basic(&basic_of(DIRECT_GOOD), &[], &root_store()).unwrap();
    }

    #[test]
    fn test_wrong_anchor_is_chain_error() {
        let store = TrustStore::from_certs(vec![cert(UNRELATED_PEM)]);
        let err = verify_basic(&basic_of(DIRECT_GOOD), &[], &store).unwrap_err();
        assert!(matches!(
            err,
            VerifyFailure::Chain(PkiError::UntrustedRoot(_))
        ));
    }

    #[test]
    fn test_signer_from_peer_chain() {
        let basic = basic_of(DIRECT_MULTI);
        assert!(basic.certs.is_empty());
        assert!(matches!(
            verify_basic(&basic, &[], &root_store()),
            Err(VerifyFailure::SignerNotFound)
        ));
        verify_basic(&basic, &[cert(ROOT_PEM)], &root_store()).unwrap();
    }

    #[test]
    fn test_delegated_responder() {
        verify_basic(&basic_of(DELEGATED_EMBEDDED), &[], &root_store()).unwrap();

        let nocerts = basic_of(DELEGATED_NOCERTS);
        assert!(matches!(
            verify_basic(&nocerts, &[], &root_store()),
            Err(VerifyFailure::SignerNotFound)
        ));
        verify_basic(&nocerts, &[cert(RESPONDER_PEM)], &root_store()).unwrap();
        // peer chain order does not matter
        verify_basic(
            &nocerts,
            &[cert(ROOT_PEM), cert(LEAF_PEM), cert(RESPONDER_PEM)],
            &root_store(),
        )
        .unwrap();
    }

    #[test]
    fn test_leaf_signed_response_lacks_ocsp_signing() {
        assert!(matches!(
            verify_basic(&basic_of(UNAUTHORIZED), &[], &root_store()),
            Err(VerifyFailure::MissingOcspSigningUsage)
        ));
    }

    #[test]
    fn test_tampered_tbs_is_bad_signature() {
        let mut basic = basic_of(DIRECT_GOOD);
        let last = basic.tbs_raw.len() - 1;
        basic.tbs_raw[last] ^= 0x01;
        assert!(matches!(
            verify_basic(&basic, &[], &root_store()),
            Err(VerifyFailure::BadSignature)
        ));
    }

    #[test]
    fn test_signature_unused_bits_rejected() {
        let mut basic = basic_of(DIRECT_GOOD);
        basic.signature_unused_bits = 1;
        assert!(matches!(
            verify_basic(&basic, &[], &root_store()),
            Err(VerifyFailure::BadSignature)
        ));
    }

    #[test]
    fn test_unsupported_signature_algorithm() {
        let mut basic = basic_of(DIRECT_GOOD);
        basic.signature_algorithm = AlgorithmIdentifier::new(&Oid::new(&[1, 2, 3, 4])).unwrap();
        assert!(matches!(
            verify_basic(&basic, &[], &root_store()),
            Err(VerifyFailure::Signature(PkiError::UnsupportedAlgorithm(_)))
        ));
    }

    #[test]
    fn test_by_key_with_wrong_length_not_found() {
        let responder = cert(RESPONDER_PEM);
        let candidates = [&responder];
        let id = ResponderId::ByKey(vec![0u8; 32]);
        assert!(matches!(
            find_signer(&id, &candidates),
            Err(VerifyFailure::SignerNotFound)
        ));
        let key_hash = compute_hash(HashAlgId::Sha1, &responder.public_key.public_key);
        let found = find_signer(&ResponderId::ByKey(key_hash), &candidates).unwrap();
        assert!(std::ptr::eq(found, &responder));
    }

    #[test]
    fn test_issuer_checks() {
        let root = cert(ROOT_PEM);
        let responder = cert(RESPONDER_PEM);
        let unrelated = cert(UNRELATED_PEM);

        let mut basic = basic_of(DIRECT_MULTI);
        check_issuer(&basic, &[&root]).unwrap();
        check_issuer(&basic, &[&responder, &root]).unwrap();
        assert!(matches!(
            check_issuer(&basic, &[&unrelated]),
            Err(VerifyFailure::ResponderNotAuthorized)
        ));

        // second CertID claims a different issuer
        basic.responses[1].cert_id.issuer_key_hash = vec![0xAA; 20];
        assert!(matches!(
            check_issuer(&basic, &[&root]),
            Err(VerifyFailure::MixedIssuers)
        ));

        basic.responses.clear();
        assert!(matches!(
            check_issuer(&basic, &[&root]),
            Err(VerifyFailure::NoResponses)
        ));
    }

    #[test]
    fn test_issuer_checks_with_mixed_hash_algorithms() {
        let root = cert(ROOT_PEM);
        let leaf = cert(LEAF_PEM);
        let mut basic = basic_of(DIRECT_MULTI);

        // re-express the second CertID with SHA-256; both still name the root
        let second = &mut basic.responses[1].cert_id;
        let sha256 = hash_alg_oid(HashAlgId::Sha256);
        second.hash_algorithm = AlgorithmIdentifier::new(&sha256).unwrap();
        second.issuer_name_hash = compute_hash(HashAlgId::Sha256, &root.subject_raw);
        second.issuer_key_hash = compute_hash(HashAlgId::Sha256, &root.public_key.public_key);
        check_issuer(&basic, &[&root]).unwrap();
        assert!(matches!(
            check_issuer(&basic, &[&leaf]),
            Err(VerifyFailure::ResponderNotAuthorized)
        ));

        // an unknown digest cannot be matched at all
        basic.responses[1].cert_id.hash_algorithm =
            AlgorithmIdentifier::new(&Oid::new(&[1, 2, 3, 4])).unwrap();
        assert!(matches!(
            check_issuer(&basic, &[&root]),
            Err(VerifyFailure::UnsupportedHash(_))
        ));
    }
}

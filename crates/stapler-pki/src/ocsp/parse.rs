//! DER decoding of OCSPResponse and BasicOCSPResponse.

use std::fmt;

use stapler_types::{CodecError, OcspError};
use stapler_utils::asn1::{tags, Decoder, Tag};
use stapler_utils::oid::{known, Oid};

use crate::x509::{
    parse_algorithm_identifier, parse_extensions, parse_name, Certificate, X509Extension,
};

use super::{
    CertStatus, OcspBasicResponse, OcspCertId, OcspResponseStatus, OcspSingleResponse,
    ResponderId, ResponseBody, RevocationReason,
};

fn malformed(e: impl fmt::Display) -> OcspError {
    OcspError::MalformedResponse(e.to_string())
}

/// ```text
/// OCSPResponse ::= SEQUENCE {
///    responseStatus  OCSPResponseStatus,
///    responseBytes   [0] EXPLICIT ResponseBytes OPTIONAL }
/// ```
pub(super) fn parse_response(
    data: &[u8],
) -> Result<(OcspResponseStatus, Option<ResponseBody>), OcspError> {
    if data.is_empty() {
        return Err(CodecError::NullInput.into());
    }
    let mut top = Decoder::new(data);
    let mut outer = top.read_sequence()?;
    top.finish()?;

    let status = OcspResponseStatus::from_code(outer.read_enumerated()?);

    let body = match outer.try_read_context_specific(0, true)? {
        Some(tlv) => Some(parse_response_bytes(tlv.value)?),
        None => None,
    };
    outer.finish()?;
    Ok((status, body))
}

/// `ResponseBytes ::= SEQUENCE { responseType OBJECT IDENTIFIER, response OCTET STRING }`
fn parse_response_bytes(data: &[u8]) -> Result<ResponseBody, OcspError> {
    let mut wrapper = Decoder::new(data);
    let mut seq = wrapper.read_sequence()?;
    wrapper.finish()?;
    let response_type = Oid::from_der_value(seq.read_oid()?)?;
    let response = seq.read_octet_string()?;
    seq.finish()?;

    if response_type == known::ocsp_basic() {
        Ok(ResponseBody::Basic(parse_basic_response(response)?))
    } else {
        Ok(ResponseBody::Other {
            response_type,
            response: response.to_vec(),
        })
    }
}

/// ```text
/// BasicOCSPResponse ::= SEQUENCE {
///    tbsResponseData      ResponseData,
///    signatureAlgorithm   AlgorithmIdentifier,
///    signature            BIT STRING,
///    certs            [0] EXPLICIT SEQUENCE OF Certificate OPTIONAL }
/// ```
pub(super) fn parse_basic_response(data: &[u8]) -> Result<OcspBasicResponse, OcspError> {
    let mut top = Decoder::new(data);
    let mut outer = top.read_sequence()?;
    top.finish()?;

    let tbs = outer.read_expected(tags::SEQUENCE)?;
    let mut tbs_dec = Decoder::new(tbs.value);

    // version [0] EXPLICIT Version DEFAULT v1
    let version = match tbs_dec.try_read_context_specific(0, true)? {
        Some(tlv) => {
            let mut inner = Decoder::new(tlv.value);
            let version = inner.read_small_integer()?;
            inner.finish()?;
            version
        }
        None => 0,
    };
    let responder_id = parse_responder_id(&mut tbs_dec)?;
    let produced_at = tbs_dec.read_generalized_time()?;

    let mut list = tbs_dec.read_sequence()?;
    let mut responses = Vec::new();
    while !list.is_empty() {
        responses.push(parse_single_response(&mut list)?);
    }
    let extensions = parse_tagged_extensions(&mut tbs_dec, 1)?;
    tbs_dec.finish()?;

    let signature_algorithm = parse_algorithm_identifier(&mut outer).map_err(malformed)?;
    let (signature_unused_bits, signature) = outer.read_bit_string()?;

    let mut certs = Vec::new();
    if let Some(tlv) = outer.try_read_context_specific(0, true)? {
        let mut wrapper = Decoder::new(tlv.value);
        let mut seq = wrapper.read_sequence()?;
        wrapper.finish()?;
        while !seq.is_empty() {
            let der = seq.read_element()?;
            let cert = Certificate::from_der(der)
                .map_err(|e| malformed(format_args!("embedded certificate: {e}")))?;
            certs.push(cert);
        }
    }
    outer.finish()?;

    Ok(OcspBasicResponse {
        tbs_raw: tbs.raw.to_vec(),
        version,
        responder_id,
        produced_at,
        responses,
        extensions,
        signature_algorithm,
        signature_unused_bits,
        signature: signature.to_vec(),
        certs,
    })
}

/// `ResponderID ::= CHOICE { byName [1] Name, byKey [2] KeyHash }`
fn parse_responder_id(dec: &mut Decoder) -> Result<ResponderId, OcspError> {
    if let Some(tlv) = dec.try_read_context_specific(1, true)? {
        let mut inner = Decoder::new(tlv.value);
        let (name, raw) = parse_name(&mut inner).map_err(malformed)?;
        inner.finish()?;
        return Ok(ResponderId::ByName {
            name,
            raw: raw.to_vec(),
        });
    }
    if let Some(tlv) = dec.try_read_context_specific(2, true)? {
        let mut inner = Decoder::new(tlv.value);
        let hash = inner.read_octet_string()?;
        inner.finish()?;
        return Ok(ResponderId::ByKey(hash.to_vec()));
    }
    Err(malformed("invalid responderID"))
}

/// Optional `[n] EXPLICIT Extensions`.
fn parse_tagged_extensions(
    dec: &mut Decoder,
    tag_num: u32,
) -> Result<Vec<X509Extension>, OcspError> {
    match dec.try_read_context_specific(tag_num, true)? {
        Some(tlv) => parse_extensions(tlv.value).map_err(malformed),
        None => Ok(Vec::new()),
    }
}

impl OcspCertId {
    /// ```text
    /// CertID ::= SEQUENCE {
    ///    hashAlgorithm    AlgorithmIdentifier,
    ///    issuerNameHash   OCTET STRING,
    ///    issuerKeyHash    OCTET STRING,
    ///    serialNumber     CertificateSerialNumber }
    /// ```
    pub(super) fn from_decoder(dec: &mut Decoder) -> Result<Self, OcspError> {
        let mut seq = dec.read_sequence()?;
        let hash_algorithm = parse_algorithm_identifier(&mut seq).map_err(malformed)?;
        let issuer_name_hash = seq.read_octet_string()?.to_vec();
        let issuer_key_hash = seq.read_octet_string()?.to_vec();
        let serial_number = seq.read_integer()?.to_vec();
        seq.finish()?;
        Ok(OcspCertId {
            hash_algorithm,
            issuer_name_hash,
            issuer_key_hash,
            serial_number,
        })
    }
}

fn parse_single_response(dec: &mut Decoder) -> Result<OcspSingleResponse, OcspError> {
    let mut seq = dec.read_sequence()?;
    let cert_id = OcspCertId::from_decoder(&mut seq)?;
    let status = parse_cert_status(&mut seq)?;
    let this_update = seq.read_generalized_time()?;
    let next_update = match seq.try_read_context_specific(0, true)? {
        Some(tlv) => {
            let mut inner = Decoder::new(tlv.value);
            let time = inner.read_generalized_time()?;
            inner.finish()?;
            Some(time)
        }
        None => None,
    };
    let extensions = parse_tagged_extensions(&mut seq, 1)?;
    seq.finish()?;
    Ok(OcspSingleResponse {
        cert_id,
        status,
        this_update,
        next_update,
        extensions,
    })
}

/// ```text
/// CertStatus ::= CHOICE {
///    good     [0] IMPLICIT NULL,
///    revoked  [1] IMPLICIT RevokedInfo,
///    unknown  [2] IMPLICIT UnknownInfo }
/// ```
fn parse_cert_status(dec: &mut Decoder) -> Result<CertStatus, OcspError> {
    let tlv = dec.read_tlv()?;
    if tlv.tag == Tag::context(0, false) && tlv.value.is_empty() {
        return Ok(CertStatus::Good);
    }
    if tlv.tag == Tag::context(2, false) && tlv.value.is_empty() {
        return Ok(CertStatus::Unknown);
    }
    if tlv.tag != Tag::context(1, true) {
        return Err(malformed(format_args!("invalid certStatus {:?}", tlv.tag)));
    }

    // RevokedInfo ::= SEQUENCE { revocationTime, revocationReason [0] EXPLICIT CRLReason OPTIONAL }
    let mut info = Decoder::new(tlv.value);
    let revocation_time = info.read_generalized_time()?;
    let reason = match info.try_read_context_specific(0, true)? {
        Some(r) => {
            let mut inner = Decoder::new(r.value);
            let code = inner.read_enumerated()?;
            inner.finish()?;
            Some(RevocationReason::from_code(code))
        }
        None => None,
    };
    info.finish()?;
    Ok(CertStatus::Revoked {
        revocation_time,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocsp::OcspResponse;
    use stapler_utils::asn1::GeneralizedTime;

    const DIRECT_GOOD: &[u8] = include_bytes!("../../../../tests/vectors/ocsp/direct_good.der");
    const DIRECT_REVOKED: &[u8] =
        include_bytes!("../../../../tests/vectors/ocsp/direct_revoked.der");
    const DELEGATED_NOCERTS: &[u8] =
        include_bytes!("../../../../tests/vectors/ocsp/delegated_nocerts.der");
    const DELEGATED_EMBEDDED: &[u8] =
        include_bytes!("../../../../tests/vectors/ocsp/delegated_embedded.der");

    fn assert_malformed(data: &[u8]) {
        match OcspResponse::from_der(data) {
            Err(OcspError::MalformedResponse(_)) => {}
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_non_successful() {
        // OCSPResponse with status = malformedRequest (1), no responseBytes
        let (status, body) = parse_response(&[0x30, 0x03, 0x0A, 0x01, 0x01]).unwrap();
        assert_eq!(status, OcspResponseStatus::MalformedRequest);
        assert!(body.is_none());
    }

    #[test]
    fn test_reject_bad_envelopes() {
        assert_malformed(&[]);
        assert_malformed(&[0x30]);
        // negative status
        assert_malformed(&[0x30, 0x03, 0x0A, 0x01, 0xFF]);
        // INTEGER instead of ENUMERATED
        assert_malformed(&[0x30, 0x03, 0x02, 0x01, 0x00]);
        // trailing byte after the outer SEQUENCE
        assert_malformed(&[0x30, 0x03, 0x0A, 0x01, 0x03, 0x00]);
        // trailing element inside it
        assert_malformed(&[0x30, 0x05, 0x0A, 0x01, 0x03, 0x05, 0x00]);
    }

    #[test]
    fn test_reject_truncated_fixture() {
        assert_malformed(&DIRECT_GOOD[..DIRECT_GOOD.len() - 1]);
        assert_malformed(&DIRECT_GOOD[..DIRECT_GOOD.len() / 2]);
    }

    #[test]
    fn test_parse_direct_good() {
        let (status, body) = parse_response(DIRECT_GOOD).unwrap();
        assert_eq!(status, OcspResponseStatus::Successful);
        let Some(ResponseBody::Basic(basic)) = body else {
            panic!("expected a basic response");
        };
        assert_eq!(basic.version, 0);
        match &basic.responder_id {
            ResponderId::ByName { name, .. } => {
                assert_eq!(name.get("CN"), Some("Stapler Test Root CA"))
            }
            other => panic!("unexpected responder id {other:?}"),
        }
        assert_eq!(basic.produced_at.unix(), 1_792_414_706);
        assert_eq!(basic.responses.len(), 1);
        let single = &basic.responses[0];
        assert_eq!(single.status, CertStatus::Good);
        assert_eq!(single.cert_id.serial_number, vec![0x10, 0x01]);
        assert_eq!(single.this_update.unix(), 1_792_414_706);
        assert!(single.next_update.is_some());
        assert!(basic.signature_algorithm.is(&known::sha256_with_rsa_encryption()));
        assert_eq!(basic.signature_unused_bits, 0);
        assert_eq!(basic.signature.len(), 256);
        assert_eq!(basic.certs.len(), 1);
        assert_eq!(basic.certs[0].subject.get("CN"), Some("Stapler Test Root CA"));
        // tbs_raw is the complete ResponseData TLV
        assert_eq!(basic.tbs_raw[0], tags::SEQUENCE);
    }

    #[test]
    fn test_parse_revoked_with_reason() {
        let (_, body) = parse_response(DIRECT_REVOKED).unwrap();
        let Some(ResponseBody::Basic(basic)) = body else {
            panic!("expected a basic response");
        };
        assert_eq!(
            basic.responses[0].status,
            CertStatus::Revoked {
                revocation_time: GeneralizedTime::from_unix(1_748_736_000).unwrap(),
                reason: Some(RevocationReason::KeyCompromise),
            }
        );
        assert_eq!(basic.extensions.len(), 1);
        assert!(!basic.extensions[0].critical);
    }

    #[test]
    fn test_parse_by_key_responder() {
        let (_, body) = parse_response(DELEGATED_NOCERTS).unwrap();
        let Some(ResponseBody::Basic(basic)) = body else {
            panic!("expected a basic response");
        };
        assert_eq!(
            basic.responder_id,
            ResponderId::ByKey(hex::decode("4C087E1D29D355AC5FE9BE1AB41C4CE97201F72D").unwrap())
        );
        assert!(basic.certs.is_empty());
        assert!(basic.signature_algorithm.is(&known::ecdsa_with_sha256()));

        let (_, body) = parse_response(DELEGATED_EMBEDDED).unwrap();
        let Some(ResponseBody::Basic(basic)) = body else {
            panic!("expected a basic response");
        };
        assert_eq!(basic.certs.len(), 1);
        assert!(basic.certs[0].has_ocsp_signing());
    }

    #[test]
    fn test_cert_status_variants() {
        let mut dec = Decoder::new(&[0x80, 0x00]);
        assert_eq!(parse_cert_status(&mut dec).unwrap(), CertStatus::Good);
        let mut dec = Decoder::new(&[0x82, 0x00]);
        assert_eq!(parse_cert_status(&mut dec).unwrap(), CertStatus::Unknown);
        // good with content is rejected
        let mut dec = Decoder::new(&[0x80, 0x01, 0x00]);
        assert!(parse_cert_status(&mut dec).is_err());
        // revoked without reason
        let data = [
            0xA1, 0x11, 0x18, 0x0F, b'2', b'0', b'2', b'5', b'0', b'6', b'0', b'1', b'0', b'0',
            b'0', b'0', b'0', b'0', b'Z',
        ];
        let mut dec = Decoder::new(&data);
        assert_eq!(
            parse_cert_status(&mut dec).unwrap(),
            CertStatus::Revoked {
                revocation_time: GeneralizedTime::from_unix(1_748_736_000).unwrap(),
                reason: None
            }
        );
    }

    #[test]
    fn test_unassigned_status_kept() {
        let (status, body) = parse_response(&[0x30, 0x03, 0x0A, 0x01, 0x04]).unwrap();
        assert_eq!(status, OcspResponseStatus::Unassigned(4));
        assert!(body.is_none());
    }

    #[test]
    fn test_unassigned_reason_kept() {
        let data = [
            0xA1, 0x16, 0x18, 0x0F, b'2', b'0', b'2', b'5', b'0', b'6', b'0', b'1', b'0', b'0',
            b'0', b'0', b'0', b'0', b'Z', 0xA0, 0x03, 0x0A, 0x01, 0x07,
        ];
        let mut dec = Decoder::new(&data);
        assert_eq!(
            parse_cert_status(&mut dec).unwrap(),
            CertStatus::Revoked {
                revocation_time: GeneralizedTime::from_unix(1_748_736_000).unwrap(),
                reason: Some(RevocationReason::Unassigned(7)),
            }
        );
    }

    #[test]
    fn test_other_response_type_kept() {
        // responseBytes with type 1.3.6.1.5.5.7.48.1.99 and an opaque payload
        let data = [
            0x30, 0x19, 0x0A, 0x01, 0x00, 0xA0, 0x14, 0x30, 0x12, 0x06, 0x09, 0x2B, 0x06, 0x01,
            0x05, 0x05, 0x07, 0x30, 0x01, 0x63, 0x04, 0x05, 0x01, 0x02, 0x03, 0x04, 0x05,
        ];
        let (status, body) = parse_response(&data).unwrap();
        assert_eq!(status, OcspResponseStatus::Successful);
        match body {
            Some(ResponseBody::Other {
                response_type,
                response,
            }) => {
                assert_eq!(response_type, Oid::new(&[1, 3, 6, 1, 5, 5, 7, 48, 1, 99]));
                assert_eq!(response, vec![1, 2, 3, 4, 5]);
            }
            other => panic!("unexpected body {other:?}"),
        }
    }
}

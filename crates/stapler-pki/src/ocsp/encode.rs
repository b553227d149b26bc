//! Canonical DER encoding of decoded OCSP responses.

use stapler_types::CodecError;
use stapler_utils::oid::known;

use crate::encoding::{
    enc_bits, enc_enum, enc_explicit_ctx, enc_gentime, enc_implicit_ctx, enc_int, enc_octet,
    enc_oid, enc_raw_parts, enc_seq, enc_small_int,
};
use crate::x509::{encode_extensions, X509Extension};

use super::{
    CertStatus, OcspBasicResponse, OcspCertId, OcspResponseStatus, OcspSingleResponse,
    ResponderId, ResponseBody,
};

pub(super) fn encode_response(
    status: OcspResponseStatus,
    body: Option<&ResponseBody>,
) -> Result<Vec<u8>, CodecError> {
    let status = enc_enum(status.code());
    let response_bytes = match body {
        None => Vec::new(),
        Some(ResponseBody::Basic(basic)) => {
            let oid = known::ocsp_basic().to_der_value()?;
            encode_response_bytes(&oid, &encode_basic(basic)?)?
        }
        Some(ResponseBody::Other {
            response_type,
            response,
        }) => encode_response_bytes(&response_type.to_der_value()?, response)?,
    };
    Ok(enc_seq(&enc_raw_parts(&[&status, &response_bytes])))
}

fn encode_response_bytes(oid: &[u8], response: &[u8]) -> Result<Vec<u8>, CodecError> {
    let inner = enc_seq(&enc_raw_parts(&[&enc_oid(oid)?, &enc_octet(response)]));
    Ok(enc_explicit_ctx(0, &inner))
}

pub(super) fn encode_basic(basic: &OcspBasicResponse) -> Result<Vec<u8>, CodecError> {
    let tbs = encode_response_data(basic)?;
    let sig_alg = basic.signature_algorithm.to_der()?;
    let signature = enc_bits(basic.signature_unused_bits, &basic.signature);
    let certs = if basic.certs.is_empty() {
        Vec::new()
    } else {
        let raws: Vec<&[u8]> = basic.certs.iter().map(|c| c.raw.as_slice()).collect();
        enc_explicit_ctx(0, &enc_seq(&enc_raw_parts(&raws)))
    };
    Ok(enc_seq(&enc_raw_parts(&[&tbs, &sig_alg, &signature, &certs])))
}

fn encode_response_data(basic: &OcspBasicResponse) -> Result<Vec<u8>, CodecError> {
    // version DEFAULT v1 is omitted
    let version = match basic.version {
        0 => Vec::new(),
        v => enc_explicit_ctx(0, &enc_small_int(v)),
    };
    let responder = match &basic.responder_id {
        ResponderId::ByName { raw, .. } => enc_explicit_ctx(1, raw),
        ResponderId::ByKey(hash) => enc_explicit_ctx(2, &enc_octet(hash)),
    };
    let produced_at = enc_gentime(&basic.produced_at);
    let mut responses = Vec::new();
    for single in &basic.responses {
        responses.extend(encode_single_response(single)?);
    }
    let extensions = encode_tagged_extensions(1, &basic.extensions)?;
    Ok(enc_seq(&enc_raw_parts(&[
        &version,
        &responder,
        &produced_at,
        &enc_seq(&responses),
        &extensions,
    ])))
}

fn encode_tagged_extensions(tag_num: u8, exts: &[X509Extension]) -> Result<Vec<u8>, CodecError> {
    if exts.is_empty() {
        return Ok(Vec::new());
    }
    Ok(enc_explicit_ctx(tag_num, &encode_extensions(exts)?))
}

impl OcspCertId {
    /// Encode this CertID to DER.
    pub fn to_der(&self) -> Result<Vec<u8>, CodecError> {
        Ok(enc_seq(&enc_raw_parts(&[
            &self.hash_algorithm.to_der()?,
            &enc_octet(&self.issuer_name_hash),
            &enc_octet(&self.issuer_key_hash),
            &enc_int(&self.serial_number)?,
        ])))
    }
}

fn encode_single_response(single: &OcspSingleResponse) -> Result<Vec<u8>, CodecError> {
    let cert_id = single.cert_id.to_der()?;
    let status = match &single.status {
        CertStatus::Good => enc_implicit_ctx(0, &[]),
        CertStatus::Revoked {
            revocation_time,
            reason,
        } => {
            let time = enc_gentime(revocation_time);
            let reason = match reason {
                Some(r) => enc_explicit_ctx(0, &enc_enum(r.code())),
                None => Vec::new(),
            };
            // [1] IMPLICIT RevokedInfo keeps the SEQUENCE's constructed bit
            enc_explicit_ctx(1, &enc_raw_parts(&[&time, &reason]))
        }
        CertStatus::Unknown => enc_implicit_ctx(2, &[]),
    };
    let this_update = enc_gentime(&single.this_update);
    let next_update = match &single.next_update {
        Some(t) => enc_explicit_ctx(0, &enc_gentime(t)),
        None => Vec::new(),
    };
    let extensions = encode_tagged_extensions(1, &single.extensions)?;
    Ok(enc_seq(&enc_raw_parts(&[
        &cert_id,
        &status,
        &this_update,
        &next_update,
        &extensions,
    ])))
}

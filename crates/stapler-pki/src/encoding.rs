//! Shared ASN.1 encoding helpers for the PKI crate.
//!
//! These functions wrap `stapler_utils::asn1::Encoder` to produce DER-encoded
//! ASN.1 primitives for the x509 and ocsp re-encoders.

use stapler_types::CodecError;
use stapler_utils::asn1::{tags, Encoder, GeneralizedTime};

/// Encode a SEQUENCE containing `content`.
pub(crate) fn enc_seq(content: &[u8]) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_sequence(content);
    e.finish()
}

/// Encode an OCTET STRING.
pub(crate) fn enc_octet(content: &[u8]) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_octet_string(content);
    e.finish()
}

/// Encode an OID from its DER value bytes. Empty OIDs are rejected.
pub(crate) fn enc_oid(oid_bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    if oid_bytes.is_empty() {
        return Err(CodecError::InvalidOid);
    }
    let mut e = Encoder::new();
    e.write_oid(oid_bytes);
    Ok(e.finish())
}

/// Encode an INTEGER from its content bytes.
pub(crate) fn enc_int(value: &[u8]) -> Result<Vec<u8>, CodecError> {
    if value.is_empty() {
        return Err(CodecError::InvalidLength);
    }
    let mut e = Encoder::new();
    e.write_integer(value);
    Ok(e.finish())
}

/// Encode a non-negative INTEGER that fits in a `u32`.
pub(crate) fn enc_small_int(value: u32) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_small_integer(value);
    e.finish()
}

/// Encode an ENUMERATED value.
pub(crate) fn enc_enum(value: u32) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_enumerated(value);
    e.finish()
}

/// Encode a BOOLEAN.
pub(crate) fn enc_bool(value: bool) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_boolean(value);
    e.finish()
}

/// Encode a BIT STRING.
pub(crate) fn enc_bits(unused_bits: u8, value: &[u8]) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_bit_string(unused_bits, value);
    e.finish()
}

/// Encode a GeneralizedTime with its original content octets.
pub(crate) fn enc_gentime(time: &GeneralizedTime) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_generalized_time(time);
    e.finish()
}

/// Encode a raw TLV (Tag-Length-Value).
pub(crate) fn enc_tlv(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_tlv(tag, value);
    e.finish()
}

/// Encode an EXPLICIT context-specific tagged value.
pub(crate) fn enc_explicit_ctx(tag_num: u8, content: &[u8]) -> Vec<u8> {
    enc_tlv(
        tags::CONTEXT_SPECIFIC | tags::CONSTRUCTED | tag_num,
        content,
    )
}

/// Encode an IMPLICIT context-specific primitive value.
pub(crate) fn enc_implicit_ctx(tag_num: u8, content: &[u8]) -> Vec<u8> {
    enc_tlv(tags::CONTEXT_SPECIFIC | tag_num, content)
}

/// Concatenate multiple raw byte slices into a single DER fragment.
pub(crate) fn enc_raw_parts(parts: &[&[u8]]) -> Vec<u8> {
    let mut e = Encoder::new();
    for p in parts {
        e.write_raw(p);
    }
    e.finish()
}

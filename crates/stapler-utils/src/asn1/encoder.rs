//! ASN.1 DER encoder.

use super::time::GeneralizedTime;
use super::{tags, Tag};

/// A builder for constructing DER-encoded ASN.1 data.
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Consume the encoder and return the encoded bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    /// Write a raw TLV with the given tag byte and value.
    pub fn write_tlv(&mut self, tag: u8, value: &[u8]) -> &mut Self {
        self.buf.push(tag);
        self.write_length(value.len());
        self.buf.extend_from_slice(value);
        self
    }

    /// Write a TLV with an arbitrary (possibly multi-byte) tag.
    pub fn write_tagged(&mut self, tag: Tag, value: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(&tag.to_bytes());
        self.write_length(value.len());
        self.buf.extend_from_slice(value);
        self
    }

    /// Write a DER length encoding.
    fn write_length(&mut self, length: usize) {
        if length < 0x80 {
            self.buf.push(length as u8);
            return;
        }
        let be = (length as u64).to_be_bytes();
        let skip = be.iter().take_while(|&&b| b == 0).count();
        self.buf.push(0x80 | (be.len() - skip) as u8);
        self.buf.extend_from_slice(&be[skip..]);
    }

    /// Write an INTEGER from its two's-complement content bytes, unchanged.
    pub fn write_integer(&mut self, value: &[u8]) -> &mut Self {
        self.write_tlv(tags::INTEGER, value)
    }

    /// Write a non-negative INTEGER from big-endian magnitude bytes,
    /// stripping redundant zeros and adding a sign octet when needed.
    pub fn write_unsigned(&mut self, magnitude: &[u8]) -> &mut Self {
        self.write_tlv(tags::INTEGER, &unsigned_content(magnitude))
    }

    /// Write a small non-negative INTEGER.
    pub fn write_small_integer(&mut self, value: u32) -> &mut Self {
        self.write_unsigned(&value.to_be_bytes())
    }

    /// Write an ENUMERATED (tag 0x0A).
    pub fn write_enumerated(&mut self, value: u32) -> &mut Self {
        self.write_tlv(tags::ENUMERATED, &unsigned_content(&value.to_be_bytes()))
    }

    /// Write an OCTET STRING.
    pub fn write_octet_string(&mut self, value: &[u8]) -> &mut Self {
        self.write_tlv(tags::OCTET_STRING, value)
    }

    /// Write a BIT STRING with the given unused_bits count.
    pub fn write_bit_string(&mut self, unused_bits: u8, value: &[u8]) -> &mut Self {
        self.buf.push(tags::BIT_STRING);
        self.write_length(value.len() + 1);
        self.buf.push(unused_bits);
        self.buf.extend_from_slice(value);
        self
    }

    /// Write an OID from raw encoded bytes.
    pub fn write_oid(&mut self, oid_bytes: &[u8]) -> &mut Self {
        self.write_tlv(tags::OID, oid_bytes)
    }

    /// Write a SEQUENCE wrapping the given contents.
    pub fn write_sequence(&mut self, contents: &[u8]) -> &mut Self {
        self.write_tlv(tags::SEQUENCE, contents)
    }

    /// Write raw bytes directly (already DER-encoded).
    pub fn write_raw(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Write a BOOLEAN (tag 0x01).
    pub fn write_boolean(&mut self, val: bool) -> &mut Self {
        self.write_tlv(tags::BOOLEAN, &[if val { 0xFF } else { 0x00 }])
    }

    /// Write a context-specific tagged value `[tag_num]`.
    pub fn write_context_specific(
        &mut self,
        tag_num: u32,
        constructed: bool,
        content: &[u8],
    ) -> &mut Self {
        self.write_tagged(Tag::context(tag_num, constructed), content)
    }

    /// Write a GeneralizedTime (tag 0x18) with its stored content octets.
    pub fn write_generalized_time(&mut self, time: &GeneralizedTime) -> &mut Self {
        self.write_tlv(tags::GENERALIZED_TIME, time.as_bytes())
    }
}

/// Minimal two's-complement content octets for a non-negative magnitude.
fn unsigned_content(magnitude: &[u8]) -> Vec<u8> {
    let start = magnitude.iter().take_while(|&&b| b == 0).count();
    let trimmed = &magnitude[start..];
    match trimmed.first() {
        None => vec![0x00],
        Some(b) if b & 0x80 != 0 => {
            let mut padded = Vec::with_capacity(trimmed.len() + 1);
            padded.push(0x00);
            padded.extend_from_slice(trimmed);
            padded
        }
        Some(_) => trimmed.to_vec(),
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

//! ASN.1 DER decoder.

use super::time::{parse_generalized_time, parse_utc_time, GeneralizedTime};
use super::{tags, Tag, TagClass, Tlv};
use stapler_types::CodecError;

/// A streaming ASN.1 DER decoder.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Create a new decoder over the given data.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the remaining undecoded bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Fails if any bytes are left undecoded.
    pub fn finish(&self) -> Result<(), CodecError> {
        match self.data.len() - self.pos {
            0 => Ok(()),
            n => Err(CodecError::TrailingData(n)),
        }
    }

    /// Parse the next TLV element.
    pub fn read_tlv(&mut self) -> Result<Tlv<'a>, CodecError> {
        let start = self.pos;
        let (tag, tag_len) = Tag::from_bytes(&self.data[self.pos..])?;
        self.pos += tag_len;

        let length = self.read_length()?;
        let end = self
            .pos
            .checked_add(length)
            .filter(|&end| end <= self.data.len())
            .ok_or(CodecError::InvalidLength)?;

        let value = &self.data[self.pos..end];
        self.pos = end;

        Ok(Tlv {
            tag,
            value,
            raw: &self.data[start..end],
        })
    }

    /// Parse a DER length.
    fn read_length(&mut self) -> Result<usize, CodecError> {
        let first = *self.data.get(self.pos).ok_or(CodecError::DecodeAsn1Fail)?;
        self.pos += 1;

        if first < 0x80 {
            return Ok(first as usize);
        }
        if first == 0x80 {
            // Indefinite length is BER only
            return Err(CodecError::InvalidLength);
        }
        let num_bytes = (first & 0x7F) as usize;
        if num_bytes > 4 || self.pos + num_bytes > self.data.len() {
            return Err(CodecError::InvalidLength);
        }
        let bytes = &self.data[self.pos..self.pos + num_bytes];
        if bytes[0] == 0 {
            return Err(CodecError::InvalidLength);
        }
        let length = bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
        if length < 0x80 {
            return Err(CodecError::InvalidLength);
        }
        self.pos += num_bytes;
        Ok(length)
    }

    /// Read a TLV whose identifier octet must equal `tag`.
    pub fn read_expected(&mut self, tag: u8) -> Result<Tlv<'a>, CodecError> {
        let tlv = self.read_tlv()?;
        if !tlv.tag.is(tag) {
            return Err(CodecError::UnexpectedTag {
                expected: tag,
                got: tlv.raw[0],
            });
        }
        Ok(tlv)
    }

    /// Read the next element and return its complete encoding.
    pub fn read_element(&mut self) -> Result<&'a [u8], CodecError> {
        Ok(self.read_tlv()?.raw)
    }

    /// Read an INTEGER and return its bytes (big-endian, may include leading zero).
    pub fn read_integer(&mut self) -> Result<&'a [u8], CodecError> {
        let tlv = self.read_expected(tags::INTEGER)?;
        if tlv.value.is_empty() {
            return Err(CodecError::DecodeAsn1Fail);
        }
        Ok(tlv.value)
    }

    /// Read a small non-negative INTEGER.
    pub fn read_small_integer(&mut self) -> Result<u32, CodecError> {
        let value = self.read_integer()?;
        small_unsigned(value)
    }

    /// Read an ENUMERATED value.
    pub fn read_enumerated(&mut self) -> Result<u32, CodecError> {
        let tlv = self.read_expected(tags::ENUMERATED)?;
        if tlv.value.is_empty() {
            return Err(CodecError::DecodeAsn1Fail);
        }
        small_unsigned(tlv.value)
    }

    /// Read an OCTET STRING.
    pub fn read_octet_string(&mut self) -> Result<&'a [u8], CodecError> {
        Ok(self.read_expected(tags::OCTET_STRING)?.value)
    }

    /// Read a BIT STRING and return (unused_bits, data).
    pub fn read_bit_string(&mut self) -> Result<(u8, &'a [u8]), CodecError> {
        let tlv = self.read_expected(tags::BIT_STRING)?;
        match tlv.value.split_first() {
            Some((&unused, data)) if unused < 8 && (unused == 0 || !data.is_empty()) => {
                Ok((unused, data))
            }
            _ => Err(CodecError::DecodeAsn1Fail),
        }
    }

    /// Read an OID and return the raw content bytes.
    pub fn read_oid(&mut self) -> Result<&'a [u8], CodecError> {
        let tlv = self.read_expected(tags::OID)?;
        if tlv.value.is_empty() {
            return Err(CodecError::InvalidOid);
        }
        Ok(tlv.value)
    }

    /// Read a NULL.
    pub fn read_null(&mut self) -> Result<(), CodecError> {
        let tlv = self.read_expected(tags::NULL)?;
        if !tlv.value.is_empty() {
            return Err(CodecError::InvalidLength);
        }
        Ok(())
    }

    /// Read a SEQUENCE, returning a sub-decoder over its contents.
    pub fn read_sequence(&mut self) -> Result<Decoder<'a>, CodecError> {
        Ok(Decoder::new(self.read_expected(tags::SEQUENCE)?.value))
    }

    /// Read a SET, returning a sub-decoder over its contents.
    pub fn read_set(&mut self) -> Result<Decoder<'a>, CodecError> {
        Ok(Decoder::new(self.read_expected(tags::SET)?.value))
    }

    /// Peek at the next tag without consuming it.
    pub fn peek_tag(&self) -> Result<Tag, CodecError> {
        if self.is_empty() {
            return Err(CodecError::DecodeAsn1Fail);
        }
        let (tag, _) = Tag::from_bytes(&self.data[self.pos..])?;
        Ok(tag)
    }

    /// Read a BOOLEAN value (DER: 0x00=false, 0xFF=true).
    pub fn read_boolean(&mut self) -> Result<bool, CodecError> {
        let tlv = self.read_expected(tags::BOOLEAN)?;
        match tlv.value {
            [0x00] => Ok(false),
            [0xFF] => Ok(true),
            _ => Err(CodecError::DecodeAsn1Fail),
        }
    }

    /// Read a context-specific tagged value with the expected tag number.
    pub fn read_context_specific(
        &mut self,
        tag_num: u32,
        constructed: bool,
    ) -> Result<Tlv<'a>, CodecError> {
        let tlv = self.read_tlv()?;
        if tlv.tag != Tag::context(tag_num, constructed) {
            return Err(CodecError::UnexpectedTag {
                expected: Tag::context(tag_num, constructed).to_bytes()[0],
                got: tlv.raw[0],
            });
        }
        Ok(tlv)
    }

    /// Try to read a context-specific tagged value. Returns `None` if
    /// the next tag does not match, without consuming any bytes.
    pub fn try_read_context_specific(
        &mut self,
        tag_num: u32,
        constructed: bool,
    ) -> Result<Option<Tlv<'a>>, CodecError> {
        if self.is_empty() {
            return Ok(None);
        }
        let tag = self.peek_tag()?;
        if tag.class == TagClass::ContextSpecific
            && tag.number == tag_num
            && tag.constructed == constructed
        {
            Ok(Some(self.read_tlv()?))
        } else {
            Ok(None)
        }
    }

    /// Read a string value (UTF8String, PrintableString, IA5String,
    /// T61String, or BMPString) and return it as a Rust `String`.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let tlv = self.read_tlv()?;
        if tlv.tag.class != TagClass::Universal || tlv.tag.constructed || tlv.tag.number >= 0x1F
        {
            return Err(CodecError::DecodeAsn1Fail);
        }
        match tlv.tag.number as u8 {
            tags::UTF8_STRING | tags::PRINTABLE_STRING | tags::IA5_STRING => {
                String::from_utf8(tlv.value.to_vec()).map_err(|_| CodecError::DecodeAsn1Fail)
            }
            // TeletexString, read as Latin-1
            tags::T61_STRING => Ok(tlv.value.iter().map(|&b| b as char).collect()),
            tags::BMP_STRING => {
                if tlv.value.len() % 2 != 0 {
                    return Err(CodecError::DecodeAsn1Fail);
                }
                let units: Vec<u16> = tlv
                    .value
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|_| CodecError::DecodeAsn1Fail)
            }
            _ => Err(CodecError::DecodeAsn1Fail),
        }
    }

    /// Read a Time value (UTCTime or GeneralizedTime) as a UNIX timestamp.
    pub fn read_time(&mut self) -> Result<i64, CodecError> {
        let tlv = self.read_tlv()?;
        if tlv.tag.is(tags::UTC_TIME) {
            parse_utc_time(tlv.value)
        } else if tlv.tag.is(tags::GENERALIZED_TIME) {
            parse_generalized_time(tlv.value)
        } else {
            Err(CodecError::UnexpectedTag {
                expected: tags::GENERALIZED_TIME,
                got: tlv.raw[0],
            })
        }
    }

    /// Read a GeneralizedTime, keeping its exact encoding.
    pub fn read_generalized_time(&mut self) -> Result<GeneralizedTime, CodecError> {
        let tlv = self.read_expected(tags::GENERALIZED_TIME)?;
        GeneralizedTime::from_der_value(tlv.value)
    }
}

fn small_unsigned(value: &[u8]) -> Result<u32, CodecError> {
    let digits = match value {
        [0x00, rest @ ..] if !rest.is_empty() => rest,
        _ => value,
    };
    if value[0] & 0x80 != 0 || digits.len() > 4 {
        return Err(CodecError::DecodeAsn1Fail);
    }
    Ok(digits.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_set() {
        // SET { INTEGER 42 }
        let data = [0x31, 0x03, 0x02, 0x01, 0x2A];
        let mut dec = Decoder::new(&data);
        let mut set_dec = dec.read_set().unwrap();
        let val = set_dec.read_integer().unwrap();
        assert_eq!(val, &[0x2A]);
        assert!(set_dec.is_empty());
    }

    #[test]
    fn test_read_boolean() {
        let mut dec = Decoder::new(&[0x01, 0x01, 0xFF]);
        assert!(dec.read_boolean().unwrap());

        let mut dec = Decoder::new(&[0x01, 0x01, 0x00]);
        assert!(!dec.read_boolean().unwrap());

        // DER allows only 0x00 and 0xFF
        let mut dec = Decoder::new(&[0x01, 0x01, 0x01]);
        assert!(dec.read_boolean().is_err());
    }

    #[test]
    fn test_read_enumerated() {
        let mut dec = Decoder::new(&[0x0A, 0x01, 0x03]);
        assert_eq!(dec.read_enumerated().unwrap(), 3);

        let mut dec = Decoder::new(&[0x02, 0x01, 0x03]);
        assert!(matches!(
            dec.read_enumerated(),
            Err(CodecError::UnexpectedTag {
                expected: 0x0A,
                got: 0x02
            })
        ));
    }

    #[test]
    fn test_context_tag_does_not_match_universal() {
        // [2] IMPLICIT is 0x82, must not be read as INTEGER (0x02)
        let mut dec = Decoder::new(&[0x82, 0x01, 0x05]);
        assert!(dec.read_integer().is_err());
    }

    #[test]
    fn test_peek_tag() {
        let data = [0x02, 0x01, 0x05];
        let dec = Decoder::new(&data);
        let tag = dec.peek_tag().unwrap();
        assert_eq!(tag.number, 0x02);
        assert!(!dec.is_empty());
    }

    #[test]
    fn test_read_context_specific() {
        // [0] EXPLICIT { INTEGER 2 }
        let data = [0xA0, 0x03, 0x02, 0x01, 0x02];
        let mut dec = Decoder::new(&data);
        let tlv = dec.read_context_specific(0, true).unwrap();
        assert_eq!(tlv.value, &[0x02, 0x01, 0x02]);
        assert_eq!(tlv.raw, &data[..]);
    }

    #[test]
    fn test_try_read_context_specific() {
        let data = [0xA0, 0x03, 0x02, 0x01, 0x02, 0x02, 0x01, 0x01];
        let mut dec = Decoder::new(&data);

        let tlv = dec.try_read_context_specific(0, true).unwrap();
        assert!(tlv.is_some());

        let tlv = dec.try_read_context_specific(1, true).unwrap();
        assert!(tlv.is_none());

        assert_eq!(dec.read_integer().unwrap(), &[0x01]);
        assert!(dec.finish().is_ok());
    }

    #[test]
    fn test_finish_reports_trailing() {
        let mut dec = Decoder::new(&[0x05, 0x00, 0xFF, 0xFF]);
        dec.read_null().unwrap();
        assert!(matches!(dec.finish(), Err(CodecError::TrailingData(2))));
    }

    #[test]
    fn test_length_checks() {
        // Truncated value
        assert!(Decoder::new(&[0x04, 0x05, 0x00]).read_tlv().is_err());
        // Indefinite length
        assert!(Decoder::new(&[0x30, 0x80, 0x00, 0x00]).read_tlv().is_err());
        // Non-minimal long form
        assert!(Decoder::new(&[0x04, 0x81, 0x01, 0x00]).read_tlv().is_err());
        // Length near usize::MAX must not overflow
        assert!(Decoder::new(&[0x04, 0x84, 0xFF, 0xFF, 0xFF, 0xFF]).read_tlv().is_err());
        // Empty input
        assert!(matches!(
            Decoder::new(&[]).read_tlv(),
            Err(CodecError::NullInput)
        ));
    }

    #[test]
    fn test_long_form_length() {
        let mut data = vec![0x04, 0x81, 0x80];
        data.extend_from_slice(&[0xAB; 0x80]);
        let mut dec = Decoder::new(&data);
        assert_eq!(dec.read_octet_string().unwrap().len(), 0x80);
    }

    #[test]
    fn test_read_string_variants() {
        let mut dec = Decoder::new(&[0x0C, 0x05, b'H', b'e', b'l', b'l', b'o']);
        assert_eq!(dec.read_string().unwrap(), "Hello");

        let mut dec = Decoder::new(&[0x13, 0x02, b'X', b'X']);
        assert_eq!(dec.read_string().unwrap(), "XX");

        let mut dec = Decoder::new(&[0x1E, 0x04, 0x00, b'O', 0x00, b'K']);
        assert_eq!(dec.read_string().unwrap(), "OK");
    }

    #[test]
    fn test_read_time_utc() {
        let mut data = vec![0x17, 13];
        data.extend_from_slice(b"200101000000Z");
        let mut dec = Decoder::new(&data);
        assert_eq!(dec.read_time().unwrap(), 1577836800);
    }

    #[test]
    fn test_read_time_generalized() {
        let mut data = vec![0x18, 15];
        data.extend_from_slice(b"21191231235959Z");
        let mut dec = Decoder::new(&data);
        let ts = dec.read_time().unwrap();
        assert!(ts > 4_700_000_000);

        let mut dec = Decoder::new(&data);
        assert_eq!(dec.read_generalized_time().unwrap().unix(), ts);
    }

    #[test]
    fn test_small_integer() {
        assert_eq!(Decoder::new(&[0x02, 0x01, 0x00]).read_small_integer().unwrap(), 0);
        assert_eq!(
            Decoder::new(&[0x02, 0x02, 0x00, 0x80]).read_small_integer().unwrap(),
            128
        );
        assert!(Decoder::new(&[0x02, 0x01, 0xFF]).read_small_integer().is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_tlv_raw_covers_input(data in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            // successive elements tile the input from the start
            let mut dec = Decoder::new(&data);
            let mut consumed = 0;
            while let Ok(tlv) = dec.read_tlv() {
                proptest::prop_assert_eq!(tlv.raw, &data[consumed..consumed + tlv.raw.len()]);
                proptest::prop_assert!(tlv.raw.ends_with(tlv.value));
                consumed += tlv.raw.len();
            }
            proptest::prop_assert!(consumed <= data.len());
        }
    }
}

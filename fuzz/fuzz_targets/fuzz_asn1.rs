#![no_main]
use libfuzzer_sys::fuzz_target;
use stapler_utils::asn1::Decoder;

fuzz_target!(|data: &[u8]| {
    let mut decoder = Decoder::new(data);
    while !decoder.is_empty() {
        let Ok(tlv) = decoder.read_tlv() else {
            break;
        };
        // descend one level into constructed values
        if tlv.tag.constructed {
            let mut inner = Decoder::new(tlv.value);
            while !inner.is_empty() && inner.read_tlv().is_ok() {}
        }
    }
});

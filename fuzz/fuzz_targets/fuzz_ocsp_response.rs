#![no_main]
use libfuzzer_sys::fuzz_target;
use stapler_pki::ocsp::OcspResponse;

fuzz_target!(|data: &[u8]| {
    if let Ok(resp) = OcspResponse::from_der(data) {
        let _ = resp.as_text();
        if let Ok(der) = resp.as_der_bytes() {
            let again = OcspResponse::from_der(&der).expect("re-encoded response must decode");
            assert_eq!(again.as_der_bytes().ok(), Some(der));
        }
    }
});

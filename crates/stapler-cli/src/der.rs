//! `stapler der`: write the canonical DER (or PEM) encoding of a response.

use std::fs;

use stapler_pki::ocsp::OcspResponse;
use stapler_utils::pem;

use crate::input::{read_response, OCSP_RESPONSE_LABEL};

pub fn run(input: &str, output: &str, as_pem: bool) -> Result<(), Box<dyn std::error::Error>> {
    let der = read_response(input)?;
    let resp = OcspResponse::from_der(&der)?;
    let encoded = resp.as_der_bytes()?;
    let bytes = if as_pem {
        pem::encode(OCSP_RESPONSE_LABEL, &encoded).into_bytes()
    } else {
        encoded
    };
    fs::write(output, bytes).map_err(|e| format!("cannot write '{output}': {e}"))?;
    Ok(())
}

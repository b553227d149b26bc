//! Reading response and certificate files.

use std::error::Error;
use std::fs;

use stapler_pki::x509::{parse_certs_pem, Certificate};
use stapler_utils::pem;

pub const OCSP_RESPONSE_LABEL: &str = "OCSP RESPONSE";

/// Read a response file holding raw DER or a PEM `OCSP RESPONSE` block.
pub fn read_response(path: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    let data = fs::read(path).map_err(|e| format!("cannot read response '{path}': {e}"))?;
    if !pem::looks_like_pem(&data) {
        return Ok(data);
    }
    let text = std::str::from_utf8(&data).map_err(|_| format!("'{path}' is not valid PEM"))?;
    pem::parse(text)?
        .into_iter()
        .find(|block| block.label == OCSP_RESPONSE_LABEL)
        .map(|block| block.data)
        .ok_or_else(|| format!("no {OCSP_RESPONSE_LABEL} block in '{path}'").into())
}

/// Read a PEM file of peer chain certificates.
pub fn read_chain(path: &str) -> Result<Vec<Certificate>, Box<dyn Error>> {
    let text =
        fs::read_to_string(path).map_err(|e| format!("cannot read chain '{path}': {e}"))?;
    let certs =
        parse_certs_pem(&text).map_err(|e| format!("failed to parse chain '{path}': {e}"))?;
    Ok(certs)
}

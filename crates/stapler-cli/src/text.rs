//! `stapler text`: print a response in human-readable form.

use std::io::Write;

use stapler_pki::ocsp::OcspResponse;

use crate::input::read_response;

pub fn run(input: &str) -> Result<(), Box<dyn std::error::Error>> {
    let der = read_response(input)?;
    let resp = OcspResponse::from_der(&der)?;
    let text = resp.as_text()?;
    std::io::stdout().write_all(&text)?;
    Ok(())
}

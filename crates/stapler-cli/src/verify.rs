//! `stapler verify`: check an OCSP response signature against trusted CAs.

use stapler_pki::ocsp::OcspResponse;

use crate::input::{read_chain, read_response};

/// Optional verification settings.
#[derive(Debug, Default)]
pub struct Options<'a> {
    pub chain: Option<&'a str>,
    pub attime: Option<i64>,
    pub max_depth: Option<u32>,
}

pub fn run(
    input: &str,
    ca_file: &str,
    opts: &Options<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let der = read_response(input)?;
    let chain = match opts.chain {
        Some(path) => read_chain(path)?,
        None => Vec::new(),
    };
    let resp = OcspResponse::from_der_with_peer_chain(&der, &chain)?;

    resp.basic_verify_with(ca_file, |store| {
        if let Some(t) = opts.attime {
            store.set_verification_time(t);
        }
        if let Some(depth) = opts.max_depth {
            store.set_max_depth(depth);
        }
    })?;

    println!("Response verify OK");
    Ok(())
}

//! PEM format parsing and generation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use stapler_types::CodecError;

/// A parsed PEM block.
#[derive(Debug, Clone)]
pub struct PemBlock {
    /// The label (e.g., "CERTIFICATE", "OCSP RESPONSE").
    pub label: String,
    /// The decoded binary data.
    pub data: Vec<u8>,
}

const BEGIN_PREFIX: &str = "-----BEGIN ";
const END_PREFIX: &str = "-----END ";
const DASHES_SUFFIX: &str = "-----";

/// Returns true if `input` contains at least one PEM BEGIN line.
pub fn looks_like_pem(input: &[u8]) -> bool {
    input
        .windows(BEGIN_PREFIX.len())
        .any(|w| w == BEGIN_PREFIX.as_bytes())
}

/// Parse a PEM-encoded string into its PEM blocks.
/// Text outside BEGIN/END markers is ignored, as are header lines
/// (`Proc-Type: ...`) inside a block.
pub fn parse(input: &str) -> Result<Vec<PemBlock>, CodecError> {
    let mut blocks = Vec::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next() {
        let Some(label) = line
            .trim()
            .strip_prefix(BEGIN_PREFIX)
            .and_then(|s| s.strip_suffix(DASHES_SUFFIX))
        else {
            continue;
        };
        let end_marker = format!("{END_PREFIX}{label}{DASHES_SUFFIX}");

        let mut body = String::new();
        let mut found_end = false;
        for inner in lines.by_ref() {
            let inner = inner.trim();
            if inner == end_marker {
                found_end = true;
                break;
            }
            if inner.contains(':') {
                continue;
            }
            body.push_str(inner);
        }
        if !found_end {
            return Err(CodecError::PemUnterminated(label.to_string()));
        }

        let data = STANDARD
            .decode(body.as_bytes())
            .map_err(|_| CodecError::InvalidBase64)?;
        blocks.push(PemBlock {
            label: label.to_string(),
            data,
        });
    }

    Ok(blocks)
}

/// Encode binary data as a PEM string with the given label.
pub fn encode(label: &str, data: &[u8]) -> String {
    let b64 = STANDARD.encode(data);
    let mut output = format!("{BEGIN_PREFIX}{label}{DASHES_SUFFIX}\n");

    // base64 output is ASCII, so 64-byte chunks are valid line breaks
    for line in b64.as_bytes().chunks(64) {
        output.extend(line.iter().map(|&b| b as char));
        output.push('\n');
    }

    output.push_str(&format!("{END_PREFIX}{label}{DASHES_SUFFIX}\n"));
    output
}

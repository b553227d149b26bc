//! Human-readable text output for X.509 certificates.
//!
//! The layout follows `openssl x509 -text`; the OCSP renderer reuses the
//! helpers here for its own fields.

use std::fmt;

use stapler_utils::asn1::{unix_to_datetime, Decoder, GeneralizedTime};
use stapler_utils::oid::Oid;

use super::extensions::{parse_basic_constraints, parse_extended_key_usage, parse_key_usage};
use super::signing::rsa_modulus_bits;
use super::{Certificate, SubjectPublicKeyInfo, X509Extension};

// ---------------------------------------------------------------------------
// OID-to-name mapping
// ---------------------------------------------------------------------------

/// Map a DER-encoded OID value to a human-readable name.
pub(crate) fn oid_name(oid_bytes: &[u8]) -> String {
    match Oid::from_der_value(oid_bytes) {
        Ok(oid) => oid_to_name(&oid)
            .map(str::to_string)
            .unwrap_or_else(|| oid.to_dot_string()),
        Err(_) => hex_colon(oid_bytes),
    }
}

fn oid_to_name(oid: &Oid) -> Option<&'static str> {
    let name = match oid.arcs() {
        // Signature and key algorithms
        [1, 2, 840, 113549, 1, 1, 1] => "rsaEncryption",
        [1, 2, 840, 113549, 1, 1, 5] => "sha1WithRSAEncryption",
        [1, 2, 840, 113549, 1, 1, 11] => "sha256WithRSAEncryption",
        [1, 2, 840, 113549, 1, 1, 12] => "sha384WithRSAEncryption",
        [1, 2, 840, 113549, 1, 1, 13] => "sha512WithRSAEncryption",
        [1, 2, 840, 113549, 1, 1, 10] => "rsassaPss",
        [1, 2, 840, 10045, 2, 1] => "id-ecPublicKey",
        [1, 2, 840, 10045, 4, 3, 2] => "ecdsa-with-SHA256",
        [1, 2, 840, 10045, 4, 3, 3] => "ecdsa-with-SHA384",
        [1, 2, 840, 10045, 4, 3, 4] => "ecdsa-with-SHA512",
        [1, 3, 101, 112] => "ED25519",
        // Named curves
        [1, 2, 840, 10045, 3, 1, 7] => "prime256v1",
        [1, 3, 132, 0, 34] => "secp384r1",
        // Hash algorithms
        [1, 3, 14, 3, 2, 26] => "sha1",
        [2, 16, 840, 1, 101, 3, 4, 2, 1] => "sha256",
        [2, 16, 840, 1, 101, 3, 4, 2, 2] => "sha384",
        [2, 16, 840, 1, 101, 3, 4, 2, 3] => "sha512",
        // Extensions
        [2, 5, 29, 14] => "X509v3 Subject Key Identifier",
        [2, 5, 29, 15] => "X509v3 Key Usage",
        [2, 5, 29, 17] => "X509v3 Subject Alternative Name",
        [2, 5, 29, 19] => "X509v3 Basic Constraints",
        [2, 5, 29, 21] => "X509v3 CRL Reason Code",
        [2, 5, 29, 35] => "X509v3 Authority Key Identifier",
        [2, 5, 29, 37] => "X509v3 Extended Key Usage",
        [1, 3, 6, 1, 5, 5, 7, 1, 1] => "Authority Information Access",
        // EKU values
        [1, 3, 6, 1, 5, 5, 7, 3, 1] => "TLS Web Server Authentication",
        [1, 3, 6, 1, 5, 5, 7, 3, 2] => "TLS Web Client Authentication",
        [1, 3, 6, 1, 5, 5, 7, 3, 9] => "OCSP Signing",
        // OCSP
        [1, 3, 6, 1, 5, 5, 7, 48, 1] => "OCSP",
        [1, 3, 6, 1, 5, 5, 7, 48, 1, 1] => "Basic OCSP Response",
        [1, 3, 6, 1, 5, 5, 7, 48, 1, 2] => "OCSP Nonce",
        [1, 3, 6, 1, 5, 5, 7, 48, 1, 3] => "OCSP CRL ID",
        [1, 3, 6, 1, 5, 5, 7, 48, 1, 5] => "OCSP No Check",
        [1, 3, 6, 1, 5, 5, 7, 48, 1, 6] => "OCSP Archive Cutoff",
        [1, 3, 6, 1, 5, 5, 7, 48, 1, 7] => "OCSP Service Locator",
        [1, 3, 6, 1, 5, 5, 7, 48, 2] => "CA Issuers",
        _ => return None,
    };
    Some(name)
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

fn hex_colon(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Colon-separated hex, 18 bytes per line, each line prefixed by `indent` spaces.
pub(crate) fn hex_block(data: &[u8], indent: usize) -> String {
    let prefix = " ".repeat(indent);
    let lines: Vec<String> = data
        .chunks(18)
        .map(|chunk| format!("{prefix}{}", hex_colon(chunk)))
        .collect();
    lines.join(":\n")
}

/// Render a UNIX timestamp as `Mon DD HH:MM:SS YYYY GMT`.
pub(crate) fn format_time(unix_ts: i64) -> String {
    format_time_fraction(unix_ts, "")
}

/// Like [`format_time`], keeping any fractional seconds (`12:58:26.5`).
pub(crate) fn format_generalized_time(time: &GeneralizedTime) -> String {
    format_time_fraction(time.unix(), time.fraction())
}

fn format_time_fraction(unix_ts: i64, fraction: &str) -> String {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    let dt = unix_to_datetime(unix_ts);
    let mon = MONTHS
        .get((dt.month as usize).wrapping_sub(1))
        .unwrap_or(&"???");
    let dot = if fraction.is_empty() { "" } else { "." };
    format!(
        "{mon} {:2} {:02}:{:02}:{:02}{dot}{fraction} {} GMT",
        dt.day, dt.hour, dt.minute, dt.second, dt.year
    )
}

/// `N (0xHEX)` for serials that fit in 64 bits, colon hex otherwise.
pub(crate) fn format_serial(serial: &[u8]) -> String {
    let digits = match serial {
        [0x00, rest @ ..] if !rest.is_empty() => rest,
        _ => serial,
    };
    let negative = serial.first().is_some_and(|b| b & 0x80 != 0);
    if digits.len() <= 8 && !negative {
        let value = digits.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
        format!("{value} (0x{value:x})")
    } else {
        hex_colon(serial)
    }
}

fn format_pubkey_info(out: &mut dyn fmt::Write, spki: &SubjectPublicKeyInfo) -> fmt::Result {
    let alg_name = oid_name(&spki.algorithm.oid);
    writeln!(out, "            Public Key Algorithm: {alg_name}")?;
    match alg_name.as_str() {
        "rsaEncryption" => {
            let bits = rsa_modulus_bits(spki).unwrap_or(0);
            writeln!(out, "                Public-Key: ({bits} bit)")?;
        }
        "id-ecPublicKey" => {
            let curve = spki
                .algorithm
                .params_oid()
                .and_then(|o| oid_to_name(&o))
                .unwrap_or("unknown");
            let bits = spki.public_key.len().saturating_sub(1) * 4;
            writeln!(out, "                Public-Key: ({bits} bit)")?;
            writeln!(out, "                ASN1 OID: {curve}")?;
        }
        "ED25519" => writeln!(out, "                ED25519 Public-Key:")?,
        _ => {}
    }
    writeln!(out, "                pub:")?;
    writeln!(out, "{}", hex_block(&spki.public_key, 20))
}

/// Render one extension: a name line, then its decoded value.
pub(crate) fn format_extension(ext: &X509Extension, indent: usize) -> String {
    let pad = " ".repeat(indent);
    let name = oid_name(&ext.oid);
    let crit = if ext.critical { " critical" } else { "" };
    let value = describe_extension_value(ext).unwrap_or_else(|| hex_colon(&ext.value));
    format!("{pad}{name}:{crit}\n{pad}    {value}\n")
}

fn describe_extension_value(ext: &X509Extension) -> Option<String> {
    let oid = Oid::from_der_value(&ext.oid).ok()?;
    match oid.arcs() {
        [2, 5, 29, 19] => {
            let bc = parse_basic_constraints(&ext.value).ok()?;
            let ca = if bc.is_ca { "TRUE" } else { "FALSE" };
            Some(match bc.path_len_constraint {
                Some(len) => format!("CA:{ca}, pathlen:{len}"),
                None => format!("CA:{ca}"),
            })
        }
        [2, 5, 29, 15] => Some(parse_key_usage(&ext.value).ok()?.names().join(", ")),
        [2, 5, 29, 37] => {
            let eku = parse_extended_key_usage(&ext.value).ok()?;
            let names: Vec<String> = eku
                .purposes
                .iter()
                .map(|p| oid_to_name(p).map(str::to_string).unwrap_or_else(|| p.to_string()))
                .collect();
            Some(names.join(", "))
        }
        [2, 5, 29, 14] => {
            let ski = Decoder::new(&ext.value).read_octet_string().ok()?;
            Some(hex_colon(ski).to_uppercase())
        }
        // OCSP nonce: usually an OCTET STRING, printed as hex either way
        [1, 3, 6, 1, 5, 5, 7, 48, 1, 2] => Some(hex::encode_upper(&ext.value)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Certificate::to_text()
// ---------------------------------------------------------------------------

/// Display adapter returned by [`Certificate::text`].
pub struct CertificateText<'a>(&'a Certificate);

impl fmt::Display for CertificateText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_certificate(f, self.0)
    }
}

pub(crate) fn write_certificate(out: &mut dyn fmt::Write, cert: &Certificate) -> fmt::Result {
    let sig_alg = oid_name(&cert.signature_algorithm.oid);
    writeln!(out, "Certificate:")?;
    writeln!(out, "    Data:")?;
    writeln!(
        out,
        "        Version: {} (0x{:x})",
        cert.version,
        cert.version.saturating_sub(1)
    )?;
    writeln!(out, "        Serial Number: {}", format_serial(&cert.serial_number))?;
    writeln!(out, "        Signature Algorithm: {sig_alg}")?;
    writeln!(out, "        Issuer: {}", cert.issuer)?;
    writeln!(out, "        Validity")?;
    writeln!(out, "            Not Before: {}", format_time(cert.not_before))?;
    writeln!(out, "            Not After : {}", format_time(cert.not_after))?;
    writeln!(out, "        Subject: {}", cert.subject)?;
    writeln!(out, "        Subject Public Key Info:")?;
    format_pubkey_info(out, &cert.public_key)?;
    if !cert.extensions.is_empty() {
        writeln!(out, "        X509v3 extensions:")?;
        for ext in &cert.extensions {
            out.write_str(&format_extension(ext, 12))?;
        }
    }
    writeln!(out, "    Signature Algorithm: {sig_alg}")?;
    writeln!(out, "    Signature Value:")?;
    writeln!(out, "{}", hex_block(&cert.signature_value, 8))
}

impl Certificate {
    /// Display adapter producing `openssl x509 -text` style output.
    pub fn text(&self) -> CertificateText<'_> {
        CertificateText(self)
    }

    /// Produce human-readable text output similar to `openssl x509 -text`.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = write_certificate(&mut out, self);
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

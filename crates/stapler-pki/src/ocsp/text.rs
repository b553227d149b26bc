//! `openssl ocsp -resp_text` style rendering.

use std::fmt;

use stapler_utils::pem;

use crate::x509::{
    format_extension, format_generalized_time, hex_block, oid_name, write_certificate,
};

use super::{CertStatus, OcspBasicResponse, OcspResponse, OcspSingleResponse, ResponderId, ResponseBody};

/// Output sink for [`write_response`] that reserves room before every append,
/// so allocation failure becomes `fmt::Error` instead of an abort.
///
/// Only the output buffer is covered. The per-field strings built while
/// formatting (hex blocks, names, PEM) still use the infallible allocator.
pub(super) struct TextBuffer {
    buf: String,
}

impl TextBuffer {
    pub(super) fn new() -> Self {
        Self { buf: String::new() }
    }

    /// Reserve room for `additional` more bytes.
    pub(super) fn grow(&mut self, additional: usize) -> fmt::Result {
        self.buf.try_reserve(additional).map_err(|_| fmt::Error)
    }

    pub(super) fn into_bytes(self) -> Vec<u8> {
        self.buf.into_bytes()
    }
}

impl fmt::Write for TextBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.grow(s.len())?;
        self.buf.push_str(s);
        Ok(())
    }
}

fn upper_hex(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Serial numbers print as the unsigned magnitude in uppercase hex.
fn serial_hex(serial: &[u8]) -> String {
    match serial {
        [0x00, rest @ ..] if !rest.is_empty() => upper_hex(rest),
        _ => upper_hex(serial),
    }
}

pub(super) fn write_response(out: &mut dyn fmt::Write, resp: &OcspResponse<'_>) -> fmt::Result {
    let status = resp.status();
    writeln!(out, "OCSP Response Data:")?;
    writeln!(
        out,
        "    OCSP Response Status: {} (0x{:x})",
        status.name(),
        status.code()
    )?;
    match resp.body() {
        None => Ok(()),
        Some(ResponseBody::Other { response_type, .. }) => {
            let name = response_type
                .to_der_value()
                .map(|v| oid_name(&v))
                .unwrap_or_else(|_| response_type.to_dot_string());
            writeln!(out, "    Response Type: {name}")?;
            writeln!(out, "    (unsupported response type)")
        }
        Some(ResponseBody::Basic(basic)) => {
            writeln!(out, "    Response Type: Basic OCSP Response")?;
            write_basic(out, basic)
        }
    }
}

fn write_basic(out: &mut dyn fmt::Write, basic: &OcspBasicResponse) -> fmt::Result {
    writeln!(out, "    Version: {} (0x{:x})", basic.version + 1, basic.version)?;
    match &basic.responder_id {
        ResponderId::ByName { name, .. } => writeln!(out, "    Responder Id: {name}")?,
        ResponderId::ByKey(hash) => writeln!(out, "    Responder Id: {}", upper_hex(hash))?,
    }
    writeln!(out, "    Produced At: {}", format_generalized_time(&basic.produced_at))?;
    writeln!(out, "    Responses:")?;
    for single in &basic.responses {
        write_single(out, single)?;
    }
    if !basic.extensions.is_empty() {
        writeln!(out, "    Response Extensions:")?;
        for ext in &basic.extensions {
            out.write_str(&format_extension(ext, 8))?;
        }
    }
    writeln!(
        out,
        "    Signature Algorithm: {}",
        oid_name(&basic.signature_algorithm.oid)
    )?;
    writeln!(out, "    Signature Value:")?;
    writeln!(out, "{}", hex_block(&basic.signature, 8))?;
    for cert in &basic.certs {
        write_certificate(out, cert)?;
        out.write_str(&pem::encode("CERTIFICATE", &cert.raw))?;
    }
    Ok(())
}

fn write_single(out: &mut dyn fmt::Write, single: &OcspSingleResponse) -> fmt::Result {
    let id = &single.cert_id;
    writeln!(out, "    Certificate ID:")?;
    writeln!(out, "      Hash Algorithm: {}", oid_name(&id.hash_algorithm.oid))?;
    writeln!(out, "      Issuer Name Hash: {}", upper_hex(&id.issuer_name_hash))?;
    writeln!(out, "      Issuer Key Hash: {}", upper_hex(&id.issuer_key_hash))?;
    writeln!(out, "      Serial Number: {}", serial_hex(&id.serial_number))?;
    writeln!(out, "    Cert Status: {}", single.status.name())?;
    if let CertStatus::Revoked {
        revocation_time,
        reason,
    } = &single.status
    {
        writeln!(out, "    Revocation Time: {}", format_generalized_time(revocation_time))?;
        if let Some(reason) = reason {
            writeln!(
                out,
                "    Revocation Reason: {} (0x{:x})",
                reason.name(),
                reason.code()
            )?;
        }
    }
    writeln!(
        out,
        "    This Update: {}",
        format_generalized_time(&single.this_update)
    )?;
    if let Some(next) = &single.next_update {
        writeln!(out, "    Next Update: {}", format_generalized_time(next))?;
    }
    if !single.extensions.is_empty() {
        writeln!(out, "    Response Single Extensions:")?;
        for ext in &single.extensions {
            out.write_str(&format_extension(ext, 8))?;
        }
    }
    writeln!(out)
}

//! PEM armor removal.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

const BEGIN: &str = "-----BEGIN ";
const END: &str = "-----END ";
const DASHES: &str = "-----";

/// Labels of the blocks [`decode`] will take a key from.
pub const KEY_LABELS: [&str; 2] = ["RSA PRIVATE KEY", "PRIVATE KEY"];

/// Finds the first `RSA PRIVATE KEY` or `PRIVATE KEY` block in `pem`, strips
/// its `-----BEGIN <label>-----` / `-----END <label>-----` lines and
/// base64-decodes what sits between them.
///
/// Blocks with any other label (certificates, encrypted or EC keys) are
/// skipped. Which of the two key encodings the payload holds is decided from
/// the DER shape, not the label. Whitespace anywhere in the body, including
/// `\r\n` line endings, is ignored.
pub fn decode(pem: &str) -> Result<Vec<u8>> {
    let (label, body) = key_block(pem)?;

    let compact: Zeroizing<String> =
        Zeroizing::new(body.chars().filter(|c| !c.is_whitespace()).collect());
    if compact.is_empty() {
        return Err(Error::MalformedPem("empty body"));
    }
    let der = STANDARD.decode(compact.as_bytes())?;

    debug!(label, der_len = der.len(), "decoded PEM block");
    Ok(der)
}

fn key_block(pem: &str) -> Result<(&str, &str)> {
    let mut rest = pem;
    let mut saw_block = false;

    while let Some(begin) = rest.find(BEGIN) {
        saw_block = true;
        let after_begin = &rest[begin + BEGIN.len()..];
        let label_end = after_begin
            .find(DASHES)
            .ok_or(Error::MalformedPem("unterminated BEGIN marker"))?;
        let label = &after_begin[..label_end];
        if label.contains('\n') {
            return Err(Error::MalformedPem("unterminated BEGIN marker"));
        }
        rest = &after_begin[label_end + DASHES.len()..];

        if KEY_LABELS.contains(&label) {
            return armored_body(label, rest).map(|body| (label, body));
        }
        debug!(label, "skipping PEM block");
    }

    Err(Error::MalformedPem(if saw_block {
        "no RSA private key block"
    } else {
        "missing BEGIN marker"
    }))
}

fn armored_body<'a>(label: &str, rest: &'a str) -> Result<&'a str> {
    let end = rest
        .find(END)
        .ok_or(Error::MalformedPem("missing END marker"))?;
    let after_end = &rest[end + END.len()..];
    let end_label = after_end
        .find(DASHES)
        .map(|idx| &after_end[..idx])
        .ok_or(Error::MalformedPem("unterminated END marker"))?;
    if end_label != label {
        return Err(Error::MalformedPem("BEGIN and END labels differ"));
    }

    Ok(&rest[..end])
}

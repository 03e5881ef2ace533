//! RFC 5322 header block reading and `Received` header field extraction.

use thiserror::Error;
use tracing::debug;

use crate::model::envelope::ParsedEnvelope;

/// Why a message's header block could not be read.
///
/// This never escapes the corpus loader: it only decides between dropping a
/// file and sending it headerless.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedMessage {
    /// Input ended before any header field was read.
    #[error("no header fields before end of input")]
    NoHeaders,

    /// The first header line is a continuation line.
    #[error("malformed initial header line {line}: {text:?}")]
    LeadingContinuation { line: usize, text: String },

    /// A header line has no `:` separator.
    #[error("malformed header line {line}: {text:?}")]
    MissingColon { line: usize, text: String },

    /// The field name is empty or contains a non-token character.
    #[error("invalid header field name on line {line}: {name:?}")]
    InvalidFieldName { line: usize, name: String },
}

/// The unfolded header fields of one message, in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    /// `(lowercase_name, value)` pairs.
    fields: Vec<(String, String)>,
}

impl HeaderBlock {
    /// First value of the named field (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Read the header block at the start of a raw message.
///
/// Reading stops at the first blank line. Continuation lines (leading space
/// or tab) are joined to the previous field with a single space. Running out
/// of input before the blank line is fine once at least one field was read.
pub fn read_header_block(raw: &[u8]) -> Result<HeaderBlock, MalformedMessage> {
    let text = decode_header_bytes(raw);
    let mut fields: Vec<(String, String)> = Vec::new();
    let mut terminated = false;

    let lines: Vec<&str> = text.split('\n').collect();
    let last_idx = lines.len() - 1;
    for (idx, line) in lines.into_iter().enumerate() {
        let line_no = idx + 1;
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            // An empty final piece is the end of input, not a separator.
            terminated = idx < last_idx;
            break;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            match fields.last_mut() {
                Some(last) => {
                    last.1.push(' ');
                    last.1.push_str(line.trim());
                }
                None => {
                    return Err(MalformedMessage::LeadingContinuation {
                        line: line_no,
                        text: line.to_string(),
                    })
                }
            }
            continue;
        }

        let Some(colon_pos) = line.find(':') else {
            return Err(MalformedMessage::MissingColon {
                line: line_no,
                text: line.to_string(),
            });
        };

        let name = &line[..colon_pos];
        if !is_valid_field_name(name) {
            return Err(MalformedMessage::InvalidFieldName {
                line: line_no,
                name: name.to_string(),
            });
        }

        let value = line[colon_pos + 1..].trim().to_string();
        fields.push((name.to_ascii_lowercase(), value));
    }

    if fields.is_empty() && !terminated {
        return Err(MalformedMessage::NoHeaders);
    }

    Ok(HeaderBlock { fields })
}

/// Field names are HTTP-style tokens: alphanumerics and ``!#$%&'*+-.^_`|~``.
fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    // Strip BOM if present
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Build the scan envelope from a message's headers.
///
/// Only the first `Received` header is consulted. Missing fields become
/// empty strings; there is always exactly one recipient entry, taken from `To`.
pub fn parse_envelope(headers: &HeaderBlock) -> ParsedEnvelope {
    let received = headers.get("received").unwrap_or_default();

    let originating_inet = extract_inet(received).unwrap_or_else(|| {
        debug!(received, "No originating address in Received header");
        ""
    });
    let helo_domain = extract_helo(received).unwrap_or_else(|| {
        debug!(received, "No HELO/EHLO name in Received header");
        ""
    });

    ParsedEnvelope {
        originating_inet: originating_inet.to_string(),
        helo_domain: helo_domain.to_string(),
        mail_from: headers.get("from").unwrap_or_default().to_string(),
        rcpt_to: vec![headers.get("to").unwrap_or_default().to_string()],
    }
}

/// Originating address from a `Received` header.
///
/// For `from 65.213.189.232  (HELO ocean07.youroptinmail.com) (65.213.189.232) by ...`
/// this is `65.213.189.232`: the text between `from` and `(HELO` (or `(EHLO`).
pub fn extract_inet(received: &str) -> Option<&str> {
    between(received, "from", "(HELO").or_else(|| between(received, "from", "(EHLO"))
}

/// Announced hostname from a `Received` header: the text between `(HELO`
/// (or `(EHLO`) and the next `)`.
pub fn extract_helo(received: &str) -> Option<&str> {
    between(received, "(HELO", ")").or_else(|| between(received, "(EHLO", ")"))
}

/// Trimmed text between the first `start` and the first `end` after it.
///
/// Returns `None` when either marker is missing.
pub fn between<'a>(haystack: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = haystack.find(start)? + start.len();
    let rest = &haystack[from..];
    let to = rest.find(end)?;
    Some(rest[..to].trim())
}

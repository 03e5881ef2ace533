//! Envelope metadata recovered from a mail message's headers.

use serde::Serialize;

/// Scan metadata extracted from a parsed message.
///
/// Every field is best-effort: a missing header leaves the field empty and
/// never aborts processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedEnvelope {
    /// Originating network address from the first `Received` header.
    pub originating_inet: String,

    /// Hostname announced in `HELO`/`EHLO`, from the first `Received` header.
    pub helo_domain: String,

    /// Raw `From` header value.
    pub mail_from: String,

    /// Recipients, in order. One `X-Rcptto` header is sent per entry.
    pub rcpt_to: Vec<String>,
}

//! Outbound scan requests, built once at load time and never mutated.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONNECTION, CONTENT_TYPE};
use http::{HeaderMap, Method, Uri};
use serde::Serialize;

use super::envelope::ParsedEnvelope;

pub const X_INET: HeaderName = HeaderName::from_static("x-inet");
pub const X_HELO: HeaderName = HeaderName::from_static("x-helo");
pub const X_MAILFROM: HeaderName = HeaderName::from_static("x-mailfrom");
pub const X_RCPTTO: HeaderName = HeaderName::from_static("x-rcptto");

const OCTET_STREAM: &str = "application/octet-stream";

/// Size and header-presence metadata that travels with each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BodyDetail {
    /// Body size in bytes.
    pub size: usize,

    /// `true` when envelope headers were parsed and attached.
    pub has_headers: bool,
}

/// A fully formed `POST` to the scan endpoint.
///
/// The body is shared through [`Bytes`], so cloning a request (or handing it
/// to the HTTP client) never copies the message.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    detail: BodyDetail,
}

impl ScanRequest {
    /// Build a request carrying `X-Inet`, `X-Helo`, `X-Mailfrom` and one
    /// `X-Rcptto` per recipient. An envelope without recipients still gets a
    /// single empty `X-Rcptto`.
    pub fn headered(uri: &Uri, envelope: &ParsedEnvelope, body: impl Into<Bytes>) -> Self {
        let mut headers = base_headers();
        headers.insert(X_INET, header_value(&envelope.originating_inet));
        headers.insert(X_HELO, header_value(&envelope.helo_domain));
        headers.insert(X_MAILFROM, header_value(&envelope.mail_from));
        for rcpt in &envelope.rcpt_to {
            headers.append(X_RCPTTO, header_value(rcpt));
        }
        if envelope.rcpt_to.is_empty() {
            headers.insert(X_RCPTTO, HeaderValue::from_static(""));
        }
        Self::with_headers(uri, headers, body.into(), true)
    }

    /// Build a request that sends only the raw body.
    pub fn headerless(uri: &Uri, body: impl Into<Bytes>) -> Self {
        Self::with_headers(uri, base_headers(), body.into(), false)
    }

    fn with_headers(uri: &Uri, headers: HeaderMap, body: Bytes, has_headers: bool) -> Self {
        let detail = BodyDetail {
            size: body.len(),
            has_headers,
        };
        Self {
            uri: uri.clone(),
            headers,
            body,
            detail,
        }
    }

    pub fn method(&self) -> Method {
        Method::POST
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn detail(&self) -> BodyDetail {
        self.detail
    }

    /// Materialize an [`http::Request`] for transports that take one.
    pub fn to_http(&self) -> http::Request<Bytes> {
        let mut request = http::Request::new(self.body.clone());
        *request.method_mut() = self.method();
        *request.uri_mut() = self.uri.clone();
        *request.headers_mut() = self.headers.clone();
        request
    }
}

fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM));
    headers
}

/// Convert a mail header value into an HTTP header value.
///
/// Control characters (other than tab) are not legal in HTTP field values and
/// are dropped; everything else is passed through untouched.
fn header_value(raw: &str) -> HeaderValue {
    let cleaned: Vec<u8> = raw
        .bytes()
        .filter(|&b| b == b'\t' || (b >= 0x20 && b != 0x7f))
        .collect();
    HeaderValue::from_bytes(&cleaned).unwrap_or_else(|_| HeaderValue::from_static(""))
}

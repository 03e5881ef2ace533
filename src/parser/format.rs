//! Mail file classification by suffix, and SMTP-session stripping for `.mail` files.

use std::path::Path;

/// Placeholder tokens found in `.mail` captures, with their substitutes.
const PLACEHOLDERS: [(&[u8], &[u8]); 2] = [
    (b"__SENDER_ADDR__", b"sender.address@gmail.com"),
    (b"__RECIP_ADDR__", b"recip.address@gmail.com"),
];

/// `EHLO`, `MAIL FROM`, `RCPT TO`, `DATA`.
const SMTP_PREAMBLE_LINES: usize = 4;
/// `.` and `QUIT`.
const SMTP_POSTAMBLE_LINES: usize = 2;

/// The recognized on-disk mail formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailFormat {
    /// Bare RFC 5322 message.
    Eml,
    /// Bare RFC 5322 message under a different suffix.
    Msg,
    /// RFC 5322 message wrapped in a captured SMTP session.
    Mail,
}

impl MailFormat {
    /// Classify a file by the suffix of its name (case-sensitive).
    ///
    /// The name must have at least one character before the suffix, so a
    /// file literally called `.eml` is not a mail file. Names need not be
    /// valid UTF-8.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.as_encoded_bytes();
        [Self::Eml, Self::Msg, Self::Mail]
            .into_iter()
            .find(|format| {
                let suffix = format.suffix().as_bytes();
                name.len() > suffix.len() && name.ends_with(suffix)
            })
    }

    /// The suffix including the leading dot.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Eml => ".eml",
            Self::Msg => ".msg",
            Self::Mail => ".mail",
        }
    }
}

/// Strip the SMTP session framing from a `.mail` capture.
///
/// A capture looks like:
///
/// ```text
/// EHLO mailqa.example.com
/// MAIL FROM:<__SENDER_ADDR__>
/// RCPT TO:<__RECIP_ADDR__>
/// DATA
/// ...message...
/// .
/// QUIT
/// ```
///
/// Placeholders are substituted first, then the first four and last two
/// lines are dropped. Input with fewer than three lines is returned as-is;
/// input with no line between preamble and postamble yields nothing.
///
/// Works on raw bytes so the header charset is left for the header reader
/// to detect.
pub fn sanitize_mail_file(raw: &[u8]) -> Vec<u8> {
    let mut text = raw.to_vec();
    for (token, substitute) in PLACEHOLDERS {
        text = replace_all(&text, token, substitute);
    }

    let lines: Vec<&[u8]> = text.split(|&b| b == b'\n').collect();
    if lines.len() <= SMTP_POSTAMBLE_LINES {
        return text;
    }

    let end = lines.len() - SMTP_POSTAMBLE_LINES;
    if end <= SMTP_PREAMBLE_LINES {
        return Vec::new();
    }
    lines[SMTP_PREAMBLE_LINES..end].join(&b'\n')
}

fn replace_all(haystack: &[u8], token: &[u8], substitute: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = rest.windows(token.len()).position(|w| w == token) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(substitute);
        rest = &rest[pos + token.len()..];
    }
    out.extend_from_slice(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_recognizes_suffixes() {
        assert_eq!(MailFormat::from_path(Path::new("a/b.eml")), Some(MailFormat::Eml));
        assert_eq!(MailFormat::from_path(Path::new("b.msg")), Some(MailFormat::Msg));
        assert_eq!(MailFormat::from_path(Path::new("x.y.mail")), Some(MailFormat::Mail));
    }

    #[test]
    fn test_from_path_is_case_sensitive_and_strict() {
        assert_eq!(MailFormat::from_path(Path::new("b.EML")), None);
        assert_eq!(MailFormat::from_path(Path::new("b.emlx")), None);
        assert_eq!(MailFormat::from_path(Path::new("notes.txt")), None);
        assert_eq!(MailFormat::from_path(Path::new(".eml")), None);
    }

    #[test]
    fn test_sanitize_strips_session() {
        let raw = "EHLO mailqa.example.com\n\
                   MAIL FROM:<a@example.com>\n\
                   RCPT TO:<b@example.com>\n\
                   DATA\n\
                   Subject: hi\n\
                   body line\n\
                   .\n\
                   QUIT";
        assert_eq!(sanitize_mail_file(raw.as_bytes()), b"Subject: hi\nbody line");
    }

    #[test]
    fn test_sanitize_substitutes_placeholders() {
        let raw = "EHLO h\nMAIL FROM:<__SENDER_ADDR__>\nRCPT TO:<__RECIP_ADDR__>\nDATA\n\
                   From: __SENDER_ADDR__\nTo: __RECIP_ADDR__\n.\nQUIT\n";
        // The trailing newline yields an empty last line, so "." survives.
        assert_eq!(
            sanitize_mail_file(raw.as_bytes()),
            b"From: sender.address@gmail.com\nTo: recip.address@gmail.com\n."
        );
    }

    #[test]
    fn test_sanitize_degenerate_inputs() {
        assert_eq!(sanitize_mail_file(b""), b"");
        assert_eq!(sanitize_mail_file(b"one\ntwo"), b"one\ntwo");
        assert_eq!(sanitize_mail_file(b"1\n2\n3"), b"");
        assert_eq!(sanitize_mail_file(b"1\n2\n3\n4\n5\n6"), b"");
        assert_eq!(sanitize_mail_file(b"1\n2\n3\n4\n5\n6\n7"), b"5");
    }

    #[test]
    fn test_sanitize_keeps_non_utf8_bytes() {
        let raw = b"EHLO h\nMAIL FROM:<x>\nRCPT TO:<y>\nDATA\n\
                    From: M\xfcller <__SENDER_ADDR__>\n\n.\nQUIT";
        assert_eq!(
            sanitize_mail_file(raw),
            b"From: M\xfcller <sender.address@gmail.com>\n"
        );
    }

    #[test]
    fn test_replace_all() {
        assert_eq!(replace_all(b"a__X__b__X__", b"__X__", b"y"), b"ayby");
        assert_eq!(replace_all(b"nothing", b"__X__", b"y"), b"nothing");
        assert_eq!(replace_all(b"", b"__X__", b"y"), b"");
    }

    #[cfg(unix)]
    #[test]
    fn test_from_path_accepts_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let name = Path::new(OsStr::from_bytes(b"caf\xe9.eml"));
        assert_eq!(MailFormat::from_path(name), Some(MailFormat::Eml));
        let bare = Path::new(OsStr::from_bytes(b"\xe9.txt"));
        assert_eq!(MailFormat::from_path(bare), None);
    }
}

//! Integration tests for corpus loading and the request ring.

use std::fs;
use std::path::Path;

use scanbench::corpus::loader::{self, load_corpus};
use scanbench::corpus::ring::MessagesRing;
use scanbench::error::ScanbenchError;
use scanbench::model::request::{X_HELO, X_INET, X_MAILFROM, X_RCPTTO};
use scanbench::parser::mail::FilePolicy;
use tempfile::TempDir;

const URI: &str = "http://scanner.test:8080/api/v1/scan";

const EML: &str = "Received: from 192.0.2.10 (HELO mx.example.org) (192.0.2.10) by scanner\n\
                   From: alice@example.org\n\
                   To: bob@example.net\n\
                   Subject: hello\n\
                   \n\
                   Hi Bob.\n";

const HEADERLESS: &str = "this first line has no colon\nso the headers cannot be read\n";

const MAIL_CAPTURE: &str = "HELO client.example.com\n\
                            MAIL FROM:<__SENDER_ADDR__>\n\
                            RCPT TO:<__RECIP_ADDR__>\n\
                            DATA\n\
                            Received: from 198.51.100.7 (EHLO relay.example.net) by mx\n\
                            From: __SENDER_ADDR__\n\
                            To: __RECIP_ADDR__\n\
                            \n\
                            body\n\
                            .\n\
                            QUIT";

fn write(dir: &Path, name: &str, contents: impl AsRef<[u8]>) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn header<'a>(ring: &'a MessagesRing, idx: usize, name: &http::HeaderName) -> Option<&'a str> {
    ring.messages()[idx]
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
}

// ─── Filtering ──────────────────────────────────────────────────────

#[test]
fn test_size_bounds_and_suffix_filter() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a_ok.eml", format!("{EML}{}", "x".repeat(1500)));
    write(dir.path(), "b_big.eml", format!("{EML}{}", "x".repeat(5000)));
    write(dir.path(), "c_small.eml", EML);
    write(dir.path(), "d_notes.txt", format!("{EML}{}", "x".repeat(1500)));

    let ring = MessagesRing::new(URI, dir.path(), 3, 1, false).unwrap();
    assert_eq!(ring.len(), 1);

    let size = EML.len() + 1500;
    assert_eq!(ring.min_size(), size);
    assert_eq!(ring.max_size(), size);
    assert!((ring.avg_size() - size as f64).abs() < f64::EPSILON);
    assert_eq!(ring.stats().skipped_size, 2);
}

#[test]
fn test_walks_subdirectories() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "top.eml", EML);
    write(dir.path(), "nested/one.msg", EML);
    write(dir.path(), "nested/deeper/two.eml", EML);

    let ring = MessagesRing::new(URI, dir.path(), 100, 0, false).unwrap();
    assert_eq!(ring.len(), 3);
}

#[test]
fn test_unparsable_headers_fallback_or_drop() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.eml", EML);
    write(dir.path(), "b.eml", HEADERLESS);

    let lenient = MessagesRing::new(URI, dir.path(), 100, 0, false).unwrap();
    assert_eq!(lenient.len(), 2);
    assert_eq!(lenient.stats().headered, 1);
    assert_eq!(lenient.stats().headerless, 1);
    let fallback = &lenient.messages()[1];
    assert!(!fallback.detail().has_headers);
    assert_eq!(fallback.body().as_ref(), HEADERLESS.as_bytes());

    let strict = MessagesRing::new(URI, dir.path(), 100, 0, true).unwrap();
    assert_eq!(strict.len(), 1);
    assert_eq!(strict.stats().skipped_unparsable, 1);
    assert!(strict.messages()[0].detail().has_headers);
}

// ─── Request construction ───────────────────────────────────────────

#[test]
fn test_headered_request_carries_envelope() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.eml", EML);
    write(dir.path(), "b.eml", HEADERLESS);

    let ring = MessagesRing::new(URI, dir.path(), 100, 0, false).unwrap();
    assert_eq!(header(&ring, 0, &X_INET), Some("192.0.2.10"));
    assert_eq!(header(&ring, 0, &X_HELO), Some("mx.example.org"));
    assert_eq!(header(&ring, 0, &X_MAILFROM), Some("alice@example.org"));
    assert_eq!(header(&ring, 0, &X_RCPTTO), Some("bob@example.net"));

    for name in [&X_INET, &X_HELO, &X_MAILFROM, &X_RCPTTO] {
        assert!(header(&ring, 1, name).is_none(), "headerless request has {name}");
    }

    let request = &ring.messages()[0];
    assert_eq!(request.method(), http::Method::POST);
    assert_eq!(request.uri().to_string(), URI);
    assert_eq!(request.body().as_ref(), EML.as_bytes());
}

#[test]
fn test_mail_capture_headers_from_data_section() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "capture.mail", MAIL_CAPTURE);

    let ring = MessagesRing::new(URI, dir.path(), 100, 0, true).unwrap();
    assert_eq!(ring.len(), 1);
    assert_eq!(header(&ring, 0, &X_INET), Some("198.51.100.7"));
    assert_eq!(header(&ring, 0, &X_HELO), Some("relay.example.net"));
    assert_eq!(header(&ring, 0, &X_MAILFROM), Some("sender.address@gmail.com"));
    assert_eq!(header(&ring, 0, &X_RCPTTO), Some("recip.address@gmail.com"));

    // The body is the capture as stored, SMTP framing included.
    assert_eq!(ring.messages()[0].body().as_ref(), MAIL_CAPTURE.as_bytes());
    assert_eq!(ring.max_size(), MAIL_CAPTURE.len());
}

// ─── Ring ───────────────────────────────────────────────────────────

#[test]
fn test_ring_cycles_in_file_order() {
    let dir = TempDir::new().unwrap();
    for (i, name) in ["m0.eml", "m1.eml", "m2.eml", "m3.eml"].iter().enumerate() {
        write(dir.path(), name, format!("{EML}#{i}\n"));
    }

    let ring = MessagesRing::new(URI, dir.path(), 100, 0, false).unwrap();
    let bodies: Vec<_> = (0..ring.len() * 2)
        .map(|_| ring.next_message().body().clone())
        .collect();

    for (i, body) in bodies.iter().take(4).enumerate() {
        assert!(body.ends_with(format!("#{i}\n").as_bytes()));
    }
    assert_eq!(bodies[..4], bodies[4..]);
}

// ─── Failures ───────────────────────────────────────────────────────

#[test]
fn test_empty_corpus_is_fatal() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "readme.txt", "nothing to send");
    write(dir.path(), "huge.eml", "x".repeat(2000));

    let err = MessagesRing::new(URI, dir.path(), 1, 0, false).unwrap_err();
    assert!(matches!(err, ScanbenchError::EmptyCorpus(_)), "got {err:?}");
}

#[test]
fn test_missing_directory_is_fatal() {
    let dir = TempDir::new().unwrap();
    let err = MessagesRing::new(URI, dir.path().join("absent"), 100, 0, false).unwrap_err();
    assert!(matches!(err, ScanbenchError::Io { .. }), "got {err:?}");
}

#[test]
fn test_invalid_arguments_are_fatal() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.eml", EML);

    assert!(matches!(
        MessagesRing::new(URI, dir.path(), 1, 5, false),
        Err(ScanbenchError::InvalidSizeBounds { .. })
    ));
    assert!(matches!(
        MessagesRing::new("/api/v1/scan", dir.path(), 100, 0, false),
        Err(ScanbenchError::InvalidUri { .. })
    ));
}

#[test]
fn test_load_reports_progress() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.eml", EML);
    write(dir.path(), "b.eml", EML);
    write(dir.path(), "c.txt", EML);

    let uri = loader::parse_uri(URI).unwrap();
    let policy = FilePolicy::from_kb(0, 100, false).unwrap();
    let seen = std::cell::RefCell::new(Vec::new());
    let report = |n: usize| seen.borrow_mut().push(n);
    let corpus = load_corpus(&uri, dir.path(), &policy, Some(&report)).unwrap();

    assert_eq!(corpus.requests.len(), 2);
    assert_eq!(*seen.borrow(), vec![1, 2]);
    assert_eq!(corpus.stats.total_bytes, 2 * EML.len() as u64);
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_file_names_are_loaded() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(OsStr::from_bytes(b"caf\xe9.eml")), EML).unwrap();

    let ring = MessagesRing::new(URI, dir.path(), 100, 0, true).unwrap();
    assert_eq!(ring.len(), 1);
    assert_eq!(header(&ring, 0, &X_MAILFROM), Some("alice@example.org"));
}

// ─── Unreadable entries ─────────────────────────────────────────────

/// Make `path` unreadable. Returns `false` when the permission change has no
/// effect (running as root), in which case the caller skips its checks.
#[cfg(unix)]
fn make_unreadable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o000)).unwrap();
    if path.is_dir() {
        fs::read_dir(path).is_err()
    } else {
        fs::read(path).is_err()
    }
}

#[cfg(unix)]
#[test]
fn test_unreadable_mail_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.eml", EML);
    write(dir.path(), "locked.eml", EML);
    if !make_unreadable(&dir.path().join("locked.eml")) {
        return;
    }

    let err = MessagesRing::new(URI, dir.path(), 100, 0, false).unwrap_err();
    match err {
        ScanbenchError::Io { path, .. } => assert!(path.ends_with("locked.eml")),
        other => panic!("expected Io error, got {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn test_unreadable_mail_directory_is_fatal() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.eml", EML);
    fs::create_dir(dir.path().join("archive.eml")).unwrap();
    if !make_unreadable(&dir.path().join("archive.eml")) {
        return;
    }

    let err = MessagesRing::new(URI, dir.path(), 100, 0, false).unwrap_err();
    assert!(matches!(err, ScanbenchError::Walk { .. }), "got {err:?}");
}

#[cfg(unix)]
#[test]
fn test_unreadable_other_entries_are_ignored() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.eml", EML);
    write(dir.path(), "secret.txt", "private");
    fs::create_dir(dir.path().join("private")).unwrap();
    if !make_unreadable(&dir.path().join("secret.txt"))
        || !make_unreadable(&dir.path().join("private"))
    {
        return;
    }

    let ring = MessagesRing::new(URI, dir.path(), 100, 0, false).unwrap();
    assert_eq!(ring.len(), 1);
}

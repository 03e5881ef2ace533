//! Mail file parsing: format detection, SMTP-capture stripping, header reading,
//! and the per-file accept/skip decision.

pub mod format;
pub mod header;
pub mod mail;

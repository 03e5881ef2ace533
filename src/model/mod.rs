//! Core data model: envelope metadata and the pre-built scan requests.

pub mod envelope;
pub mod request;

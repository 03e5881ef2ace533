//! The request corpus: loading mail files from disk and serving them round-robin.

pub mod loader;
pub mod ring;
pub mod stats;

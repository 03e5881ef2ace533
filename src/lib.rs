//! `scanbench`: replay a corpus of email messages as HTTP scan requests.
//!
//! This crate provides the corpus builder (mail file discovery, parsing and
//! request construction), the shared round-robin [`corpus::ring::MessagesRing`]
//! that workers draw requests from, metrics reporting, and a fixed-concurrency
//! load driver.

pub mod config;
pub mod corpus;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod model;
pub mod parser;

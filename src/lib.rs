//! Taaruf workflow engine: match requests, the guided taaruf process, and the
//! adapters needed to drive them.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;

//! Application layer containing the workflow orchestration.
//!
//! `TaarufEngine` is the single entry point the presentation layer calls into. It
//! reads the current actor from the session provider, applies domain transitions to
//! copies of stored state, persists them, and reports every outcome to the notifier.

pub mod engine;

//! Outer surfaces used by the command-line driver.

pub mod csv;
pub mod report;
pub mod script;

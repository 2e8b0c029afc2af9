//! Domain layer: value types, state transitions and the ports the engine talks through.

pub mod actor;
pub mod candidate;
pub mod notification;
pub mod ports;
pub mod process;
pub mod request;

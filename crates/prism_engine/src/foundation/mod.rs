//! Foundation utilities shared across the engine
//!
//! Math type aliases and logging setup. Everything here is deliberately
//! thin: the heavy lifting is done by `nalgebra` and `log`.

pub mod logging;
pub mod math;

//! Core abstractions for concentrator drivers.
//!
//! - [`driver::Concentrator`]: Trait to implement for new hardware
//! - [`types`]: Configuration values and received packets

pub mod driver;
pub mod types;

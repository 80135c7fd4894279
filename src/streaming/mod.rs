//! TCP streaming to the downstream client

pub mod connection;

pub use connection::{ConnectionManager, Liveness};

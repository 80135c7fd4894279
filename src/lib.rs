//! lora-pkt-server - LoRa concentrator packet server
//!
//! Receives spotter telemetry through a LoRa concentrator and streams it, one
//! text line per packet, to a single TCP client.
//!
//! ## Components
//!
//! - [`channel_plan`]: absolute frequency to logical channel index
//! - [`session`]: concentrator configuration and polling
//! - [`pipeline`]: acceptance filter, payload decode, forwarding
//! - [`streaming`]: single-client TCP connection manager
//! - [`lifecycle`]: graceful stop and immediate quit signals
//! - [`server`]: the main loop
//!
//! ## Output
//!
//! ```text
//! Connected...
//! #0,17000000006,10,-20,30
//! ```

pub mod channel_plan;
pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod lifecycle;
pub mod pipeline;
pub mod server;
pub mod session;
pub mod spotter;
pub mod streaming;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
pub use server::{Server, ServerOptions};

//! Concentrator trait definition

use crate::core::types::{BoardConfig, IfChannelConfig, RfChainConfig, RxPacket};
use crate::error::Result;

/// Radio driver abstraction for a LoRa concentrator
///
/// The driver owns all register access and demodulation. Callers submit the
/// board, RF chain and IF channel configuration, then `start()` and poll
/// `receive()` until `stop()`.
pub trait Concentrator: Send {
    /// Submit board-wide settings
    fn configure_board(&mut self, conf: &BoardConfig) -> Result<()>;

    /// Submit settings for RF chain `index`
    fn configure_rf_chain(&mut self, index: usize, conf: &RfChainConfig) -> Result<()>;

    /// Submit settings for IF channel `index`
    fn configure_channel(&mut self, index: usize, conf: &IfChannelConfig) -> Result<()>;

    /// Start reception with the submitted configuration
    fn start(&mut self) -> Result<()>;

    /// Fetch up to `max` buffered packets without waiting for new ones
    fn receive(&mut self, max: usize) -> Result<Vec<RxPacket>>;

    /// Stop reception
    fn stop(&mut self) -> Result<()>;
}

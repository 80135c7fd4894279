//! Device implementations

pub mod mock;

use crate::config::DeviceConfig;
use crate::core::driver::Concentrator;
use crate::error::{Error, Result};
use crate::spotter::PayloadLayout;
use mock::MockConcentrator;

/// Create a concentrator driver based on configuration
pub fn create_device(config: &DeviceConfig, layout: PayloadLayout) -> Result<Box<dyn Concentrator>> {
    match config.device.as_str() {
        "mock" => {
            let (driver, _handle) = MockConcentrator::new(layout, config.mock.spotter_interval_ms);
            Ok(Box::new(driver))
        }
        _ => Err(Error::UnknownDevice(config.device.clone())),
    }
}

//! Radio session: configures and drives a [`Concentrator`]

use crate::config::ConcentratorConfig;
use crate::core::driver::Concentrator;
use crate::core::types::{FSK_IF_INDEX, LORA_STD_IF_INDEX, RxPacket};
use crate::error::{Error, Result};
use log::{debug, info, warn};

/// Owns the concentrator driver for the lifetime of the process
pub struct RadioSession {
    driver: Box<dyn Concentrator>,
    max_packets: usize,
    running: bool,
}

impl RadioSession {
    /// Wrap a driver; each poll fetches at most `max_packets`
    pub fn new(driver: Box<dyn Concentrator>, max_packets: usize) -> Self {
        Self {
            driver,
            max_packets: max_packets.max(1),
            running: false,
        }
    }

    /// Submit board, RF chain and IF channel configuration
    ///
    /// Elements absent from `conf` are not submitted. Any rejection aborts.
    pub fn configure(&mut self, conf: &ConcentratorConfig) -> Result<()> {
        self.driver
            .configure_board(&conf.board)
            .map_err(|e| context("board configuration rejected", e))?;

        for (i, radio) in conf.radios.iter().enumerate() {
            if let Some(radio) = radio {
                self.driver
                    .configure_rf_chain(i, &radio.to_rf_chain())
                    .map_err(|e| context(&format!("radio {i} configuration rejected"), e))?;
            }
        }

        for (i, chan) in conf.multi_sf.iter().enumerate() {
            if let Some(chan) = chan {
                self.driver
                    .configure_channel(i, &chan.to_if_channel())
                    .map_err(|e| {
                        context(&format!("multi-SF channel {i} configuration rejected"), e)
                    })?;
            }
        }

        if let Some(chan) = &conf.lora_std {
            self.driver
                .configure_channel(LORA_STD_IF_INDEX, &chan.to_if_channel())
                .map_err(|e| context("LoRa standard channel configuration rejected", e))?;
        }

        if let Some(chan) = &conf.fsk {
            self.driver
                .configure_channel(FSK_IF_INDEX, &chan.to_if_channel())
                .map_err(|e| context("FSK channel configuration rejected", e))?;
        }

        debug!("Concentrator configuration submitted");
        Ok(())
    }

    /// Start reception
    pub fn start(&mut self) -> Result<()> {
        self.driver
            .start()
            .map_err(|e| context("failed to start the concentrator", e))?;
        self.running = true;
        info!("Concentrator started, packets can now be received");
        Ok(())
    }

    /// Fetch buffered packets
    pub fn poll(&mut self) -> Result<Vec<RxPacket>> {
        self.driver
            .receive(self.max_packets)
            .map_err(|e| context("failed packet fetch", e))
    }

    /// Fetch and discard buffered packets, returning how many were dropped
    pub fn flush(&mut self) -> Result<usize> {
        let stale = self.poll()?.len();
        if stale > 0 {
            debug!("Discarded {} stale packets", stale);
        }
        Ok(stale)
    }

    /// Stop reception
    ///
    /// A failure is logged and returned; callers shutting down may ignore it.
    pub fn stop(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        self.running = false;
        match self.driver.stop() {
            Ok(()) => {
                info!("Concentrator stopped successfully");
                Ok(())
            }
            Err(e) => {
                warn!("Failed to stop concentrator: {}", e);
                Err(e)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

fn context(what: &str, err: Error) -> Error {
    match err {
        Error::Concentrator(msg) => Error::Concentrator(format!("{what}: {msg}")),
        other => Error::Concentrator(format!("{what}: {other}")),
    }
}

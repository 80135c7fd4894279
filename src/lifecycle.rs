//! Shutdown signal state
//!
//! - `SIGINT` / `SIGTERM`: graceful stop, the concentrator is stopped and
//!   the client closed
//! - `SIGQUIT`: immediate quit, hardware and sockets are left as they are
//!
//! Flags are only sampled between loop iterations.

use crate::error::Result;
use log::info;
use signal_hook::consts::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// How the main loop should terminate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Stop the concentrator, close the client, exit successfully
    Graceful,
    /// Exit without touching the concentrator or sockets
    Immediate,
}

/// Shared shutdown flags
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    exit: Arc<AtomicBool>,
    quit: Arc<AtomicBool>,
}

impl Lifecycle {
    /// Flags without any signal handler attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Route process signals to the flags from a dedicated thread
    pub fn install_signal_handlers(&self) -> Result<()> {
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGQUIT])?;
        let lifecycle = self.clone();

        std::thread::Builder::new()
            .name("signal-handler".to_string())
            .spawn(move || {
                for sig in signals.forever() {
                    if sig == SIGQUIT {
                        info!("Received signal {:?}, quitting immediately...", sig);
                        lifecycle.request_quit();
                    } else {
                        info!("Received signal {:?}, initiating shutdown...", sig);
                        lifecycle.request_stop();
                    }
                }
            })?;
        Ok(())
    }

    pub fn request_stop(&self) {
        self.exit.store(true, Ordering::Relaxed);
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::Relaxed);
    }

    /// Pending shutdown request; quit wins over stop
    pub fn check(&self) -> Option<ShutdownMode> {
        if self.quit.load(Ordering::Relaxed) {
            Some(ShutdownMode::Immediate)
        } else if self.exit.load(Ordering::Relaxed) {
            Some(ShutdownMode::Graceful)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_request() {
        assert_eq!(Lifecycle::new().check(), None);
    }

    #[test]
    fn test_stop_and_quit() {
        let lifecycle = Lifecycle::new();
        let remote = lifecycle.clone();
        remote.request_stop();
        assert_eq!(lifecycle.check(), Some(ShutdownMode::Graceful));
        remote.request_quit();
        assert_eq!(lifecycle.check(), Some(ShutdownMode::Immediate));
    }
}

//! Main receive-and-stream loop
//!
//! One iteration:
//! 1. accept a client if none (flush stale packets, then greet) or turn
//!    away extra clients
//! 2. poll the concentrator
//! 3. liveness check on the client
//! 4. decode, filter and forward the polled packets
//!
//! Shutdown flags are checked between iterations only.

use crate::error::Result;
use crate::lifecycle::{Lifecycle, ShutdownMode};
use crate::core::types::RxPacket;
use crate::pipeline::{LineSink, Pipeline};
use crate::session::RadioSession;
use crate::streaming::{ConnectionManager, Liveness};
use log::{debug, info};
use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

/// Loop timing
#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// Sleep after a poll that returned nothing
    pub idle_sleep: Duration,
    /// Statistics log period, `None` to disable
    pub stats_interval: Option<Duration>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            idle_sleep: Duration::from_millis(10),
            stats_interval: Some(Duration::from_secs(10)),
        }
    }
}

/// Packet server: radio session, client connection and pipeline
pub struct Server {
    session: RadioSession,
    connections: ConnectionManager,
    pipeline: Pipeline,
    lifecycle: Lifecycle,
    options: ServerOptions,
    last_stats: Instant,
}

impl Server {
    /// `session` must already be configured and started
    pub fn new(
        session: RadioSession,
        connections: ConnectionManager,
        pipeline: Pipeline,
        lifecycle: Lifecycle,
        options: ServerOptions,
    ) -> Self {
        Self {
            session,
            connections,
            pipeline,
            lifecycle,
            options,
            last_stats: Instant::now(),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.connections.local_addr()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn is_connected(&self) -> bool {
        self.connections.is_connected()
    }

    /// Iterate until a shutdown is requested or a fatal error occurs
    pub fn run(&mut self) -> Result<ShutdownMode> {
        info!("Packet server running. Press Ctrl-C to stop.");
        loop {
            if let Some(mode) = self.lifecycle.check() {
                info!("Leaving main loop ({:?})", mode);
                return Ok(mode);
            }
            self.run_once()?;
        }
    }

    /// One loop iteration
    pub fn run_once(&mut self) -> Result<()> {
        if self.connections.is_connected() {
            self.connections.reject_pending();
        } else if self.connections.try_accept()? {
            self.session.flush()?;
            self.connections.greet();
        }

        let packets = self.session.poll()?;

        let liveness = self.connections.check_liveness()?;
        forward_polled(&mut self.pipeline, liveness, &packets, &mut self.connections);

        if packets.is_empty() {
            thread::sleep(self.options.idle_sleep);
        }

        if let Some(interval) = self.options.stats_interval
            && self.last_stats.elapsed() >= interval
        {
            self.pipeline.log_statistics();
            self.last_stats = Instant::now();
        }

        Ok(())
    }

    /// Release resources according to `mode`
    ///
    /// Graceful: stop the concentrator (a failure only warns) and close the
    /// client. Immediate: leave everything as is.
    pub fn shutdown(&mut self, mode: ShutdownMode) {
        match mode {
            ShutdownMode::Graceful => {
                info!("Shutting down...");
                let _ = self.session.stop();
                self.connections.close();
                self.pipeline.log_statistics();
                info!("Shutdown complete");
            }
            ShutdownMode::Immediate => {
                info!("Quitting without stopping the concentrator");
            }
        }
    }
}

/// Forward one poll's packets, or skip them when the client just vanished
///
/// Returns the number of records delivered.
fn forward_polled<S: LineSink + ?Sized>(
    pipeline: &mut Pipeline,
    liveness: Liveness,
    packets: &[RxPacket],
    sink: &mut S,
) -> usize {
    if liveness == Liveness::Gone {
        debug!("Client gone, skipping {} packets", packets.len());
        return 0;
    }
    pipeline.forward(packets, sink)
}

//! Hardware-free concentrator
//!
//! [`MockConcentrator`] validates configuration the way the radio HAL does and
//! serves packets from an in-memory queue. Tests push packets and flip failure
//! switches through the paired [`MockHandle`]. With a non-zero spotter
//! interval it also produces one synthetic spotter packet per enabled
//! multi-SF channel on every interval, which is enough to watch the daemon
//! stream telemetry without a gateway attached.

use crate::core::driver::Concentrator;
use crate::core::types::{
    Bandwidth, BoardConfig, CodeRate, IF_CHAIN_COUNT, IfChannelConfig, MULTI_SF_COUNT,
    RF_CHAIN_COUNT, RfChainConfig, RxPacket,
};
use crate::error::{Error, Result};
use crate::spotter::{PayloadLayout, SpotterReading};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Configuration accepted by the mock so far
#[derive(Debug, Clone, Default)]
pub struct AppliedConfig {
    pub board: Option<BoardConfig>,
    pub rf_chains: [Option<RfChainConfig>; RF_CHAIN_COUNT],
    pub if_channels: [Option<IfChannelConfig>; IF_CHAIN_COUNT],
}

#[derive(Default)]
struct MockState {
    applied: AppliedConfig,
    started: bool,
    queue: VecDeque<RxPacket>,
    fail_start: bool,
    fail_receive: bool,
    fail_stop: bool,
    paused: bool,
    stop_calls: usize,
}

/// Test-side access to a [`MockConcentrator`]
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Queue a packet for the next `receive`
    pub fn inject(&self, packet: RxPacket) {
        self.state.lock().queue.push_back(packet);
    }

    /// Packets still queued
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn applied(&self) -> AppliedConfig {
        self.state.lock().applied.clone()
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    /// Number of `stop` calls, successful or not
    pub fn stop_calls(&self) -> usize {
        self.state.lock().stop_calls
    }

    pub fn fail_start(&self, fail: bool) {
        self.state.lock().fail_start = fail;
    }

    pub fn fail_receive(&self, fail: bool) {
        self.state.lock().fail_receive = fail;
    }

    pub fn fail_stop(&self, fail: bool) {
        self.state.lock().fail_stop = fail;
    }

    /// Hold queued packets back: `receive` returns nothing until resumed
    pub fn pause_receive(&self, paused: bool) {
        self.state.lock().paused = paused;
    }
}

/// In-memory concentrator
pub struct MockConcentrator {
    state: Arc<Mutex<MockState>>,
    layout: PayloadLayout,
    spotter_interval: Option<Duration>,
    last_spotter: Option<Instant>,
    sequence: u32,
}

impl MockConcentrator {
    /// Create the device and its handle
    ///
    /// `spotter_interval_ms` of 0 disables synthetic traffic.
    pub fn new(layout: PayloadLayout, spotter_interval_ms: u64) -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let device = Self {
            state: Arc::clone(&state),
            layout,
            spotter_interval: (spotter_interval_ms > 0)
                .then(|| Duration::from_millis(spotter_interval_ms)),
            last_spotter: None,
            sequence: 0,
        };
        (device, MockHandle { state })
    }

    fn ensure_stopped(state: &MockState) -> Result<()> {
        if state.started {
            return Err(Error::Concentrator(
                "configuration is locked while the concentrator is running".into(),
            ));
        }
        Ok(())
    }

    /// Absolute frequencies of enabled multi-SF channels on enabled chains
    fn spotter_frequencies(applied: &AppliedConfig) -> Vec<u32> {
        applied.if_channels[..MULTI_SF_COUNT]
            .iter()
            .flatten()
            .filter(|chan| chan.enabled)
            .filter_map(|chan| {
                let rf = applied.rf_chains.get(usize::from(chan.rf_chain))?.as_ref()?;
                if !rf.enabled {
                    return None;
                }
                u32::try_from(i64::from(rf.freq_hz) + i64::from(chan.freq_hz)).ok()
            })
            .collect()
    }

    fn synthesize(&mut self, state: &mut MockState) {
        let Some(interval) = self.spotter_interval else {
            return;
        };
        let now = Instant::now();
        if self
            .last_spotter
            .is_some_and(|last| now.duration_since(last) < interval)
        {
            return;
        }
        self.last_spotter = Some(now);

        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        for freq in Self::spotter_frequencies(&state.applied) {
            self.sequence = self.sequence.wrapping_add(1);
            let phase = i64::from(self.sequence % 200) - 100;
            let reading = SpotterReading {
                seconds: since_epoch.as_secs(),
                fraction: (since_epoch.subsec_millis() / 100) as u8,
                x: phase,
                y: -phase,
                z: 1000 + phase / 4,
            };
            let mut packet = RxPacket::lora(
                freq,
                Bandwidth::Khz125,
                7,
                CodeRate::Cr4_5,
                &reading.encode(self.layout),
            );
            packet.rssi = -60.0;
            packet.snr = 9.5;
            state.queue.push_back(packet);
        }
    }
}

impl Concentrator for MockConcentrator {
    fn configure_board(&mut self, conf: &BoardConfig) -> Result<()> {
        let mut state = self.state.lock();
        Self::ensure_stopped(&state)?;
        state.applied.board = Some(*conf);
        Ok(())
    }

    fn configure_rf_chain(&mut self, index: usize, conf: &RfChainConfig) -> Result<()> {
        let mut state = self.state.lock();
        Self::ensure_stopped(&state)?;
        if index >= RF_CHAIN_COUNT {
            return Err(Error::Concentrator(format!(
                "RF chain {index} does not exist"
            )));
        }
        if conf.enabled && conf.freq_hz == 0 {
            return Err(Error::Concentrator(format!(
                "RF chain {index} is enabled without a frequency"
            )));
        }
        state.applied.rf_chains[index] = Some(*conf);
        Ok(())
    }

    fn configure_channel(&mut self, index: usize, conf: &IfChannelConfig) -> Result<()> {
        let mut state = self.state.lock();
        Self::ensure_stopped(&state)?;
        if index >= IF_CHAIN_COUNT {
            return Err(Error::Concentrator(format!(
                "IF chain {index} does not exist"
            )));
        }
        if conf.enabled && usize::from(conf.rf_chain) >= RF_CHAIN_COUNT {
            return Err(Error::Concentrator(format!(
                "IF chain {index} references RF chain {}",
                conf.rf_chain
            )));
        }
        state.applied.if_channels[index] = Some(*conf);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.started {
            return Err(Error::Concentrator("concentrator already started".into()));
        }
        if state.fail_start {
            return Err(Error::Concentrator("mock start failure".into()));
        }
        state.started = true;
        info!("Mock concentrator started");
        Ok(())
    }

    fn receive(&mut self, max: usize) -> Result<Vec<RxPacket>> {
        let state_arc = Arc::clone(&self.state);
        let mut state = state_arc.lock();
        if !state.started {
            return Err(Error::Concentrator("concentrator is not started".into()));
        }
        if state.fail_receive {
            return Err(Error::Concentrator("mock receive failure".into()));
        }
        if state.paused {
            return Ok(Vec::new());
        }

        self.synthesize(&mut state);

        let count = state.queue.len().min(max);
        let packets: Vec<RxPacket> = state.queue.drain(..count).collect();
        if !packets.is_empty() {
            debug!("Mock concentrator returned {} packets", packets.len());
        }
        Ok(packets)
    }

    fn stop(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.stop_calls += 1;
        if state.fail_stop {
            return Err(Error::Concentrator("mock stop failure".into()));
        }
        if !state.started {
            return Err(Error::Concentrator("concentrator is not started".into()));
        }
        state.started = false;
        info!("Mock concentrator stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spotter::SpotterRecord;

    fn started(interval_ms: u64) -> (MockConcentrator, MockHandle) {
        let (mut mock, handle) = MockConcentrator::new(PayloadLayout::Compact, interval_ms);
        mock.configure_rf_chain(
            0,
            &RfChainConfig {
                enabled: true,
                freq_hz: 915_000_000,
                ..Default::default()
            },
        )
        .unwrap();
        mock.configure_channel(
            0,
            &IfChannelConfig {
                enabled: true,
                rf_chain: 0,
                freq_hz: -200_000,
                ..Default::default()
            },
        )
        .unwrap();
        mock.start().unwrap();
        (mock, handle)
    }

    #[test]
    fn test_receive_requires_start() {
        let (mut mock, _handle) = MockConcentrator::new(PayloadLayout::Compact, 0);
        assert!(mock.receive(16).is_err());
        mock.start().unwrap();
        assert!(mock.receive(16).unwrap().is_empty());
    }

    #[test]
    fn test_validation() {
        let (mut mock, _handle) = MockConcentrator::new(PayloadLayout::Compact, 0);
        assert!(mock.configure_rf_chain(2, &RfChainConfig::default()).is_err());
        assert!(
            mock.configure_rf_chain(
                0,
                &RfChainConfig {
                    enabled: true,
                    ..Default::default()
                }
            )
            .is_err()
        );
        assert!(
            mock.configure_channel(IF_CHAIN_COUNT, &IfChannelConfig::default())
                .is_err()
        );
        assert!(
            mock.configure_channel(
                0,
                &IfChannelConfig {
                    enabled: true,
                    rf_chain: 2,
                    ..Default::default()
                }
            )
            .is_err()
        );
    }

    #[test]
    fn test_configuration_locked_while_running() {
        let (mut mock, _handle) = started(0);
        assert!(mock.configure_board(&BoardConfig::default()).is_err());
        mock.stop().unwrap();
        assert!(mock.configure_board(&BoardConfig::default()).is_ok());
    }

    #[test]
    fn test_injected_packets_in_order() {
        let (mut mock, handle) = started(0);
        for freq in [1, 2, 3] {
            handle.inject(RxPacket::new(freq));
        }
        let freqs: Vec<u32> = mock.receive(2).unwrap().iter().map(|p| p.freq_hz).collect();
        assert_eq!(freqs, vec![1, 2]);
        assert_eq!(handle.pending(), 1);
    }

    #[test]
    fn test_paused_receive_keeps_queue() {
        let (mut mock, handle) = started(0);
        handle.pause_receive(true);
        handle.inject(RxPacket::new(7));
        assert!(mock.receive(16).unwrap().is_empty());
        assert_eq!(handle.pending(), 1);

        handle.pause_receive(false);
        assert_eq!(mock.receive(16).unwrap().len(), 1);
        assert_eq!(handle.pending(), 0);
    }

    #[test]
    fn test_synthetic_spotter_packets() {
        let (mut mock, _handle) = started(60_000);
        let packets = mock.receive(16).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].freq_hz, 914_800_000);
        let record =
            SpotterRecord::from_payload(0, packets[0].payload(), PayloadLayout::Compact).unwrap();
        assert!(record.timestamp_ds > 0);

        // next packet not due yet
        assert!(mock.receive(16).unwrap().is_empty());
    }

    #[test]
    fn test_failure_switches() {
        let (mut mock, handle) = started(0);
        handle.fail_receive(true);
        assert!(mock.receive(16).is_err());
        handle.fail_stop(true);
        assert!(mock.stop().is_err());
        assert_eq!(handle.stop_calls(), 1);
        assert!(handle.is_started());
    }
}

//! Decode, filter and forward received packets
//!
//! Every packet from one poll goes through, in driver order:
//!
//! 1. acceptance filter ([`AcceptancePolicy`]), silent drop on mismatch
//! 2. channel resolution against the [`ChannelPlan`]
//! 3. payload decode and timestamp extension ([`SpotterRecord`])
//! 4. delivery of the text line to the [`LineSink`], if a client is there

use crate::channel_plan::ChannelPlan;
use crate::core::types::{Bandwidth, CodeRate, CrcStatus, DataRate, Modulation, RxPacket};
use crate::error::Error;
use crate::spotter::{PayloadLayout, SpotterRecord};
use crate::streaming::ConnectionManager;
use log::{info, trace, warn};

/// Destination for formatted records
pub trait LineSink {
    /// Deliver one line; `false` when nobody received it
    fn send_line(&mut self, line: &str) -> bool;
}

impl LineSink for ConnectionManager {
    fn send_line(&mut self, line: &str) -> bool {
        self.send(line)
    }
}

/// Radio parameters a packet must match to be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptancePolicy {
    pub require_crc: bool,
    pub bandwidth: Bandwidth,
    pub datarate: DataRate,
    pub coderate: CodeRate,
}

impl Default for AcceptancePolicy {
    /// CRC OK, LoRa, 125 kHz, SF7, 4/5
    fn default() -> Self {
        Self {
            require_crc: true,
            bandwidth: Bandwidth::Khz125,
            datarate: DataRate::LoraSf(7),
            coderate: CodeRate::Cr4_5,
        }
    }
}

/// Why a packet was filtered out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Crc,
    Modulation,
    Bandwidth,
    DataRate,
    CodeRate,
}

impl AcceptancePolicy {
    /// First criterion `pkt` fails, if any
    pub fn check(&self, pkt: &RxPacket) -> Option<Rejection> {
        if self.require_crc && pkt.status != CrcStatus::Ok {
            Some(Rejection::Crc)
        } else if pkt.modulation != Modulation::Lora {
            Some(Rejection::Modulation)
        } else if pkt.bandwidth != self.bandwidth {
            Some(Rejection::Bandwidth)
        } else if pkt.datarate != self.datarate {
            Some(Rejection::DataRate)
        } else if pkt.coderate != self.coderate {
            Some(Rejection::CodeRate)
        } else {
            None
        }
    }

    pub fn accepts(&self, pkt: &RxPacket) -> bool {
        self.check(pkt).is_none()
    }
}

/// What happened to one packet
#[derive(Debug)]
pub enum Outcome {
    /// Decoded into a record
    Decoded(SpotterRecord),
    /// Did not match the acceptance policy
    Filtered(Rejection),
    /// Received on a frequency outside the channel plan
    UnknownFrequency(u32),
    /// Payload could not be decoded
    Malformed(Error),
}

/// Pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub received: u64,
    pub filtered: u64,
    pub unknown_frequency: u64,
    pub malformed: u64,
    pub forwarded: u64,
    /// Decoded but not delivered (no client, or the write failed)
    pub undelivered: u64,
}

/// Packet processing state, built once at startup
pub struct Pipeline {
    plan: ChannelPlan,
    policy: AcceptancePolicy,
    layout: PayloadLayout,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(plan: ChannelPlan, policy: AcceptancePolicy, layout: PayloadLayout) -> Self {
        Self {
            plan,
            policy,
            layout,
            stats: PipelineStats::default(),
        }
    }

    pub fn plan(&self) -> &ChannelPlan {
        &self.plan
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Filter, resolve and decode one packet
    pub fn process(&mut self, pkt: &RxPacket) -> Outcome {
        self.stats.received += 1;

        if let Some(reason) = self.policy.check(pkt) {
            self.stats.filtered += 1;
            trace!(
                "Filtered packet at {} Hz ({:?} mismatch)",
                pkt.freq_hz, reason
            );
            return Outcome::Filtered(reason);
        }

        let Some(channel) = self.plan.channel_for(pkt.freq_hz) else {
            self.stats.unknown_frequency += 1;
            warn!("Received packet on unknown frequency {} Hz", pkt.freq_hz);
            return Outcome::UnknownFrequency(pkt.freq_hz);
        };

        match SpotterRecord::from_payload(channel, pkt.payload(), self.layout) {
            Ok(record) => Outcome::Decoded(record),
            Err(e) => {
                self.stats.malformed += 1;
                warn!("Dropping packet on channel {}: {}", channel, e);
                Outcome::Malformed(e)
            }
        }
    }

    /// Process `packets` in order and deliver decoded records to `sink`
    ///
    /// Returns the number of records delivered.
    pub fn forward<S: LineSink + ?Sized>(&mut self, packets: &[RxPacket], sink: &mut S) -> usize {
        let mut delivered = 0;
        for pkt in packets {
            let Outcome::Decoded(record) = self.process(pkt) else {
                continue;
            };
            if sink.send_line(&record.to_line()) {
                trace!("Forwarded {}", record);
                self.stats.forwarded += 1;
                delivered += 1;
            } else {
                self.stats.undelivered += 1;
            }
        }
        delivered
    }

    /// Log counters
    pub fn log_statistics(&self) {
        let s = &self.stats;
        info!(
            "Packets: received={} filtered={} unknown_freq={} malformed={} forwarded={} undelivered={}",
            s.received, s.filtered, s.unknown_frequency, s.malformed, s.forwarded, s.undelivered
        );
    }
}

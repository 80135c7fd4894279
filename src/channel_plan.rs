//! Channel plan: absolute receive frequency to logical channel index
//!
//! Every radio owns [`CHANNELS_PER_RADIO`] slots. Enabled multi-SF channels
//! fill their radio's slots in configuration order with
//! `center + IF`; unused slots stay unset. The whole table is then sorted
//! ascending with unset slots last, so a channel's index reflects its
//! position in frequency order across both radios.

use crate::config::concentrator::{MultiSfChannelConfig, RadioConfig};
use crate::core::types::RF_CHAIN_COUNT;
use crate::error::{Error, Result};
use log::{info, warn};

/// Multi-SF slots per radio
pub const CHANNELS_PER_RADIO: usize = 4;

/// Total slots in the plan
pub const PLAN_SLOTS: usize = RF_CHAIN_COUNT * CHANNELS_PER_RADIO;

/// Sorted frequency table, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPlan {
    slots: [Option<u32>; PLAN_SLOTS],
}

impl ChannelPlan {
    /// Build the plan from radio and multi-SF channel configuration
    ///
    /// Fails if an enabled radio has no center frequency, a channel names a
    /// radio that does not exist, a radio has more enabled channels than
    /// slots, or a channel lands outside the representable frequency range.
    /// Channels on a disabled or absent radio are left unset.
    pub fn build(
        radios: &[Option<RadioConfig>],
        channels: &[Option<MultiSfChannelConfig>],
    ) -> Result<Self> {
        for (i, radio) in radios.iter().enumerate() {
            if let Some(radio) = radio
                && radio.enabled
                && radio.center_frequency().is_none()
            {
                return Err(Error::MissingCenterFrequency { radio: i });
            }
        }

        let mut slots = [None; PLAN_SLOTS];
        let mut used = [0usize; RF_CHAIN_COUNT];

        for (i, chan) in channels.iter().enumerate() {
            let Some(chan) = chan.filter(|c| c.enabled) else {
                continue;
            };
            if chan.radio >= RF_CHAIN_COUNT {
                return Err(Error::InvalidRadioIndex {
                    channel: i,
                    radio: chan.radio,
                });
            }

            let center = radios
                .get(chan.radio)
                .and_then(|r| r.as_ref())
                .and_then(RadioConfig::center_frequency);
            let Some(center) = center else {
                warn!(
                    "Multi-SF channel {} is on radio {}, which is not enabled; channel ignored",
                    i, chan.radio
                );
                continue;
            };

            if used[chan.radio] >= CHANNELS_PER_RADIO {
                return Err(Error::TooManyChannels {
                    radio: chan.radio,
                    capacity: CHANNELS_PER_RADIO,
                });
            }

            let absolute = i64::from(center) + i64::from(chan.if_hz);
            let freq = u32::try_from(absolute).map_err(|_| Error::FrequencyOutOfRange {
                channel: i,
                freq_hz: absolute,
            })?;

            slots[chan.radio * CHANNELS_PER_RADIO + used[chan.radio]] = Some(freq);
            used[chan.radio] += 1;
        }

        Ok(Self::from_slots(slots))
    }

    /// Sort raw slots into a plan
    fn from_slots(mut slots: [Option<u32>; PLAN_SLOTS]) -> Self {
        slots.sort_unstable_by_key(|slot| slot.map_or(u64::MAX, u64::from));

        let plan = Self { slots };
        for pair in plan.slots.windows(2) {
            if let [Some(a), Some(b)] = pair
                && a == b
            {
                warn!(
                    "Two channels share {} Hz; packets resolve to the higher index",
                    a
                );
            }
        }
        plan
    }

    /// Logical channel for a packet received at `freq_hz`
    ///
    /// When two slots share the frequency the last one wins.
    pub fn channel_for(&self, freq_hz: u32) -> Option<usize> {
        self.slots.iter().rposition(|slot| *slot == Some(freq_hz))
    }

    /// Frequency at slot `index`, `None` when unset or out of range
    pub fn frequency(&self, index: usize) -> Option<u32> {
        self.slots.get(index).copied().flatten()
    }

    /// All slots in index order
    pub fn slots(&self) -> &[Option<u32>] {
        &self.slots
    }

    /// `(index, frequency)` for every set slot
    pub fn channels(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|f| (i, f)))
    }

    /// Number of set slots
    pub fn len(&self) -> usize {
        self.channels().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Log every resolved channel
    pub fn log_summary(&self) {
        if self.is_empty() {
            warn!("Channel plan is empty; no packet will be forwarded");
        }
        for (index, freq) in self.channels() {
            info!("Spotter channel {}: LoRa receiver set to {} Hz", index, freq);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn radio(freq: u32) -> Option<RadioConfig> {
        Some(RadioConfig {
            enabled: true,
            freq_hz: Some(freq),
            ..Default::default()
        })
    }

    fn disabled_radio() -> Option<RadioConfig> {
        Some(RadioConfig::default())
    }

    fn chan(radio: usize, if_hz: i32) -> Option<MultiSfChannelConfig> {
        Some(MultiSfChannelConfig {
            enabled: true,
            radio,
            if_hz,
        })
    }

    fn off() -> Option<MultiSfChannelConfig> {
        Some(MultiSfChannelConfig::default())
    }

    #[test]
    fn test_single_channel_scenario() {
        let radios = [radio(915_000_000), disabled_radio()];
        let channels = [chan(0, -200_000), None, None, None, None, None, None, None];
        let plan = ChannelPlan::build(&radios, &channels).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.frequency(0), Some(914_800_000));
        assert_eq!(plan.channel_for(914_800_000), Some(0));
        assert_eq!(plan.channel_for(915_000_000), None);
        assert!(plan.slots()[1..].iter().all(Option::is_none));
    }

    #[test]
    fn test_plan_sorted_across_radios() {
        let radios = [radio(904_300_000), radio(905_000_000)];
        let channels = [
            chan(0, -400_000),
            chan(0, -200_000),
            chan(1, -300_000),
            chan(0, 0),
            chan(1, 200_000),
            chan(1, -500_000),
            off(),
            chan(0, 200_000),
        ];
        let plan = ChannelPlan::build(&radios, &channels).unwrap();

        let freqs: Vec<u32> = plan.channels().map(|(_, f)| f).collect();
        assert_eq!(
            freqs,
            vec![
                903_900_000,
                904_100_000,
                904_300_000,
                904_500_000,
                904_500_000,
                904_700_000,
                905_200_000
            ]
        );
        assert!(freqs.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(plan.frequency(7), None);
        // duplicate frequency resolves to the last index
        assert_eq!(plan.channel_for(904_500_000), Some(4));
    }

    #[test]
    fn test_shared_frequency_on_one_radio() {
        let radios = [radio(915_000_000), disabled_radio()];
        let channels = [chan(0, 0), chan(0, 0), None, None, None, None, None, None];
        let plan = ChannelPlan::build(&radios, &channels).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.channel_for(915_000_000), Some(1));
    }

    #[test]
    fn test_unset_slots_sort_last() {
        let radios = [radio(868_500_000), radio(869_500_000)];
        let channels = [chan(1, 100_000), off(), chan(0, -100_000), None, None, None, None, None];
        let plan = ChannelPlan::build(&radios, &channels).unwrap();

        let first_unset = plan.slots().iter().position(Option::is_none).unwrap();
        assert_eq!(first_unset, 2);
        assert!(plan.slots()[first_unset..].iter().all(Option::is_none));
        assert_eq!(plan.channel_for(868_400_000), Some(0));
        assert_eq!(plan.channel_for(869_600_000), Some(1));
    }

    #[test]
    fn test_disabled_channel_never_in_plan() {
        let radios = [radio(915_000_000), None];
        let mut channels = [None; 8];
        channels[0] = Some(MultiSfChannelConfig {
            enabled: false,
            radio: 0,
            if_hz: -200_000,
        });
        let plan = ChannelPlan::build(&radios, &channels).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.channel_for(914_800_000), None);
    }

    #[test]
    fn test_channel_on_disabled_radio_is_unset() {
        let radios = [radio(915_000_000), disabled_radio()];
        let channels = [chan(1, 100_000), chan(0, 100_000), None, None, None, None, None, None];
        let plan = ChannelPlan::build(&radios, &channels).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.frequency(0), Some(915_100_000));
    }

    #[test]
    fn test_enabled_radio_without_frequency_is_fatal() {
        let radios = [
            radio(915_000_000),
            Some(RadioConfig {
                enabled: true,
                freq_hz: None,
                ..Default::default()
            }),
        ];
        let result = ChannelPlan::build(&radios, &[chan(0, 0)]);
        assert!(matches!(result, Err(Error::MissingCenterFrequency { radio: 1 })));

        let radios = [radio(0), None];
        let result = ChannelPlan::build(&radios, &[]);
        assert!(matches!(result, Err(Error::MissingCenterFrequency { radio: 0 })));
    }

    #[test]
    fn test_too_many_channels_on_one_radio() {
        let radios = [radio(915_000_000), None];
        let channels = [
            chan(0, -300_000),
            chan(0, -100_000),
            chan(0, 100_000),
            chan(0, 300_000),
            chan(0, 500_000),
        ];
        let result = ChannelPlan::build(&radios, &channels);
        assert!(matches!(
            result,
            Err(Error::TooManyChannels {
                radio: 0,
                capacity: 4
            })
        ));
    }

    #[test]
    fn test_invalid_radio_index() {
        let radios = [radio(915_000_000), None];
        let result = ChannelPlan::build(&radios, &[chan(2, 0)]);
        assert!(matches!(
            result,
            Err(Error::InvalidRadioIndex {
                channel: 0,
                radio: 2
            })
        ));
    }

    #[test]
    fn test_out_of_range_frequency() {
        let radios = [radio(100_000), None];
        let result = ChannelPlan::build(&radios, &[chan(0, -200_000)]);
        assert!(matches!(
            result,
            Err(Error::FrequencyOutOfRange { channel: 0, .. })
        ));
    }
}

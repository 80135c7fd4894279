//! Concentrator radio configuration (`SX1301_conf`)
//!
//! Parsed from the JSON configuration documents shipped with LoRa gateways.
//! Sections that are absent stay `None` and are never submitted to the driver.
//! Values with the wrong type fall back to their defaults with a warning,
//! so a slightly malformed file still starts the concentrator.
//!
//! The `to_*` methods adapt the parsed values to the driver's
//! configuration types in [`crate::core::types`].

use super::document::ConfigDocument;
use crate::core::types::{
    Bandwidth, BoardConfig, DataRate, IfChannelConfig, MULTI_SF_COUNT, RF_CHAIN_COUNT, RadioType,
    RfChainConfig,
};
use crate::error::{Error, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Name of the JSON object holding the radio configuration
pub const CONF_SECTION: &str = "SX1301_conf";

/// One RF chain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadioConfig {
    pub enabled: bool,
    /// Center frequency in Hz, `None` when not set
    pub freq_hz: Option<u32>,
    /// RSSI calibration offset in dB
    pub rssi_offset: f32,
    pub radio_type: RadioType,
    pub tx_enabled: bool,
    /// Only read when TX is enabled
    pub tx_notch_freq: Option<u32>,
}

impl RadioConfig {
    /// Center frequency if the radio can anchor channels
    pub fn center_frequency(&self) -> Option<u32> {
        if self.enabled {
            self.freq_hz.filter(|&f| f != 0)
        } else {
            None
        }
    }

    pub fn to_rf_chain(&self) -> RfChainConfig {
        RfChainConfig {
            enabled: self.enabled,
            freq_hz: self.freq_hz.unwrap_or(0),
            rssi_offset: self.rssi_offset,
            radio_type: self.radio_type,
            tx_enabled: self.tx_enabled,
            tx_notch_freq: self.tx_notch_freq.unwrap_or(0),
        }
    }
}

/// LoRa multi-SF channel (125 kHz, SF7..SF12)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MultiSfChannelConfig {
    pub enabled: bool,
    /// Owning RF chain
    pub radio: usize,
    /// Intermediate frequency offset in Hz
    pub if_hz: i32,
}

/// RF chain field for the HAL; an index past `u8` stays invalid instead of wrapping
fn rf_chain(radio: usize) -> u8 {
    u8::try_from(radio).unwrap_or(u8::MAX)
}

impl MultiSfChannelConfig {
    pub fn to_if_channel(&self) -> IfChannelConfig {
        IfChannelConfig {
            enabled: self.enabled,
            rf_chain: rf_chain(self.radio),
            freq_hz: self.if_hz,
            ..Default::default()
        }
    }
}

/// LoRa standard channel (single bandwidth and spreading factor)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoraStdChannelConfig {
    pub enabled: bool,
    pub radio: usize,
    pub if_hz: i32,
    pub bandwidth_hz: u32,
    pub spread_factor: u8,
}

impl LoraStdChannelConfig {
    pub fn to_if_channel(&self) -> IfChannelConfig {
        IfChannelConfig {
            enabled: self.enabled,
            rf_chain: rf_chain(self.radio),
            freq_hz: self.if_hz,
            bandwidth: Bandwidth::from_lora_hz(self.bandwidth_hz),
            datarate: DataRate::lora(self.spread_factor),
        }
    }
}

/// FSK channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FskChannelConfig {
    pub enabled: bool,
    pub radio: usize,
    pub if_hz: i32,
    pub bandwidth_hz: u32,
    /// Bit rate in bit/s
    pub datarate: u32,
}

impl FskChannelConfig {
    pub fn to_if_channel(&self) -> IfChannelConfig {
        IfChannelConfig {
            enabled: self.enabled,
            rf_chain: rf_chain(self.radio),
            freq_hz: self.if_hz,
            bandwidth: Bandwidth::from_fsk_hz(self.bandwidth_hz),
            datarate: DataRate::FskBps(self.datarate),
        }
    }
}

/// Complete concentrator configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConcentratorConfig {
    pub board: BoardConfig,
    pub radios: [Option<RadioConfig>; RF_CHAIN_COUNT],
    pub multi_sf: [Option<MultiSfChannelConfig>; MULTI_SF_COUNT],
    pub lora_std: Option<LoraStdChannelConfig>,
    pub fsk: Option<FskChannelConfig>,
}

impl ConcentratorConfig {
    /// Load the first candidate file that exists
    ///
    /// Candidates are not merged: once a file is found the others are ignored.
    pub fn locate_and_load(candidates: &[PathBuf]) -> Result<(PathBuf, Self)> {
        let path = locate(candidates)?;
        info!("Found configuration file {}, parsing it", path.display());
        let config = Self::load(&path)?;
        Ok((path, config))
    }

    /// Load from a specific file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let doc = ConfigDocument::load_section(path, CONF_SECTION)?.ok_or_else(|| {
            Error::Config(format!(
                "{} does not contain a JSON object named {}",
                path.display(),
                CONF_SECTION
            ))
        })?;
        Ok(Self::from_document(&doc))
    }

    /// Build from an `SX1301_conf` document
    pub fn from_document(doc: &ConfigDocument) -> Self {
        let board = parse_board(doc);

        let mut radios: [Option<RadioConfig>; RF_CHAIN_COUNT] = Default::default();
        for (i, slot) in radios.iter_mut().enumerate() {
            *slot = parse_radio(doc, i);
        }

        let mut multi_sf = [None; MULTI_SF_COUNT];
        for (i, slot) in multi_sf.iter_mut().enumerate() {
            *slot = parse_multi_sf(doc, i);
        }

        Self {
            board,
            radios,
            multi_sf,
            lora_std: parse_lora_std(doc),
            fsk: parse_fsk(doc),
        }
    }
}

/// First existing path among `candidates`
pub fn locate(candidates: &[PathBuf]) -> Result<PathBuf> {
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| Error::ConfigNotFound(candidates.to_vec()))
}

/// Integer at `path` in the range of `T`; an out-of-range value warns
fn get_int<T: TryFrom<i64>>(doc: &ConfigDocument, path: &str) -> Option<T> {
    let value = doc.get_i64(path)?;
    match T::try_from(value) {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Value {} for {} is out of range, please check", value, path);
            None
        }
    }
}

fn parse_board(doc: &ConfigDocument) -> BoardConfig {
    let lorawan_public = doc.get_bool("lorawan_public").unwrap_or_else(|| {
        warn!("Data type for lorawan_public seems wrong, please check");
        false
    });
    let clock_source = match doc.get_i64("clksrc") {
        Some(_) => get_int(doc, "clksrc").unwrap_or(0),
        None => {
            warn!("Data type for clksrc seems wrong, please check");
            0
        }
    };
    info!(
        "lorawan_public {}, clksrc {}",
        lorawan_public, clock_source
    );
    BoardConfig {
        lorawan_public,
        clock_source,
    }
}

fn parse_radio(doc: &ConfigDocument, i: usize) -> Option<RadioConfig> {
    let name = format!("radio_{i}");
    if !doc.has_object(&name) {
        info!("No configuration for radio {}", i);
        return None;
    }

    let enabled = doc.get_bool(&format!("{name}.enable")).unwrap_or(false);
    if !enabled {
        info!("Radio {} disabled", i);
        return Some(RadioConfig::default());
    }

    let freq_hz = get_int(doc, &format!("{name}.freq"));
    let rssi_offset = doc.get_f64(&format!("{name}.rssi_offset")).unwrap_or(0.0) as f32;

    let type_name = doc.get_str(&format!("{name}.type")).unwrap_or("");
    let radio_type = RadioType::from_name(type_name).unwrap_or_else(|| {
        warn!(
            "Invalid radio type: {} (should be SX1255 or SX1257)",
            type_name
        );
        RadioType::Undefined
    });

    let tx_enabled = doc.get_bool(&format!("{name}.tx_enable")).unwrap_or(false);
    let tx_notch_freq = if tx_enabled {
        get_int(doc, &format!("{name}.tx_notch_freq"))
    } else {
        None
    };

    info!(
        "Radio {} enabled (type {}), center frequency {:?}, RSSI offset {}, tx enabled {}, tx_notch_freq {:?}",
        i, type_name, freq_hz, rssi_offset, tx_enabled, tx_notch_freq
    );

    Some(RadioConfig {
        enabled,
        freq_hz,
        rssi_offset,
        radio_type,
        tx_enabled,
        tx_notch_freq,
    })
}

fn parse_multi_sf(doc: &ConfigDocument, i: usize) -> Option<MultiSfChannelConfig> {
    let name = format!("chan_multiSF_{i}");
    if !doc.has_object(&name) {
        info!("No configuration for LoRa multi-SF channel {}", i);
        return None;
    }

    let enabled = doc.get_bool(&format!("{name}.enable")).unwrap_or(false);
    if !enabled {
        info!("LoRa multi-SF channel {} disabled", i);
        return Some(MultiSfChannelConfig::default());
    }

    let radio = get_int(doc, &format!("{name}.radio")).unwrap_or(0);
    let if_hz = get_int(doc, &format!("{name}.if")).unwrap_or(0);
    info!(
        "LoRa multi-SF channel {} enabled, radio {} selected, IF {} Hz, 125 kHz bandwidth, SF 7 to 12",
        i, radio, if_hz
    );

    Some(MultiSfChannelConfig {
        enabled,
        radio,
        if_hz,
    })
}

fn parse_lora_std(doc: &ConfigDocument) -> Option<LoraStdChannelConfig> {
    if !doc.has_object("chan_Lora_std") {
        info!("No configuration for LoRa standard channel");
        return None;
    }
    if !doc.get_bool("chan_Lora_std.enable").unwrap_or(false) {
        info!("LoRa standard channel disabled");
        return Some(LoraStdChannelConfig::default());
    }

    let conf = LoraStdChannelConfig {
        enabled: true,
        radio: get_int(doc, "chan_Lora_std.radio").unwrap_or(0),
        if_hz: get_int(doc, "chan_Lora_std.if").unwrap_or(0),
        bandwidth_hz: get_int(doc, "chan_Lora_std.bandwidth").unwrap_or(0),
        spread_factor: get_int(doc, "chan_Lora_std.spread_factor").unwrap_or(0),
    };
    info!(
        "LoRa standard channel enabled, radio {} selected, IF {} Hz, {} Hz bandwidth, SF {}",
        conf.radio, conf.if_hz, conf.bandwidth_hz, conf.spread_factor
    );
    Some(conf)
}

fn parse_fsk(doc: &ConfigDocument) -> Option<FskChannelConfig> {
    if !doc.has_object("chan_FSK") {
        info!("No configuration for FSK channel");
        return None;
    }
    if !doc.get_bool("chan_FSK.enable").unwrap_or(false) {
        info!("FSK channel disabled");
        return Some(FskChannelConfig::default());
    }

    let conf = FskChannelConfig {
        enabled: true,
        radio: get_int(doc, "chan_FSK.radio").unwrap_or(0),
        if_hz: get_int(doc, "chan_FSK.if").unwrap_or(0),
        bandwidth_hz: get_int(doc, "chan_FSK.bandwidth").unwrap_or(0),
        datarate: get_int(doc, "chan_FSK.datarate").unwrap_or(0),
    };
    info!(
        "FSK channel enabled, radio {} selected, IF {} Hz, {} Hz bandwidth, {} bps datarate",
        conf.radio, conf.if_hz, conf.bandwidth_hz, conf.datarate
    );
    Some(conf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const US915: &str = r#"{
        "SX1301_conf": {
            "lorawan_public": false,
            "clksrc": 1,
            "radio_0": {
                "enable": true,
                "type": "SX1257",
                "freq": 915000000,
                "rssi_offset": -166.0,
                "tx_enable": true,
                "tx_notch_freq": 129000
            },
            "radio_1": { "enable": false },
            "chan_multiSF_0": { "enable": true, "radio": 0, "if": -200000 },
            "chan_multiSF_1": { "enable": false },
            "chan_Lora_std": {
                "enable": true, "radio": 0, "if": 300000,
                "bandwidth": 500000, "spread_factor": 8
            },
            "chan_FSK": {
                "enable": true, "radio": 1, "if": 300000,
                "bandwidth": 100000, "datarate": 50000
            }
        }
    }"#;

    fn parse(text: &str) -> ConcentratorConfig {
        let doc = ConfigDocument::parse_section(text, CONF_SECTION)
            .unwrap()
            .unwrap();
        ConcentratorConfig::from_document(&doc)
    }

    #[test]
    fn test_parse_full_document() {
        let conf = parse(US915);
        assert!(!conf.board.lorawan_public);
        assert_eq!(conf.board.clock_source, 1);

        let radio0 = conf.radios[0].as_ref().unwrap();
        assert!(radio0.enabled);
        assert_eq!(radio0.freq_hz, Some(915_000_000));
        assert_eq!(radio0.radio_type, RadioType::Sx1257);
        assert_eq!(radio0.rssi_offset, -166.0);
        assert_eq!(radio0.tx_notch_freq, Some(129_000));

        assert!(!conf.radios[1].as_ref().unwrap().enabled);
        assert_eq!(
            conf.multi_sf[0],
            Some(MultiSfChannelConfig {
                enabled: true,
                radio: 0,
                if_hz: -200_000
            })
        );
        assert!(!conf.multi_sf[1].unwrap().enabled);
        assert!(conf.multi_sf[2].is_none());
    }

    #[test]
    fn test_lora_std_adaptation() {
        let conf = parse(US915);
        let chan = conf.lora_std.unwrap().to_if_channel();
        assert!(chan.enabled);
        assert_eq!(chan.freq_hz, 300_000);
        assert_eq!(chan.bandwidth, Bandwidth::Khz500);
        assert_eq!(chan.datarate, DataRate::LoraSf(8));
    }

    #[test]
    fn test_fsk_adaptation() {
        let conf = parse(US915);
        let chan = conf.fsk.unwrap().to_if_channel();
        assert_eq!(chan.rf_chain, 1);
        assert_eq!(chan.bandwidth, Bandwidth::Khz125);
        assert_eq!(chan.datarate, DataRate::FskBps(50_000));
    }

    #[test]
    fn test_mistyped_values_fall_back() {
        let conf = parse(
            r#"{"SX1301_conf": {
                "lorawan_public": "yes",
                "clksrc": "one",
                "radio_0": { "enable": true, "freq": 868500000, "type": "SX9999" }
            }}"#,
        );
        assert!(!conf.board.lorawan_public);
        assert_eq!(conf.board.clock_source, 0);
        let radio = conf.radios[0].as_ref().unwrap();
        assert_eq!(radio.radio_type, RadioType::Undefined);
        assert_eq!(radio.tx_notch_freq, None);
    }

    #[test]
    fn test_out_of_range_integers_fall_back() {
        let conf = parse(
            r#"{"SX1301_conf": {
                "clksrc": 300,
                "radio_0": { "enable": true, "freq": 5000000000 },
                "chan_multiSF_0": { "enable": true, "radio": -1, "if": 3000000000 },
                "chan_Lora_std": { "enable": true, "radio": 1, "if": -3000000000,
                                   "bandwidth": -250000, "spread_factor": 263 },
                "chan_FSK": { "enable": true, "radio": 1, "datarate": 5000000000 }
            }}"#,
        );
        assert_eq!(conf.board.clock_source, 0);
        assert_eq!(conf.radios[0].as_ref().unwrap().freq_hz, None);
        assert_eq!(
            conf.multi_sf[0],
            Some(MultiSfChannelConfig {
                enabled: true,
                radio: 0,
                if_hz: 0
            })
        );
        let lora = conf.lora_std.unwrap();
        assert_eq!((lora.if_hz, lora.bandwidth_hz, lora.spread_factor), (0, 0, 0));
        assert_eq!(conf.fsk.unwrap().datarate, 0);
    }

    #[test]
    fn test_radio_index_past_u8_stays_invalid() {
        let chan = MultiSfChannelConfig {
            enabled: true,
            radio: 256,
            if_hz: 0,
        };
        assert_eq!(chan.to_if_channel().rf_chain, u8::MAX);
    }

    #[test]
    fn test_tx_notch_ignored_without_tx() {
        let conf = parse(
            r#"{"SX1301_conf": {
                "radio_0": { "enable": true, "freq": 868500000, "tx_enable": false, "tx_notch_freq": 129000 }
            }}"#,
        );
        assert_eq!(conf.radios[0].as_ref().unwrap().tx_notch_freq, None);
    }

    #[test]
    fn test_center_frequency_requires_enabled() {
        let mut radio = RadioConfig {
            enabled: true,
            freq_hz: Some(915_000_000),
            ..Default::default()
        };
        assert_eq!(radio.center_frequency(), Some(915_000_000));
        radio.freq_hz = Some(0);
        assert_eq!(radio.center_frequency(), None);
        radio.freq_hz = Some(915_000_000);
        radio.enabled = false;
        assert_eq!(radio.center_frequency(), None);
    }

    #[test]
    fn test_shipped_gateway_config() {
        let conf = parse(include_str!("../../global_conf.json"));
        assert_eq!(conf.radios[0].as_ref().unwrap().center_frequency(), Some(915_000_000));
        assert_eq!(conf.radios[1].as_ref().unwrap().center_frequency(), None);
        assert!(conf.multi_sf[0].unwrap().enabled);
        assert!(!conf.lora_std.unwrap().enabled);
        assert!(!conf.fsk.unwrap().enabled);
    }

    #[test]
    fn test_first_candidate_wins() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global_conf.json");
        let local = dir.path().join("local_conf.json");
        fs::write(
            &global,
            r#"{"SX1301_conf": {"radio_0": {"enable": true, "freq": 915000000}}}"#,
        )
        .unwrap();
        fs::write(
            &local,
            r#"{"SX1301_conf": {"radio_0": {"enable": true, "freq": 868000000}}}"#,
        )
        .unwrap();

        let (path, conf) =
            ConcentratorConfig::locate_and_load(&[global.clone(), local.clone()]).unwrap();
        assert_eq!(path, global);
        assert_eq!(conf.radios[0].as_ref().unwrap().freq_hz, Some(915_000_000));

        fs::remove_file(&global).unwrap();
        let (path, conf) = ConcentratorConfig::locate_and_load(&[global, local.clone()]).unwrap();
        assert_eq!(path, local);
        assert_eq!(conf.radios[0].as_ref().unwrap().freq_hz, Some(868_000_000));
    }

    #[test]
    fn test_no_candidate_found() {
        let dir = TempDir::new().unwrap();
        let missing = vec![dir.path().join("a.json"), dir.path().join("b.json")];
        let result = ConcentratorConfig::locate_and_load(&missing);
        assert!(matches!(result, Err(Error::ConfigNotFound(paths)) if paths.len() == 2));
    }

    #[test]
    fn test_missing_section_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("global_conf.json");
        fs::write(&path, r#"{"gateway_conf": {"server_port_up": 1700}}"#).unwrap();
        assert!(matches!(
            ConcentratorConfig::load(&path),
            Err(Error::Config(_))
        ));
    }
}

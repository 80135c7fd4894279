//! Value types exchanged with the concentrator driver.
//!
//! These mirror what a LoRa concentrator HAL accepts and produces:
//! - [`BoardConfig`], [`RfChainConfig`], [`IfChannelConfig`]: configuration submitted before start
//! - [`RxPacket`]: one received radio packet with metadata and payload

/// Number of RF chains (radios) on the concentrator board
pub const RF_CHAIN_COUNT: usize = 2;

/// Number of LoRa multi-SF IF channels
pub const MULTI_SF_COUNT: usize = 8;

/// IF slot used by the LoRa standard (single SF) channel
pub const LORA_STD_IF_INDEX: usize = 8;

/// IF slot used by the FSK channel
pub const FSK_IF_INDEX: usize = 9;

/// Total IF slots accepted by the driver
pub const IF_CHAIN_COUNT: usize = 10;

/// Maximum payload carried by a single received packet
pub const MAX_PAYLOAD_SIZE: usize = 256;

/// Board-wide settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardConfig {
    /// Use the public LoRaWAN sync word
    pub lorawan_public: bool,
    /// RF chain providing the reference clock
    pub clock_source: u8,
}

/// Radio front-end variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RadioType {
    #[default]
    Undefined,
    Sx1255,
    Sx1257,
}

impl RadioType {
    /// Parse the configuration spelling (`"SX1255"` / `"SX1257"`)
    pub fn from_name(name: &str) -> Option<Self> {
        if name.starts_with("SX1255") {
            Some(RadioType::Sx1255)
        } else if name.starts_with("SX1257") {
            Some(RadioType::Sx1257)
        } else {
            None
        }
    }
}

/// Settings for one RF chain
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RfChainConfig {
    pub enabled: bool,
    /// Center frequency in Hz
    pub freq_hz: u32,
    /// RSSI calibration offset in dB
    pub rssi_offset: f32,
    pub radio_type: RadioType,
    pub tx_enabled: bool,
    /// TX notch filter frequency in Hz (0 when unused)
    pub tx_notch_freq: u32,
}

/// Modulation kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Modulation {
    #[default]
    Undefined,
    Lora,
    Fsk,
}

/// Channel bandwidth classes understood by the driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Bandwidth {
    #[default]
    Undefined,
    Khz500,
    Khz250,
    Khz125,
    Khz62_5,
    Khz31_2,
    Khz15_6,
    Khz7_8,
}

impl Bandwidth {
    /// Exact LoRa bandwidth match (500, 250 or 125 kHz)
    pub fn from_lora_hz(hz: u32) -> Self {
        match hz {
            500_000 => Bandwidth::Khz500,
            250_000 => Bandwidth::Khz250,
            125_000 => Bandwidth::Khz125,
            _ => Bandwidth::Undefined,
        }
    }

    /// Smallest FSK bandwidth class that fits `hz`
    pub fn from_fsk_hz(hz: u32) -> Self {
        match hz {
            0..=7_800 => Bandwidth::Khz7_8,
            7_801..=15_600 => Bandwidth::Khz15_6,
            15_601..=31_200 => Bandwidth::Khz31_2,
            31_201..=62_500 => Bandwidth::Khz62_5,
            62_501..=125_000 => Bandwidth::Khz125,
            125_001..=250_000 => Bandwidth::Khz250,
            250_001..=500_000 => Bandwidth::Khz500,
            _ => Bandwidth::Undefined,
        }
    }

    /// Nominal bandwidth in Hz, `None` when undefined
    pub fn hz(self) -> Option<u32> {
        match self {
            Bandwidth::Undefined => None,
            Bandwidth::Khz500 => Some(500_000),
            Bandwidth::Khz250 => Some(250_000),
            Bandwidth::Khz125 => Some(125_000),
            Bandwidth::Khz62_5 => Some(62_500),
            Bandwidth::Khz31_2 => Some(31_200),
            Bandwidth::Khz15_6 => Some(15_600),
            Bandwidth::Khz7_8 => Some(7_800),
        }
    }
}

/// Data rate: LoRa spreading factor or FSK bit rate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataRate {
    #[default]
    Undefined,
    /// LoRa spreading factor (7..=12)
    LoraSf(u8),
    /// FSK bit rate in bit/s
    FskBps(u32),
}

impl DataRate {
    /// LoRa data rate for `sf`, undefined outside SF7..SF12
    pub fn lora(sf: u8) -> Self {
        if (7..=12).contains(&sf) {
            DataRate::LoraSf(sf)
        } else {
            DataRate::Undefined
        }
    }
}

/// LoRa forward error correction rate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CodeRate {
    #[default]
    Undefined,
    Cr4_5,
    Cr4_6,
    Cr4_7,
    Cr4_8,
}

impl CodeRate {
    /// Parse `"4/5"` .. `"4/8"`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "4/5" => Some(CodeRate::Cr4_5),
            "4/6" => Some(CodeRate::Cr4_6),
            "4/7" => Some(CodeRate::Cr4_7),
            "4/8" => Some(CodeRate::Cr4_8),
            _ => None,
        }
    }
}

/// Settings for one IF channel (multi-SF, LoRa standard or FSK)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IfChannelConfig {
    pub enabled: bool,
    /// RF chain this channel is demodulated from
    pub rf_chain: u8,
    /// Offset from the RF chain center frequency in Hz
    pub freq_hz: i32,
    /// Only meaningful for the LoRa standard and FSK channels
    pub bandwidth: Bandwidth,
    /// Only meaningful for the LoRa standard and FSK channels
    pub datarate: DataRate,
}

/// Integrity check outcome of a received packet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CrcStatus {
    #[default]
    Undefined,
    NoCrc,
    Bad,
    Ok,
}

/// A packet received by the concentrator
///
/// Uses a fixed-size payload buffer with an explicit length, like the
/// driver's receive structure.
#[derive(Debug, Clone, Copy)]
pub struct RxPacket {
    /// Absolute receive frequency in Hz
    pub freq_hz: u32,
    /// IF chain the packet came in on
    pub if_chain: u8,
    pub status: CrcStatus,
    pub modulation: Modulation,
    pub bandwidth: Bandwidth,
    pub datarate: DataRate,
    pub coderate: CodeRate,
    /// Average RSSI in dB
    pub rssi: f32,
    /// Average SNR in dB (LoRa only)
    pub snr: f32,
    payload: [u8; MAX_PAYLOAD_SIZE],
    size: usize,
}

impl RxPacket {
    /// Create an empty packet received at `freq_hz`
    pub const fn new(freq_hz: u32) -> Self {
        Self {
            freq_hz,
            if_chain: 0,
            status: CrcStatus::Undefined,
            modulation: Modulation::Undefined,
            bandwidth: Bandwidth::Undefined,
            datarate: DataRate::Undefined,
            coderate: CodeRate::Undefined,
            rssi: 0.0,
            snr: 0.0,
            payload: [0u8; MAX_PAYLOAD_SIZE],
            size: 0,
        }
    }

    /// LoRa packet with a good CRC carrying `payload`
    pub fn lora(
        freq_hz: u32,
        bandwidth: Bandwidth,
        sf: u8,
        coderate: CodeRate,
        payload: &[u8],
    ) -> Self {
        let mut pkt = Self::new(freq_hz);
        pkt.status = CrcStatus::Ok;
        pkt.modulation = Modulation::Lora;
        pkt.bandwidth = bandwidth;
        pkt.datarate = DataRate::lora(sf);
        pkt.coderate = coderate;
        pkt.set_payload(payload);
        pkt
    }

    /// Received bytes
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.size]
    }

    /// Number of received bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Replace the payload, truncating to [`MAX_PAYLOAD_SIZE`]
    pub fn set_payload(&mut self, data: &[u8]) {
        let len = data.len().min(MAX_PAYLOAD_SIZE);
        self.payload[..len].copy_from_slice(&data[..len]);
        self.size = len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lora_bandwidth_exact_match() {
        assert_eq!(Bandwidth::from_lora_hz(125_000), Bandwidth::Khz125);
        assert_eq!(Bandwidth::from_lora_hz(500_000), Bandwidth::Khz500);
        assert_eq!(Bandwidth::from_lora_hz(125_001), Bandwidth::Undefined);
    }

    #[test]
    fn test_fsk_bandwidth_thresholds() {
        assert_eq!(Bandwidth::from_fsk_hz(7_800), Bandwidth::Khz7_8);
        assert_eq!(Bandwidth::from_fsk_hz(7_801), Bandwidth::Khz15_6);
        assert_eq!(Bandwidth::from_fsk_hz(100_000), Bandwidth::Khz125);
        assert_eq!(Bandwidth::from_fsk_hz(500_000), Bandwidth::Khz500);
        assert_eq!(Bandwidth::from_fsk_hz(500_001), Bandwidth::Undefined);
    }

    #[test]
    fn test_spreading_factor_range() {
        assert_eq!(DataRate::lora(7), DataRate::LoraSf(7));
        assert_eq!(DataRate::lora(12), DataRate::LoraSf(12));
        assert_eq!(DataRate::lora(6), DataRate::Undefined);
        assert_eq!(DataRate::lora(13), DataRate::Undefined);
    }

    #[test]
    fn test_radio_and_coderate_names() {
        assert_eq!(RadioType::from_name("SX1257"), Some(RadioType::Sx1257));
        assert_eq!(RadioType::from_name("SX1255"), Some(RadioType::Sx1255));
        assert_eq!(RadioType::from_name("SX1301"), None);
        assert_eq!(CodeRate::from_name("4/5"), Some(CodeRate::Cr4_5));
        assert_eq!(CodeRate::from_name("4/9"), None);
    }

    #[test]
    fn test_payload_truncates_to_capacity() {
        let mut pkt = RxPacket::new(868_100_000);
        pkt.set_payload(&[0xAB; 300]);
        assert_eq!(pkt.size(), MAX_PAYLOAD_SIZE);
        pkt.set_payload(&[1, 2, 3]);
        assert_eq!(pkt.payload(), &[1, 2, 3]);
    }
}

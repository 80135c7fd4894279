//! Spotter telemetry payloads
//!
//! A spotter transmits a fixed-layout little-endian record:
//!
//! ```text
//! Compact (17 bytes):
//! ┌────────────┬──────┬────────┬────────┬────────┐
//! │ seconds u32│ ds u8│ X i32  │ Y i32  │ Z i32  │
//! └────────────┴──────┴────────┴────────┴────────┘
//!
//! Wide (33 bytes):
//! ┌────────────┬──────┬────────┬────────┬────────┐
//! │ seconds u64│ ds u8│ X i64  │ Y i64  │ Z i64  │
//! └────────────┴──────┴────────┴────────┴────────┘
//! ```
//!
//! `ds` is the decisecond fraction of the timestamp. Trailing bytes beyond
//! the layout are ignored.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer width used by the transmitting spotter firmware
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadLayout {
    /// 4-byte integers, 17 bytes total
    #[default]
    Compact,
    /// 8-byte integers, 33 bytes total
    Wide,
}

impl PayloadLayout {
    /// Width of the seconds and axis fields
    #[inline]
    pub const fn field_width(self) -> usize {
        match self {
            PayloadLayout::Compact => 4,
            PayloadLayout::Wide => 8,
        }
    }

    /// Bytes required to decode a record
    #[inline]
    pub const fn size(self) -> usize {
        self.field_width() * 4 + 1
    }
}

/// Raw fields of a spotter payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpotterReading {
    /// Whole seconds
    pub seconds: u64,
    /// Tenths of a second
    pub fraction: u8,
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl SpotterReading {
    /// Decode the leading bytes of `payload`
    pub fn decode(payload: &[u8], layout: PayloadLayout) -> Result<Self> {
        if payload.len() < layout.size() {
            return Err(Error::PayloadTooShort {
                expected: layout.size(),
                actual: payload.len(),
            });
        }

        let mut reader = FieldReader::new(payload, layout);
        let seconds = reader.unsigned();
        let fraction = reader.byte();
        let x = reader.signed();
        let y = reader.signed();
        let z = reader.signed();

        Ok(Self {
            seconds,
            fraction,
            x,
            y,
            z,
        })
    }

    /// Encode into `layout`, truncating values that do not fit compact fields
    pub fn encode(&self, layout: PayloadLayout) -> Vec<u8> {
        let mut out = Vec::with_capacity(layout.size());
        match layout {
            PayloadLayout::Compact => {
                out.extend_from_slice(&(self.seconds as u32).to_le_bytes());
                out.push(self.fraction);
                for axis in [self.x, self.y, self.z] {
                    out.extend_from_slice(&(axis as i32).to_le_bytes());
                }
            }
            PayloadLayout::Wide => {
                out.extend_from_slice(&self.seconds.to_le_bytes());
                out.push(self.fraction);
                for axis in [self.x, self.y, self.z] {
                    out.extend_from_slice(&axis.to_le_bytes());
                }
            }
        }
        out
    }

    /// `seconds * 10 + fraction`
    pub fn combined_timestamp(&self) -> Result<u64> {
        self.seconds
            .checked_mul(10)
            .and_then(|ds| ds.checked_add(u64::from(self.fraction)))
            .ok_or(Error::TimestampOverflow {
                seconds: self.seconds,
                fraction: self.fraction,
            })
    }
}

/// Fixed-width little-endian field reader
///
/// Callers check the total length first; each read advances by the field width.
struct FieldReader<'a> {
    data: &'a [u8],
    offset: usize,
    width: usize,
}

impl<'a> FieldReader<'a> {
    fn new(data: &'a [u8], layout: PayloadLayout) -> Self {
        Self {
            data,
            offset: 0,
            width: layout.field_width(),
        }
    }

    fn take(&mut self, len: usize) -> &'a [u8] {
        let field = &self.data[self.offset..self.offset + len];
        self.offset += len;
        field
    }

    fn byte(&mut self) -> u8 {
        self.take(1)[0]
    }

    fn unsigned(&mut self) -> u64 {
        let field = self.take(self.width);
        let mut buf = [0u8; 8];
        buf[..field.len()].copy_from_slice(field);
        u64::from_le_bytes(buf)
    }

    fn signed(&mut self) -> i64 {
        let field = self.take(self.width);
        if field.len() == 4 {
            i64::from(i32::from_le_bytes([field[0], field[1], field[2], field[3]]))
        } else {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(field);
            i64::from_le_bytes(buf)
        }
    }
}

/// Decoded record ready to be forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpotterRecord {
    /// Logical channel index from the channel plan
    pub channel: usize,
    /// Timestamp in deciseconds
    pub timestamp_ds: u64,
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl SpotterRecord {
    /// Decode `payload` received on `channel`
    pub fn from_payload(channel: usize, payload: &[u8], layout: PayloadLayout) -> Result<Self> {
        let reading = SpotterReading::decode(payload, layout)?;
        Ok(Self {
            channel,
            timestamp_ds: reading.combined_timestamp()?,
            x: reading.x,
            y: reading.y,
            z: reading.z,
        })
    }

    /// Text line sent to the client: `#<channel>,<timestamp>,<X>,<Y>,<Z>\n`
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for SpotterRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{},{},{},{},{}",
            self.channel, self.timestamp_ds, self.x, self.y, self.z
        )
    }
}

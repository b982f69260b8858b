//! Control record parsing
//!
//! The control record is a packed byte sequence:
//!
//! | offset | size          | field                 |
//! |--------|---------------|-----------------------|
//! | 0      | 1             | fiber channel count   |
//! | 1      | 1             | strip count           |
//! | 2      | strip count   | LEDs on each strip    |
//!
//! Bytes after the last strip entry are ignored.

use crate::config::HardwareLimits;
use crate::types::{FrameStoreError, Result};
use byteorder::ReadBytesExt;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

/// Fixed header length: fiber count + strip count
pub const CONTROL_HEADER_SIZE: usize = 2;

/// Hardware topology described by a control record
///
/// Immutable once loaded; the open store owns it for the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelTopology {
    fiber_channel_count: u8,
    leds_per_strip: Vec<u8>,
}

impl ChannelTopology {
    /// Build and validate a topology from explicit counts
    pub fn new(
        fiber_channel_count: u8,
        leds_per_strip: Vec<u8>,
        limits: &HardwareLimits,
    ) -> Result<Self> {
        if fiber_channel_count > limits.max_fiber_channels {
            return Err(FrameStoreError::MalformedControl(format!(
                "fiber channel count {} exceeds hardware maximum {}",
                fiber_channel_count, limits.max_fiber_channels
            )));
        }

        if leds_per_strip.len() > limits.max_strips as usize {
            return Err(FrameStoreError::MalformedControl(format!(
                "strip count {} exceeds hardware maximum {}",
                leds_per_strip.len(),
                limits.max_strips
            )));
        }

        if let Some(strip) = leds_per_strip.iter().position(|&n| n == 0) {
            return Err(FrameStoreError::MalformedControl(format!(
                "strip {} declares zero LEDs",
                strip
            )));
        }

        Ok(Self {
            fiber_channel_count,
            leds_per_strip,
        })
    }

    /// Parse a control record from any byte source
    ///
    /// The source is consumed up to the end of the declared strip table and is
    /// not retained.
    pub fn load<R: Read>(source: &mut R, limits: &HardwareLimits) -> Result<Self> {
        let fiber_channel_count = read_header_byte(source, "fiber channel count")?;
        let strip_count = read_header_byte(source, "strip count")?;

        if strip_count > limits.max_strips {
            return Err(FrameStoreError::MalformedControl(format!(
                "strip count {} exceeds hardware maximum {}",
                strip_count, limits.max_strips
            )));
        }

        let mut leds_per_strip = vec![0u8; strip_count as usize];
        source.read_exact(&mut leds_per_strip).map_err(|e| {
            FrameStoreError::MalformedControl(format!(
                "strip count {} declares more LED entries than the record holds: {}",
                strip_count, e
            ))
        })?;

        let topology = Self::new(fiber_channel_count, leds_per_strip, limits)?;
        log::debug!(
            "Control record: {} fiber channels, {} strips, {} LEDs total",
            topology.fiber_channel_count(),
            topology.strip_count(),
            topology.total_leds()
        );
        Ok(topology)
    }

    /// Parse a control record held in memory
    pub fn from_bytes(bytes: &[u8], limits: &HardwareLimits) -> Result<Self> {
        if bytes.len() < CONTROL_HEADER_SIZE {
            return Err(FrameStoreError::MalformedControl(format!(
                "record is {} bytes, minimum is {}",
                bytes.len(),
                CONTROL_HEADER_SIZE
            )));
        }
        Self::load(&mut Cursor::new(bytes), limits)
    }

    /// Parse a control record file
    pub fn load_file(path: &Path, limits: &HardwareLimits) -> Result<Self> {
        log::info!("Loading control record: {:?}", path);
        let file = File::open(path)?;
        Self::load(&mut BufReader::new(file), limits)
    }

    /// Serialize back into the packed control record layout
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CONTROL_HEADER_SIZE + self.leds_per_strip.len());
        out.push(self.fiber_channel_count);
        out.push(self.strip_count());
        out.extend_from_slice(&self.leds_per_strip);
        out
    }

    pub fn fiber_channel_count(&self) -> u8 {
        self.fiber_channel_count
    }

    pub fn strip_count(&self) -> u8 {
        // Bounded by `max_strips: u8` at construction
        self.leds_per_strip.len() as u8
    }

    /// LED count for one strip
    pub fn leds_per_strip(&self, index: usize) -> Result<u8> {
        self.leds_per_strip
            .get(index)
            .copied()
            .ok_or(FrameStoreError::IndexOutOfRange {
                index,
                limit: self.leds_per_strip.len(),
            })
    }

    /// LED counts for every strip, in strip order
    pub fn strips(&self) -> &[u8] {
        &self.leds_per_strip
    }

    /// Sum of LEDs over all strips
    pub fn total_leds(&self) -> usize {
        self.leds_per_strip.iter().map(|&n| n as usize).sum()
    }
}

fn read_header_byte<R: Read>(source: &mut R, field: &str) -> Result<u8> {
    source.read_u8().map_err(|e| {
        FrameStoreError::MalformedControl(format!(
            "record shorter than {} bytes (missing {}): {}",
            CONTROL_HEADER_SIZE, field, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_control_record() {
        let topology = ChannelTopology::from_bytes(&[2, 3, 10, 20, 30], &HardwareLimits::default())
            .unwrap();
        assert_eq!(topology.fiber_channel_count(), 2);
        assert_eq!(topology.strip_count(), 3);
        assert_eq!(topology.strips(), &[10, 20, 30]);
        assert_eq!(topology.leds_per_strip(1).unwrap(), 20);
        assert_eq!(topology.total_leds(), 60);
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let topology =
            ChannelTopology::from_bytes(&[1, 1, 5, 0xFF, 0xFF], &HardwareLimits::default()).unwrap();
        assert_eq!(topology.strips(), &[5]);
    }

    #[test]
    fn test_no_strips() {
        let topology = ChannelTopology::from_bytes(&[4, 0], &HardwareLimits::default()).unwrap();
        assert_eq!(topology.strip_count(), 0);
        assert_eq!(topology.total_leds(), 0);
    }

    #[test]
    fn test_short_record_rejected() {
        let cases: [&[u8]; 2] = [&[], &[3]];
        for bytes in cases {
            let err = ChannelTopology::from_bytes(bytes, &HardwareLimits::default()).unwrap_err();
            assert!(matches!(err, FrameStoreError::MalformedControl(_)));
        }
    }

    #[test]
    fn test_missing_strip_entries_rejected() {
        let err =
            ChannelTopology::from_bytes(&[1, 3, 10, 20], &HardwareLimits::default()).unwrap_err();
        assert!(matches!(err, FrameStoreError::MalformedControl(_)));
    }

    #[test]
    fn test_counts_over_limit_rejected() {
        let limits = HardwareLimits {
            max_fiber_channels: 4,
            max_strips: 2,
        };
        let err = ChannelTopology::from_bytes(&[5, 1, 10], &limits).unwrap_err();
        assert!(matches!(err, FrameStoreError::MalformedControl(_)));

        let err = ChannelTopology::from_bytes(&[4, 3, 10, 10, 10], &limits).unwrap_err();
        assert!(matches!(err, FrameStoreError::MalformedControl(_)));

        assert!(ChannelTopology::from_bytes(&[4, 2, 10, 10], &limits).is_ok());
    }

    #[test]
    fn test_zero_led_strip_rejected() {
        let err = ChannelTopology::from_bytes(&[1, 2, 10, 0], &HardwareLimits::default()).unwrap_err();
        assert!(matches!(err, FrameStoreError::MalformedControl(_)));
    }

    #[test]
    fn test_strip_index_out_of_range() {
        let topology = ChannelTopology::new(0, vec![8], &HardwareLimits::default()).unwrap();
        assert!(matches!(
            topology.leds_per_strip(1),
            Err(FrameStoreError::IndexOutOfRange { index: 1, limit: 1 })
        ));
    }

    #[test]
    fn test_encode_matches_input() {
        let bytes = [3, 2, 7, 9];
        let topology = ChannelTopology::from_bytes(&bytes, &HardwareLimits::default()).unwrap();
        assert_eq!(topology.encode(), bytes);
    }
}

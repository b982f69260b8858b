//! Per-frame binary layout
//!
//! Every record in the frame file has the same size, derived from the control
//! record:
//!
//! ```text
//! timestamp   u64 little-endian                  8 bytes
//! fade        u8 (0 = cut, non-zero = fade)      1 byte
//! fibers      fiber_channel_count x (g, r, b)
//! strips      for each strip: leds x (g, r, b)
//! ```
//!
//! No padding between fields.

use crate::topology::ChannelTopology;
use crate::types::{ColorTriple, FrameRecord, FrameStoreError, Result, COLOR_TRIPLE_SIZE};
use byteorder::{ByteOrder, LittleEndian};
use std::io::{Error, ErrorKind};

pub const TIMESTAMP_SIZE: usize = 8;
pub const FADE_SIZE: usize = 1;

pub const TIMESTAMP_OFFSET: usize = 0;
pub const FADE_OFFSET: usize = TIMESTAMP_OFFSET + TIMESTAMP_SIZE;
pub const FIBER_OFFSET: usize = FADE_OFFSET + FADE_SIZE;

/// A contiguous run of color triples inside a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    /// Byte offset from the start of the record
    pub offset: usize,
    /// Number of color triples
    pub count: usize,
}

impl Section {
    pub fn byte_len(&self) -> usize {
        self.count * COLOR_TRIPLE_SIZE
    }

    fn end(&self) -> usize {
        self.offset + self.byte_len()
    }
}

/// Byte layout of one frame record
///
/// Computed once when a store is opened and never changed afterwards, so every
/// decode in a session uses the same record size and offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    record_size: usize,
    fiber: Section,
    strips: Vec<Section>,
}

impl FrameLayout {
    /// Compute field offsets and the record size for a topology
    pub fn derive(topology: &ChannelTopology) -> Result<Self> {
        let fiber_count = topology.fiber_channel_count() as usize;
        let fiber_section_size = triples_to_bytes(fiber_count, "fiber section")?;
        let fiber = Section {
            offset: FIBER_OFFSET,
            count: fiber_count,
        };

        let mut cursor = checked_add(FIBER_OFFSET, fiber_section_size, "fiber section")?;
        let mut strips = Vec::with_capacity(topology.strips().len());
        for (index, &leds) in topology.strips().iter().enumerate() {
            let size = triples_to_bytes(leds as usize, "strip section")?;
            strips.push(Section {
                offset: cursor,
                count: leds as usize,
            });
            cursor = checked_add(cursor, size, &format!("strip {}", index))?;
        }

        log::debug!(
            "Frame layout: record size {} bytes (fiber section {} bytes, {} strip sections)",
            cursor,
            fiber_section_size,
            strips.len()
        );

        Ok(Self {
            record_size: cursor,
            fiber,
            strips,
        })
    }

    /// Bytes per record
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn fiber_section(&self) -> Section {
        self.fiber
    }

    pub fn fiber_section_size(&self) -> usize {
        self.fiber.byte_len()
    }

    pub fn strip_section(&self, strip: usize) -> Option<Section> {
        self.strips.get(strip).copied()
    }

    /// Total bytes of all strip sections
    pub fn strip_section_size(&self) -> usize {
        self.strips.iter().map(Section::byte_len).sum()
    }

    pub fn strip_count(&self) -> usize {
        self.strips.len()
    }

    /// Read only the timestamp field of an encoded record
    pub fn timestamp_of(&self, record: &[u8]) -> Result<u64> {
        if record.len() < TIMESTAMP_OFFSET + TIMESTAMP_SIZE {
            return Err(size_mismatch(record.len(), self.record_size));
        }
        Ok(LittleEndian::read_u64(
            &record[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + TIMESTAMP_SIZE],
        ))
    }

    /// Decode one encoded record into a freshly allocated `FrameRecord`
    pub fn decode(&self, bytes: &[u8]) -> Result<FrameRecord> {
        let mut record = FrameRecord::default();
        self.decode_into(bytes, &mut record)?;
        Ok(record)
    }

    /// Decode one encoded record, overwriting `record` in place
    ///
    /// Existing vector capacity in `record` is reused.
    pub fn decode_into(&self, bytes: &[u8], record: &mut FrameRecord) -> Result<()> {
        if bytes.len() != self.record_size {
            return Err(size_mismatch(bytes.len(), self.record_size));
        }

        record.timestamp = self.timestamp_of(bytes)?;
        record.fade = bytes[FADE_OFFSET] != 0;

        record.fiber_colors.clear();
        record.fiber_colors.extend(colors(bytes, self.fiber));

        record.strip_colors.truncate(self.strips.len());
        record
            .strip_colors
            .resize_with(self.strips.len(), Vec::new);
        for (leds, section) in record.strip_colors.iter_mut().zip(&self.strips) {
            leds.clear();
            leds.extend(colors(bytes, *section));
        }

        Ok(())
    }

    /// Encode a record into its on-disk form
    ///
    /// Used to build fixture files; the store itself never writes.
    pub fn encode(&self, record: &FrameRecord) -> Result<Vec<u8>> {
        if record.fiber_colors.len() != self.fiber.count {
            return Err(shape_mismatch(format!(
                "{} fiber colors, layout expects {}",
                record.fiber_colors.len(),
                self.fiber.count
            )));
        }
        if record.strip_colors.len() != self.strips.len() {
            return Err(shape_mismatch(format!(
                "{} strips, layout expects {}",
                record.strip_colors.len(),
                self.strips.len()
            )));
        }

        let mut out = vec![0u8; self.record_size];
        LittleEndian::write_u64(
            &mut out[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + TIMESTAMP_SIZE],
            record.timestamp,
        );
        out[FADE_OFFSET] = u8::from(record.fade);
        write_colors(&mut out, self.fiber, &record.fiber_colors);

        for (index, (leds, section)) in record.strip_colors.iter().zip(&self.strips).enumerate() {
            if leds.len() != section.count {
                return Err(shape_mismatch(format!(
                    "strip {} has {} LEDs, layout expects {}",
                    index,
                    leds.len(),
                    section.count
                )));
            }
            write_colors(&mut out, *section, leds);
        }

        Ok(out)
    }
}

fn colors(bytes: &[u8], section: Section) -> impl Iterator<Item = ColorTriple> + '_ {
    bytes[section.offset..section.end()]
        .chunks_exact(COLOR_TRIPLE_SIZE)
        .map(|c| ColorTriple::new(c[0], c[1], c[2]))
}

fn write_colors(out: &mut [u8], section: Section, colors: &[ColorTriple]) {
    for (chunk, color) in out[section.offset..section.end()]
        .chunks_exact_mut(COLOR_TRIPLE_SIZE)
        .zip(colors)
    {
        chunk.copy_from_slice(&color.to_bytes());
    }
}

fn triples_to_bytes(count: usize, what: &str) -> Result<usize> {
    count.checked_mul(COLOR_TRIPLE_SIZE).ok_or_else(|| {
        FrameStoreError::LayoutOverflow(format!("{} of {} colors overflows", what, count))
    })
}

fn checked_add(a: usize, b: usize, what: &str) -> Result<usize> {
    a.checked_add(b)
        .ok_or_else(|| FrameStoreError::LayoutOverflow(format!("record size overflows at {}", what)))
}

fn size_mismatch(actual: usize, expected: usize) -> FrameStoreError {
    FrameStoreError::Io(Error::new(
        ErrorKind::InvalidData,
        format!("record buffer is {} bytes, layout expects {}", actual, expected),
    ))
}

fn shape_mismatch(detail: String) -> FrameStoreError {
    FrameStoreError::Io(Error::new(ErrorKind::InvalidInput, detail))
}

//! Console output for store summaries and frames

use chrono::TimeDelta;
use led_frame_store::{FrameRecord, FrameSource, FrameStore};
use serde::Serialize;

/// Static facts about an open store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub fiber_channel_count: u8,
    pub strip_count: u8,
    pub leds_per_strip: Vec<u8>,
    pub record_size: usize,
    pub record_count: usize,
    pub first_timestamp: Option<u64>,
    pub last_timestamp: Option<u64>,
}

impl StoreSummary {
    pub fn collect<S: FrameSource>(store: &mut FrameStore<S>) -> led_frame_store::Result<Self> {
        let record_count = store.record_count()?;
        let (first_timestamp, last_timestamp) = if record_count == 0 {
            (None, None)
        } else {
            (
                Some(store.timestamp_at(0)?),
                Some(store.timestamp_at(record_count - 1)?),
            )
        };

        let topology = store.topology()?;
        Ok(Self {
            fiber_channel_count: topology.fiber_channel_count(),
            strip_count: topology.strip_count(),
            leds_per_strip: topology.strips().to_vec(),
            record_size: store.layout()?.record_size(),
            record_count,
            first_timestamp,
            last_timestamp,
        })
    }

    pub fn print(&self) {
        println!("Configuration:");
        println!("  Optical fibers: {}", self.fiber_channel_count);
        println!("  LED strips:     {}", self.strip_count);
        for (strip, leds) in self.leds_per_strip.iter().enumerate() {
            println!("    Strip {}: {} LEDs", strip, leds);
        }
        println!("\nFrame file:");
        println!("  Record size:  {} bytes", self.record_size);
        println!("  Total frames: {}", self.record_count);
        if let (Some(first), Some(last)) = (self.first_timestamp, self.last_timestamp) {
            println!("  First frame:  {}", describe_timestamp(first));
            println!("  Last frame:   {}", describe_timestamp(last));
        }
    }
}

/// Render a timestamp as a playback offset (milliseconds)
pub fn format_playback_offset(ts: u64) -> Option<String> {
    let delta = i64::try_from(ts).ok().and_then(TimeDelta::try_milliseconds)?;
    Some(format!(
        "{:02}:{:02}:{:02}.{:03}",
        delta.num_hours(),
        delta.num_minutes() % 60,
        delta.num_seconds() % 60,
        delta.num_milliseconds() % 1000
    ))
}

pub fn describe_timestamp(ts: u64) -> String {
    match format_playback_offset(ts) {
        Some(offset) => format!("{} ({})", ts, offset),
        None => ts.to_string(),
    }
}

/// One-line frame header, optionally followed by every channel color
pub fn print_frame(index: usize, record: &FrameRecord, detailed: bool) {
    println!(
        "Frame {}: ts={}, fade={}",
        index,
        describe_timestamp(record.timestamp),
        u8::from(record.fade)
    );
    if !detailed {
        return;
    }

    println!("  Optical Fibers ({}):", record.fiber_colors.len());
    for (i, color) in record.fiber_colors.iter().enumerate() {
        println!("    OF[{}]: {}", i, color);
    }
    println!("  LED Strips ({}):", record.strip_colors.len());
    for (strip, leds) in record.strip_colors.iter().enumerate() {
        println!("    Strip {} ({} LEDs):", strip, leds.len());
        for (led, color) in leds.iter().enumerate() {
            println!("      LED[{}][{}]: {}", strip, led, color);
        }
    }
}

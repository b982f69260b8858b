//! Frame store configuration types
//!
//! Hardware limits for validating the control record, plus an optional hint
//! that the frame file is uniformly timed.

use serde::{Deserialize, Serialize};

/// Default number of constant-current fiber channels the driver board exposes
pub const DEFAULT_MAX_FIBER_CHANNELS: u8 = 40;

/// Default number of addressable strip outputs
pub const DEFAULT_MAX_STRIPS: u8 = 8;

/// Upper bounds imposed by the output hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareLimits {
    #[serde(default = "default_max_fiber_channels")]
    pub max_fiber_channels: u8,
    #[serde(default = "default_max_strips")]
    pub max_strips: u8,
}

fn default_max_fiber_channels() -> u8 {
    DEFAULT_MAX_FIBER_CHANNELS
}

fn default_max_strips() -> u8 {
    DEFAULT_MAX_STRIPS
}

impl Default for HardwareLimits {
    fn default() -> Self {
        Self {
            max_fiber_channels: DEFAULT_MAX_FIBER_CHANNELS,
            max_strips: DEFAULT_MAX_STRIPS,
        }
    }
}

/// Configuration for opening a frame store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Limits checked against the control record
    #[serde(default)]
    pub limits: HardwareLimits,

    /// Spacing between consecutive timestamps when the file is uniformly timed.
    /// Enables direct index computation in `seek_by_timestamp`.
    #[serde(default)]
    pub nominal_frame_interval: Option<u64>,
}

impl StoreConfig {
    /// Create a configuration with default limits and no timing hint
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: replace the hardware limits
    pub fn with_limits(mut self, limits: HardwareLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Builder method: set the fiber channel limit
    pub fn with_max_fiber_channels(mut self, max: u8) -> Self {
        self.limits.max_fiber_channels = max;
        self
    }

    /// Builder method: set the strip limit
    pub fn with_max_strips(mut self, max: u8) -> Self {
        self.limits.max_strips = max;
        self
    }

    /// Builder method: mark the file as uniformly timed.
    /// An interval of zero is ignored.
    pub fn with_nominal_frame_interval(mut self, interval: u64) -> Self {
        self.nominal_frame_interval = (interval > 0).then_some(interval);
        self
    }

    /// The timing hint, if it is usable
    pub fn frame_interval(&self) -> Option<u64> {
        self.nominal_frame_interval.filter(|&i| i > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_builder() {
        let config = StoreConfig::new()
            .with_max_fiber_channels(16)
            .with_max_strips(4)
            .with_nominal_frame_interval(33);

        assert_eq!(config.limits.max_fiber_channels, 16);
        assert_eq!(config.limits.max_strips, 4);
        assert_eq!(config.frame_interval(), Some(33));
    }

    #[test]
    fn test_zero_interval_is_ignored() {
        let config = StoreConfig::new().with_nominal_frame_interval(0);
        assert_eq!(config.frame_interval(), None);

        let config = StoreConfig {
            nominal_frame_interval: Some(0),
            ..StoreConfig::default()
        };
        assert_eq!(config.frame_interval(), None);
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.limits.max_fiber_channels, DEFAULT_MAX_FIBER_CHANNELS);
        assert_eq!(config.limits.max_strips, DEFAULT_MAX_STRIPS);
        assert_eq!(config.frame_interval(), None);
    }
}

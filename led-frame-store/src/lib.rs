//! LED Frame Store Library
//!
//! Read-only access to a prerecorded lighting show: a control record that
//! describes the output hardware (fiber channels, LED strips, LEDs per strip)
//! and a flat frame file of fixed-size, timestamped color records.
//!
//! # Architecture
//!
//! - [`ChannelTopology`] parses the control record
//! - [`FrameLayout`] derives the record size and field offsets from it
//! - [`FrameStore`] owns the open frame file and a single read cursor, and
//!   hands out decoded [`FrameRecord`]s sequentially or by timestamp
//!
//! The library does NOT:
//! - Write or modify frame files
//! - Drive LED hardware or apply fades
//! - Synchronize access from several threads
//!
//! # Example Usage
//!
//! ```no_run
//! use led_frame_store::{FrameRecord, FrameStore, FrameStoreError, StoreConfig};
//! use std::path::Path;
//!
//! let config = StoreConfig::new().with_nominal_frame_interval(33);
//! let mut store = FrameStore::open_with_config(
//!     Path::new("/sd/control.dat"),
//!     Path::new("/sd/frame.dat"),
//!     config,
//! ).unwrap();
//!
//! // Jump to the frame playing at t=1000, then continue sequentially
//! let frame = store.seek_by_timestamp(1000).unwrap();
//! println!("resuming at ts={}", frame.timestamp);
//!
//! let mut buffer = FrameRecord::default();
//! loop {
//!     match store.next_into(&mut buffer) {
//!         Ok(()) => { /* push buffer to the LED drivers */ }
//!         Err(FrameStoreError::EndOfStream) => break,
//!         Err(e) => panic!("frame read failed: {}", e),
//!     }
//! }
//! store.close();
//! ```

// Public modules
pub mod config;
pub mod layout;
pub mod store;
pub mod topology;
pub mod types;

// Re-export main types for convenience
pub use config::{HardwareLimits, StoreConfig};
pub use layout::FrameLayout;
pub use store::{FrameSource, FrameStore, Frames};
pub use topology::ChannelTopology;
pub use types::{ColorTriple, FrameRecord, FrameStoreError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

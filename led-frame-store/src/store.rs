//! Frame store: cursor-based access to an open frame file
//!
//! A [`FrameStore`] is created by [`FrameStore::open`] (or one of its variants)
//! and stays open until [`FrameStore::close`] or drop. There is no unopened
//! store value; a store that failed to open does not exist. Once closed, every
//! operation except `reset` and `close` returns [`FrameStoreError::StoreClosed`].
//!
//! The store is not internally synchronized. All operations take `&mut self`,
//! so a single owner drives it.

use crate::config::StoreConfig;
use crate::layout::{FrameLayout, TIMESTAMP_OFFSET, TIMESTAMP_SIZE};
use crate::topology::ChannelTopology;
use crate::types::{FrameRecord, FrameStoreError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Seekable, read-only byte source backing a frame store
///
/// The hosting storage layer supplies an implementation; the store only needs
/// to read at an offset and know the total length.
pub trait FrameSource: Read + Seek {
    /// Total length of the source in bytes
    fn byte_len(&mut self) -> io::Result<u64> {
        let current = self.stream_position()?;
        let len = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(current))?;
        Ok(len)
    }
}

impl FrameSource for File {
    fn byte_len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

impl<T: AsRef<[u8]>> FrameSource for Cursor<T> {
    fn byte_len(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().as_ref().len() as u64)
    }
}

/// State of an open session
struct Session<S> {
    source: S,
    topology: ChannelTopology,
    layout: FrameLayout,
    record_count: usize,
    /// Index of the next record `next()` will decode
    cursor: usize,
    /// Where the source is currently positioned, if known
    position: Option<u64>,
    /// Scratch buffer holding one encoded record
    buf: Vec<u8>,
}

impl<S: FrameSource> Session<S> {
    fn record_offset(&self, index: usize) -> u64 {
        index as u64 * self.layout.record_size() as u64
    }

    fn position_at(&mut self, offset: u64, index: usize) -> Result<()> {
        if self.position != Some(offset) {
            self.position = None;
            self.source
                .seek(SeekFrom::Start(offset))
                .map_err(|source| FrameStoreError::IoFailure { index, source })?;
        }
        Ok(())
    }

    /// Load the encoded bytes of record `index` into the scratch buffer
    fn read_record(&mut self, index: usize) -> Result<()> {
        let offset = self.record_offset(index);
        self.position_at(offset, index)?;
        self.position = None;
        self.source
            .read_exact(&mut self.buf)
            .map_err(|source| FrameStoreError::IoFailure { index, source })?;
        self.position = Some(offset + self.buf.len() as u64);
        Ok(())
    }

    /// Read only the timestamp field of record `index`
    fn read_timestamp(&mut self, index: usize) -> Result<u64> {
        let offset = self.record_offset(index) + TIMESTAMP_OFFSET as u64;
        self.position_at(offset, index)?;
        self.position = None;
        let timestamp = self
            .source
            .read_u64::<LittleEndian>()
            .map_err(|source| FrameStoreError::IoFailure { index, source })?;
        self.position = Some(offset + TIMESTAMP_SIZE as u64);
        Ok(timestamp)
    }

    /// Greatest index whose timestamp is `<= ts`, given `timestamp[0] <= ts`
    fn last_at_or_before(&mut self, ts: u64) -> Result<usize> {
        // First index in [1, record_count] whose timestamp is > ts
        let (mut lo, mut hi) = (1, self.record_count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.read_timestamp(mid)? <= ts {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo - 1)
    }

    /// Direct index for a uniformly timed file, if the stored timestamps agree
    fn direct_index(&mut self, ts: u64, interval: u64) -> Result<Option<usize>> {
        let last = self.record_count - 1;
        let candidate = usize::try_from(ts / interval).map_or(last, |i| i.min(last));

        if self.read_timestamp(candidate)? > ts {
            return Ok(None);
        }
        if candidate < last && self.read_timestamp(candidate + 1)? <= ts {
            return Ok(None);
        }
        Ok(Some(candidate))
    }

    /// First index of the run of equal timestamps ending at `index`
    fn run_start(&mut self, index: usize) -> Result<usize> {
        if index == 0 {
            return Ok(0);
        }
        let target = self.read_timestamp(index)?;
        if self.read_timestamp(index - 1)? != target {
            return Ok(index);
        }

        let (mut lo, mut hi) = (0, index);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.read_timestamp(mid)? < target {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }
}

/// An open frame file with a single read cursor
pub struct FrameStore<S = File> {
    session: Option<Session<S>>,
    config: StoreConfig,
}

impl FrameStore<File> {
    /// Open a store from a control record path and a frame file path
    ///
    /// # Example
    /// ```no_run
    /// use led_frame_store::FrameStore;
    /// use std::path::Path;
    ///
    /// let mut store = FrameStore::open(Path::new("control.dat"), Path::new("frame.dat")).unwrap();
    /// for frame in store.frames() {
    ///     let frame = frame.unwrap();
    ///     println!("ts={} fade={}", frame.timestamp, frame.fade);
    /// }
    /// store.close();
    /// ```
    pub fn open(control_path: &Path, frame_path: &Path) -> Result<Self> {
        Self::open_with_config(control_path, frame_path, StoreConfig::default())
    }

    /// Open a store with explicit hardware limits and timing hint
    pub fn open_with_config(
        control_path: &Path,
        frame_path: &Path,
        config: StoreConfig,
    ) -> Result<Self> {
        let control = File::open(control_path)?;
        log::info!("Opening frame file: {:?}", frame_path);
        let frames = File::open(frame_path)?;
        Self::from_sources(&mut BufReader::new(control), frames, config)
    }
}

impl<S: FrameSource> FrameStore<S> {
    /// Open a store over arbitrary sources
    ///
    /// Parses the control record, derives the frame layout and checks that the
    /// frame source holds a whole number of records. The cursor starts at 0.
    pub fn from_sources<C: Read>(control: &mut C, mut frames: S, config: StoreConfig) -> Result<Self> {
        let topology = ChannelTopology::load(control, &config.limits)?;
        let layout = FrameLayout::derive(&topology)?;
        let record_size = layout.record_size();

        let file_len = frames.byte_len()?;
        if file_len % record_size as u64 != 0 {
            return Err(FrameStoreError::TruncatedFrameFile {
                file_len,
                record_size,
            });
        }
        let record_count = usize::try_from(file_len / record_size as u64).map_err(|_| {
            FrameStoreError::LayoutOverflow(format!(
                "{} records do not fit the address space",
                file_len / record_size as u64
            ))
        })?;

        log::info!(
            "Frame store open: {} records of {} bytes ({} fiber channels, {} strips)",
            record_count,
            record_size,
            topology.fiber_channel_count(),
            topology.strip_count()
        );

        Ok(Self {
            session: Some(Session {
                source: frames,
                topology,
                layout,
                record_count,
                cursor: 0,
                position: None,
                buf: vec![0u8; record_size],
            }),
            config,
        })
    }

    fn session(&self) -> Result<&Session<S>> {
        self.session.as_ref().ok_or(FrameStoreError::StoreClosed)
    }

    fn session_mut(&mut self) -> Result<&mut Session<S>> {
        self.session.as_mut().ok_or(FrameStoreError::StoreClosed)
    }

    /// Decode the record at the cursor and advance
    ///
    /// Returns [`FrameStoreError::EndOfStream`] once every record has been read;
    /// the cursor is left where it was.
    pub fn next(&mut self) -> Result<FrameRecord> {
        let mut record = FrameRecord::default();
        self.next_into(&mut record)?;
        Ok(record)
    }

    /// Like [`FrameStore::next`], overwriting a caller-owned record buffer
    pub fn next_into(&mut self, record: &mut FrameRecord) -> Result<()> {
        let session = self.session_mut()?;
        if session.cursor == session.record_count {
            return Err(FrameStoreError::EndOfStream);
        }

        let index = session.cursor;
        session.read_record(index)?;
        session.layout.decode_into(&session.buf, record)?;
        session.cursor += 1;
        Ok(())
    }

    /// Position at the frame playing at `ts` and decode it
    ///
    /// Picks the greatest index whose timestamp is `<= ts`; within a run of
    /// equal timestamps the earliest record wins. The cursor is left just past
    /// the returned record.
    pub fn seek_by_timestamp(&mut self, ts: u64) -> Result<FrameRecord> {
        let interval = self.config.frame_interval();
        let session = self.session_mut()?;

        if session.record_count == 0 || session.read_timestamp(0)? > ts {
            return Err(FrameStoreError::NotFound(ts));
        }

        let direct = match interval {
            Some(interval) => session.direct_index(ts, interval)?,
            None => None,
        };
        let index = match direct {
            Some(index) => {
                log::trace!("Seek {}: direct index {}", ts, index);
                index
            }
            None => {
                let index = session.last_at_or_before(ts)?;
                log::trace!("Seek {}: binary search found {}", ts, index);
                index
            }
        };
        let index = session.run_start(index)?;

        session.read_record(index)?;
        let record = session.layout.decode(&session.buf)?;
        session.cursor = index + 1;
        Ok(record)
    }

    /// Rewind the cursor to the first record. No effect on a closed store.
    pub fn reset(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.cursor = 0;
        }
    }

    /// Release the frame source and all derived state
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            log::debug!(
                "Closing frame store at record {}/{}",
                session.cursor,
                session.record_count
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_none()
    }

    /// Timestamp of record `index`, without moving the cursor
    pub fn timestamp_at(&mut self, index: usize) -> Result<u64> {
        let session = self.session_mut()?;
        if index >= session.record_count {
            return Err(FrameStoreError::IndexOutOfRange {
                index,
                limit: session.record_count,
            });
        }
        session.read_timestamp(index)
    }

    /// Iterate from the cursor to the end of the file
    pub fn frames(&mut self) -> Frames<'_, S> {
        Frames {
            store: self,
            done: false,
        }
    }

    pub fn fiber_channel_count(&self) -> Result<u8> {
        Ok(self.session()?.topology.fiber_channel_count())
    }

    pub fn strip_count(&self) -> Result<u8> {
        Ok(self.session()?.topology.strip_count())
    }

    pub fn leds_per_strip(&self, index: usize) -> Result<u8> {
        self.session()?.topology.leds_per_strip(index)
    }

    pub fn record_count(&self) -> Result<usize> {
        Ok(self.session()?.record_count)
    }

    /// Index of the next record `next()` will return
    pub fn cursor(&self) -> Result<usize> {
        Ok(self.session()?.cursor)
    }

    pub fn topology(&self) -> Result<&ChannelTopology> {
        Ok(&self.session()?.topology)
    }

    pub fn layout(&self) -> Result<&FrameLayout> {
        Ok(&self.session()?.layout)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

/// Iterator over the remaining records of a store
///
/// Ends at the end of the stream. After the first error it yields that error
/// and then stops.
pub struct Frames<'a, S> {
    store: &'a mut FrameStore<S>,
    done: bool,
}

impl<'a, S: FrameSource> Iterator for Frames<'a, S> {
    type Item = Result<FrameRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.store.next() {
            Ok(record) => Some(Ok(record)),
            Err(FrameStoreError::EndOfStream) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColorTriple;

    const CONTROL: [u8; 3] = [2, 1, 3];

    fn frame_bytes(timestamps: &[u64]) -> Vec<u8> {
        let topology = ChannelTopology::from_bytes(&CONTROL, &Default::default()).unwrap();
        let layout = FrameLayout::derive(&topology).unwrap();
        timestamps
            .iter()
            .enumerate()
            .flat_map(|(i, &ts)| {
                let record = FrameRecord {
                    timestamp: ts,
                    fade: i % 2 == 0,
                    fiber_colors: vec![ColorTriple::new(i as u8, 0, 0); 2],
                    strip_colors: vec![vec![ColorTriple::new(0, i as u8, 1); 3]],
                };
                layout.encode(&record).unwrap()
            })
            .collect()
    }

    fn store(timestamps: &[u64], config: StoreConfig) -> FrameStore<Cursor<Vec<u8>>> {
        FrameStore::from_sources(&mut &CONTROL[..], Cursor::new(frame_bytes(timestamps)), config)
            .unwrap()
    }

    #[test]
    fn test_open_counts_records() {
        let store = store(&[0, 10, 20], StoreConfig::default());
        assert_eq!(store.record_count().unwrap(), 3);
        assert_eq!(store.layout().unwrap().record_size(), 24);
        assert_eq!(store.cursor().unwrap(), 0);
        assert_eq!(store.fiber_channel_count().unwrap(), 2);
        assert_eq!(store.strip_count().unwrap(), 1);
        assert_eq!(store.leds_per_strip(0).unwrap(), 3);
        assert!(matches!(
            store.leds_per_strip(1),
            Err(FrameStoreError::IndexOutOfRange { index: 1, limit: 1 })
        ));
    }

    #[test]
    fn test_truncated_file_rejected() {
        let mut bytes = frame_bytes(&[0, 10]);
        bytes.pop();
        let result = FrameStore::from_sources(&mut &CONTROL[..], Cursor::new(bytes), StoreConfig::default());
        assert!(matches!(
            result,
            Err(FrameStoreError::TruncatedFrameFile { file_len: 47, record_size: 24 })
        ));
    }

    #[test]
    fn test_malformed_control_rejected() {
        let result = FrameStore::from_sources(
            &mut &[2u8][..],
            Cursor::new(Vec::new()),
            StoreConfig::default(),
        );
        assert!(matches!(result, Err(FrameStoreError::MalformedControl(_))));
    }

    #[test]
    fn test_sequential_read_then_end() {
        let mut store = store(&[0, 10, 20], StoreConfig::default());
        for expected in [0, 10, 20] {
            assert_eq!(store.next().unwrap().timestamp, expected);
        }
        assert!(matches!(store.next(), Err(FrameStoreError::EndOfStream)));
        assert!(matches!(store.next(), Err(FrameStoreError::EndOfStream)));
        assert_eq!(store.cursor().unwrap(), 3);
    }

    #[test]
    fn test_reset_restarts() {
        let mut store = store(&[5, 10, 20], StoreConfig::default());
        let first = store.next().unwrap();
        store.next().unwrap();
        store.reset();
        assert_eq!(store.cursor().unwrap(), 0);
        assert_eq!(store.next().unwrap(), first);
    }

    #[test]
    fn test_seek_exact_and_between() {
        let mut store = store(&[0, 10, 20, 30], StoreConfig::default());
        let record = store.seek_by_timestamp(20).unwrap();
        assert_eq!(record.timestamp, 20);
        assert_eq!(record.fiber_colors[0], ColorTriple::new(2, 0, 0));
        assert_eq!(store.next().unwrap().timestamp, 30);

        assert_eq!(store.seek_by_timestamp(15).unwrap().timestamp, 10);
        assert_eq!(store.cursor().unwrap(), 2);

        assert_eq!(store.seek_by_timestamp(1_000).unwrap().timestamp, 30);
        assert!(matches!(store.next(), Err(FrameStoreError::EndOfStream)));
    }

    #[test]
    fn test_seek_before_first_not_found() {
        let mut store = store(&[100, 200], StoreConfig::default());
        store.next().unwrap();
        assert!(matches!(store.seek_by_timestamp(99), Err(FrameStoreError::NotFound(99))));
        assert_eq!(store.cursor().unwrap(), 1);
    }

    #[test]
    fn test_seek_empty_store() {
        let mut store = store(&[], StoreConfig::default());
        assert_eq!(store.record_count().unwrap(), 0);
        assert!(matches!(store.seek_by_timestamp(0), Err(FrameStoreError::NotFound(0))));
        assert!(matches!(store.next(), Err(FrameStoreError::EndOfStream)));
    }

    #[test]
    fn test_seek_returns_earliest_of_equal_run() {
        let mut store = store(&[0, 10, 10, 10, 20], StoreConfig::default());
        let record = store.seek_by_timestamp(15).unwrap();
        assert_eq!(record.timestamp, 10);
        assert_eq!(record.fiber_colors[0], ColorTriple::new(1, 0, 0));
        assert_eq!(store.cursor().unwrap(), 2);

        let mut store = self::store(&[7, 7, 7], StoreConfig::default());
        assert_eq!(store.seek_by_timestamp(7).unwrap().fiber_colors[0].g, 0);
    }

    #[test]
    fn test_seek_uniform_timing() {
        let config = StoreConfig::new().with_nominal_frame_interval(10);
        let mut store = store(&[0, 10, 20, 30, 40], config);
        assert_eq!(store.seek_by_timestamp(25).unwrap().timestamp, 20);
        assert_eq!(store.seek_by_timestamp(40).unwrap().timestamp, 40);
        assert_eq!(store.seek_by_timestamp(999).unwrap().timestamp, 40);
    }

    #[test]
    fn test_seek_uniform_hint_wrong_falls_back() {
        // Hint says 10, file is actually spaced by 25
        let config = StoreConfig::new().with_nominal_frame_interval(10);
        let mut store = store(&[0, 25, 50, 75], config);
        assert_eq!(store.seek_by_timestamp(30).unwrap().timestamp, 25);
        assert_eq!(store.seek_by_timestamp(74).unwrap().timestamp, 50);
        assert_eq!(store.cursor().unwrap(), 3);
    }

    #[test]
    fn test_timestamp_at_keeps_cursor() {
        let mut store = store(&[3, 6, 9], StoreConfig::default());
        store.next().unwrap();
        assert_eq!(store.timestamp_at(2).unwrap(), 9);
        assert_eq!(store.timestamp_at(0).unwrap(), 3);
        assert!(matches!(
            store.timestamp_at(3),
            Err(FrameStoreError::IndexOutOfRange { index: 3, limit: 3 })
        ));
        assert_eq!(store.next().unwrap().timestamp, 6);
    }

    #[test]
    fn test_closed_store_rejects_operations() {
        let mut store = store(&[0, 10], StoreConfig::default());
        store.next().unwrap();
        store.close();
        assert!(store.is_closed());
        assert!(matches!(store.next(), Err(FrameStoreError::StoreClosed)));
        assert!(matches!(store.seek_by_timestamp(0), Err(FrameStoreError::StoreClosed)));
        assert!(matches!(store.record_count(), Err(FrameStoreError::StoreClosed)));
        assert!(matches!(store.leds_per_strip(0), Err(FrameStoreError::StoreClosed)));
        store.reset();
        store.close();
        assert!(store.is_closed());
    }

    #[test]
    fn test_frames_iterator() {
        let mut store = store(&[1, 2, 3], StoreConfig::default());
        store.next().unwrap();
        let rest: Vec<u64> = store.frames().map(|r| r.unwrap().timestamp).collect();
        assert_eq!(rest, vec![2, 3]);
        assert_eq!(store.frames().count(), 0);
    }

    #[test]
    fn test_short_read_is_io_failure() {
        /// Claims one record more than it actually holds
        struct Lying(Cursor<Vec<u8>>);

        impl Read for Lying {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                self.0.read(buf)
            }
        }
        impl Seek for Lying {
            fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
                self.0.seek(pos)
            }
        }
        impl FrameSource for Lying {
            fn byte_len(&mut self) -> io::Result<u64> {
                Ok(self.0.get_ref().len() as u64 + 24)
            }
        }

        let source = Lying(Cursor::new(frame_bytes(&[0])));
        let mut store =
            FrameStore::from_sources(&mut &CONTROL[..], source, StoreConfig::default()).unwrap();
        assert_eq!(store.record_count().unwrap(), 2);
        store.next().unwrap();
        let err = store.next().unwrap_err();
        assert!(matches!(err, FrameStoreError::IoFailure { index: 1, .. }));
        assert!(!err.is_recoverable());
        assert_eq!(store.cursor().unwrap(), 1);
    }
}

//! LED Frame Store CLI Application
//!
//! Diagnostic tool for lighting show files. It uses the led-frame-store
//! library and adds:
//! - Store summaries (text or JSON)
//! - Sequential scans that print every Nth frame
//! - Timestamp lookups

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use led_frame_store::{FrameRecord, FrameStore, FrameStoreError, StoreConfig};
use std::path::PathBuf;

mod config;
mod report;

use config::AppConfig;
use report::StoreSummary;

const DEFAULT_CONTROL_PATH: &str = "control.dat";
const DEFAULT_FRAME_PATH: &str = "frame.dat";

/// LED Frame Store - Inspect lighting show frame files
#[derive(Parser, Debug)]
#[command(name = "led-frame-cli")]
#[command(about = "Inspect LED/fiber lighting show frame files", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the control record (default: control.dat)
    #[arg(long, value_name = "FILE", global = true)]
    control: Option<PathBuf>,

    /// Path to the frame file (default: frame.dat)
    #[arg(long, value_name = "FILE", global = true)]
    frames: Option<PathBuf>,

    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Nominal spacing between frame timestamps, for uniformly timed files
    #[arg(long, value_name = "TICKS", global = true)]
    interval: Option<u64>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show topology, record size and frame count
    Info {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Read frames sequentially, printing every Nth one
    Dump {
        /// Print every Nth frame
        #[arg(long, value_name = "N")]
        every: Option<usize>,

        /// Maximum number of frames to read
        #[arg(long, value_name = "COUNT")]
        max_frames: Option<usize>,
    },
    /// Find the frame playing at a timestamp
    Seek {
        /// Target timestamp
        #[arg(long)]
        ts: u64,

        /// Fall back to the first frame when the target precedes it
        #[arg(long)]
        clamp: bool,
    },
}

/// Inputs resolved from config file and command line
struct Session {
    control: PathBuf,
    frames: PathBuf,
    store: StoreConfig,
    config: AppConfig,
}

impl Session {
    fn resolve(args: &Args) -> Result<Self> {
        let config = match &args.config {
            Some(path) => {
                log::info!("Loading configuration from: {:?}", path);
                config::load_config(path)?
            }
            None => AppConfig::default(),
        };

        let control = args
            .control
            .clone()
            .or_else(|| config.input.control.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTROL_PATH));
        let frames = args
            .frames
            .clone()
            .or_else(|| config.input.frames.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FRAME_PATH));

        let mut store = config.store.clone();
        if let Some(interval) = args.interval {
            store = store.with_nominal_frame_interval(interval);
        }

        Ok(Self {
            control,
            frames,
            store,
            config,
        })
    }

    fn open(&self) -> Result<FrameStore> {
        FrameStore::open_with_config(&self.control, &self.frames, self.store.clone())
            .with_context(|| {
                format!(
                    "Failed to open frame store (control {:?}, frames {:?})",
                    self.control, self.frames
                )
            })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("LED Frame Store CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using frame store library v{}", led_frame_store::VERSION);

    let session = Session::resolve(&args)?;

    match &args.command {
        Command::Info { json } => info_mode(&session, *json),
        Command::Dump { every, max_frames } => {
            let every = every.unwrap_or(session.config.inspect.every).max(1);
            let max_frames = max_frames.or(session.config.inspect.max_frames);
            dump_mode(&session, every, max_frames, args.verbose > 0)
        }
        Command::Seek { ts, clamp } => seek_mode(&session, *ts, *clamp),
    }
}

fn info_mode(session: &Session, json: bool) -> Result<()> {
    let mut store = session.open()?;
    let summary = StoreSummary::collect(&mut store).context("Failed to read store summary")?;
    store.close();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        summary.print();
    }
    Ok(())
}

/// Sequential scan, printing every Nth frame
fn dump_mode(session: &Session, every: usize, max_frames: Option<usize>, detailed: bool) -> Result<()> {
    let mut store = session.open()?;

    println!(
        "Configuration: OF={}, Strips={}, Total frames={}",
        store.fiber_channel_count()?,
        store.strip_count()?,
        store.record_count()?
    );
    log::info!("Reading frames sequentially...");

    let mut frame = FrameRecord::default();
    let mut frame_count = 0usize;
    loop {
        if max_frames.is_some_and(|max| frame_count >= max) {
            log::info!("Stopping after {} frames", frame_count);
            break;
        }

        match store.next_into(&mut frame) {
            Ok(()) => {}
            Err(FrameStoreError::EndOfStream) => {
                log::info!("Reached end of frames");
                break;
            }
            Err(e) => {
                store.close();
                return Err(e).with_context(|| format!("Failed to read frame {}", frame_count));
            }
        }

        frame_count += 1;
        if frame_count % every == 0 {
            report::print_frame(frame_count, &frame, detailed);
        }
    }

    println!("Total frames read: {}", frame_count);
    store.close();
    Ok(())
}

fn seek_mode(session: &Session, ts: u64, clamp: bool) -> Result<()> {
    let mut store = session.open()?;

    let frame = match store.seek_by_timestamp(ts) {
        Ok(frame) => frame,
        Err(FrameStoreError::NotFound(_)) if clamp => {
            log::info!("Timestamp {} precedes the first frame, clamping", ts);
            store.reset();
            store.next().context("Failed to read first frame")?
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to seek to timestamp {}", ts)),
    };

    let cursor = store.cursor()?;
    report::print_frame(cursor - 1, &frame, true);

    if cursor < store.record_count()? {
        let following = store.timestamp_at(cursor)?;
        println!("Next frame: ts={}", report::describe_timestamp(following));
    } else {
        println!("Next frame: none (end of show)");
    }

    store.close();
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

use eclypse_engine::Engine;
use eclypse_messages::{Command, Delivery, Event, Hertz, Ppm, SampleEncoding, SessionConfig};

use clap::{Parser, ValueEnum};
use log::{LevelFilter, debug, error, info, warn};
use std::io::Write;
use std::time::{Duration, Instant};

/// Tune an Eclypse front end and stream IQ samples from it
#[derive(Parser, Debug)]
#[command(name = "eclypse")]
#[command(version, about, long_about = None)]
struct Args {
    /// Device address
    #[arg(short, long, default_value = "192.168.178.64")]
    address: String,

    /// Device port (shared by the control and data channels)
    #[arg(short, long, default_value = "1001")]
    port: u16,

    /// Center frequency in Hz
    #[arg(short, long, default_value = "100000000")]
    frequency: u64,

    /// Sample rate in S/s (24000, 48000, 96000, 192000, 384000, 768000 or 1536000)
    #[arg(short, long, default_value = "768000")]
    rate: u64,

    /// Oscillator correction in ppm
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    ppm: f64,

    /// Sample encoding on the data channel
    #[arg(short, long, value_enum, default_value = "f32")]
    encoding: EncodingArg,

    /// Maximum bytes per data channel read (at most 1048576)
    #[arg(
        short,
        long,
        default_value = "16384",
        value_parser = clap::value_parser!(u32).range(1..=SessionConfig::MAX_READ_BATCH_SIZE as i64)
    )]
    batch_size: u32,

    /// Connect timeout in milliseconds
    #[arg(long, default_value = "5000")]
    connect_timeout: u64,

    /// Data read timeout in milliseconds (blocks forever when omitted)
    #[arg(long)]
    read_timeout: Option<u64>,

    /// Deliver undecoded sample frames instead of IQ samples
    #[arg(long)]
    raw: bool,

    /// Stop after this many samples
    #[arg(short = 'n', long)]
    max_samples: Option<u64>,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EncodingArg {
    /// Pairs of little-endian f32
    F32,
    /// Pairs of little-endian i16
    I16,
}

impl From<EncodingArg> for SampleEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::F32 => SampleEncoding::F32Pair,
            EncodingArg::I16 => SampleEncoding::I16Pair,
        }
    }
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            address: self.address.clone(),
            port: self.port,
            center_frequency: Hertz(self.frequency),
            sample_rate: Hertz(self.rate),
            correction: Ppm::from(self.ppm),
            encoding: self.encoding.into(),
            read_batch_size: self.batch_size as usize,
            connect_timeout: Duration::from_millis(self.connect_timeout),
            read_timeout: self.read_timeout.map(Duration::from_millis),
            delivery: if self.raw {
                Delivery::Raw
            } else {
                Delivery::Samples
            },
        }
    }

    fn engine_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::builder()
        .format(|buf, record| {
            writeln!(
                buf,
                "{:<5} - {} | {}",
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .filter_level(LevelFilter::Warn)
        .filter_module("eclypse_engine", args.engine_level())
        .filter_module("eclypse", args.engine_level())
        .init();

    let config = args.session_config();
    info!(
        "Streaming from {}:{} at {} / {} S/s ({}, {})",
        config.address,
        config.port,
        config.center_frequency,
        config.sample_rate.as_hz(),
        config.correction,
        config.encoding
    );

    // Create flume channels for bidirectional communication
    let (cmd_tx, cmd_rx) = flume::unbounded();
    let (event_tx, event_rx) = flume::bounded(8);

    // Spawn engine thread
    let engine_handle = std::thread::spawn(move || {
        let engine = Engine::new(cmd_rx, event_tx, config);
        engine.run()
    });

    let outcome = consume_events(&event_rx, args.max_samples);

    // Consumer is done - send stop command to engine
    let _ = cmd_tx.send(Command::Stop);
    drop(event_rx);

    engine_handle
        .join()
        .map_err(|_| anyhow::anyhow!("Engine thread panicked"))??;

    outcome
}

/// Log incoming batches until the stream ends, fails, or `max_samples`
/// have been received.
fn consume_events(
    event_rx: &flume::Receiver<Event>,
    max_samples: Option<u64>,
) -> anyhow::Result<()> {
    let started = Instant::now();
    let mut total: u64 = 0;

    for event in event_rx.iter() {
        match event {
            Event::StateSnapshot(state) => {
                info!(
                    "Session {}: tuned to {} (requested {}, {}), {} S/s",
                    state.session,
                    state.tuned_frequency,
                    state.center_frequency,
                    state.correction,
                    state.sample_rate.as_hz()
                );
            }
            Event::Samples(batch) => {
                total += batch.samples.len() as u64;
                debug!("Received {} samples ({} total)", batch.samples.len(), total);
            }
            Event::Raw(batch) => {
                total += batch.sample_count() as u64;
                debug!(
                    "Received {} bytes / {} samples ({} total)",
                    batch.bytes.len(),
                    batch.sample_count(),
                    total
                );
            }
            Event::EndOfStream => {
                info!("Device closed the data stream");
                break;
            }
            Event::Error(msg) => {
                error!("Engine error: {}", msg);
                return Err(anyhow::anyhow!(msg));
            }
        }

        if max_samples.is_some_and(|max| total >= max) {
            info!("Reached {} samples, stopping", total);
            break;
        }
    }

    let elapsed = started.elapsed().as_secs_f64();
    if elapsed > 0.0 && total > 0 {
        info!(
            "{} samples in {:.2} s ({:.0} S/s)",
            total,
            elapsed,
            total as f64 / elapsed
        );
    } else if total == 0 {
        warn!("No samples received");
    }
    Ok(())
}

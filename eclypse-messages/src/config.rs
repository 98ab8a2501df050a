use crate::{Hertz, Ppm};
use std::time::Duration;

/// Sample rates the front end supports, with their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleRate {
    Sps24k,
    Sps48k,
    Sps96k,
    Sps192k,
    Sps384k,
    Sps768k,
    Sps1536k,
}

impl SampleRate {
    /// Every supported rate, in code order.
    pub const ALL: [SampleRate; 7] = [
        SampleRate::Sps24k,
        SampleRate::Sps48k,
        SampleRate::Sps96k,
        SampleRate::Sps192k,
        SampleRate::Sps384k,
        SampleRate::Sps768k,
        SampleRate::Sps1536k,
    ];

    /// Look up a rate in samples per second. `None` if the device has no
    /// code for it.
    pub fn from_hz(hz: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|rate| rate.hz() == hz)
    }

    pub const fn hz(self) -> u64 {
        match self {
            SampleRate::Sps24k => 24_000,
            SampleRate::Sps48k => 48_000,
            SampleRate::Sps96k => 96_000,
            SampleRate::Sps192k => 192_000,
            SampleRate::Sps384k => 384_000,
            SampleRate::Sps768k => 768_000,
            SampleRate::Sps1536k => 1_536_000,
        }
    }

    /// Code carried in the payload of a set-rate control word (0-6).
    pub const fn code(self) -> u32 {
        match self {
            SampleRate::Sps24k => 0,
            SampleRate::Sps48k => 1,
            SampleRate::Sps96k => 2,
            SampleRate::Sps192k => 3,
            SampleRate::Sps384k => 4,
            SampleRate::Sps768k => 5,
            SampleRate::Sps1536k => 6,
        }
    }
}

impl From<SampleRate> for Hertz {
    fn from(rate: SampleRate) -> Self {
        Hertz(rate.hz())
    }
}

/// Layout of one sample unit on the data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleEncoding {
    /// Little-endian f32 I followed by f32 Q (8 bytes).
    #[default]
    F32Pair,
    /// Little-endian i16 I followed by i16 Q (4 bytes).
    I16Pair,
}

impl SampleEncoding {
    /// Width in bytes of one complete sample unit.
    pub const fn unit_width(self) -> usize {
        match self {
            SampleEncoding::F32Pair => 8,
            SampleEncoding::I16Pair => 4,
        }
    }
}

impl std::fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleEncoding::F32Pair => write!(f, "f32-pair"),
            SampleEncoding::I16Pair => write!(f, "i16-pair"),
        }
    }
}

/// What the engine forwards to the consumer for each read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Decoded complex samples.
    #[default]
    Samples,
    /// Sample-aligned raw bytes, left undecoded.
    Raw,
}

/// Everything needed to bring up and configure one device session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Device host name or IP address.
    pub address: String,
    /// TCP port shared by the control and data channels.
    pub port: u16,
    /// Requested center frequency, before correction.
    pub center_frequency: Hertz,
    /// Requested sample rate; must be one of [`SampleRate::ALL`].
    pub sample_rate: Hertz,
    /// Oscillator correction applied to the center frequency.
    pub correction: Ppm,
    /// Wire layout of the data stream.
    pub encoding: SampleEncoding,
    /// Upper bound for a single read from the data channel, at most
    /// [`SessionConfig::MAX_READ_BATCH_SIZE`].
    pub read_batch_size: usize,
    /// Limit on establishing each TCP connection.
    pub connect_timeout: Duration,
    /// Limit on a single data read; `None` blocks until data or close.
    pub read_timeout: Option<Duration>,
    pub delivery: Delivery,
}

impl SessionConfig {
    /// Largest single read from the data channel; larger batch sizes are
    /// clamped to this.
    pub const MAX_READ_BATCH_SIZE: usize = 1 << 20;
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: "192.168.178.64".to_string(),
            port: 1001,
            center_frequency: Hertz::mhz(100),
            sample_rate: SampleRate::Sps768k.into(),
            correction: Ppm::ZERO,
            encoding: SampleEncoding::F32Pair,
            read_batch_size: 16_384,
            connect_timeout: Duration::from_secs(5),
            read_timeout: None,
            delivery: Delivery::Samples,
        }
    }
}

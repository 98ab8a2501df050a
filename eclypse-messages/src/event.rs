use crate::{EngineState, Hertz, IqSample, SampleEncoding};

/// Events sent from the engine to the consumer.
#[derive(Debug)]
pub enum Event {
    /// Sent once the session is configured, before any data.
    StateSnapshot(EngineState),
    /// Decoded samples from one read of the data channel.
    Samples(SampleBatch),
    /// Sample-aligned bytes from one read of the data channel.
    Raw(RawBatch),
    /// The device closed the data channel.
    EndOfStream,
    /// The session failed; the engine will not stream again until reconfigured.
    Error(String),
}

/// A batch of decoded samples plus what is needed to interpret them.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    pub samples: Vec<IqSample>,
    pub encoding: SampleEncoding,
    pub sample_rate: Hertz,
}

/// Whole sample units, still in their wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBatch {
    pub bytes: Vec<u8>,
    pub encoding: SampleEncoding,
    pub sample_rate: Hertz,
}

impl RawBatch {
    /// Number of complete sample units in the batch.
    pub fn sample_count(&self) -> usize {
        self.bytes.len() / self.encoding.unit_width()
    }
}

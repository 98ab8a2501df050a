//! Error types for the Eclypse engine.
//!
//! Configuration-time validation failures (`UnsupportedSampleRate`,
//! `FrequencyOutOfRange`, `PayloadOverflow`) are local and never retried.
//! Transport failures close the owning channel before they are returned.
//! Peer close on the data channel is not an error; see
//! [`Batch::is_end_of_stream`](crate::data::Batch::is_end_of_stream).

use eclypse_messages::SessionState;

use crate::link::ChannelRole;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The TCP connection for a channel could not be established.
    #[error("failed to connect {role} channel to {addr}: {source}")]
    Connect {
        role: ChannelRole,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The 4-byte role selector was not fully written.
    #[error("{role} channel handshake with {addr} failed: {source}")]
    Handshake {
        role: ChannelRole,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The rate has no code in the device's rate table.
    #[error("unsupported sample rate: {0} S/s (expected 24k, 48k, 96k, 192k, 384k, 768k or 1536k)")]
    UnsupportedSampleRate(u64),

    /// The corrected frequency does not fit the 28-bit payload.
    #[error("frequency {requested} Hz corrects to {corrected} Hz, outside the 28-bit payload range")]
    FrequencyOutOfRange { requested: u64, corrected: f64 },

    /// A control payload needs more than 28 bits.
    #[error("control payload {0:#x} does not fit in 28 bits")]
    PayloadOverflow(u32),

    /// A control word could not be written.
    #[error("failed to send control word {word:#010x}: {source}")]
    Command {
        word: u32,
        #[source]
        source: std::io::Error,
    },

    /// The data channel failed mid-stream.
    #[error("data channel read failed: {0}")]
    StreamRead(#[source] std::io::Error),

    /// No data arrived within the configured read timeout.
    #[error("timeout waiting for data")]
    Timeout,

    /// The channel was already closed.
    #[error("not connected")]
    NotConnected,

    /// The session is not in a state that allows the operation.
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

impl Error {
    /// True for local validation failures that only a corrected
    /// configuration can fix.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedSampleRate(_)
                | Error::FrequencyOutOfRange { .. }
                | Error::PayloadOverflow(_)
        )
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

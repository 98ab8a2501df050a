use crate::{Hertz, Ppm, SampleEncoding};

/// Lifecycle of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    /// Both channels are open and the handshakes were sent.
    Connected,
    /// Frequency and sample rate were sent on the control channel.
    Configured,
    /// The data channel is being read.
    Streaming,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::Configured => "configured",
            SessionState::Streaming => "streaming",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Snapshot of what the engine has pushed to the device.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub session: SessionState,
    /// Requested center frequency
    pub center_frequency: Hertz,
    /// Frequency actually written to the control channel, after correction
    pub tuned_frequency: Hertz,
    pub correction: Ppm,
    pub sample_rate: Hertz,
    pub encoding: SampleEncoding,
}

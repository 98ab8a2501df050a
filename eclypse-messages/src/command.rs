use crate::SessionConfig;

/// Commands sent from the consumer to the engine.
#[derive(Debug)]
pub enum Command {
    /// Cancel streaming, close the session and terminate the engine.
    Stop,
    /// Replace the session configuration. The engine cancels the current
    /// stream, closes both channels and reconnects with the new settings.
    Reconfigure(SessionConfig),
}

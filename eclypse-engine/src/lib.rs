//! Control and streaming client for the Eclypse SDR front end.
//!
//! The device is reached over two TCP connections to the same port: a
//! control channel that takes 4-byte configuration commands, and a data
//! channel that streams raw IQ samples. [`DeviceSession`] brings both up,
//! pushes frequency and sample rate, and exposes the data as a lazy
//! [`SampleStream`]. [`Engine`] runs sessions on a worker thread behind
//! flume command and event channels.

pub mod codec;
pub mod control;
pub mod data;
mod engine;
pub mod error;
pub mod link;
pub mod session;
pub mod stream;

pub use control::ControlChannel;
pub use data::{Batch, DataChannel, FrameBuffer, RawFrames};
pub use engine::Engine;
pub use error::{Error, Result};
pub use session::DeviceSession;
pub use stream::{CancelToken, RawFrameStream, SampleStream};

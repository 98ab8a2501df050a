//! Plain data shared between the Eclypse engine and whatever consumes it.

mod command;
mod config;
mod event;
mod state;
mod units;

pub use command::Command;
pub use config::{Delivery, SampleEncoding, SampleRate, SessionConfig};
pub use event::{Event, RawBatch, SampleBatch};
pub use state::{EngineState, SessionState};
pub use units::{Hertz, Ppm};

/// One decoded IQ sample: `re` is I, `im` is Q.
pub type IqSample = num_complex::Complex<f32>;

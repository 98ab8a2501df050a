//! One device session: control channel, data channel and their lifecycle.
//!
//! ```text
//! connect -> Connected -> configure -> Configured -> stream -> Streaming
//!                \______________________________________________\-> close -> Closed
//! ```

use eclypse_messages::{
    EngineState, Hertz, Ppm, SampleEncoding, SampleRate, SessionConfig, SessionState,
};
use log::{info, warn};

use crate::codec;
use crate::control::ControlChannel;
use crate::data::DataChannel;
use crate::error::{Error, Result};
use crate::stream::{self, CancelToken, RawFrameStream, SampleStream};

/// A connected Eclypse front end.
///
/// Sessions are never shared: the control channel has a single writer and
/// the data channel a single reader.
#[derive(Debug)]
pub struct DeviceSession {
    pub(crate) state: SessionState,
    pub(crate) control: ControlChannel,
    pub(crate) data: DataChannel,
    tuned_frequency: Option<Hertz>,
    sample_rate: Option<SampleRate>,
}

impl DeviceSession {
    /// Open the control channel, then the data channel.
    ///
    /// If the data channel cannot be opened the control channel is closed
    /// before the error is returned.
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        info!(
            "Connecting to Eclypse at {}:{} ({})",
            config.address, config.port, config.encoding
        );
        let mut control =
            ControlChannel::open(&config.address, config.port, config.connect_timeout)?;

        let mut data = match DataChannel::open(
            &config.address,
            config.port,
            config.encoding,
            config.connect_timeout,
        ) {
            Ok(data) => data,
            Err(e) => {
                control.close();
                return Err(e);
            }
        };

        if let Some(timeout) = config.read_timeout
            && let Err(e) = data.set_read_timeout(Some(timeout))
        {
            control.close();
            data.close();
            return Err(e);
        }

        Ok(Self {
            state: SessionState::Connected,
            control,
            data,
            tuned_frequency: None,
            sample_rate: None,
        })
    }

    /// Tune and set the sample rate.
    ///
    /// Both commands are validated before anything is sent. On any failure
    /// both channels are closed and the session stays `Connected`; it has to
    /// be reconnected before it can be used again.
    pub fn configure(&mut self, frequency: Hertz, rate: Hertz, correction: Ppm) -> Result<()> {
        if self.state != SessionState::Connected {
            return Err(Error::InvalidState {
                operation: "configure",
                state: self.state,
            });
        }
        if !self.control.is_open() || !self.data.is_open() {
            return Err(Error::NotConnected);
        }

        match self.push_configuration(frequency, rate, correction) {
            Ok(()) => {
                self.state = SessionState::Configured;
                Ok(())
            }
            Err(e) => {
                warn!("Configuration failed, closing session: {}", e);
                self.control.close();
                self.data.close();
                Err(e)
            }
        }
    }

    /// [`configure`](Self::configure) from the tuning fields of `config`.
    pub fn configure_from(&mut self, config: &SessionConfig) -> Result<()> {
        self.configure(config.center_frequency, config.sample_rate, config.correction)
    }

    fn push_configuration(&mut self, frequency: Hertz, rate: Hertz, correction: Ppm) -> Result<()> {
        let sample_rate =
            SampleRate::from_hz(rate.as_hz()).ok_or(Error::UnsupportedSampleRate(rate.as_hz()))?;
        let tuned = codec::corrected_frequency(frequency, correction)?;

        self.control.set_frequency(frequency, correction)?;
        self.control.set_rate(rate)?;

        self.tuned_frequency = Some(Hertz(u64::from(tuned)));
        self.sample_rate = Some(sample_rate);
        info!(
            "Configured: {} ({}) -> {}, {} S/s",
            frequency,
            correction,
            Hertz(u64::from(tuned)),
            sample_rate.hz()
        );
        Ok(())
    }

    /// Start pulling decoded samples, reading at most `max_bytes` per read.
    pub fn stream(&mut self, max_bytes: usize) -> Result<SampleStream<'_>> {
        self.stream_until(max_bytes, CancelToken::new())
    }

    /// Like [`stream`](Self::stream), stopped when `cancel` fires.
    pub fn stream_until(&mut self, max_bytes: usize, cancel: CancelToken) -> Result<SampleStream<'_>> {
        stream::ensure_streamable(self)?;
        Ok(SampleStream::new(self, max_bytes, cancel))
    }

    /// Start pulling sample-aligned raw bytes.
    pub fn raw_stream(&mut self, max_bytes: usize) -> Result<RawFrameStream<'_>> {
        self.raw_stream_until(max_bytes, CancelToken::new())
    }

    pub fn raw_stream_until(
        &mut self,
        max_bytes: usize,
        cancel: CancelToken,
    ) -> Result<RawFrameStream<'_>> {
        stream::ensure_streamable(self)?;
        Ok(RawFrameStream::new(self, max_bytes, cancel))
    }

    /// Close both channels. Safe to call in any state, and more than once.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            info!("Closing session in state {}", self.state);
        }
        self.control.close();
        self.data.close();
        self.state = SessionState::Closed;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn encoding(&self) -> SampleEncoding {
        self.data.encoding()
    }

    /// Frequency written to the device, after correction.
    pub fn tuned_frequency(&self) -> Option<Hertz> {
        self.tuned_frequency
    }

    /// Nominal rate of the sample stream once configured.
    pub fn sample_rate(&self) -> Option<SampleRate> {
        self.sample_rate
    }

    /// Describe this session for a consumer.
    pub fn snapshot(&self, config: &SessionConfig) -> EngineState {
        EngineState {
            session: self.state,
            center_frequency: config.center_frequency,
            tuned_frequency: self.tuned_frequency.unwrap_or_default(),
            correction: config.correction,
            sample_rate: self
                .sample_rate
                .map(Hertz::from)
                .unwrap_or(config.sample_rate),
            encoding: self.encoding(),
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            self.close();
        }
    }
}

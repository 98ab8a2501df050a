//! Control channel: the socket that carries configuration commands.
//!
//! Commands are fire-and-forget. The device sends no acknowledgement, and
//! TCP's in-order delivery is the only ordering guarantee. A
//! `ControlChannel` has a single-writer contract: callers that share one
//! across threads must serialize sends themselves.

use eclypse_messages::{Hertz, Ppm};
use log::{debug, error, info, trace};
use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;

use crate::codec::{self, ControlWord};
use crate::error::{Error, Result};
use crate::link::{self, ChannelRole};

#[derive(Debug)]
pub struct ControlChannel {
    /// `None` after `close()` or a failed send.
    stream: Option<TcpStream>,
    addr: String,
}

impl ControlChannel {
    /// Connect and identify this socket as the control channel.
    pub fn open(address: &str, port: u16, timeout: Duration) -> Result<Self> {
        let stream = link::open(address, port, ChannelRole::Control, timeout)?;
        Ok(Self {
            stream: Some(stream),
            addr: format!("{}:{}", address, port),
        })
    }

    /// Tune to `frequency` corrected by `correction`.
    ///
    /// Returns the word that was sent. Validation failures leave the
    /// channel open; transport failures close it.
    pub fn set_frequency(&mut self, frequency: Hertz, correction: Ppm) -> Result<ControlWord> {
        let word = codec::encode_frequency(frequency, correction)?;
        debug!(
            "Setting frequency {} ({}) -> payload {} Hz",
            frequency,
            correction,
            word.payload()
        );
        self.send(word)?;
        Ok(word)
    }

    /// Select one of the supported sample rates.
    pub fn set_rate(&mut self, rate: Hertz) -> Result<ControlWord> {
        let word = codec::encode_rate(rate)?;
        debug!("Setting sample rate {} -> code {}", rate, word.payload());
        self.send(word)?;
        Ok(word)
    }

    /// Write one control word.
    pub fn send(&mut self, word: ControlWord) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        trace!("Sending control word {} to {}", word, self.addr);

        if let Err(source) = stream.write_all(&word.to_le_bytes()) {
            error!(
                "Failed to send control word {} to {}: {}",
                word, self.addr, source
            );
            self.close();
            return Err(Error::Command {
                word: word.value(),
                source,
            });
        }
        Ok(())
    }

    /// Close the connection. Calling it again is a no-op.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            link::shutdown(&stream, ChannelRole::Control, &self.addr);
            info!("control channel to {} closed", self.addr);
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        if self.stream.is_some() {
            debug!("ControlChannel to {} dropped while open, closing", self.addr);
            self.close();
        }
    }
}

//! Data channel: the socket the device streams sample bytes on.
//!
//! TCP gives no guarantee that a read ends on a sample boundary. Whatever
//! is left over after decoding is kept in a [`FrameBuffer`] and put in
//! front of the next read, so alignment survives any segmentation.

use eclypse_messages::{IqSample, SampleEncoding, SessionConfig};
use log::{debug, error, info, trace, warn};
use std::io::{ErrorKind, Read};
use std::net::TcpStream;
use std::time::Duration;

use crate::codec;
use crate::error::{Error, Result};
use crate::link::{self, ChannelRole};

/// Bytes that have not yet formed a whole sample unit.
///
/// After every `decode` or `take_frames` the residue is shorter than one
/// unit.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    encoding: SampleEncoding,
    residue: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(encoding: SampleEncoding) -> Self {
        Self {
            encoding,
            residue: Vec::with_capacity(encoding.unit_width()),
        }
    }

    pub fn encoding(&self) -> SampleEncoding {
        self.encoding
    }

    pub fn residue(&self) -> &[u8] {
        &self.residue
    }

    /// Append `bytes` and decode every sample that is now complete.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<IqSample> {
        if self.residue.is_empty() {
            let (samples, rest) = codec::decode_samples(bytes, self.encoding);
            self.residue.extend_from_slice(rest);
            return samples;
        }

        self.residue.extend_from_slice(bytes);
        let (samples, rest) = codec::decode_samples(&self.residue, self.encoding);
        let consumed = self.residue.len() - rest.len();
        self.residue.drain(..consumed);
        samples
    }

    /// Append `bytes` and split off every complete unit, still encoded.
    pub fn take_frames(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.residue.extend_from_slice(bytes);
        let width = self.encoding.unit_width();
        let whole = self.residue.len() - self.residue.len() % width;
        let tail = self.residue.split_off(whole);
        std::mem::replace(&mut self.residue, tail)
    }

    pub fn clear(&mut self) {
        self.residue.clear();
    }
}

/// Samples decoded from one read.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub samples: Vec<IqSample>,
    /// Bytes taken from the socket by this read; `0` means the peer closed.
    pub bytes_read: usize,
}

impl Batch {
    pub fn is_end_of_stream(&self) -> bool {
        self.bytes_read == 0
    }
}

/// Whole sample units from one read, left in wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrames {
    pub bytes: Vec<u8>,
    pub bytes_read: usize,
}

impl RawFrames {
    pub fn is_end_of_stream(&self) -> bool {
        self.bytes_read == 0
    }
}

/// The FrameBuffer is owned here and never shared, so a `DataChannel`
/// must be read from one thread at a time.
#[derive(Debug)]
pub struct DataChannel {
    stream: Option<TcpStream>,
    addr: String,
    frames: FrameBuffer,
    scratch: Vec<u8>,
}

impl DataChannel {
    /// Connect and identify this socket as the data channel.
    pub fn open(
        address: &str,
        port: u16,
        encoding: SampleEncoding,
        timeout: Duration,
    ) -> Result<Self> {
        let stream = link::open(address, port, ChannelRole::Data, timeout)?;
        Ok(Self {
            stream: Some(stream),
            addr: format!("{}:{}", address, port),
            frames: FrameBuffer::new(encoding),
            scratch: Vec::new(),
        })
    }

    /// Bound each blocking read. `None` waits indefinitely.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        let stream = self.stream.as_ref().ok_or(Error::NotConnected)?;
        stream.set_read_timeout(timeout).map_err(Error::StreamRead)
    }

    /// Do one blocking read of up to `max_bytes` (capped at
    /// [`SessionConfig::MAX_READ_BATCH_SIZE`]) and decode what is complete.
    ///
    /// A batch with `bytes_read == 0` means the device closed the stream;
    /// the channel is closed at that point and further reads fail with
    /// [`Error::NotConnected`]. A read shorter than one unit returns no
    /// samples and its bytes are carried into the next call.
    pub fn read_batch(&mut self, max_bytes: usize) -> Result<Batch> {
        let n = self.fill(max_bytes)?;
        let samples = self.frames.decode(&self.scratch[..n]);
        trace!(
            "{}: read {} bytes, decoded {} samples, residue {}",
            self.addr,
            n,
            samples.len(),
            self.frames.residue().len()
        );
        Ok(Batch {
            samples,
            bytes_read: n,
        })
    }

    /// Like [`read_batch`](Self::read_batch), but hands back whole sample
    /// units undecoded.
    pub fn read_frames(&mut self, max_bytes: usize) -> Result<RawFrames> {
        let n = self.fill(max_bytes)?;
        let bytes = self.frames.take_frames(&self.scratch[..n]);
        trace!(
            "{}: read {} bytes, {} aligned, residue {}",
            self.addr,
            n,
            bytes.len(),
            self.frames.residue().len()
        );
        Ok(RawFrames {
            bytes,
            bytes_read: n,
        })
    }

    /// Read into `scratch`, returning the byte count (`0` at end of stream).
    fn fill(&mut self, max_bytes: usize) -> Result<usize> {
        // A zero-length read would be indistinguishable from peer close.
        let max_bytes = max_bytes.clamp(1, SessionConfig::MAX_READ_BATCH_SIZE);
        if self.scratch.len() < max_bytes {
            self.scratch.resize(max_bytes, 0);
        }
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        loop {
            match stream.read(&mut self.scratch[..max_bytes]) {
                Ok(0) => {
                    info!("{}: device closed the data stream", self.addr);
                    if !self.frames.residue().is_empty() {
                        warn!(
                            "{}: discarding {} bytes of incomplete sample",
                            self.addr,
                            self.frames.residue().len()
                        );
                    }
                    self.close();
                    return Ok(0);
                }
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    debug!("{}: read timed out", self.addr);
                    return Err(Error::Timeout);
                }
                Err(e) => {
                    error!("{}: data read failed: {}", self.addr, e);
                    self.close();
                    return Err(Error::StreamRead(e));
                }
            }
        }
    }

    /// Close the connection and drop any residue. Calling it again is a no-op.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            link::shutdown(&stream, ChannelRole::Data, &self.addr);
            self.frames.clear();
            info!("data channel to {} closed", self.addr);
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn encoding(&self) -> SampleEncoding {
        self.frames.encoding()
    }

    /// Bytes waiting for the rest of their sample unit.
    pub fn residue_len(&self) -> usize {
        self.frames.residue().len()
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// A second handle on the socket, used to unblock a pending read.
    pub(crate) fn try_clone_socket(&self) -> Option<TcpStream> {
        let stream = self.stream.as_ref()?;
        match stream.try_clone() {
            Ok(clone) => Some(clone),
            Err(e) => {
                warn!("{}: failed to clone data socket: {}", self.addr, e);
                None
            }
        }
    }
}

impl Drop for DataChannel {
    fn drop(&mut self) {
        if self.stream.is_some() {
            debug!("DataChannel to {} dropped while open, closing", self.addr);
            self.close();
        }
    }
}

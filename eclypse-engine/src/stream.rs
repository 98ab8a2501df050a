//! Lazy sample sequences pulled from a configured session.
//!
//! A stream runs until the device closes the data channel, a read fails,
//! or its [`CancelToken`] fires. It cannot be restarted: once it is done
//! the session has to be closed and connected again.

use eclypse_messages::{IqSample, SessionState};
use log::{debug, info};
use std::marker::PhantomData;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::data::DataChannel;
use crate::error::{Error, Result};
use crate::link::{self, ChannelRole};
use crate::session::DeviceSession;

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    socket: Mutex<Option<TcpStream>>,
}

/// Cloneable handle that stops a stream from any thread.
///
/// Cancelling also shuts down the data socket the stream reads from, so a
/// read blocked waiting for the device returns straight away.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            debug!("Stream cancellation requested");
        }
        let socket = self
            .inner
            .socket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(socket) = socket {
            link::shutdown(&socket, ChannelRole::Data, "cancelled stream");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Register the socket to shut down on cancel. If the token already
    /// fired, the socket is shut down immediately.
    pub(crate) fn attach(&self, socket: TcpStream) {
        let mut slot = self
            .inner
            .socket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.is_cancelled() {
            link::shutdown(&socket, ChannelRole::Data, "cancelled stream");
        } else {
            *slot = Some(socket);
        }
    }
}

/// How a stream turns one read into one item.
pub trait Framing {
    type Batch;

    /// `Ok(None)` at end of stream.
    fn pull(data: &mut DataChannel, max_bytes: usize) -> Result<Option<Self::Batch>>;

    fn is_empty(batch: &Self::Batch) -> bool;
}

/// Items are decoded samples.
#[derive(Debug)]
pub struct Decoded;

impl Framing for Decoded {
    type Batch = Vec<IqSample>;

    fn pull(data: &mut DataChannel, max_bytes: usize) -> Result<Option<Self::Batch>> {
        let batch = data.read_batch(max_bytes)?;
        Ok((!batch.is_end_of_stream()).then_some(batch.samples))
    }

    fn is_empty(batch: &Self::Batch) -> bool {
        batch.is_empty()
    }
}

/// Items are whole sample units in wire encoding.
#[derive(Debug)]
pub struct Undecoded;

impl Framing for Undecoded {
    type Batch = Vec<u8>;

    fn pull(data: &mut DataChannel, max_bytes: usize) -> Result<Option<Self::Batch>> {
        let frames = data.read_frames(max_bytes)?;
        Ok((!frames.is_end_of_stream()).then_some(frames.bytes))
    }

    fn is_empty(batch: &Self::Batch) -> bool {
        batch.is_empty()
    }
}

/// Iterator over batches read from a session's data channel.
///
/// Reads that complete no sample unit are not yielded; their bytes are
/// carried into the next read. The first error ends the sequence, and
/// cancellation ends it without an error.
pub struct SampleStream<'s, F: Framing = Decoded> {
    session: &'s mut DeviceSession,
    max_bytes: usize,
    cancel: CancelToken,
    started: bool,
    finished: bool,
    _framing: PhantomData<F>,
}

/// A stream of sample-aligned raw bytes.
pub type RawFrameStream<'s> = SampleStream<'s, Undecoded>;

impl<'s, F: Framing> SampleStream<'s, F> {
    /// Creating a stream uses up the session's one chance to stream, even
    /// if the stream is cancelled before its first pull.
    pub(crate) fn new(session: &'s mut DeviceSession, max_bytes: usize, cancel: CancelToken) -> Self {
        session.state = SessionState::Streaming;
        if let Some(socket) = session.data.try_clone_socket() {
            cancel.attach(socket);
        }
        Self {
            session,
            max_bytes,
            cancel,
            started: false,
            finished: false,
            _framing: PhantomData,
        }
    }

    /// A handle that cancels this stream from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn finish(&mut self) -> Option<Result<F::Batch>> {
        self.finished = true;
        None
    }
}

impl<F: Framing> Iterator for SampleStream<'_, F> {
    type Item = Result<F::Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.cancel.is_cancelled() {
            debug!("Stream cancelled");
            return self.finish();
        }
        if !self.started {
            self.started = true;
            info!(
                "Streaming {} from {}",
                self.session.data.encoding(),
                self.session.data.addr()
            );
        }

        loop {
            match F::pull(&mut self.session.data, self.max_bytes) {
                Ok(Some(batch)) if F::is_empty(&batch) => {
                    if self.cancel.is_cancelled() {
                        return self.finish();
                    }
                }
                Ok(Some(batch)) => return Some(Ok(batch)),
                Ok(None) => {
                    if !self.cancel.is_cancelled() {
                        info!("End of stream from {}", self.session.data.addr());
                    }
                    return self.finish();
                }
                Err(e) => {
                    self.finished = true;
                    // A shutdown from cancel() can surface as a read error.
                    if self.cancel.is_cancelled() {
                        return None;
                    }
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<F: Framing> std::iter::FusedIterator for SampleStream<'_, F> {}

/// Check that `session` may start streaming.
pub(crate) fn ensure_streamable(session: &DeviceSession) -> Result<()> {
    if session.state != SessionState::Configured {
        return Err(Error::InvalidState {
            operation: "stream",
            state: session.state,
        });
    }
    if !session.data.is_open() {
        return Err(Error::NotConnected);
    }
    Ok(())
}

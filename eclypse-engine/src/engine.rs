use anyhow::Result;
use eclypse_messages::{Command, Delivery, Event, RawBatch, SampleBatch, SessionConfig};
use flume::{Receiver, SendTimeoutError, Sender};
use log::{debug, error, info};
use std::thread;
use std::time::Duration;

use crate::session::DeviceSession;
use crate::stream::CancelToken;

/// How often the command loop checks on the session thread.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The streaming engine.
/// Runs one device session at a time on a worker thread and processes
/// commands from the consumer.
pub struct Engine {
    cmd_rx: Receiver<Command>,
    event_tx: Sender<Event>,
    current_config: SessionConfig,
    should_exit: bool,
}

impl Engine {
    /// Create a new Engine instance.
    pub fn new(cmd_rx: Receiver<Command>, event_tx: Sender<Event>, config: SessionConfig) -> Self {
        debug!("Constructing a new engine");
        Self {
            cmd_rx,
            event_tx,
            current_config: config,
            should_exit: false,
        }
    }

    /// Run the engine (blocking).
    /// Each iteration is one session; `Reconfigure` starts the next one.
    pub fn run(mut self) -> Result<()> {
        while !self.should_exit {
            self.run_session_iteration()?;
        }
        Ok(())
    }

    fn run_session_iteration(&mut self) -> Result<()> {
        let cancel = CancelToken::new();
        let config = self.current_config.clone();
        let event_tx = self.event_tx.clone();
        let token = cancel.clone();

        let session_handle = thread::spawn(move || stream_session(&config, &event_tx, &token));

        self.process_commands(&cancel, &session_handle);

        session_handle
            .join()
            .map_err(|_| anyhow::anyhow!("Session thread panicked"))
    }

    fn process_commands(&mut self, cancel: &CancelToken, session_handle: &thread::JoinHandle<()>) {
        loop {
            let msg = self.cmd_rx.recv_timeout(POLL_INTERVAL);

            match msg {
                Ok(Command::Stop) | Err(flume::RecvTimeoutError::Disconnected) => {
                    debug!("Engine stopping");
                    self.should_exit = true;
                    cancel.cancel();
                    break;
                }
                Ok(Command::Reconfigure(new_config)) => {
                    debug!("Engine reconfiguring: {:?}", new_config);
                    self.current_config = new_config;
                    cancel.cancel();
                    break;
                }
                Err(flume::RecvTimeoutError::Timeout) => {
                    if session_handle.is_finished() {
                        // Nothing is streaming; wait for the consumer to decide.
                        self.await_command();
                        break;
                    }
                }
            }
        }
    }

    fn await_command(&mut self) {
        match self.cmd_rx.recv() {
            Ok(Command::Reconfigure(new_config)) => {
                debug!("Engine reconfiguring after session end: {:?}", new_config);
                self.current_config = new_config;
            }
            Ok(Command::Stop) | Err(_) => self.should_exit = true,
        }
    }
}

/// Body of the session thread. Failures are reported as events, never
/// returned, unless the session was cancelled.
fn stream_session(config: &SessionConfig, event_tx: &Sender<Event>, cancel: &CancelToken) {
    if let Err(e) = run_session(config, event_tx, cancel) {
        if cancel.is_cancelled() {
            debug!("Session cancelled: {}", e);
            return;
        }
        error!("Session failed: {}", e);
        deliver(event_tx, Event::Error(e.to_string()), cancel);
    }
}

fn run_session(
    config: &SessionConfig,
    event_tx: &Sender<Event>,
    cancel: &CancelToken,
) -> crate::Result<()> {
    let mut session = DeviceSession::connect(config)?;
    if cancel.is_cancelled() {
        return Ok(());
    }
    session.configure_from(config)?;

    if !deliver(event_tx, Event::StateSnapshot(session.snapshot(config)), cancel) {
        return Ok(());
    }

    let sample_rate = session.snapshot(config).sample_rate;
    let encoding = config.encoding;

    match config.delivery {
        Delivery::Samples => {
            for batch in session.stream_until(config.read_batch_size, cancel.clone())? {
                let event = Event::Samples(SampleBatch {
                    samples: batch?,
                    encoding,
                    sample_rate,
                });
                if !deliver(event_tx, event, cancel) {
                    return Ok(());
                }
            }
        }
        Delivery::Raw => {
            for frames in session.raw_stream_until(config.read_batch_size, cancel.clone())? {
                let event = Event::Raw(RawBatch {
                    bytes: frames?,
                    encoding,
                    sample_rate,
                });
                if !deliver(event_tx, event, cancel) {
                    return Ok(());
                }
            }
        }
    }

    if !cancel.is_cancelled() {
        deliver(event_tx, Event::EndOfStream, cancel);
    }
    session.close();
    Ok(())
}

/// Blocking send that gives up once the consumer is gone or the session
/// is cancelled. Returns whether the event was delivered.
fn deliver(event_tx: &Sender<Event>, event: Event, cancel: &CancelToken) -> bool {
    let mut event = event;
    loop {
        match event_tx.send_timeout(event, POLL_INTERVAL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(pending)) => {
                if cancel.is_cancelled() {
                    return false;
                }
                event = pending;
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                info!("Event receiver dropped, stopping session");
                cancel.cancel();
                return false;
            }
        }
    }
}

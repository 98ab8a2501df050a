//! A scripted stand-in for the Eclypse front end, plus synthetic signals.

#![allow(dead_code)]

use std::f32::consts::PI;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use eclypse_engine::codec::{self, ControlWord};
use eclypse_messages::{IqSample, SampleEncoding, SessionConfig};

/// Fake device listening on a random localhost port.
///
/// It accepts one control and one data connection (in either order, told
/// apart by their handshake), forwards every control word it receives to
/// `commands`, and writes `chunks` on the data connection one by one.
/// How the fake device ends its data connection once the chunks are out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataEnd {
    Close,
    HoldOpen,
    /// Hold open until released, then abort the connection so the client
    /// sees a reset instead of an orderly close.
    Reset,
}

pub struct FakeDevice {
    pub port: u16,
    /// Control words received after the handshake. Disconnects once the
    /// client closes the control channel.
    pub commands: flume::Receiver<u32>,
    release: Option<flume::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl FakeDevice {
    /// Send `chunks`, then close the data connection.
    pub fn start(chunks: Vec<Vec<u8>>) -> Self {
        Self::spawn(chunks, DataEnd::Close)
    }

    /// Send `chunks`, then keep the data connection open until
    /// [`release`](Self::release) is called or the device is dropped.
    pub fn start_open(chunks: Vec<Vec<u8>>) -> Self {
        Self::spawn(chunks, DataEnd::HoldOpen)
    }

    /// Send `chunks`, then reset the data connection once
    /// [`release`](Self::release) is called.
    pub fn start_reset(chunks: Vec<Vec<u8>>) -> Self {
        Self::spawn(chunks, DataEnd::Reset)
    }

    fn spawn(chunks: Vec<Vec<u8>>, end: DataEnd) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (cmd_tx, cmd_rx) = flume::unbounded::<u32>();
        let (release_tx, release_rx) = flume::bounded::<()>(1);

        let handle = thread::spawn(move || {
            let (first, first_role) = accept_with_role(&listener);
            let (second, second_role) = accept_with_role(&listener);
            assert_ne!(first_role, second_role, "both sockets sent the same role");
            let (mut control, mut data) = if first_role == 0 {
                (first, second)
            } else {
                (second, first)
            };

            consume_handshake(&mut control);
            // Closing a socket with unread bytes makes the kernel send a
            // reset, so a resetting device leaves the handshake in place.
            if end != DataEnd::Reset {
                consume_handshake(&mut data);
            }

            thread::spawn(move || record_commands(control, cmd_tx));

            for chunk in chunks {
                if data.write_all(&chunk).is_err() {
                    return;
                }
                let _ = data.flush();
                thread::sleep(Duration::from_millis(2));
            }

            if end != DataEnd::Close {
                // Returns on release or once the sender is dropped.
                let _ = release_rx.recv();
            }
        });

        Self {
            port,
            commands: cmd_rx,
            release: Some(release_tx),
            handle: Some(handle),
        }
    }

    /// Session configuration pointing at this device.
    pub fn config(&self) -> SessionConfig {
        SessionConfig {
            address: "127.0.0.1".to_string(),
            port: self.port,
            connect_timeout: Duration::from_secs(2),
            ..SessionConfig::default()
        }
    }

    /// Let a `start_open` device close (or a `start_reset` device reset)
    /// its data connection.
    pub fn release(&mut self) {
        self.release.take();
    }

    /// Wait for the device thread to finish.
    pub fn join(mut self) {
        self.release.take();
        if let Some(handle) = self.handle.take() {
            handle.join().expect("fake device panicked");
        }
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.release.take();
    }
}

/// Accept a connection and look at its handshake without consuming it.
fn accept_with_role(listener: &TcpListener) -> (TcpStream, u32) {
    let (stream, _) = listener.accept().unwrap();
    let mut handshake = [0u8; 4];
    loop {
        let n = stream.peek(&mut handshake).unwrap();
        assert!(n > 0, "client closed before its handshake");
        if n == handshake.len() {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    (stream, u32::from_le_bytes(handshake))
}

fn consume_handshake(stream: &mut TcpStream) {
    let mut handshake = [0u8; 4];
    stream.read_exact(&mut handshake).unwrap();
}

fn record_commands(mut control: TcpStream, cmd_tx: flume::Sender<u32>) {
    let mut word = [0u8; 4];
    while control.read_exact(&mut word).is_ok() {
        if cmd_tx.send(ControlWord::from_le_bytes(word).value()).is_err() {
            break;
        }
    }
}

/// A complex tone, scaled so that it survives I16Pair encoding unchanged.
pub fn tone(frequency: f32, sample_rate: u32, num_samples: usize) -> Vec<IqSample> {
    let angular_freq = 2.0 * PI * frequency / sample_rate as f32;
    (0..num_samples)
        .map(|n| {
            let phase = angular_freq * n as f32;
            IqSample::new(
                (phase.cos() * 16_000.0).round(),
                (phase.sin() * 16_000.0).round(),
            )
        })
        .collect()
}

/// Split `bytes` into chunks of the given sizes; whatever remains becomes
/// the last chunk.
pub fn split_at_sizes(bytes: &[u8], sizes: &[usize]) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut rest = bytes;
    for &size in sizes {
        let size = size.min(rest.len());
        let (head, tail) = rest.split_at(size);
        chunks.push(head.to_vec());
        rest = tail;
    }
    if !rest.is_empty() {
        chunks.push(rest.to_vec());
    }
    chunks
}

pub fn encode(samples: &[IqSample], encoding: SampleEncoding) -> Vec<u8> {
    codec::encode_samples(samples, encoding)
}

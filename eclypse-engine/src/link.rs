//! TCP connection setup shared by both channels.
//!
//! The device listens on a single port. Right after connecting, the client
//! writes a little-endian `u32` that tells the device which role the socket
//! plays: `0` for control, `1` for data.

use log::{debug, error, info, warn};
use std::io::Write;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{Error, Result};

/// Role selected by the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRole {
    Control,
    Data,
}

impl ChannelRole {
    pub const fn selector(self) -> u32 {
        match self {
            ChannelRole::Control => 0,
            ChannelRole::Data => 1,
        }
    }

    pub const fn handshake_bytes(self) -> [u8; 4] {
        self.selector().to_le_bytes()
    }
}

impl std::fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelRole::Control => f.write_str("control"),
            ChannelRole::Data => f.write_str("data"),
        }
    }
}

/// Connect to `address:port` and send the handshake for `role`.
///
/// Every resolved address is tried in turn, each bounded by `timeout`.
/// The socket is dropped (and so closed) if the handshake fails.
pub(crate) fn open(
    address: &str,
    port: u16,
    role: ChannelRole,
    timeout: Duration,
) -> Result<TcpStream> {
    let addr = format!("{}:{}", address, port);
    debug!(
        "Connecting {} channel to {} (timeout {} ms)",
        role,
        addr,
        timeout.as_millis()
    );

    let connect_err = |source| Error::Connect {
        role,
        addr: addr.clone(),
        source,
    };

    let candidates: Vec<SocketAddr> = (address, port)
        .to_socket_addrs()
        .map_err(connect_err)?
        .collect();

    let mut last_err = std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "address resolved to nothing",
    );
    let mut stream = None;
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(s) => {
                stream = Some(s);
                break;
            }
            Err(e) => {
                debug!("{} channel: {} unreachable: {}", role, candidate, e);
                last_err = e;
            }
        }
    }
    let mut stream = stream.ok_or_else(|| {
        error!("{} channel connection to {} failed: {}", role, addr, last_err);
        connect_err(last_err)
    })?;

    // Control words are four bytes each; don't let Nagle sit on them.
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY on {} (continuing anyway): {}", addr, e);
    }

    stream
        .write_all(&role.handshake_bytes())
        .and_then(|()| stream.flush())
        .map_err(|source| {
            error!("{} channel handshake with {} failed: {}", role, addr, source);
            Error::Handshake {
                role,
                addr: addr.clone(),
                source,
            }
        })?;

    info!("{} channel connected to {}", role, addr);
    Ok(stream)
}

/// Shut down both directions, logging instead of failing.
pub(crate) fn shutdown(stream: &TcpStream, role: ChannelRole, addr: &str) {
    if let Err(e) = stream.shutdown(std::net::Shutdown::Both) {
        // NotConnected just means the peer got there first.
        if e.kind() != std::io::ErrorKind::NotConnected {
            warn!("Failed to shut down {} channel to {}: {}", role, addr, e);
        }
    }
}

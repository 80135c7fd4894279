//! Single-client TCP connection manager
//!
//! The server streams to at most one client. The state is an explicit
//! two-state machine:
//!
//! ```text
//!                 accept
//!  Disconnected ─────────► Connected
//!        ▲                     │
//!        └─────────────────────┘
//!   close / end of stream / client gone
//! ```
//!
//! The listener is non-blocking so the caller can keep servicing signals
//! while waiting for a client. The client socket itself is blocking, with a
//! write timeout, and is only switched to non-blocking for the duration of a
//! liveness check.

use crate::error::{Error, Result};
use log::{debug, info, trace, warn};
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

/// Result of a liveness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// No client is connected
    NoClient,
    /// Client is still there (no data, or data that was discarded)
    Alive,
    /// Client closed the connection in an orderly way
    Closed,
    /// Client socket is no longer usable
    Gone,
}

/// Outcome of one non-blocking read on the client socket
#[derive(Debug, PartialEq, Eq)]
enum ReadCheck {
    Idle,
    Discarded(usize),
    EndOfStream,
    Gone(ErrorKind),
}

fn classify(read: io::Result<usize>) -> io::Result<ReadCheck> {
    match read {
        Ok(0) => Ok(ReadCheck::EndOfStream),
        Ok(n) => Ok(ReadCheck::Discarded(n)),
        Err(e) => match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::Interrupted => Ok(ReadCheck::Idle),
            kind @ (ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected) => Ok(ReadCheck::Gone(kind)),
            _ => Err(e),
        },
    }
}

struct Client {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Client {
    /// One read without waiting, then back to blocking mode
    fn check_read(&mut self) -> io::Result<ReadCheck> {
        if let Err(e) = self.stream.set_nonblocking(true) {
            debug!("Failed to switch client socket to non-blocking: {}", e);
            return Ok(ReadCheck::Gone(e.kind()));
        }
        let mut buf = [0u8; 512];
        let read = self.stream.read(&mut buf);
        let restored = self.stream.set_nonblocking(false);

        let check = classify(read)?;
        match (&check, restored) {
            (ReadCheck::Idle | ReadCheck::Discarded(_), Err(e)) => {
                debug!("Failed to restore blocking mode: {}", e);
                Ok(ReadCheck::Gone(e.kind()))
            }
            _ => Ok(check),
        }
    }
}

enum ConnectionState {
    Disconnected,
    Connected(Client),
}

/// Listener plus at most one connected client
pub struct ConnectionManager {
    listener: TcpListener,
    state: ConnectionState,
    greeting: String,
    write_timeout: Option<Duration>,
}

impl ConnectionManager {
    /// Bind the listener
    ///
    /// # Arguments
    /// - `bind_address`: TCP bind address (e.g., "0.0.0.0:2600")
    /// - `greeting`: sent to every client right after it connects
    /// - `write_timeout`: bound on a single write to the client
    pub fn bind(bind_address: &str, greeting: &str, write_timeout: Option<Duration>) -> Result<Self> {
        let listener = TcpListener::bind(bind_address)
            .map_err(|e| Error::Other(format!("Failed to bind to {}: {}", bind_address, e)))?;
        listener.set_nonblocking(true)?;
        info!("TCP server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            state: ConnectionState::Disconnected,
            greeting: greeting.to_string(),
            write_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected(_))
    }

    /// Address of the connected client
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        match &self.state {
            ConnectionState::Connected(client) => Some(client.peer),
            ConnectionState::Disconnected => None,
        }
    }

    /// Accept a pending client while disconnected
    ///
    /// Returns `true` when a client was accepted. Returns `false` when
    /// already connected or nobody is waiting.
    pub fn try_accept(&mut self) -> Result<bool> {
        if self.is_connected() {
            return Ok(false);
        }

        let (stream, peer) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if is_transient_accept_error(&e) => return Ok(false),
            Err(e) => return Err(Error::Other(format!("Accept error: {}", e))),
        };

        if let Err(e) = self.prepare(&stream) {
            warn!("Failed to set up client {}: {}", peer, e);
            let _ = stream.shutdown(Shutdown::Both);
            return Ok(false);
        }

        info!("TCP client connected: {}", peer);
        self.state = ConnectionState::Connected(Client { stream, peer });
        Ok(true)
    }

    /// Send the greeting to the connected client
    ///
    /// A client that cannot be greeted is dropped.
    pub fn greet(&mut self) -> bool {
        let greeting = self.greeting.clone();
        self.send(&greeting)
    }

    fn prepare(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_write_timeout(self.write_timeout)?;
        stream.set_nodelay(true)
    }

    /// Turn away clients that connect while one is already served
    ///
    /// Returns how many were rejected.
    pub fn reject_pending(&mut self) -> usize {
        let ConnectionState::Connected(active) = &self.state else {
            return 0;
        };

        let mut rejected = 0;
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    warn!(
                        "Rejecting TCP connection from {}: already have active client {}",
                        addr, active.peer
                    );
                    let _ = stream.shutdown(Shutdown::Both);
                    rejected += 1;
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(ref e) if is_transient_accept_error(e) => continue,
                Err(e) => {
                    debug!("Accept error while connected: {}", e);
                    break;
                }
            }
        }
        rejected
    }

    /// Non-blocking liveness check on the connected client
    ///
    /// Bytes sent by the client are discarded. End of stream closes the
    /// connection; a dead socket is dropped. Any other read error is fatal.
    /// A slow client that stops reading is still `Alive`; it is dropped by
    /// the first write that fails.
    pub fn check_liveness(&mut self) -> Result<Liveness> {
        let ConnectionState::Connected(client) = &mut self.state else {
            return Ok(Liveness::NoClient);
        };
        let peer = client.peer;

        match client.check_read()? {
            ReadCheck::Idle => Ok(Liveness::Alive),
            ReadCheck::Discarded(n) => {
                trace!("Discarded {} bytes from client {}", n, peer);
                Ok(Liveness::Alive)
            }
            ReadCheck::EndOfStream => {
                info!("Client {} disconnected", peer);
                self.close();
                Ok(Liveness::Closed)
            }
            ReadCheck::Gone(kind) => {
                warn!("Client {} is gone ({:?})", peer, kind);
                self.state = ConnectionState::Disconnected;
                Ok(Liveness::Gone)
            }
        }
    }

    /// Write `data` to the client, if any
    ///
    /// Fire-and-forget: returns `false` when disconnected or the write failed.
    /// A failed write may have left part of a line on the wire, so the
    /// client is closed and nothing more is appended to it.
    pub fn send(&mut self, data: &str) -> bool {
        let ConnectionState::Connected(client) = &mut self.state else {
            return false;
        };
        let Err(e) = client.stream.write_all(data.as_bytes()) else {
            return true;
        };
        warn!("Failed to write to client {}, dropping it: {}", client.peer, e);
        self.close();
        false
    }

    /// Close the client connection, if any
    pub fn close(&mut self) {
        if let ConnectionState::Connected(client) =
            std::mem::replace(&mut self.state, ConnectionState::Disconnected)
        {
            let _ = client.stream.shutdown(Shutdown::Both);
            info!("Closed connection to {}", client.peer);
        }
    }
}

fn is_transient_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::WouldBlock | ErrorKind::Interrupted | ErrorKind::ConnectionAborted
    )
}

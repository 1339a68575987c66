//! Network transport for link frames
//!
//! The tag pushes one payload per report tick to a listener on the host. The
//! connection is best effort: while it is down, payloads are simply not sent.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::hardware::error::{HardwareError, HardwareResult};

/// Connect attempts run inside the report tick and must stay well below its period
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(50);

/// Outbound channel for serialized snapshots
pub trait Transport {
    fn is_connected(&self) -> bool;

    /// Write one payload. Fails if the peer is not connected or the write breaks.
    fn send(&mut self, payload: &str) -> HardwareResult<()>;

    /// Called once per tick; re-establishes a lost connection when due.
    fn maintain(&mut self);
}

/// TCP client transport with rate-limited reconnection
pub struct TcpTransport {
    peer: String,
    stream: Option<TcpStream>,
    connect_timeout: Duration,
    reconnect_interval: Duration,
    last_attempt: Option<Instant>,
}

impl TcpTransport {
    /// Transport for `peer` (`host:port`); no connection is attempted yet
    pub fn new(peer: impl Into<String>, reconnect_interval: Duration) -> Self {
        Self {
            peer: peer.into(),
            stream: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_interval,
            last_attempt: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn connect(&mut self) -> HardwareResult<()> {
        self.last_attempt = Some(Instant::now());
        let connect_failed = |reason: String| HardwareError::ConnectFailed {
            peer: self.peer.clone(),
            reason,
        };

        let addr = self
            .peer
            .to_socket_addrs()
            .map_err(|e| connect_failed(e.to_string()))?
            .next()
            .ok_or_else(|| connect_failed("address did not resolve".to_string()))?;

        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| connect_failed(e.to_string()))?;
        stream
            .set_write_timeout(Some(self.connect_timeout))
            .map_err(|e| connect_failed(e.to_string()))?;
        stream.set_nodelay(true).ok();

        info!(peer = %self.peer, "connected to link server");
        self.stream = Some(stream);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.stream = None;
    }

    fn reconnect_due(&self) -> bool {
        self.last_attempt
            .map_or(true, |at| at.elapsed() >= self.reconnect_interval)
    }
}

impl Transport for TcpTransport {
    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn send(&mut self, payload: &str) -> HardwareResult<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(HardwareError::ConnectionLost {
                peer: self.peer.clone(),
                reason: "not connected".to_string(),
            });
        };

        if let Err(e) = stream.write_all(payload.as_bytes()).and_then(|()| stream.flush()) {
            warn!(peer = %self.peer, error = %e, "link server connection lost");
            self.stream = None;
            return Err(HardwareError::ConnectionLost {
                peer: self.peer.clone(),
                reason: e.to_string(),
            });
        }
        debug!(bytes = payload.len(), "payload sent");
        Ok(())
    }

    fn maintain(&mut self) {
        if self.stream.is_some() || !self.reconnect_due() {
            return;
        }
        if let Err(e) = self.connect() {
            debug!(error = %e, "reconnect attempt failed");
        }
    }
}

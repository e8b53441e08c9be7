//! Byte-level transport contract under the RPTL backend.
use std::sync::Arc;

use crate::error::NetworkError;
use crate::time::LocalDuration;

/// Event surfaced by a transport while pumping I/O.
#[derive(Debug)]
pub enum TransportEvent {
    /// A new client connection was accepted under a fresh token.
    Connected { token: u64 },

    /// A complete message line was received from a client.
    Message { token: u64, message: String },

    /// A client connection died; `error` is `None` for an orderly shutdown.
    Disconnected { token: u64, error: Option<String> },

    /// The process was asked to stop by a signal.
    Stop { signal: i32 },
}

/// Driver pumping bytes for the RPTL backend.
///
/// The backend owns sessions and message queues; a transport owns the
/// connections themselves. Concrete transports decide the framing and the
/// security layer — the TCP transport of this crate frames messages as text
/// lines, a TLS WebSocket transport would plug in behind this same trait.
pub trait Transport {
    /// Blocks until I/O activity produces events, or until `timeout`
    /// elapses. An empty batch means the timeout was reached.
    ///
    /// `timeout` is the delay until the next timer deadline the backend
    /// tracks; transports fall back to their own polling interval when it is
    /// `None`.
    fn wait(&mut self, timeout: Option<LocalDuration>) -> Result<Vec<TransportEvent>, NetworkError>;

    /// Queues one message for transmission to given client.
    ///
    /// The buffer is shared: a broadcast hands the same `Arc` to every
    /// session queue and the transport copies it into the connection's write
    /// buffer at transmission time.
    fn transmit(&mut self, token: u64, message: &Arc<str>) -> Result<(), NetworkError>;

    /// Drops the connection of given client, if still known.
    fn disconnect(&mut self, token: u64);
}

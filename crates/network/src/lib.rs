//! RPTL networking layer of the parlor game server.
//!
//! [`NetworkBackend`] implements the login protocol (RPTL) spoken on the
//! wire: actor registration, connection lifecycle and per-client outbound
//! message queues. It is generic over a [`Transport`], the byte-level driver
//! pumping I/O; [`TcpTransport`] is the poll-based TCP line transport
//! shipped with the crate, and the seam where TLS or WebSocket transports
//! would plug in.
pub mod backend;
pub mod error;
pub mod tcp;
pub mod time;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::NetworkBackend;
pub use error::NetworkError;
pub use tcp::TcpTransport;
pub use time::{LocalDuration, LocalTime, TimeoutManager};
pub use transport::{Transport, TransportEvent};

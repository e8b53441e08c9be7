//! Networking layer errors.
use std::io;

use thiserror::Error;

/// An error occurring in the networking backend or its transport.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// An I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// No connected client uses this token.
    #[error("no connected client with token {0}")]
    UnknownClientToken(u64),

    /// A client already uses this token.
    #[error("client token {0} is unavailable")]
    UnavailableClientToken(u64),

    /// The operation requires the client connection to be dead.
    #[error("client with token {0} is still alive")]
    AliveClient(u64),

    /// No registered actor uses this UID.
    #[error("no registered actor with UID {0}")]
    UnknownActorUid(u64),
}

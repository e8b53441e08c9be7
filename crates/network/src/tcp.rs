//! Poll-based TCP line transport. This is a single-threaded transport using
//! a `poll` loop; messages are UTF-8 text lines separated by `\n`.
use std::collections::HashMap;
use std::io;
use std::io::prelude::*;
use std::net;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::error::NetworkError;
use crate::time::LocalDuration;
use crate::transport::{Transport, TransportEvent};

/// Socket read buffer size.
const READ_BUFFER_SIZE: usize = 1024 * 16;
/// Poll timeout when no timer deadline bounds the wait.
const WAIT_TIMEOUT: LocalDuration = LocalDuration::from_secs(5);

/// Last signal caught by the process-wide handler; 0 when none is pending.
static CAUGHT_SIGNAL: AtomicI32 = AtomicI32::new(0);

extern "C" fn catch_signal(signal: libc::c_int) {
    CAUGHT_SIGNAL.store(signal, Ordering::SeqCst);
}

#[derive(Debug, PartialEq, Eq, Clone)]
enum Source {
    Listener,
    Client(u64),
}

/// Nonblocking client socket with buffered reads and writes.
struct Socket {
    stream: net::TcpStream,
    addr: SocketAddr,
    read_buffer: Vec<u8>,
    write_buffer: Vec<u8>,
}

impl Socket {
    fn from(stream: net::TcpStream, addr: SocketAddr) -> Self {
        Self {
            stream,
            addr,
            read_buffer: Vec::new(),
            write_buffer: Vec::new(),
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.write_buffer.extend_from_slice(bytes);
    }

    /// Writes as much of the output buffer as the socket accepts.
    fn flush(&mut self) -> io::Result<()> {
        while !self.write_buffer.is_empty() {
            match self.stream.write(&self.write_buffer) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(count) => {
                    self.write_buffer.drain(..count);
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    fn disconnect(&self) -> io::Result<()> {
        self.stream.shutdown(net::Shutdown::Both)
    }
}

/// A single-threaded nonblocking TCP transport.
///
/// Connections are accepted from one listening socket; each client is keyed
/// by a random token independent of any actor UID. SIGINT and SIGTERM are
/// surfaced as [`TransportEvent::Stop`].
pub struct TcpTransport {
    listener: net::TcpListener,
    sources: popol::Sources<Source>,
    peers: HashMap<u64, Socket>,
}

impl TcpTransport {
    /// Binds the listening socket and installs the signal handlers.
    pub fn bind(local_endpoint: SocketAddr) -> Result<Self, NetworkError> {
        let listener = net::TcpListener::bind(local_endpoint)?;
        listener.set_nonblocking(true)?;

        let mut sources = popol::Sources::new();
        sources.register(Source::Listener, &listener, popol::interest::READ);

        let handler = catch_signal as extern "C" fn(libc::c_int);
        unsafe {
            libc::signal(libc::SIGINT, handler as libc::sighandler_t);
            libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
        }

        debug!(target: "net", "Listening for connections on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            sources,
            peers: HashMap::new(),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        Ok(self.listener.local_addr()?)
    }

    fn caught_signal() -> Option<TransportEvent> {
        match CAUGHT_SIGNAL.swap(0, Ordering::SeqCst) {
            0 => None,
            signal => Some(TransportEvent::Stop { signal }),
        }
    }

    fn free_token(&self) -> u64 {
        loop {
            let token = fastrand::u64(..);
            if !self.peers.contains_key(&token) {
                return token;
            }
        }
    }

    fn accept_clients(&mut self, batch: &mut Vec<TransportEvent>) -> Result<(), NetworkError> {
        loop {
            let (conn, addr) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    error!(target: "net", "Accept error: {}", err);
                    break;
                }
            };

            conn.set_nonblocking(true)?;

            let token = self.free_token();
            trace!(target: "net", "{}: accepting client connection, token {}", addr, token);

            self.sources
                .register(Source::Client(token), &conn, popol::interest::ALL);
            self.peers.insert(token, Socket::from(conn, addr));

            batch.push(TransportEvent::Connected { token });
        }

        Ok(())
    }

    fn drop_client(&mut self, token: u64) {
        if let Some(socket) = self.peers.remove(&token) {
            socket.disconnect().ok();
        }
        self.sources.unregister(&Source::Client(token));
    }

    fn handle_readable(&mut self, token: u64, batch: &mut Vec<TransportEvent>) {
        // `None` below means an orderly shutdown, `Some` a connection error.
        let mut failure: Option<Option<String>> = None;

        if let Some(socket) = self.peers.get_mut(&token) {
            let mut buffer = [0; READ_BUFFER_SIZE];

            trace!(target: "net", "{}: socket is readable", socket.addr);

            // Nb. `poll` is level-triggered: if more data remains on the
            // socket after this read, we will be notified again.
            match socket.stream.read(&mut buffer) {
                Ok(0) => failure = Some(None),
                Ok(count) => {
                    socket.read_buffer.extend_from_slice(&buffer[..count]);

                    while let Some(position) =
                        socket.read_buffer.iter().position(|&byte| byte == b'\n')
                    {
                        let line: Vec<u8> = socket.read_buffer.drain(..=position).collect();
                        let line = &line[..line.len() - 1];
                        let line = line.strip_suffix(b"\r").unwrap_or(line);

                        match std::str::from_utf8(line) {
                            Ok(message) => batch.push(TransportEvent::Message {
                                token,
                                message: message.to_owned(),
                            }),
                            Err(_) => {
                                failure =
                                    Some(Some("received line is not valid UTF-8".to_owned()));
                                break;
                            }
                        }
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    trace!(target: "net", "{}: read error: {}", socket.addr, err);
                    failure = Some(Some(err.to_string()));
                }
            }
        }

        if let Some(error) = failure {
            self.drop_client(token);
            batch.push(TransportEvent::Disconnected { token, error });
        }
    }

    fn handle_writable(&mut self, token: u64, batch: &mut Vec<TransportEvent>) {
        let mut failure: Option<String> = None;

        if let Some(socket) = self.peers.get_mut(&token) {
            trace!(target: "net", "{}: socket is writable", socket.addr);

            if let Some(source) = self.sources.get_mut(&Source::Client(token)) {
                match socket.flush() {
                    // All buffered data was written, no longer interested in
                    // writability.
                    Ok(()) => source.unset(popol::interest::WRITE),
                    // The write could not complete, wait for the socket to
                    // become writable again.
                    Err(err)
                        if [io::ErrorKind::WouldBlock, io::ErrorKind::WriteZero]
                            .contains(&err.kind()) =>
                    {
                        source.set(popol::interest::WRITE);
                    }
                    Err(err) => {
                        error!(target: "net", "{}: write error: {}", socket.addr, err);
                        failure = Some(err.to_string());
                    }
                }
            }
        }

        if let Some(error) = failure {
            self.drop_client(token);
            batch.push(TransportEvent::Disconnected {
                token,
                error: Some(error),
            });
        }
    }
}

impl Transport for TcpTransport {
    fn wait(&mut self, timeout: Option<LocalDuration>) -> Result<Vec<TransportEvent>, NetworkError> {
        let mut batch = Vec::new();

        if let Some(stop) = Self::caught_signal() {
            batch.push(stop);
            return Ok(batch);
        }

        let timeout = timeout.unwrap_or(WAIT_TIMEOUT);
        let mut events = Vec::with_capacity(32);

        trace!(
            target: "net",
            "Polling {} source(s), waking up in {}",
            self.sources.len(),
            timeout,
        );

        match self.sources.wait_timeout(&mut events, timeout.into()) {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::TimedOut => return Ok(batch),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                if let Some(stop) = Self::caught_signal() {
                    batch.push(stop);
                }
                return Ok(batch);
            }
            Err(err) => return Err(err.into()),
        }

        for event in events.drain(..) {
            match &event.key {
                Source::Listener => self.accept_clients(&mut batch)?,
                Source::Client(token) => {
                    let token = *token;

                    if event.is_error() || event.is_hangup() {
                        // Let the subsequent read fail and report the error.
                        trace!(target: "net", "token {}: socket error triggered: {:?}", token, event);
                    }
                    if event.is_invalid() {
                        // File descriptor was closed and is invalid; the
                        // source was not properly unregistered.
                        error!(target: "net", "token {}: socket is invalid, removing", token);
                        self.sources.unregister(&event.key);
                        continue;
                    }

                    if event.is_writable() {
                        self.handle_writable(token, &mut batch);
                    }
                    if event.is_readable() {
                        self.handle_readable(token, &mut batch);
                    }
                }
            }
        }

        Ok(batch)
    }

    fn transmit(&mut self, token: u64, message: &Arc<str>) -> Result<(), NetworkError> {
        let socket = self
            .peers
            .get_mut(&token)
            .ok_or(NetworkError::UnknownClientToken(token))?;

        socket.push(message.as_bytes());
        socket.push(b"\n");

        match socket.flush() {
            Ok(()) => {
                if let Some(source) = self.sources.get_mut(&Source::Client(token)) {
                    source.unset(popol::interest::WRITE);
                }
                Ok(())
            }
            Err(err)
                if [io::ErrorKind::WouldBlock, io::ErrorKind::WriteZero].contains(&err.kind()) =>
            {
                if let Some(source) = self.sources.get_mut(&Source::Client(token)) {
                    source.set(popol::interest::WRITE);
                }
                Ok(())
            }
            Err(err) => {
                self.drop_client(token);
                Err(err.into())
            }
        }
    }

    fn disconnect(&mut self, token: u64) {
        trace!(target: "net", "Dropping connection of client {}", token);
        self.drop_client(token);
    }
}

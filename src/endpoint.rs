//! Producer-facing endpoint: Unix-socket lifecycle and session reads.
//!
//! An [`Endpoint`] owns a well-known socket path. Each producer session is a
//! fresh [`Session`]; when the producer closes its end the session is simply
//! over — not an error — and [`Endpoint::reconnect`] blocks until the next
//! producer shows up. Only unexpected OS failures surface as [`PipeError`].

use std::fs;
use std::io::{self, ErrorKind, Read};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Fatal conditions. A producer closing its connection is deliberately not
/// represented here; see [`SessionRead::Ended`].
#[derive(Error, Debug)]
pub enum PipeError {
    /// The listening socket could not be created at the configured path.
    #[error("failed to create endpoint at {}: {source}", .path.display())]
    Bind {
        path: PathBuf,
        source: io::Error,
    },
    /// Waiting for a producer to connect failed for an unexpected reason.
    #[error("failed while waiting for a producer: {0}")]
    Accept(io::Error),
    /// A read from the live session failed with something other than a
    /// session-boundary condition.
    #[error("unexpected read error: {0}")]
    Read(io::Error),
    /// The consumer-side sink failed with something other than closing.
    #[error("failed to write to consumer: {0}")]
    Consumer(io::Error),
    /// Rejected configuration (e.g. a zero-word block buffer).
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Returns true if the error means the producer went away (session boundary),
/// as opposed to a genuine I/O failure.
fn is_session_end(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    )
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Outcome of [`Session::read_exact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRead {
    /// The buffer was filled completely.
    Complete,
    /// The producer closed its end; this many bytes were placed in the
    /// buffer before the close. The caller resumes the remainder on the
    /// next session.
    Ended(usize),
}

/// One live producer connection. Exactly one exists at a time.
#[derive(Debug)]
pub struct Session {
    stream: UnixStream,
}

impl Session {
    fn new(stream: UnixStream) -> Self {
        Self { stream }
    }

    /// Blocking read of exactly `buf.len()` bytes, issuing as many
    /// underlying reads as needed.
    ///
    /// A graceful close (EOF) or broken-pipe condition ends the session:
    /// the partial byte count is reported via [`SessionRead::Ended`] so the
    /// caller can resume filling from the next session. Any other failure
    /// is fatal.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<SessionRead, PipeError> {
        let mut total = 0;
        while total < buf.len() {
            match self.stream.read(&mut buf[total..]) {
                Ok(0) => return Ok(SessionRead::Ended(total)),
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_session_end(&e) => return Ok(SessionRead::Ended(total)),
                Err(e) => return Err(PipeError::Read(e)),
            }
        }
        Ok(SessionRead::Complete)
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// The well-known socket address producers connect to.
///
/// Each call to [`wait_for_producer`](Endpoint::wait_for_producer) binds a
/// fresh single-client listener, accepts exactly one connection and drops
/// the listener again, so between sessions the endpoint is closed — a
/// producer that connects too early simply retries.
#[derive(Debug)]
pub struct Endpoint {
    path: PathBuf,
}

impl Endpoint {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the listening socket and block until one producer connects.
    ///
    /// A stale socket file left by a previous run is removed first. `EINTR`
    /// while accepting is benign and retried; every other failure is fatal.
    pub fn wait_for_producer(&self) -> Result<Session, PipeError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(PipeError::Bind {
                    path: self.path.clone(),
                    source: e,
                })
            }
        }
        let listener = UnixListener::bind(&self.path).map_err(|e| PipeError::Bind {
            path: self.path.clone(),
            source: e,
        })?;
        loop {
            match listener.accept() {
                Ok((stream, _)) => return Ok(Session::new(stream)),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(PipeError::Accept(e)),
            }
        }
    }

    /// Replace an ended session: recreate the listening socket and block
    /// until the next producer connects.
    ///
    /// Invisible to the word-level consumer apart from the log lines and
    /// the added latency.
    pub fn reconnect(&self) -> Result<Session, PipeError> {
        log::warn!(
            "producer closed; waiting for next session on {}",
            self.path.display()
        );
        let session = self.wait_for_producer()?;
        log::info!("producer reconnected; continuing stream");
        Ok(session)
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

//! The byte-stream transport contract.
//!
//! Mirrors the teacher crate's `Comm` trait: a thin abstraction over
//! `Read + Write` so the core never has to know whether it's talking to a
//! `TcpStream`, a pty, or a test double. Unlike the teacher, reads and
//! writes here are bulk operations (`&mut [u8]` / `&[u8]`) rather than single
//! bytes — the session's peek buffer (see [`crate::session::Session`]) needs
//! to know how many bytes a single underlying read produced, matching
//! `gdb_get_char`'s `buf_cnt`/`buf_p` bookkeeping in the original stub.

use crate::error::CommError;
use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

/// A bidirectional byte-stream channel between the core and a connected
/// debugger.
pub trait Comm {
    /// Reads at least one byte into `buf`, returning the number of bytes
    /// read. Must never return `Ok(0)` for a live connection; `Ok(0)` (or an
    /// I/O error whose kind indicates the same) is surfaced as
    /// [`CommError::RemoteClosed`].
    ///
    /// Implementations must treat a transient "no data yet" condition
    /// (`WouldBlock`/`Interrupted`) as a reason to retry internally, not as
    /// an error — precisely as the original `gdb_get_char` spins on
    /// `EAGAIN` with a short sleep.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CommError>;

    /// Writes all of `buf` to the stream. Implementations must retry
    /// `WouldBlock`/`Interrupted` internally rather than surfacing them, the
    /// same contract `read` has.
    fn write(&mut self, buf: &[u8]) -> Result<(), CommError>;
}

/// Blanket implementation for any synchronous, blocking-or-nonblocking
/// `Read + Write` stream (e.g. `TcpStream`).
impl<T: Read + Write> Comm for T {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CommError> {
        loop {
            match Read::read(self, buf) {
                Ok(0) => return Err(CommError::RemoteClosed),
                Ok(n) => return Ok(n),
                Err(e) => match e.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => {
                        thread::sleep(Duration::from_millis(1));
                    }
                    io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::UnexpectedEof => return Err(CommError::RemoteClosed),
                    _ => return Err(CommError::Io(e)),
                },
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), CommError> {
        let mut remaining = buf;
        while !remaining.is_empty() {
            match Write::write(self, remaining) {
                Ok(0) => return Err(CommError::RemoteClosed),
                Ok(n) => remaining = &remaining[n..],
                Err(e) => match e.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => {
                        thread::sleep(Duration::from_millis(1));
                    }
                    io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof => return Err(CommError::RemoteClosed),
                    _ => return Err(CommError::Io(e)),
                },
            }
        }
        Ok(())
    }
}

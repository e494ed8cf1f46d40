//! Per-connection session state (§3, §4.2).
//!
//! The peek-buffer bookkeeping here generalizes the teacher crate's
//! `GdbStub` (which held a single `buf: Vec<u8>` plus a lone lookahead byte
//! in `next`) into the position/count read-ahead buffer described by §3,
//! grounded directly in the original stub's `gdb_connection_t` (`buffer`,
//! `buf_p`, `buf_cnt`) and `gdb_get_char`'s refill logic.

use crate::comm::Comm;
use crate::error::{CommError, SessionError, TargetError};
use crate::proto::codec::ByteSource;
use crate::target::{Target, TargetState};

/// Default size of the per-session read-ahead buffer. Analogous to
/// `GDB_BUFFER_SIZE` in the original stub.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// The debugger's belief about the target's run/halt state (§3). The core
/// must keep this synchronized with reality via stop-replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendState {
    Halted,
    Running,
}

impl Default for FrontendState {
    fn default() -> Self {
        FrontendState::Halted
    }
}

/// The sink monitor-command text (`qRcmd`) is submitted to, and through
/// which console output is routed back as `O`-packets.
///
/// Deliberately minimal: the actual command interpreter is an external
/// collaborator (spec §1), this is just the seam the core needs to reach it.
pub trait CommandSink {
    /// Runs `command` and reports each line of output through `out`. The
    /// caller wraps each reported line in an `O`-packet.
    fn run_command(&mut self, command: &str, out: &mut dyn FnMut(&str));
}

/// A `CommandSink` that accepts commands and produces no output, for
/// embedders with no monitor commands and for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCommandSink;

impl CommandSink for NullCommandSink {
    fn run_command(&mut self, _command: &str, _out: &mut dyn FnMut(&str)) {}
}

/// Per-connection state: the read-ahead buffer, the pending-interrupt flag,
/// and the debugger's run/halt view.
pub struct Session<C: Comm> {
    comm: C,
    buffer: Vec<u8>,
    buf_pos: usize,
    buf_cnt: usize,
    ctrl_c_pending: bool,
    frontend_state: FrontendState,
}

impl<C: Comm> Session<C> {
    /// Creates a session with the default buffer capacity.
    pub fn new(comm: C) -> Self {
        Self::with_capacity(comm, DEFAULT_BUFFER_SIZE)
    }

    /// Creates a session whose read-ahead buffer holds at most `capacity`
    /// bytes per underlying read.
    pub fn with_capacity(comm: C, capacity: usize) -> Self {
        Session {
            comm,
            buffer: vec![0u8; capacity],
            buf_pos: 0,
            buf_cnt: 0,
            ctrl_c_pending: false,
            frontend_state: FrontendState::default(),
        }
    }

    /// Attaches to a freshly halted (or halting) target: requests a halt,
    /// polls until the target reports `Halted`, then consumes the
    /// debugger's opening `+` from the stream (§4.2).
    pub fn attach<T: Target>(comm: C, target: &mut T) -> Result<Self, SessionError> {
        let mut session = Session::new(comm);

        match target.halt() {
            Ok(()) => {}
            Err(TargetError::AlreadyHalted) => {}
            Err(e) => return Err(SessionError::Target(e)),
        }

        while target.state() != TargetState::Halted {
            target.poll().map_err(SessionError::Target)?;
        }
        // Any events accumulated while reaching Halted predate this
        // session's view of the world (frontend_state starts Halted too).
        target.take_events();

        session.read_byte()?;
        Ok(session)
    }

    /// Whether more input is already buffered — lets the dispatcher's
    /// receive loop keep draining without blocking on the stream (§4.1).
    pub fn has_buffered(&self) -> bool {
        self.buf_pos < self.buf_cnt
    }

    pub fn ctrl_c_pending(&self) -> bool {
        self.ctrl_c_pending
    }

    /// Returns whether an interrupt was pending and clears the flag.
    pub fn take_ctrl_c_pending(&mut self) -> bool {
        let was_pending = self.ctrl_c_pending;
        self.ctrl_c_pending = false;
        was_pending
    }

    pub fn frontend_state(&self) -> FrontendState {
        self.frontend_state
    }

    pub fn set_frontend_state(&mut self, state: FrontendState) {
        self.frontend_state = state;
    }

    fn refill(&mut self) -> Result<(), CommError> {
        let n = self.comm.read(&mut self.buffer[..])?;
        self.buf_pos = 0;
        self.buf_cnt = n;
        Ok(())
    }
}

impl<C: Comm> ByteSource for Session<C> {
    fn read_byte(&mut self) -> Result<u8, CommError> {
        if self.buf_pos >= self.buf_cnt {
            self.refill()?;
        }
        let b = self.buffer[self.buf_pos];
        self.buf_pos += 1;
        Ok(b)
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), CommError> {
        self.comm.write(buf)
    }

    fn set_ctrl_c_pending(&mut self) {
        self.ctrl_c_pending = true;
    }
}

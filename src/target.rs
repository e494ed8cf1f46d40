//! The target adapter contract (§4.3): the abstract capability surface the
//! core demands of any debug backend.
//!
//! Generalizes the teacher crate's `StubCalls`/`TargetDesc` pair (fixed,
//! compile-time register structs keyed to one hardcoded x86 layout) into a
//! dynamic register list, since the core must support arbitrary targets
//! rather than one baked-in architecture. The register shape itself (width,
//! raw value buffer, dirty flag) is grounded in the original stub's `reg_t`
//! (`reg_list[i]->value`, `->size`, `->dirty` in `gdb_get_registers_packet`
//! and `gdb_set_register_packet`).

use byteorder::{ByteOrder, LittleEndian};

use crate::error::TargetError;

/// The target's run/halt state, as observed through `state()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Halted,
    Running,
}

/// Why the target is halted. Valid to read only while `state() ==
/// TargetState::Halted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugReason {
    /// The debugger explicitly requested a halt (Ctrl-C, or an initial
    /// attach).
    Request,
    Breakpoint,
    Watchpoint,
    /// Both a breakpoint and a watchpoint fired on the same halt.
    BreakAndWatch,
    SingleStep,
    /// The target reports a halt reason while it is, in fact, still
    /// running — a backend bug, but the core must be able to name it.
    NotHalted,
    /// Backend-specific halt reason with no GDB signal equivalent.
    Other,
}

impl DebugReason {
    /// The wire signal byte for this reason (spec §4.4's mapping table).
    /// `None` means "unmapped" — the caller must treat this as an internal
    /// error ([`crate::error::SessionError::UnmappedDebugReason`]), matching
    /// the original's `ERROR("BUG: undefined debug reason"); exit(-1);`.
    pub fn signal(self) -> Option<u8> {
        match self {
            DebugReason::Request => Some(0x02), // SIGINT
            DebugReason::Breakpoint
            | DebugReason::Watchpoint
            | DebugReason::BreakAndWatch
            | DebugReason::SingleStep => Some(0x05), // SIGTRAP
            DebugReason::NotHalted => Some(0x00),
            DebugReason::Other => None,
        }
    }
}

/// A breakpoint or watchpoint kind, keyed together with an address as the
/// record's identity (§3: "at most one record per (type, address)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakpointKind {
    SoftwareBreak,
    HardwareBreak,
    WriteWatch,
    ReadWatch,
    AccessWatch,
}

impl BreakpointKind {
    /// Decodes the `z`/`Z` packet's leading type digit (§4.4).
    pub fn from_wire_type(ty: u8) -> Option<Self> {
        match ty {
            0 => Some(BreakpointKind::SoftwareBreak),
            1 => Some(BreakpointKind::HardwareBreak),
            2 => Some(BreakpointKind::WriteWatch),
            3 => Some(BreakpointKind::ReadWatch),
            4 => Some(BreakpointKind::AccessWatch),
            _ => None,
        }
    }
}

/// One register in the target's register file (§3 "Register view").
///
/// The value buffer is conceptually little-endian; the dispatcher is
/// responsible for the wire's reversed-byte rendering (§6), this struct just
/// holds the raw bytes the backend reads/writes.
#[derive(Debug, Clone)]
pub struct Register {
    width_bits: u32,
    value: Vec<u8>,
    dirty: bool,
}

impl Register {
    /// Creates a register of the given bit width, value initially all zero.
    pub fn new(width_bits: u32) -> Self {
        Register {
            width_bits,
            value: vec![0u8; Self::byte_len_for(width_bits)],
            dirty: false,
        }
    }

    fn byte_len_for(width_bits: u32) -> usize {
        ((width_bits as usize) + 7) / 8
    }

    pub fn width_bits(&self) -> u32 {
        self.width_bits
    }

    /// `ceil(width_bits / 8)`, the number of bytes in `value()`.
    pub fn byte_len(&self) -> usize {
        self.value.len()
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut [u8] {
        &mut self.value
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Builds a 32-bit register from a native integer, little-endian —
    /// the convention the wire's reversed-byte hex expects the value
    /// buffer to already be in.
    pub fn from_u32(value: u32) -> Self {
        let mut value_bytes = vec![0u8; 4];
        LittleEndian::write_u32(&mut value_bytes, value);
        Register { width_bits: 32, value: value_bytes, dirty: false }
    }

    /// Builds a 64-bit register from a native integer, little-endian.
    pub fn from_u64(value: u64) -> Self {
        let mut value_bytes = vec![0u8; 8];
        LittleEndian::write_u64(&mut value_bytes, value);
        Register { width_bits: 64, value: value_bytes, dirty: false }
    }
}

/// A target state transition the dispatcher must react to (§4.3's event
/// callback, §9's "typed event channel" rewrite direction).
///
/// Rather than a registered callback with its own threading contract, the
/// adapter accumulates events and the dispatcher drains them with
/// [`Target::take_events`] — an explicit polled interface, one of the two
/// forms spec §9 sanctions for replacing the original's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetEvent {
    Halted,
    Resumed,
}

/// The capability surface a debug backend must implement.
///
/// Addresses and sizes are all in the target's address space and are bytes
/// unless noted otherwise.
pub trait Target {
    /// Current run/halt state.
    fn state(&self) -> TargetState;

    /// Valid only while `state() == TargetState::Halted`.
    fn debug_reason(&self) -> DebugReason;

    /// Requests a halt. `AlreadyHalted` is treated as success by callers.
    fn halt(&mut self) -> Result<(), TargetError>;

    /// Advances target state. Idempotent; used to spin until `Halted`.
    fn poll(&mut self) -> Result<(), TargetError>;

    /// Resumes execution. If `current`, resumes at the program counter;
    /// otherwise at `address`. The core always passes
    /// `handle_breakpoints = false`; `debug` is `true` only for `D` detach.
    fn resume(
        &mut self,
        current: bool,
        address: u64,
        handle_breakpoints: bool,
        debug: bool,
    ) -> Result<(), TargetError>;

    /// Single-steps. Same `current`/`address` convention as `resume`.
    fn step(
        &mut self,
        current: bool,
        address: u64,
        handle_breakpoints: bool,
    ) -> Result<(), TargetError>;

    /// The target's register file, in the backend's authoritative order —
    /// this order is what `p`/`P`/`g`/`G` number registers by.
    fn register_list(&mut self) -> &mut [Register];

    /// Reads `count` elements of `element_size` bytes starting at `address`
    /// into `out` (`out.len() == count * element_size as u32 as usize`).
    fn read_memory(
        &mut self,
        address: u64,
        element_size: u8,
        count: u32,
        out: &mut [u8],
    ) -> Result<(), TargetError>;

    /// Writes `data` (`data.len() == count * element_size as u32 as usize`)
    /// as `count` elements of `element_size` bytes starting at `address`.
    fn write_memory(
        &mut self,
        address: u64,
        element_size: u8,
        count: u32,
        data: &[u8],
    ) -> Result<(), TargetError>;

    /// Bulk write path for payloads longer than 4 bytes; backends may
    /// implement this with DMA-style acceleration.
    fn write_buffer(&mut self, address: u64, data: &[u8]) -> Result<(), TargetError>;

    /// Adds a breakpoint/watchpoint. `Err(TargetError::ResourceNotAvailable)`
    /// is reported to the debugger as `E00`; any other error is session-fatal.
    fn add_breakpoint(
        &mut self,
        kind: BreakpointKind,
        address: u64,
        size: u32,
    ) -> Result<(), TargetError>;

    /// Removes a breakpoint/watchpoint by `(kind, address)`; size need not
    /// match the original add.
    fn remove_breakpoint(&mut self, kind: BreakpointKind, address: u64) -> Result<(), TargetError>;

    /// Drains and returns any state-transition events observed since the
    /// last call. Called by the dispatcher after every `halt`/`poll`/
    /// `resume`/`step`, and at the top of the receive loop.
    fn take_events(&mut self) -> Vec<TargetEvent>;
}

/// Picks the wire element size for a memory access of `len` bytes starting
/// at `address`, per §4.3: 4-aligned address and length prefer 4-byte
/// elements, 2-aligned with length 2 or 4 prefers 2-byte elements, else 1.
///
/// Grounded in `gdb_read_memory_packet`/`gdb_write_memory_packet`'s
/// `switch (len) { case 4: ...; case 2: ...; default: ... }` dispatch.
pub fn select_element_size(address: u64, len: u64) -> u8 {
    if address % 4 == 0 && len % 4 == 0 && len != 0 {
        4
    } else if address % 2 == 0 && (len == 2 || len == 4) {
        2
    } else {
        1
    }
}

//! Test doubles shared by the codec, session, and dispatcher test modules.
//! Not part of the public API; compiled only under `#[cfg(test)]`.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::io::{Cursor, Read, Write};
use std::rc::Rc;

use crate::error::TargetError;
use crate::target::{BreakpointKind, DebugReason, Register, Target, TargetEvent, TargetState};

/// A minimal in-memory duplex stream: reads come from a fixed byte buffer,
/// writes accumulate in a handle the test keeps hold of after the stream
/// itself has been moved into a `Session`. Stands in for a real socket.
pub struct MemoryStream {
    input: Cursor<Vec<u8>>,
    output: Rc<RefCell<Vec<u8>>>,
}

impl MemoryStream {
    pub fn new(input: &[u8]) -> Self {
        MemoryStream { input: Cursor::new(input.to_vec()), output: Rc::new(RefCell::new(Vec::new())) }
    }

    /// A cheaply-cloned handle to the bytes written to this stream so far.
    pub fn output_handle(&self) -> Rc<RefCell<Vec<u8>>> {
        self.output.clone()
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.output.borrow_mut().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A small, fully in-memory [`Target`] for exercising the dispatcher without
/// a real debug backend.
pub struct FakeTarget {
    state: TargetState,
    reason: DebugReason,
    registers: Vec<Register>,
    memory: Vec<u8>,
    breakpoints: HashSet<(BreakpointKind, u64)>,
    breakpoint_capacity: usize,
    events: VecDeque<TargetEvent>,
    pub halt_calls: u32,
    pub resume_calls: u32,
    pub step_calls: u32,
    pub last_resume: Option<(bool, u64, bool, bool)>,
    pub last_step: Option<(bool, u64, bool)>,
}

impl FakeTarget {
    pub fn new(register_widths: &[u32], memory_size: usize) -> Self {
        FakeTarget {
            state: TargetState::Halted,
            reason: DebugReason::Request,
            registers: register_widths.iter().map(|&w| Register::new(w)).collect(),
            memory: vec![0u8; memory_size],
            breakpoints: HashSet::new(),
            breakpoint_capacity: usize::MAX,
            events: VecDeque::new(),
            halt_calls: 0,
            resume_calls: 0,
            step_calls: 0,
            last_resume: None,
            last_step: None,
        }
    }

    pub fn with_breakpoint_capacity(mut self, capacity: usize) -> Self {
        self.breakpoint_capacity = capacity;
        self
    }

    pub fn set_reason(&mut self, reason: DebugReason) {
        self.reason = reason;
    }

    pub fn write_memory_raw(&mut self, address: u64, bytes: &[u8]) {
        let start = address as usize;
        self.memory[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn read_memory_raw(&self, address: u64, len: usize) -> &[u8] {
        let start = address as usize;
        &self.memory[start..start + len]
    }

    pub fn push_event(&mut self, event: TargetEvent) {
        self.events.push_back(event);
    }
}

impl Target for FakeTarget {
    fn state(&self) -> TargetState {
        self.state
    }

    fn debug_reason(&self) -> DebugReason {
        self.reason
    }

    fn halt(&mut self) -> Result<(), TargetError> {
        self.halt_calls += 1;
        if self.state == TargetState::Halted {
            return Err(TargetError::AlreadyHalted);
        }
        self.state = TargetState::Halted;
        self.reason = DebugReason::Request;
        self.events.push_back(TargetEvent::Halted);
        Ok(())
    }

    fn poll(&mut self) -> Result<(), TargetError> {
        Ok(())
    }

    fn resume(&mut self, current: bool, address: u64, handle_breakpoints: bool, debug: bool) -> Result<(), TargetError> {
        self.resume_calls += 1;
        self.last_resume = Some((current, address, handle_breakpoints, debug));
        self.state = TargetState::Running;
        self.events.push_back(TargetEvent::Resumed);
        Ok(())
    }

    fn step(&mut self, current: bool, address: u64, handle_breakpoints: bool) -> Result<(), TargetError> {
        self.step_calls += 1;
        self.last_step = Some((current, address, handle_breakpoints));
        self.reason = DebugReason::SingleStep;
        self.events.push_back(TargetEvent::Halted);
        Ok(())
    }

    fn register_list(&mut self) -> &mut [Register] {
        &mut self.registers
    }

    fn read_memory(&mut self, address: u64, element_size: u8, count: u32, out: &mut [u8]) -> Result<(), TargetError> {
        let len = element_size as usize * count as usize;
        let start = address as usize;
        out[..len].copy_from_slice(&self.memory[start..start + len]);
        Ok(())
    }

    fn write_memory(&mut self, address: u64, element_size: u8, count: u32, data: &[u8]) -> Result<(), TargetError> {
        let len = element_size as usize * count as usize;
        let start = address as usize;
        self.memory[start..start + len].copy_from_slice(&data[..len]);
        Ok(())
    }

    fn write_buffer(&mut self, address: u64, data: &[u8]) -> Result<(), TargetError> {
        let start = address as usize;
        self.memory[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn add_breakpoint(&mut self, kind: BreakpointKind, address: u64, _size: u32) -> Result<(), TargetError> {
        if self.breakpoints.len() >= self.breakpoint_capacity {
            return Err(TargetError::ResourceNotAvailable);
        }
        self.breakpoints.insert((kind, address));
        Ok(())
    }

    fn remove_breakpoint(&mut self, kind: BreakpointKind, address: u64) -> Result<(), TargetError> {
        self.breakpoints.remove(&(kind, address));
        Ok(())
    }

    fn take_events(&mut self) -> Vec<TargetEvent> {
        self.events.drain(..).collect()
    }
}

//! Core packet framer, session state machine, and command dispatcher for a
//! GDB remote serial protocol (RSP) server.
//!
//! This crate implements the parts of a GDB stub that don't vary between
//! embedders: the `$...#cc` packet framing (including the binary-escape
//! sub-mode `X` packets use), the per-connection peek buffer and
//! interrupt/run-state bookkeeping, and the command dispatcher that turns
//! inbound packets into calls against a [`Target`](target::Target)
//! implementation supplied by the embedder.
//!
//! What's explicitly someone else's job:
//!
//! - the transport (anything that is `Read + Write` implements
//!   [`Comm`](comm::Comm) automatically);
//! - the target backend itself ([`target::Target`]);
//! - the monitor command interpreter behind `qRcmd`
//!   ([`session::CommandSink`]).
//!
//! A typical embedder wires these together as:
//!
//! ```no_run
//! use rsp_core::config::ServerConfig;
//! use rsp_core::dispatch::Dispatcher;
//! use rsp_core::session::NullCommandSink;
//! # use rsp_core::target::{Target, TargetState, DebugReason, Register, TargetEvent};
//! # use rsp_core::error::TargetError;
//! # struct MyTarget;
//! # impl Target for MyTarget {
//! #     fn state(&self) -> TargetState { TargetState::Halted }
//! #     fn debug_reason(&self) -> DebugReason { DebugReason::Request }
//! #     fn halt(&mut self) -> Result<(), TargetError> { Ok(()) }
//! #     fn poll(&mut self) -> Result<(), TargetError> { Ok(()) }
//! #     fn resume(&mut self, _: bool, _: u64, _: bool, _: bool) -> Result<(), TargetError> { Ok(()) }
//! #     fn step(&mut self, _: bool, _: u64, _: bool) -> Result<(), TargetError> { Ok(()) }
//! #     fn register_list(&mut self) -> &mut [Register] { &mut [] }
//! #     fn read_memory(&mut self, _: u64, _: u8, _: u32, _: &mut [u8]) -> Result<(), TargetError> { Ok(()) }
//! #     fn write_memory(&mut self, _: u64, _: u8, _: u32, _: &[u8]) -> Result<(), TargetError> { Ok(()) }
//! #     fn write_buffer(&mut self, _: u64, _: &[u8]) -> Result<(), TargetError> { Ok(()) }
//! #     fn add_breakpoint(&mut self, _: rsp_core::target::BreakpointKind, _: u64, _: u32) -> Result<(), TargetError> { Ok(()) }
//! #     fn remove_breakpoint(&mut self, _: rsp_core::target::BreakpointKind, _: u64) -> Result<(), TargetError> { Ok(()) }
//! #     fn take_events(&mut self) -> Vec<TargetEvent> { Vec::new() }
//! # }
//! # fn connect() -> std::net::TcpStream { unimplemented!() }
//! let config = ServerConfig::default();
//! let stream = connect(); // accept()ed from a listener bound to config.port()
//! let mut target = MyTarget;
//! let mut dispatcher = Dispatcher::attach(stream, &mut target, NullCommandSink)
//!     .expect("attach failed")
//!     .with_max_packet_len(config.max_packet_len());
//! dispatcher.run().ok(); // Ok(()) never happens; RemoteClosed ends the loop
//! ```

#[macro_use]
extern crate log;
extern crate byteorder;

pub mod comm;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod proto;
pub mod session;
pub mod target;

#[cfg(test)]
mod test_support;

pub use comm::Comm;
pub use config::ServerConfig;
pub use dispatch::Dispatcher;
pub use error::{CommError, FramingError, SessionError, TargetError};
pub use session::{CommandSink, NullCommandSink, Session};
pub use target::{BreakpointKind, DebugReason, Register, Target, TargetEvent, TargetState};

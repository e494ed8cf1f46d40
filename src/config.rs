//! Server-level configuration (§6): the bits that don't belong to any one
//! connection.
//!
//! The original stub's listener binds one TCP port per target and increments
//! a static counter for the next one; `ServerConfig` is the constructor-
//! injected equivalent. Parsing command-line flags into this struct is left
//! to the embedder, same as the original leaves `gdb_port` parsing to the
//! surrounding server's config file reader.

/// Per-target server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port this target's debug stub listens on.
    port: u16,
    /// Cap on a single packet's payload length, passed through to
    /// [`crate::dispatch::Dispatcher::with_max_packet_len`].
    max_packet_len: usize,
}

/// The port the first configured target listens on absent an explicit
/// choice; later targets are offered successive ports by [`next_port`].
pub const DEFAULT_PORT: u16 = 3333;

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        ServerConfig { port, max_packet_len: crate::dispatch::DEFAULT_MAX_PACKET_LEN }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn max_packet_len(&self) -> usize {
        self.max_packet_len
    }

    pub fn with_max_packet_len(mut self, max_packet_len: usize) -> Self {
        self.max_packet_len = max_packet_len;
        self
    }

    /// The port the next target in a multi-target server should default to,
    /// absent an explicit choice of its own.
    pub fn next_port(&self) -> u16 {
        self.port + 1
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig::new(DEFAULT_PORT)
    }
}

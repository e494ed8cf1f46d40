//! Error types shared across the codec, session, and dispatcher.
//!
//! Shaped after the teacher crate's `Error` enum (one variant per failure
//! class, a `CommError` wrapping the transport's own error), but derived
//! with `thiserror` instead of a hand-written `Display` impl.

/// Error produced by the embedder-supplied transport while reading or
/// writing bytes.
///
/// Transient conditions (`WouldBlock`, `Interrupted`) must never reach this
/// type — an implementation of [`crate::comm::Comm`] is expected to retry
/// those internally, exactly as the original stub's `gdb_get_char` spins on
/// `EAGAIN`. Only a genuinely closed/reset connection or an unrelated I/O
/// failure should surface here.
#[derive(Debug, thiserror::Error)]
pub enum CommError {
    /// The peer closed or reset the connection (EOF, `ECONNABORTED`,
    /// `ECONNRESET`).
    #[error("remote closed the connection")]
    RemoteClosed,

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
}

/// Errors the packet codec can return while framing an inbound or outbound
/// packet.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// The payload did not fit in the caller-supplied buffer. Fatal: the
    /// session must be torn down, it cannot resynchronize mid-packet.
    #[error("packet payload exceeded buffer capacity ({capacity} bytes)")]
    BufferTooSmall { capacity: usize },

    /// A byte other than `+`, `-`, or `0x03` was seen where an
    /// acknowledgment was expected.
    #[error("unexpected byte {byte:#04x}, expected {expected}")]
    Unexpected { byte: u8, expected: &'static str },

    /// The checksum computed over the received bytes didn't match the
    /// trailing two hex digits.
    #[error("checksum mismatch: received {received:02x}, computed {computed:02x}")]
    ChecksumMismatch { received: u8, computed: u8 },

    /// A binary-escape byte (`0x7D`) was the last byte before `#`, with no
    /// following byte to XOR.
    #[error("truncated binary escape sequence")]
    TruncatedEscape,

    #[error(transparent)]
    Comm(#[from] CommError),
}

impl FramingError {
    pub(crate) fn unexpected(byte: u8, expected: &'static str) -> Self {
        FramingError::Unexpected { byte, expected }
    }
}

/// Errors the target adapter can report back to the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// `halt()` was called on an already-halted target. Treated as success
    /// by callers, but modeled explicitly so adapters don't have to lie.
    #[error("target already halted")]
    AlreadyHalted,

    /// A register or memory operation was attempted while the target was
    /// running. Per spec this is unrecoverable at the protocol level; the
    /// session is torn down.
    #[error("target is not halted")]
    NotHalted,

    /// No hardware breakpoint/watchpoint slot was available.
    #[error("no breakpoint/watchpoint resource available")]
    ResourceNotAvailable,

    /// Anything else the backend wants to report.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Session-fatal errors: any of these unwind the session, never the process
/// (see spec §9's rewrite directive — the original aborts via `exit(-1)`).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Framing(FramingError),

    #[error("remote closed the connection")]
    RemoteClosed,

    /// A register/memory operation hit `TargetError::NotHalted`, or the
    /// adapter reported an error class the protocol has no recovery for.
    #[error("target adapter reported a fatal error: {0}")]
    Target(#[from] TargetError),

    /// `debug_reason` held a value the signal mapping table doesn't cover.
    /// The original treats this as `BUG: undefined debug reason` and exits;
    /// the rewrite surfaces it as a session-fatal error instead.
    #[error("internal error: unmapped debug reason {0:?}")]
    UnmappedDebugReason(crate::target::DebugReason),
}

impl From<CommError> for SessionError {
    fn from(e: CommError) -> Self {
        match e {
            CommError::RemoteClosed => SessionError::RemoteClosed,
            other => SessionError::Framing(FramingError::Comm(other)),
        }
    }
}

/// A peer disconnect can reach `SessionError` two ways: directly, when
/// `Session::attach` converts a `CommError` itself, or wrapped in a
/// `FramingError::Comm` when it surfaces through the codec's own `?` (see
/// `FramingError`'s `#[from] CommError`). Both must classify as
/// `SessionError::RemoteClosed`, not `SessionError::Framing`, so the
/// dispatcher's receive loop tears down the same way regardless of which
/// layer first observed the close.
impl From<FramingError> for SessionError {
    fn from(e: FramingError) -> Self {
        match e {
            FramingError::Comm(CommError::RemoteClosed) => SessionError::RemoteClosed,
            other => SessionError::Framing(other),
        }
    }
}

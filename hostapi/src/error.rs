//! Host-side error types for the Sigil host.
//!
//! `HostError` never crosses the managed boundary. Recoverable failures seen
//! by the managed program are sentinels (empty buffer, `false`); `HostError`
//! only describes the conditions that end the process or fail setup.

/// Host-side error type.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The system allocator returned null.
    #[error("allocation of {size} bytes (alignment {alignment}) failed")]
    AllocationFailed { size: usize, alignment: usize },

    /// The runtime asked for an alignment that is zero or not a power of two.
    #[error("alignment {0} is not a power of two")]
    InvalidAlignment(usize),

    /// Requested size plus the tracking header does not fit in `usize`.
    #[error("allocation size overflow: {size} bytes + {header} header bytes")]
    SizeOverflow { size: usize, header: usize },

    /// The curve context could not be created or failed its self-test.
    #[error("curve context: {0}")]
    CurveContext(String),

    /// Terminal I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    /// Create a curve-context error.
    pub fn curve_context(msg: impl Into<String>) -> Self {
        Self::CurveContext(msg.into())
    }
}

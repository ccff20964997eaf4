//! Error types and handling for doctree-core operations.
//!
//! Every fallible operation in this crate returns [`Result<T>`]. The error
//! enum mirrors the wire-level failure taxonomy: each variant maps to a
//! stable `kind` string via [`Error::kind`], which the protocol layer places
//! in the `error.data.kind` field of JSON-RPC error responses.
//!
//! Parse-time problems that do not abort indexing (missing include targets,
//! include cycles, depth overflow) are *not* errors; they accumulate on the
//! index as [`crate::ValidationWarning`]s and surface only through
//! `validate_structure`.

use thiserror::Error;

/// The main error type for doctree-core operations.
///
/// `Display` gives a user-facing message; the structured `kind` string is the
/// stable identifier clients should match on.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Covers reading source files, writing temp files, and the final atomic
    /// rename. The underlying `std::io::Error` is preserved as the `detail`
    /// clients see.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecoverable parser failure on a required file.
    ///
    /// Missing includes and depth overflow are warnings, not this variant.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Requested section identifier or file path is not in the index.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An argument failed semantic validation (range, shape, or type).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The file on disk no longer matches the indexed section.
    ///
    /// Raised by the editor when the heading line it expects has moved or
    /// changed. Clients recover by calling `refresh_index` and retrying.
    #[error("Stale section: {0}")]
    Stale(String),

    /// An include cycle was detected while a terminal error was required.
    ///
    /// During indexing cycles are downgraded to warnings; this variant exists
    /// for the wire taxonomy.
    #[error("Include cycle: {0}")]
    Cycle(String),

    /// The requested mutation would produce an identifier collision that
    /// disambiguation cannot break. Reserved; should not occur under the
    /// slugging rules.
    #[error("Identifier conflict: {0}")]
    Conflict(String),

    /// The exclusive index lock could not be acquired in time.
    ///
    /// The reference design blocks on the lock, so this is never constructed
    /// at runtime; it completes the taxonomy for non-blocking deployments.
    #[error("Server busy: {0}")]
    ServerBusy(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl Error {
    /// Stable taxonomy identifier for this error.
    ///
    /// These strings are part of the protocol contract and must not change:
    /// they appear in `error.data.kind` on the wire and in editor failure
    /// payloads.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io_error",
            Self::Parse(_) => "parse_error",
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Stale(_) => "stale",
            Self::Cycle(_) => "cycle",
            Self::Conflict(_) => "conflict",
            Self::ServerBusy(_) => "server_busy",
        }
    }
}

/// Convenience alias used throughout doctree-core.
pub type Result<T> = std::result::Result<T, Error>;

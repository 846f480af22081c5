//! Error types for coil.

use std::{fmt, io};

// ─── StorageError ─────────────────────────────────────────────────────────────

/// Failure while loading or saving persisted session state.
///
/// Absence of a stored artifact is never an error: backends report it as a
/// successful load that leaves the state untouched.
#[derive(Debug)]
pub enum StorageError {
    /// The underlying storage medium failed.
    Io(io::Error),
    /// A persisted blob is structurally invalid — a declared section length
    /// overruns the buffer, a length is negative, or the blob is shorter
    /// than its fixed layout.  Corrupted state is not self-healing; the
    /// caller must discard or repair the artifact.
    Corrupt(String),
    /// A record inside an otherwise well-framed blob failed to decode.
    Wire(coil_tl::deserialize::Error),
}

impl StorageError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e)      => write!(f, "I/O error: {e}"),
            Self::Corrupt(s) => write!(f, "corrupt persisted state: {s}"),
            Self::Wire(e)    => write!(f, "record decode error: {e}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e)   => Some(e),
            Self::Wire(e) => Some(e),
            Self::Corrupt(_) => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl From<coil_tl::deserialize::Error> for StorageError {
    fn from(e: coil_tl::deserialize::Error) -> Self { Self::Wire(e) }
}

// ─── Superseded ───────────────────────────────────────────────────────────────

/// A pending conversation wait was settled without its update.
///
/// Returned when a newer `wait` call replaced the pending one (last wait
/// wins), or when the conversation was ended or removed while the wait was
/// still outstanding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Superseded;

impl fmt::Display for Superseded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wait superseded before a matching update arrived")
    }
}

impl std::error::Error for Superseded {}

// ─── RpcError ─────────────────────────────────────────────────────────────────

/// An error reported by the remote server through the underlying client.
///
/// Numeric values are stripped from the name and placed in [`RpcError::value`]:
/// `FLOOD_WAIT_30` → `RpcError { code: 420, name: "FLOOD_WAIT", value: Some(30) }`.
#[derive(Clone, Debug, PartialEq)]
pub struct RpcError {
    /// HTTP-like status code.
    pub code: i32,
    /// Error name in SCREAMING_SNAKE_CASE with digits removed.
    pub name: String,
    /// Numeric suffix extracted from the name, if any.
    pub value: Option<u32>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC {}: {}", self.code, self.name)?;
        if let Some(v) = self.value {
            write!(f, " (value: {v})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

impl RpcError {
    /// Parse a raw server error message like `"FLOOD_WAIT_30"`.
    pub fn from_wire(code: i32, message: &str) -> Self {
        if let Some(idx) = message.rfind('_') {
            let suffix = &message[idx + 1..];
            if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(v) = suffix.parse::<u32>() {
                    return Self { code, name: message[..idx].to_string(), value: Some(v) };
                }
            }
        }
        Self { code, name: message.to_string(), value: None }
    }

    /// Match on the error name, with optional wildcard prefix/suffix `'*'`.
    pub fn is(&self, pattern: &str) -> bool {
        if let Some(prefix) = pattern.strip_suffix('*') {
            self.name.starts_with(prefix)
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            self.name.ends_with(suffix)
        } else {
            self.name == pattern
        }
    }

    /// Returns the flood-wait duration in seconds, if this is a FLOOD_WAIT error.
    pub fn flood_wait_seconds(&self) -> Option<u64> {
        if self.code == 420 && self.name == "FLOOD_WAIT" {
            self.value.map(|v| v as u64)
        } else {
            None
        }
    }
}

// ─── ClientError ──────────────────────────────────────────────────────────────

/// The error type surfaced across the [`crate::client::MtprotoClient`]
/// boundary.  This layer carries it unmodified; interpreting transport or
/// server failures is the client's business.
#[derive(Debug)]
pub enum ClientError {
    /// The server rejected the request.
    Rpc(RpcError),
    /// Network / I/O failure inside the client.
    Io(io::Error),
    /// The request was dropped before completion (e.g. client shut down).
    Dropped,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(e)  => write!(f, "{e}"),
            Self::Io(e)   => write!(f, "I/O error: {e}"),
            Self::Dropped => write!(f, "request dropped"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl ClientError {
    /// Returns `true` if this is the named RPC error (supports `'*'` wildcards).
    pub fn is(&self, pattern: &str) -> bool {
        match self {
            Self::Rpc(e) => e.is(pattern),
            _            => false,
        }
    }

    /// If this is a FLOOD_WAIT error, returns how many seconds to wait.
    pub fn flood_wait_seconds(&self) -> Option<u64> {
        match self {
            Self::Rpc(e) => e.flood_wait_seconds(),
            _            => None,
        }
    }
}

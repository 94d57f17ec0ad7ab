//! Error taxonomy shared by every `aa-core` module.

use core::fmt;

/// Errors the core codec/signing pipeline can report.
///
/// Hash and encoding operations are pure and therefore never produce a
/// transient variant here — every variant reflects a caller mistake
/// (`BadInput`), a configuration gap (`AddressUnavailable`), a capability the
/// account family doesn't have yet (`UnsupportedOperation`), or a malformed
/// wire payload (`ValidationError`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Empty call list where a call is required, version mismatch, invalid
    /// hex, an address shorter than 20 bytes, etc.
    BadInput { message: String },
    /// An account's address was requested but neither a pre-computed address
    /// nor a resolver client was available.
    AddressUnavailable { family: &'static str },
    /// The account family cannot perform the requested capability yet (e.g.
    /// signing before an EIP-7702 delegation has happened).
    UnsupportedOperation { family: &'static str, operation: &'static str },
    /// Decoding ERC-7579 execute calldata failed: bad selector, unknown call
    /// kind, or truncated payload.
    ValidationError { message: String },
}

impl Error {
    /// Shorthand for [`Error::BadInput`].
    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::BadInput { message: message.into() }
    }

    /// Shorthand for [`Error::ValidationError`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError { message: message.into() }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadInput { message } => write!(f, "bad input: {message}"),
            Self::AddressUnavailable { family } => {
                write!(f, "address unavailable for account family {family}")
            }
            Self::UnsupportedOperation { family, operation } => {
                write!(f, "{family} does not support {operation}")
            }
            Self::ValidationError { message } => write!(f, "validation error: {message}"),
        }
    }
}

impl std::error::Error for Error {}

/// Convenience alias used throughout `aa-core`.
pub type Result<T> = core::result::Result<T, Error>;

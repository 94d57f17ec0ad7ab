//! Client-level error taxonomy: wraps `aa_core::Error` with the
//! two RPC-sourced kinds the orchestrator can encounter, `BundlerRpcError`
//! and `PublicRpcError`.

use core::fmt;
use regex::Regex;
use std::sync::OnceLock;

fn aa_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"AA\d+").expect("static regex is valid"))
}

/// Extracts the first `AA\d+` substring from an RPC error payload, the
/// convention bundlers use to report ERC-4337 validation/execution
/// failures.
pub fn extract_aa_code(payload: &str) -> Option<String> {
    aa_code_pattern().find(payload).map(|m| m.as_str().to_string())
}

/// A bundler JSON-RPC error, with the ERC-4337 `AA\d+` code pulled out of
/// `message`/`data` when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlerRpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<String>,
    pub aa_code: Option<String>,
}

impl BundlerRpcError {
    pub fn new(code: i64, message: impl Into<String>, data: Option<String>) -> Self {
        let message = message.into();
        let aa_code = extract_aa_code(&message).or_else(|| data.as_deref().and_then(extract_aa_code));
        Self { code, message, data, aa_code }
    }
}

impl fmt::Display for BundlerRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.aa_code {
            Some(aa) => write!(f, "bundler error {} ({aa}): {}", self.code, self.message),
            None => write!(f, "bundler error {}: {}", self.code, self.message),
        }
    }
}

/// A public-RPC error (`eth_call`, `eth_getCode`, `getSenderAddress`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicRpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<String>,
}

impl fmt::Display for PublicRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "public RPC error {}: {}", self.code, self.message)
    }
}

/// Every error the client crate can surface: the core's pure codec/signing
/// errors plus the two RPC-sourced kinds. No automatic retry — every error
/// is returned to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    Core(aa_core::Error),
    Bundler(BundlerRpcError),
    Public(PublicRpcError),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core(e) => write!(f, "{e}"),
            Self::Bundler(e) => write!(f, "{e}"),
            Self::Public(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<aa_core::Error> for ClientError {
    fn from(e: aa_core::Error) -> Self {
        Self::Core(e)
    }
}

impl From<BundlerRpcError> for ClientError {
    fn from(e: BundlerRpcError) -> Self {
        Self::Bundler(e)
    }
}

impl From<PublicRpcError> for ClientError {
    fn from(e: PublicRpcError) -> Self {
        Self::Public(e)
    }
}

pub type Result<T> = core::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_aa_code_from_payload() {
        let payload = "UserOperation reverted during simulation with reason: AA23 reverted";
        assert_eq!(extract_aa_code(payload), Some("AA23".to_string()));
    }

    #[test]
    fn returns_none_when_no_aa_code_present() {
        assert_eq!(extract_aa_code("execution reverted"), None);
    }

    #[test]
    fn bundler_error_captures_code_from_data_when_message_has_none() {
        let err = BundlerRpcError::new(-32500, "execution reverted", Some("AA21 didn't pay prefund".to_string()));
        assert_eq!(err.aa_code, Some("AA21".to_string()));
    }
}

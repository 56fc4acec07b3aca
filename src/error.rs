//! Unified error types for the TSS signer
//!
//! Every failure that aborts a signing request flows through [`TssError`],
//! tagged with the signing mode and the pipeline stage that produced it so
//! an operator can tell a backend outage from a digest/key mismatch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all signing operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TssError {
    pub code: ErrorCode,
    pub message: String,
    pub mode: Option<Mode>,
    pub stage: Option<Stage>,
}

impl TssError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            mode: None,
            stage: None,
        }
    }

    /// Attach the signing mode, keeping any mode that was already set.
    pub fn in_mode(mut self, mode: Mode) -> Self {
        self.mode.get_or_insert(mode);
        self
    }

    /// Attach the pipeline stage, keeping any stage that was already set.
    pub fn at_stage(mut self, stage: Stage) -> Self {
        self.stage.get_or_insert(stage);
        self
    }

    // Convenience constructors
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::BackendError, msg)
    }

    pub fn invalid_signature(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidSignature, msg)
    }

    pub fn signer_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SignerMismatch, msg)
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::EncodingError, msg)
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, msg)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// Fatal errors abort the request; only broadcast failures are reportable.
    pub fn is_fatal(&self) -> bool {
        self.code != ErrorCode::NetworkError
    }
}

impl fmt::Display for TssError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.code.as_str())?;
        match (self.mode, self.stage) {
            (Some(mode), Some(stage)) => write!(f, " {}/{}:", mode, stage)?,
            (Some(mode), None) => write!(f, " {}:", mode)?,
            (None, Some(stage)) => write!(f, " {}:", stage)?,
            (None, None) => {}
        }
        write!(f, " {}", self.message)
    }
}

impl std::error::Error for TssError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Signing pipeline
    BackendError,
    InvalidSignature,
    SignerMismatch,
    EncodingError,

    // Broadcast
    NetworkError,

    // Input / setup
    InvalidInput,
    ConfigError,

    // Internal
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BackendError => "backend_error",
            ErrorCode::InvalidSignature => "invalid_signature",
            ErrorCode::SignerMismatch => "signer_mismatch",
            ErrorCode::EncodingError => "encoding_error",
            ErrorCode::NetworkError => "network_error",
            ErrorCode::InvalidInput => "invalid_input",
            ErrorCode::ConfigError => "config_error",
            ErrorCode::Internal => "internal",
        }
    }
}

/// Signing mode a request runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Message,
    Transaction,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Message => write!(f, "message"),
            Mode::Transaction => write!(f, "tx"),
        }
    }
}

/// Pipeline step that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Sign,
    Resolve,
    ApplySignature,
    ExtractSender,
    Broadcast,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Sign => "sign",
            Stage::Resolve => "resolve",
            Stage::ApplySignature => "apply_signature",
            Stage::ExtractSender => "extract_sender",
            Stage::Broadcast => "broadcast",
        };
        f.write_str(name)
    }
}

/// Result type alias for signing operations
pub type TssResult<T> = Result<T, TssError>;

// Conversions from common error types

impl From<serde_json::Error> for TssError {
    fn from(e: serde_json::Error) -> Self {
        TssError::new(ErrorCode::InvalidInput, format!("JSON error: {}", e))
    }
}

impl From<hex::FromHexError> for TssError {
    fn from(e: hex::FromHexError) -> Self {
        TssError::new(ErrorCode::InvalidInput, format!("Invalid hex: {}", e))
    }
}

impl From<std::io::Error> for TssError {
    fn from(e: std::io::Error) -> Self {
        TssError::new(ErrorCode::Internal, e.to_string())
    }
}

impl From<reqwest::Error> for TssError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TssError::network("Request timed out")
        } else if e.is_connect() {
            TssError::network("Connection failed")
        } else {
            TssError::network(e.to_string())
        }
    }
}

impl From<secp256k1::Error> for TssError {
    fn from(e: secp256k1::Error) -> Self {
        TssError::invalid_signature(format!("Secp256k1 error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = TssError::signer_mismatch("no candidate matched")
            .in_mode(Mode::Transaction)
            .at_stage(Stage::Resolve);

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("signer_mismatch"));
        assert!(json.contains("resolve"));
        assert!(json.contains("transaction"));
    }

    #[test]
    fn test_display_carries_context() {
        let err = TssError::encoding("v overflows u64")
            .in_mode(Mode::Transaction)
            .at_stage(Stage::ApplySignature);
        assert_eq!(
            err.to_string(),
            "[encoding_error] tx/apply_signature: v overflows u64"
        );

        let bare = TssError::backend("peer timeout");
        assert_eq!(bare.to_string(), "[backend_error] peer timeout");
    }

    #[test]
    fn test_stage_names_match_json() {
        for stage in [
            Stage::Sign,
            Stage::Resolve,
            Stage::ApplySignature,
            Stage::ExtractSender,
            Stage::Broadcast,
        ] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn test_first_stage_wins() {
        let err = TssError::invalid_signature("s is zero")
            .at_stage(Stage::Sign)
            .at_stage(Stage::Resolve);
        assert_eq!(err.stage, Some(Stage::Sign));
    }

    #[test]
    fn test_only_network_errors_are_recoverable() {
        assert!(!TssError::network("rpc down").is_fatal());
        assert!(TssError::backend("rpc down").is_fatal());
        assert!(TssError::signer_mismatch("x").is_fatal());
    }
}

// ===================================================================================================
// Error Handling System - Comprehensive Error Types and Management
// ===================================================================================================
//
// Structured error types for the upload/download orchestration core, organized by the
// component that raises them. Each variant carries a descriptive message rather than a
// nested error chain so that orchestrator code can match on category without downcasting.
// ===================================================================================================

use std::error::Error as StdError;
use std::fmt;

/// Errors produced anywhere in the upload/download orchestration core.
#[derive(Debug)]
pub enum DfsError {
    // ===== SYSTEM-LEVEL ERRORS =====
    /// File system I/O failures: temp-file writes, source reads, stat failures.
    Io(String),

    /// Network/serialization failure while talking to the bridge (connection refused,
    /// timeout, malformed body). Distinct from `Bridge`, which means the bridge *answered*
    /// with an error status.
    Transport(String),

    /// The bridge answered with an HTTP status >= 400.
    Bridge { status: u16, message: String },

    /// Invalid configuration at construction (conflicting or missing auth, bad URI).
    Config(String),

    /// Malformed caller input (bad bucket id, non-positive byte range, etc).
    BadRequest(String),

    // ===== CRYPTOGRAPHIC ERRORS =====
    /// Request signing or digest computation failure.
    Crypto(String),

    // ===== STORAGE/TRANSFER ERRORS =====
    /// A single shard exhausted its transfer retry budget. Recovered internally by
    /// blacklisting the farmer and re-acquiring a contract; surfaces to a caller only
    /// if that recovery itself fails.
    ShardTransfer(String),

    /// A requested file, frame, or pointer window was not found.
    NotFound(String),

    // ===== DATA PROCESSING ERRORS =====
    Serialization(String),
    Deserialization(String),

    // ===== TERMINAL WRAPPERS =====
    /// Delivered to the completion callback when an upload cannot proceed after
    /// internal recovery is exhausted.
    UploadFailed(String),
    /// Delivered to the completion callback when a download cannot proceed.
    DownloadFailed(String),
    /// Delivered when the caller killed the upload/download before completion.
    Cancelled,
}

impl fmt::Display for DfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DfsError::Io(e) => write!(f, "IO error: {}", e),
            DfsError::Transport(e) => write!(f, "Transport error: {}", e),
            DfsError::Bridge { status, message } => {
                write!(f, "Bridge error ({}): {}", status, message)
            }
            DfsError::Config(e) => write!(f, "Configuration error: {}", e),
            DfsError::BadRequest(e) => write!(f, "Bad request: {}", e),
            DfsError::Crypto(e) => write!(f, "Cryptographic error: {}", e),
            DfsError::ShardTransfer(e) => write!(f, "Shard transfer error: {}", e),
            DfsError::NotFound(e) => write!(f, "Not found: {}", e),
            DfsError::Serialization(e) => write!(f, "Serialization error: {}", e),
            DfsError::Deserialization(e) => write!(f, "Deserialization error: {}", e),
            DfsError::UploadFailed(e) => write!(f, "Upload failed: {}", e),
            DfsError::DownloadFailed(e) => write!(f, "Download failed: {}", e),
            DfsError::Cancelled => write!(f, "Operation cancelled"),
        }
    }
}

impl StdError for DfsError {}

impl From<std::io::Error> for DfsError {
    fn from(error: std::io::Error) -> Self {
        DfsError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for DfsError {
    fn from(error: serde_json::Error) -> Self {
        DfsError::Serialization(error.to_string())
    }
}

impl From<reqwest::Error> for DfsError {
    fn from(error: reqwest::Error) -> Self {
        DfsError::Transport(error.to_string())
    }
}

impl From<hex::FromHexError> for DfsError {
    fn from(error: hex::FromHexError) -> Self {
        DfsError::Deserialization(format!("hex decode error: {}", error))
    }
}

/// Result type alias for orchestration operations.
pub type DfsResult<T> = Result<T, DfsError>;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while starting the renderer.
///
/// Nothing in the per-frame path returns these; once the frame loop is
/// running every stage is infallible.
#[derive(Error, Debug)]
pub enum SentinelError {
    /// Error related to IO operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: io::Error,
    },

    /// Config file is not valid TOML for `RendererConfig`
    #[error("Invalid config {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        message: String,
    },

    /// Config values out of their allowed range
    #[error("Configuration error: {0}")]
    Config(String),

    /// Window or render resources could not be created
    #[error("Startup error: {0}")]
    Startup(String),
}

/// Problems with a single ModeChannel line. Always recoverable: the line is
/// dropped and the transition state is left as it was.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Not JSON, or JSON missing required fields
    #[error("Malformed mode message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Line is not UTF-8
    #[error("Mode message is not UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),

    /// No newline within the allowed length
    #[error("Mode message longer than {0} bytes")]
    TooLong(u64),

    /// Intensity present but NaN or infinite
    #[error("Non-finite intensity in mode message")]
    NonFiniteIntensity,

    /// Goal present but NaN or infinite
    #[error("Non-finite goal in mode message")]
    NonFiniteGoal,

    /// Blank line
    #[error("Empty mode message")]
    Empty,
}

/// Type alias for Result with SentinelError
pub type Result<T> = std::result::Result<T, SentinelError>;

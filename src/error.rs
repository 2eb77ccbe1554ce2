//! Error types shared across the connection engine, codec pipeline, and
//! request processor.

use thiserror::Error;

use crate::result_code::ResultCode;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while operating QuickFT as either a server or a client.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying I/O failure (socket or filesystem).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The frame header was malformed or carried an unsupported message type.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A `Tframe` or `Tack` deadline elapsed before the operation completed.
    #[error("operation timed out")]
    Timeout,

    /// The peer closed the connection before a full frame was received.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// A wire-sourced path failed the root-confinement check.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Gzip compression of a file failed.
    #[error("gzip compression failed: {0}")]
    Compress(String),

    /// Gzip decompression of a file failed.
    #[error("gzip decompression failed: {0}")]
    Decompress(String),

    /// Base64 encoding of a file failed.
    #[error("base64 encoding failed: {0}")]
    Encode(String),

    /// Base64 decoding of a file failed.
    #[error("base64 decoding failed: {0}")]
    Decode(String),

    /// The requested destination directory was invalid or uncreatable.
    #[error("destination directory error: {0}")]
    DestinationDirectory(String),

    /// The configuration file could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// A response carried a message type other than the one expected.
    #[error("unexpected response message type")]
    UnexpectedResponse,

    /// A declared `length` exceeded the configured maximum and was rejected
    /// before any allocation was attempted.
    #[error("declared length {len} exceeds configured maximum {max}")]
    LengthExceedsMaximum {
        /// Declared length, in bytes.
        len: u64,
        /// Configured maximum, in bytes.
        max: u64,
    },
}

impl Error {
    /// Maps an internal failure onto the closed wire-level result
    /// vocabulary so the request processor can answer with a `=result:`
    /// token without a second parallel error taxonomy.
    #[must_use]
    pub fn as_result_code(&self) -> ResultCode {
        match self {
            Self::Io(_) | Self::ConnectionClosed => ResultCode::FileAccessError,
            Self::Protocol(_) => ResultCode::InvalidRequest,
            Self::Timeout => ResultCode::ConnectionError,
            Self::InvalidPath(_) => ResultCode::InvalidRequest,
            Self::Compress(_) => ResultCode::FileCompressError,
            Self::Decompress(_) => ResultCode::FileDecompressError,
            Self::Encode(_) => ResultCode::FileEncodeError,
            Self::Decode(_) => ResultCode::FileDecodeError,
            Self::DestinationDirectory(_) => ResultCode::InvalidDestinationDirectory,
            Self::Config(_) => ResultCode::ConfigError,
            Self::UnexpectedResponse => ResultCode::InvalidResponse,
            Self::LengthExceedsMaximum { .. } => ResultCode::InvalidRequest,
        }
    }
}

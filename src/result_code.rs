//! The closed result-code vocabulary exchanged in `=result:` tokens.
//!
//! Every outcome a server response can carry is one of these seventeen
//! values. Codes and their fixed-width wire tokens are a closed set: new
//! failure modes must map onto `Undefined` rather than grow this enum
//! casually, since the token width (19 bytes, underscore-padded) is part of
//! the wire contract.

use std::fmt;

/// Fixed width, in bytes, of a result token on the wire.
pub const RESULT_VALUE_LEN: usize = 19;

/// A result code exchanged in the `=result:` token of a response message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultCode {
    /// The operation completed successfully.
    Success,
    /// A connection-level failure (send/receive/timeout) occurred.
    ConnectionError,
    /// Catch-all for failures with no more specific code.
    Undefined,
    /// The local configuration could not be loaded or was invalid.
    ConfigError,
    /// The request was malformed or missing required parameters.
    InvalidRequest,
    /// The response was malformed or missing required parameters.
    InvalidResponse,
    /// The target file could not be accessed (permissions, I/O).
    FileAccessError,
    /// The target file does not exist.
    FileNotFound,
    /// Writing the target file failed.
    FileWriteError,
    /// Reading the target file failed.
    FileReadError,
    /// Gzip compression of the file failed.
    FileCompressError,
    /// Gzip decompression of the file failed.
    FileDecompressError,
    /// Base64 encoding of the file failed.
    FileEncodeError,
    /// Base64 decoding of the file failed.
    FileDecodeError,
    /// Deleting the target file failed.
    FileDeleteError,
    /// The destination directory path is invalid.
    InvalidDestinationDirectory,
    /// The destination directory does not exist and could not be created.
    CouldNotCreateDestinationDirectory,
}

impl ResultCode {
    /// The signed numeric code used internally and in diagnostics (not on
    /// the wire — the wire only ever carries the fixed-width string token).
    #[must_use]
    pub const fn numeric(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::ConnectionError => -100,
            Self::Undefined => -101,
            Self::ConfigError => -102,
            Self::InvalidRequest => -103,
            Self::InvalidResponse => -104,
            Self::FileAccessError => -105,
            Self::FileNotFound => -106,
            Self::FileWriteError => -107,
            Self::FileReadError => -108,
            Self::FileCompressError => -109,
            Self::FileDecompressError => -110,
            Self::FileEncodeError => -111,
            Self::FileDecodeError => -112,
            Self::FileDeleteError => -113,
            Self::InvalidDestinationDirectory => -114,
            Self::CouldNotCreateDestinationDirectory => -115,
        }
    }

    /// True if this code represents success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// The fixed 19-byte, underscore-padded wire token for this code.
    #[must_use]
    pub const fn as_token(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS____________",
            Self::ConnectionError => "CONNECTION_ERROR___",
            Self::Undefined => "UNDEFINED__________",
            Self::ConfigError => "CONFIG_ERROR_______",
            Self::InvalidRequest => "INVALID_REQUEST____",
            Self::InvalidResponse => "INVALID_RESPONSE___",
            Self::FileAccessError => "FILE_ACCESS_ERROR__",
            Self::FileNotFound => "FILE_NOT_FOUND_____",
            Self::FileWriteError => "FILE_WRITE_ERROR___",
            Self::FileReadError => "FILE_READ_ERROR____",
            Self::FileCompressError => "COMPRESS_ERROR_____",
            Self::FileDecompressError => "DECOMPRESS_ERROR___",
            Self::FileEncodeError => "ENCODE_ERROR_______",
            Self::FileDecodeError => "DECODE_ERROR_______",
            Self::FileDeleteError => "DELETE_ERROR_______",
            Self::InvalidDestinationDirectory => "DEST_DIR_INVALID___",
            Self::CouldNotCreateDestinationDirectory => "DEST_DIR_CREATE_ERR",
        }
    }

    /// Parses a wire token back into a `ResultCode`. Unknown or malformed
    /// tokens map to `Undefined`, matching `message_result_string_to_code`'s
    /// default-case behavior in the original implementation; this function
    /// never fails.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        match token {
            "SUCCESS____________" => Self::Success,
            "CONNECTION_ERROR___" => Self::ConnectionError,
            "CONFIG_ERROR_______" => Self::ConfigError,
            "INVALID_REQUEST____" => Self::InvalidRequest,
            "INVALID_RESPONSE___" => Self::InvalidResponse,
            "FILE_ACCESS_ERROR__" => Self::FileAccessError,
            "FILE_NOT_FOUND_____" => Self::FileNotFound,
            "FILE_WRITE_ERROR___" => Self::FileWriteError,
            "FILE_READ_ERROR____" => Self::FileReadError,
            "COMPRESS_ERROR_____" => Self::FileCompressError,
            "DECOMPRESS_ERROR___" => Self::FileDecompressError,
            "ENCODE_ERROR_______" => Self::FileEncodeError,
            "DECODE_ERROR_______" => Self::FileDecodeError,
            "DELETE_ERROR_______" => Self::FileDeleteError,
            "DEST_DIR_INVALID___" => Self::InvalidDestinationDirectory,
            "DEST_DIR_CREATE_ERR" => Self::CouldNotCreateDestinationDirectory,
            _ => Self::Undefined,
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_token().trim_end_matches('_'), self.numeric())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[ResultCode] = &[
        ResultCode::Success,
        ResultCode::ConnectionError,
        ResultCode::Undefined,
        ResultCode::ConfigError,
        ResultCode::InvalidRequest,
        ResultCode::InvalidResponse,
        ResultCode::FileAccessError,
        ResultCode::FileNotFound,
        ResultCode::FileWriteError,
        ResultCode::FileReadError,
        ResultCode::FileCompressError,
        ResultCode::FileDecompressError,
        ResultCode::FileEncodeError,
        ResultCode::FileDecodeError,
        ResultCode::FileDeleteError,
        ResultCode::InvalidDestinationDirectory,
        ResultCode::CouldNotCreateDestinationDirectory,
    ];

    #[test]
    fn tokens_are_nineteen_bytes() {
        for code in ALL {
            assert_eq!(code.as_token().len(), RESULT_VALUE_LEN);
        }
    }

    #[test]
    fn round_trips_through_token() {
        for code in ALL {
            assert_eq!(ResultCode::from_token(code.as_token()), *code);
        }
    }

    #[test]
    fn unknown_token_is_undefined() {
        assert_eq!(ResultCode::from_token("GARBAGE____________"), ResultCode::Undefined);
    }

    #[test]
    fn success_numeric_is_zero() {
        assert_eq!(ResultCode::Success.numeric(), 0);
    }
}

//! QUIFT_MSG frame encoding and decoding.
//!
//! A frame is a fixed 32-byte ASCII header followed by a variable part of
//! `=KEY:VALUE` tokens. This module is the single place that knows about
//! the header's byte offsets; callers never compute them inline.

use crate::error::{Error, Result};
use crate::result_code::{ResultCode, RESULT_VALUE_LEN};

/// Protocol name occupying header bytes `0..9`.
const PCOL_NAME: &str = "QUIFT_MSG";
/// Protocol version occupying header bytes `10..14`.
const VERSION: &str = "V1.0";
/// Total length of the fixed header, in bytes.
pub const HEADER_LEN: usize = 32;
/// Width of the `MSG_TYPE` field within the header.
const MSG_TYPE_LEN: usize = 8;
/// Width of the hex-encoded variable-part length field.
const LENGTH_FIELD_LEN: usize = 8;
/// I/O chunk size used by the connection engine for partial reads/writes.
pub const CHUNK_SIZE: usize = 1024;
/// Receive buffers are never allocated smaller than this for the variable
/// part, regardless of the declared length, to absorb small frames cheaply.
pub const VAR_PART_MINIMUM_LEN: usize = 256;

/// The literal 32-byte ACK frame. Carries no variable part.
pub const ACK_FRAME: &[u8; HEADER_LEN] = b"QUIFT_MSG=V1.0=ACK_____=00000000";

const TYPE_FILE_SND: &str = "FILE_SND";
const TYPE_FILE_RCV: &str = "FILE_RCV";
const TYPE_FILE_DEL: &str = "FILE_DEL";
const TYPE_ACK: &str = "ACK_____";

/// One of the three file operations carried by a non-ACK frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Upload: client sends file content to the server.
    Send,
    /// Download: client asks the server to send file content back.
    Receive,
    /// Delete: client asks the server to remove a file.
    Delete,
}

impl MessageKind {
    const fn bit(self) -> u8 {
        match self {
            Self::Send => 0x01,
            Self::Receive => 0x02,
            Self::Delete => 0x04,
        }
    }

    const fn type_str(self) -> &'static str {
        match self {
            Self::Send => TYPE_FILE_SND,
            Self::Receive => TYPE_FILE_RCV,
            Self::Delete => TYPE_FILE_DEL,
        }
    }

    fn from_type_str(s: &str) -> Option<Self> {
        match s {
            TYPE_FILE_SND => Some(Self::Send),
            TYPE_FILE_RCV => Some(Self::Receive),
            TYPE_FILE_DEL => Some(Self::Delete),
            _ => None,
        }
    }
}

/// A set of allowed [`MessageKind`]s, used to restrict what a header parse
/// will accept (e.g. the server accepts all three, a client awaiting a
/// response only accepts the kind it requested).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindMask(u8);

impl KindMask {
    /// Accepts any of SEND, RECEIVE, or DELETE.
    pub const ANY_REQUEST: Self = Self(MessageKind::Send.bit() | MessageKind::Receive.bit() | MessageKind::Delete.bit());

    /// A mask that accepts exactly one kind.
    #[must_use]
    pub const fn only(kind: MessageKind) -> Self {
        Self(kind.bit())
    }

    fn allows(self, kind: MessageKind) -> bool {
        self.0 & kind.bit() != 0
    }
}

/// Builds the 8-byte `=content:`-style hex length field, lowercase,
/// zero-padded, matching the original's `_itoa`-based encoding.
fn encode_hex_len(len: usize) -> String {
    format!("{len:0width$x}", width = LENGTH_FIELD_LEN)
}

fn build_header(type_str: &str, var_len: usize) -> [u8; HEADER_LEN] {
    let rendered = format!(
        "{PCOL_NAME}={VERSION}={type_str:.<width$}={hexlen}",
        width = MSG_TYPE_LEN,
        hexlen = encode_hex_len(var_len),
    );
    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(rendered.as_bytes());
    header
}

/// Parses and validates a 32-byte header, returning the message kind and
/// the declared variable-part length (in bytes). `allowed` restricts which
/// kinds are accepted; anything else — including a syntactically valid
/// header carrying an unexpected kind — is a [`Error::Protocol`].
pub fn parse_header(header: &[u8], allowed: KindMask) -> Result<(MessageKind, usize)> {
    if header.len() != HEADER_LEN {
        return Err(Error::Protocol(format!(
            "header must be exactly {HEADER_LEN} bytes, got {}",
            header.len()
        )));
    }
    let text = std::str::from_utf8(header)
        .map_err(|_| Error::Protocol("header is not valid ASCII".to_string()))?;

    if &text[0..9] != PCOL_NAME || &text[9..10] != "=" {
        return Err(Error::Protocol("bad protocol name".to_string()));
    }
    if &text[10..14] != VERSION || &text[14..15] != "=" {
        return Err(Error::Protocol("bad protocol version".to_string()));
    }
    let type_str = text[15..23].trim_end_matches('.');
    if &text[23..24] != "=" {
        return Err(Error::Protocol("malformed header separator".to_string()));
    }
    let kind = MessageKind::from_type_str(type_str)
        .ok_or_else(|| Error::Protocol(format!("unknown message type {type_str:?}")))?;
    if !allowed.allows(kind) {
        return Err(Error::Protocol(format!("message type {type_str:?} not allowed here")));
    }

    let var_len = usize::from_str_radix(&text[24..32], 16)
        .map_err(|_| Error::Protocol("malformed hex length field".to_string()))?;

    Ok((kind, var_len))
}

/// Parses the literal ACK frame. Any deviation — even a single differing
/// byte — is rejected; the ACK carries no fields to be lenient about.
#[must_use]
pub fn is_ack_frame(buf: &[u8]) -> bool {
    buf.len() == HEADER_LEN && buf == ACK_FRAME
}

/// Finds the byte offset immediately *after* `token` (i.e. the start of its
/// value), searching `haystack` starting at `from`. Used to extract
/// variable-part fields in strict left-to-right order: each call's `from`
/// is the end of the previous token's value, so a value that happens to
/// contain the literal text of a later token (e.g. a path containing
/// `=content:`) cannot desynchronize the parse.
fn find_token_value_start(haystack: &[u8], token: &str, from: usize) -> Option<usize> {
    let token = token.as_bytes();
    if from > haystack.len() || token.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(token.len())
        .position(|w| w == token)
        .map(|pos| from + pos + token.len())
}

/// Builds a FILE_SND request frame for uploading `content` to `path`.
#[must_use]
pub fn build_request_send(path: &str, content: &[u8]) -> Vec<u8> {
    let mut var_part = Vec::with_capacity(content.len() + path.len() + 64);
    var_part.extend_from_slice(b":=path:");
    var_part.extend_from_slice(path.as_bytes());
    var_part.extend_from_slice(b"=length:");
    var_part.extend_from_slice(content.len().to_string().as_bytes());
    var_part.extend_from_slice(b"=content:");
    var_part.extend_from_slice(content);
    frame_from(MessageKind::Send, &var_part)
}

/// Builds a FILE_RCV request frame asking for `filename`.
#[must_use]
pub fn build_request_receive(filename: &str) -> Vec<u8> {
    build_filename_request(MessageKind::Receive, filename)
}

/// Builds a FILE_DEL request frame targeting `filename`.
#[must_use]
pub fn build_request_delete(filename: &str) -> Vec<u8> {
    build_filename_request(MessageKind::Delete, filename)
}

fn build_filename_request(kind: MessageKind, filename: &str) -> Vec<u8> {
    let mut var_part = Vec::with_capacity(filename.len() + 16);
    var_part.extend_from_slice(b":=filename:");
    var_part.extend_from_slice(filename.as_bytes());
    frame_from(kind, &var_part)
}

/// Builds a result-only response frame (used by SEND, DELETE, and failed
/// RECEIVE responses).
#[must_use]
pub fn build_response_result_only(kind: MessageKind, result: ResultCode) -> Vec<u8> {
    let mut var_part = Vec::with_capacity(32);
    var_part.extend_from_slice(b":=result:");
    var_part.extend_from_slice(result.as_token().as_bytes());
    frame_from(kind, &var_part)
}

/// Builds a successful FILE_RCV response carrying the requested file's
/// compressed, base64-armored bytes.
#[must_use]
pub fn build_response_receive_success(content: &[u8]) -> Vec<u8> {
    let mut var_part = Vec::with_capacity(content.len() + 64);
    var_part.extend_from_slice(b":=result:");
    var_part.extend_from_slice(ResultCode::Success.as_token().as_bytes());
    var_part.extend_from_slice(b"=length:");
    var_part.extend_from_slice(content.len().to_string().as_bytes());
    var_part.extend_from_slice(b"=content:");
    var_part.extend_from_slice(content);
    frame_from(MessageKind::Receive, &var_part)
}

fn frame_from(kind: MessageKind, var_part: &[u8]) -> Vec<u8> {
    let header = build_header(kind.type_str(), var_part.len());
    let mut frame = Vec::with_capacity(HEADER_LEN + var_part.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(var_part);
    frame
}

/// Parsed fields of a FILE_SND request's variable part.
pub struct SendRequestFields {
    /// The `=path:` value — the remote destination path.
    pub path: String,
    /// The declared `=length:` value, in bytes.
    pub length: u64,
    /// Byte offset of the content within the variable part, so callers can
    /// slice it without an extra copy.
    pub content_offset: usize,
}

/// Parses a FILE_SND request's variable part (`var_part` excludes the
/// 32-byte header but includes the leading `:` separator). Tokens are
/// located strictly left-to-right as required by the protocol's handling
/// of attacker-controlled path/content bytes.
pub fn parse_send_request(var_part: &[u8]) -> Result<SendRequestFields> {
    let path_start = find_token_value_start(var_part, "=path:", 0)
        .ok_or_else(|| Error::Protocol("missing =path: token".to_string()))?;
    let length_key_start = find_token_value_start(var_part, "=length:", path_start)
        .ok_or_else(|| Error::Protocol("missing =length: token".to_string()))?;
    let length_token_len = "=length:".len();
    let path_end = length_key_start - length_token_len;
    let path = String::from_utf8_lossy(&var_part[path_start..path_end]).into_owned();

    let content_key_start = find_token_value_start(var_part, "=content:", length_key_start)
        .ok_or_else(|| Error::Protocol("missing =content: token".to_string()))?;
    let content_token_len = "=content:".len();
    let length_end = content_key_start - content_token_len;
    let length_str = std::str::from_utf8(&var_part[length_key_start..length_end])
        .map_err(|_| Error::Protocol("non-ASCII length field".to_string()))?;
    let length: u64 = length_str
        .parse()
        .map_err(|_| Error::Protocol(format!("malformed length field {length_str:?}")))?;
    if length == 0 {
        return Err(Error::Protocol("length must be > 0".to_string()));
    }

    Ok(SendRequestFields {
        path,
        length,
        content_offset: content_key_start,
    })
}

/// Parses a FILE_RCV or FILE_DEL request's variable part, whose only field
/// is `=filename:`, spanning to the end of the variable part.
pub fn parse_filename_request(var_part: &[u8]) -> Result<String> {
    let start = find_token_value_start(var_part, "=filename:", 0)
        .ok_or_else(|| Error::Protocol("missing =filename: token".to_string()))?;
    Ok(String::from_utf8_lossy(&var_part[start..]).into_owned())
}

/// Parsed fields of a response's variable part, as seen by a client.
pub struct ResponseFields {
    /// The result code carried by `=result:`.
    pub result: ResultCode,
    /// Offset and length of `=content:`'s value, when present (RECEIVE
    /// success responses only).
    pub content: Option<(usize, u64)>,
}

/// Parses a response's variable part. `kind` is the kind the *request*
/// declared; RECEIVE responses additionally carry `=length:`/`=content:`
/// when the result is `SUCCESS`.
pub fn parse_response(kind: MessageKind, var_part: &[u8]) -> Result<ResponseFields> {
    let result_start = find_token_value_start(var_part, "=result:", 0)
        .ok_or_else(|| Error::Protocol("missing =result: token".to_string()))?;
    if result_start + RESULT_VALUE_LEN > var_part.len() {
        return Err(Error::Protocol("truncated =result: value".to_string()));
    }
    let token = std::str::from_utf8(&var_part[result_start..result_start + RESULT_VALUE_LEN])
        .map_err(|_| Error::Protocol("non-ASCII result token".to_string()))?;
    let result = ResultCode::from_token(token);

    if kind != MessageKind::Receive || !result.is_success() {
        return Ok(ResponseFields { result, content: None });
    }

    let after_result = result_start + RESULT_VALUE_LEN;
    let length_key_start = find_token_value_start(var_part, "=length:", after_result)
        .ok_or_else(|| Error::Protocol("missing =length: token in response".to_string()))?;
    let content_key_start = find_token_value_start(var_part, "=content:", length_key_start)
        .ok_or_else(|| Error::Protocol("missing =content: token in response".to_string()))?;
    let length_end = content_key_start - "=content:".len();
    let length_str = std::str::from_utf8(&var_part[length_key_start..length_end])
        .map_err(|_| Error::Protocol("non-ASCII length field".to_string()))?;
    let length: u64 = length_str
        .parse()
        .map_err(|_| Error::Protocol(format!("malformed length field {length_str:?}")))?;

    Ok(ResponseFields {
        result,
        content: Some((content_key_start, length)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = build_header(MessageKind::Send.type_str(), 42);
        let (kind, len) = parse_header(&header, KindMask::ANY_REQUEST).unwrap();
        assert_eq!(kind, MessageKind::Send);
        assert_eq!(len, 42);
    }

    #[test]
    fn ack_frame_is_recognized() {
        assert!(is_ack_frame(ACK_FRAME));
        let mut tampered = *ACK_FRAME;
        tampered[31] = b'1';
        assert!(!is_ack_frame(&tampered));
    }

    #[test]
    fn rejects_kind_outside_mask() {
        let header = build_header(MessageKind::Delete.type_str(), 10);
        let err = parse_header(&header, KindMask::only(MessageKind::Send)).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn send_request_round_trips() {
        let frame = build_request_send("/uploads/a.bin", b"hello world");
        let (kind, var_len) = parse_header(&frame[..HEADER_LEN], KindMask::ANY_REQUEST).unwrap();
        assert_eq!(kind, MessageKind::Send);
        let var_part = &frame[HEADER_LEN..HEADER_LEN + var_len];
        let fields = parse_send_request(var_part).unwrap();
        assert_eq!(fields.path, "/uploads/a.bin");
        assert_eq!(fields.length, 11);
        let content = &var_part[fields.content_offset..fields.content_offset + fields.length as usize];
        assert_eq!(content, b"hello world");
    }

    #[test]
    fn send_request_path_containing_content_token_does_not_desync() {
        // A path value that happens to contain "=content:" must not confuse
        // the left-to-right parse, since =length: is located relative to
        // =path:'s own end, not by an independent scan for =content:.
        let path = "weird=content:path";
        let frame = build_request_send(path, b"payload");
        let var_part = &frame[HEADER_LEN..];
        let fields = parse_send_request(var_part).unwrap();
        assert_eq!(fields.path, path);
        assert_eq!(fields.length, 7);
    }

    #[test]
    fn filename_request_round_trips() {
        let frame = build_request_delete("reports/q1.csv");
        let var_part = &frame[HEADER_LEN..];
        let filename = parse_filename_request(var_part).unwrap();
        assert_eq!(filename, "reports/q1.csv");
    }

    #[test]
    fn receive_response_round_trips() {
        let frame = build_response_receive_success(b"compressed-bytes");
        let var_part = &frame[HEADER_LEN..];
        let fields = parse_response(MessageKind::Receive, var_part).unwrap();
        assert!(fields.result.is_success());
        let (offset, len) = fields.content.unwrap();
        assert_eq!(len, 17);
        assert_eq!(&var_part[offset..offset + len as usize], b"compressed-bytes");
    }

    #[test]
    fn result_only_response_has_no_content() {
        let frame = build_response_result_only(MessageKind::Delete, ResultCode::FileNotFound);
        let var_part = &frame[HEADER_LEN..];
        let fields = parse_response(MessageKind::Delete, var_part).unwrap();
        assert_eq!(fields.result, ResultCode::FileNotFound);
        assert!(fields.content.is_none());
    }

    #[test]
    fn varlen_zero_is_rejected_by_callers() {
        let header = build_header(MessageKind::Send.type_str(), 0);
        let (_, len) = parse_header(&header, KindMask::ANY_REQUEST).unwrap();
        assert_eq!(len, 0);
    }
}

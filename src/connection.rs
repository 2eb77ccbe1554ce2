//! The connection engine: chunked, deadline-driven frame I/O over an owned
//! [`tokio::net::TcpStream`] half.
//!
//! Each accepted or outgoing connection is driven by exactly one task, so
//! unlike the original's per-socket recursive mutex, no lock is needed here
//! — ownership of the stream is the synchronization. The listener is the
//! one socket genuinely shared between the accept loop and shutdown, and it
//! keeps its own lock in [`crate::server`].

use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::protocol::{self, KindMask, MessageKind, ACK_FRAME, CHUNK_SIZE, HEADER_LEN};

/// A frame received on a connection: its kind and the raw variable part
/// (header already stripped and validated).
pub struct ReceivedFrame {
    /// The message kind the header declared.
    pub kind: MessageKind,
    /// The variable part, exactly `varLen` bytes.
    pub var_part: Vec<u8>,
}

/// Reads `buf` to completion, waiting up to `tframe` for byte progress and
/// resetting the deadline each time data arrives — a sliding-idle timeout
/// rather than one hard cap on the whole read, matching §4.5 of the
/// original design.
async fn read_with_deadline(stream: &mut TcpStream, buf: &mut [u8], tframe: Duration) -> Result<()> {
    let mut filled = 0;
    let mut deadline = Instant::now() + tframe;
    while filled < buf.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::Timeout);
        }
        let want = (buf.len() - filled).min(CHUNK_SIZE);
        match tokio::time::timeout(remaining, stream.read(&mut buf[filled..filled + want])).await {
            Ok(Ok(0)) => return Err(Error::ConnectionClosed),
            Ok(Ok(n)) => {
                filled += n;
                deadline = Instant::now() + tframe;
            }
            Ok(Err(e)) => return Err(Error::Io(e)),
            Err(_) => return Err(Error::Timeout),
        }
    }
    Ok(())
}

/// Writes `buf` to completion in `CHUNK_SIZE`-bounded writes, under a single
/// fixed deadline computed once — unlike [`read_with_deadline`]'s
/// sliding-idle timeout, a send never extends `Tframe` on partial progress,
/// matching the original's `process_outgoing_message`, which sets
/// `exec_timeout` once before its send loop and never refreshes it.
async fn write_with_deadline(stream: &mut TcpStream, buf: &[u8], tframe: Duration) -> Result<()> {
    let mut sent = 0;
    let deadline = Instant::now() + tframe;
    while sent < buf.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::Timeout);
        }
        let want = (buf.len() - sent).min(CHUNK_SIZE);
        match tokio::time::timeout(remaining, stream.write(&buf[sent..sent + want])).await {
            Ok(Ok(0)) => return Err(Error::ConnectionClosed),
            Ok(Ok(n)) => sent += n,
            Ok(Err(e)) => return Err(Error::Io(e)),
            Err(_) => return Err(Error::Timeout),
        }
    }
    Ok(())
}

/// Receives one frame whose kind is in `allowed`, honoring `tframe`.
/// Rejects a syntactically valid header whose `varLen` is 0, per the
/// invariant that only the ACK frame (handled separately) carries no
/// variable part. `max_var_len` bounds the declared length *before* the
/// receive buffer is allocated, so a hostile header cannot force an
/// unbounded allocation ahead of any content-size validation.
pub async fn recv_frame(
    stream: &mut TcpStream,
    allowed: KindMask,
    tframe: Duration,
    max_var_len: u64,
) -> Result<ReceivedFrame> {
    let mut header = [0u8; HEADER_LEN];
    read_with_deadline(stream, &mut header, tframe).await?;
    let (kind, var_len) = protocol::parse_header(&header, allowed)?;
    if var_len == 0 {
        return Err(Error::Protocol("variable part length must be > 0".to_string()));
    }
    if var_len as u64 > max_var_len {
        return Err(Error::LengthExceedsMaximum {
            len: var_len as u64,
            max: max_var_len,
        });
    }

    let mut var_part = vec![0u8; var_len.max(protocol::VAR_PART_MINIMUM_LEN)];
    read_with_deadline(stream, &mut var_part[..var_len], tframe).await?;
    var_part.truncate(var_len);
    Ok(ReceivedFrame { kind, var_part })
}

/// Sends a complete, pre-built frame, honoring `tframe`.
pub async fn send_frame(stream: &mut TcpStream, frame: &[u8], tframe: Duration) -> Result<()> {
    write_with_deadline(stream, frame, tframe).await
}

/// Sends the literal ACK frame, honoring `tframe` (the ACK itself has no
/// separate deadline on the sending side — only the waiting side uses
/// `Tack`).
pub async fn send_ack(stream: &mut TcpStream, tframe: Duration) -> Result<()> {
    write_with_deadline(stream, ACK_FRAME, tframe).await
}

/// Waits up to `tack` for the literal ACK frame. Any short read or
/// non-matching bytes are discarded and polling continues until the
/// deadline, matching `client_get_ack`'s tolerance for partial reads.
pub async fn await_ack(stream: &mut TcpStream, tack: Duration) -> Result<()> {
    let deadline = Instant::now() + tack;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::Timeout);
        }
        let mut buf = [0u8; HEADER_LEN];
        match tokio::time::timeout(remaining, stream.read(&mut buf)).await {
            Ok(Ok(n)) if n == HEADER_LEN && protocol::is_ack_frame(&buf) => return Ok(()),
            Ok(Ok(_)) => continue,
            Ok(Err(e)) => return Err(Error::Io(e)),
            Err(_) => return Err(Error::Timeout),
        }
    }
}

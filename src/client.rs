//! Client-side operations: `send`, `receive`, and `delete`, grounded in the
//! original implementation's `client_file_send`/`client_file_receive`/
//! `client_file_delete` request/response cycle.
//!
//! Every operation follows the same shape: connect, send the request frame,
//! wait for the ACK, wait for the response, and check that the response's
//! message type matches what was requested before trusting its `=result:`.

use std::path::Path;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::codec;
use crate::config::Config;
use crate::connection;
use crate::error::{Error, Result};
use crate::protocol::{self, KindMask, MessageKind, ResponseFields};
use crate::result_code::ResultCode;

/// A connected QuickFT client bound to one server address, carrying the
/// timeouts and base64 line-wrap width to use for outgoing requests.
pub struct Client {
    server_addr: String,
    tframe: Duration,
    tack: Duration,
    base64_line_wrap: usize,
    max_var_len: u64,
}

impl Client {
    /// Builds a client targeting `server_addr` (`host:port`) using `config`
    /// for timeouts and encoding parameters. A `frame_timeout_secs` or
    /// `ack_timeout_secs` of 0 in `config` is overridden with the built-in
    /// default, mirroring `client_initialize`'s zero-means-default rule.
    #[must_use]
    pub fn new(server_addr: impl Into<String>, config: &Config) -> Self {
        let tframe = if config.frame_timeout_secs == 0 {
            Duration::from_secs(crate::config::DEFAULT_TFRAME_SECS)
        } else {
            config.frame_timeout()
        };
        let tack = if config.ack_timeout_secs == 0 {
            Duration::from_secs(crate::config::DEFAULT_TACK_SECS)
        } else {
            config.ack_timeout()
        };
        Self {
            server_addr: server_addr.into(),
            tframe,
            tack,
            base64_line_wrap: config.base64_line_wrap,
            max_var_len: config.max_content_length.saturating_add(4096),
        }
    }

    async fn connect(&self) -> Result<TcpStream> {
        Ok(TcpStream::connect(&self.server_addr).await?)
    }

    /// Sends `request` and waits for the ACK, matching `client_get_ack`'s
    /// discard-and-retry tolerance for stray or partial bytes.
    async fn send_and_ack(&self, stream: &mut TcpStream, request: &[u8]) -> Result<()> {
        connection::send_frame(stream, request, self.tframe).await?;
        connection::await_ack(stream, self.tack).await
    }

    /// Waits for a response frame whose kind matches `expected` — any other
    /// kind is an [`Error::UnexpectedResponse`], the same mismatch the
    /// original Python wrapper layer checked for explicitly — and returns
    /// both its parsed fields and the raw variable part, so callers needing
    /// `=content:` bytes can slice it without a second read.
    async fn await_response(&self, stream: &mut TcpStream, expected: MessageKind) -> Result<(ResponseFields, Vec<u8>)> {
        let frame = connection::recv_frame(stream, KindMask::only(expected), self.tframe, self.max_var_len).await?;
        if frame.kind != expected {
            return Err(Error::UnexpectedResponse);
        }
        let fields = protocol::parse_response(expected, &frame.var_part)?;
        Ok((fields, frame.var_part))
    }

    /// Uploads `local_path` to `remote_path` on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails, a deadline elapses, or the
    /// local file cannot be read and compressed. A server-side rejection is
    /// reported as `Ok` carrying a non-success [`ResultCode`], matching the
    /// wire protocol's separation of transport errors from result codes.
    pub async fn send(&self, local_path: &Path, remote_path: &str) -> Result<ResultCode> {
        let data = tokio::fs::read(local_path).await?;
        let packed = codec::gzip_pack(&data).map_err(|e| Error::Compress(e.to_string()))?;
        let encoded = codec::base64_encode(&packed, self.base64_line_wrap);

        let mut stream = self.connect().await?;
        let request = protocol::build_request_send(remote_path, &encoded);
        self.send_and_ack(&mut stream, &request).await?;
        let (fields, _) = self.await_response(&mut stream, MessageKind::Send).await?;
        info!(remote_path, result = %fields.result, "send complete");
        Ok(fields.result)
    }

    /// Downloads `remote_filename` from the server, writing it to
    /// `local_dest`. The destination's parent directory is created if
    /// missing, matching `client_get_file_receive_response_result`'s
    /// behavior, except when the parent is the destination root itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails, a deadline elapses, or the
    /// received content cannot be decoded and unpacked. A server-side
    /// rejection (file not found, access denied) is reported as `Ok`
    /// carrying a non-success [`ResultCode`], with no local file written.
    pub async fn receive(&self, remote_filename: &str, local_dest: &Path) -> Result<ResultCode> {
        let mut stream = self.connect().await?;
        let request = protocol::build_request_receive(remote_filename);
        self.send_and_ack(&mut stream, &request).await?;
        let (fields, var_part) = self.await_response(&mut stream, MessageKind::Receive).await?;

        if !fields.result.is_success() {
            return Ok(fields.result);
        }
        let Some((offset, length)) = fields.content else {
            return Err(Error::Protocol("success response carried no content".to_string()));
        };
        let end = offset
            .checked_add(usize::try_from(length).unwrap_or(usize::MAX))
            .filter(|&end| end <= var_part.len())
            .ok_or_else(|| Error::Protocol("truncated content field".to_string()))?;

        let decoded = codec::base64_decode(&var_part[offset..end]).map_err(|e| Error::Decode(e.to_string()))?;
        let unpacked = codec::gzip_unpack(&decoded).map_err(|e| Error::Decompress(e.to_string()))?;

        ensure_parent_dir(local_dest).await?;
        tokio::fs::write(local_dest, &unpacked).await?;
        debug!(bytes = unpacked.len(), "wrote received file");
        Ok(fields.result)
    }

    /// Asks the server to delete `remote_filename`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or a deadline elapses. A
    /// server-side rejection (file not found) is reported as `Ok` carrying a
    /// non-success [`ResultCode`].
    pub async fn delete(&self, remote_filename: &str) -> Result<ResultCode> {
        let mut stream = self.connect().await?;
        let request = protocol::build_request_delete(remote_filename);
        self.send_and_ack(&mut stream, &request).await?;
        let (fields, _) = self.await_response(&mut stream, MessageKind::Delete).await?;
        info!(remote_filename, result = %fields.result, "delete complete");
        Ok(fields.result)
    }
}

/// Creates `dest`'s parent directory if missing, skipping an empty or
/// already-existing parent.
async fn ensure_parent_dir(dest: &Path) -> Result<()> {
    let Some(parent) = dest.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.exists() {
        return Ok(());
    }
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| Error::DestinationDirectory(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::net::TcpListener;

    async fn respond_with(mut server: TcpStream, request_kind: MessageKind, response: Vec<u8>, max_var_len: u64) {
        connection::recv_frame(&mut server, KindMask::only(request_kind), Duration::from_secs(5), max_var_len)
            .await
            .unwrap();
        connection::send_ack(&mut server, Duration::from_secs(5)).await.unwrap();
        connection::send_frame(&mut server, &response, Duration::from_secs(5)).await.unwrap();
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.frame_timeout_secs = 5;
        config.ack_timeout_secs = 5;
        config
    }

    #[tokio::test]
    async fn send_reports_server_result_code() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = protocol::build_response_result_only(MessageKind::Send, ResultCode::Success);

        let server_task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            respond_with(stream, MessageKind::Send, response, 1024 * 1024).await;
        });

        let dir = tempdir().unwrap();
        let local_path = dir.path().join("payload.txt");
        std::fs::write(&local_path, b"client test payload").unwrap();

        let client = Client::new(addr.to_string(), &test_config());
        let result = client.send(&local_path, "remote/payload.txt").await.unwrap();
        assert_eq!(result, ResultCode::Success);
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn receive_writes_decoded_content_to_local_dest() {
        let original = b"round trip through the wire format";
        let packed = codec::gzip_pack(original).unwrap();
        let encoded = codec::base64_encode(&packed, 72);
        let response = protocol::build_response_receive_success(&encoded);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            respond_with(stream, MessageKind::Receive, response, 1024 * 1024).await;
        });

        let dir = tempdir().unwrap();
        let local_dest = dir.path().join("nested").join("downloaded.txt");

        let client = Client::new(addr.to_string(), &test_config());
        let result = client.receive("remote/file.txt", &local_dest).await.unwrap();
        assert_eq!(result, ResultCode::Success);
        assert_eq!(std::fs::read(&local_dest).unwrap(), original);
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn receive_of_missing_file_does_not_write_local_file() {
        let response = protocol::build_response_result_only(MessageKind::Receive, ResultCode::FileNotFound);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            respond_with(stream, MessageKind::Receive, response, 1024 * 1024).await;
        });

        let dir = tempdir().unwrap();
        let local_dest = dir.path().join("absent.txt");

        let client = Client::new(addr.to_string(), &test_config());
        let result = client.receive("missing.txt", &local_dest).await.unwrap();
        assert_eq!(result, ResultCode::FileNotFound);
        assert!(!local_dest.exists());
        server_task.await.unwrap();
    }

    #[test]
    fn zero_timeouts_fall_back_to_defaults() {
        let mut config = Config::default();
        config.frame_timeout_secs = 0;
        config.ack_timeout_secs = 0;
        let client = Client::new("127.0.0.1:29765", &config);
        assert_eq!(client.tframe, Duration::from_secs(crate::config::DEFAULT_TFRAME_SECS));
        assert_eq!(client.tack, Duration::from_secs(crate::config::DEFAULT_TACK_SECS));
    }
}

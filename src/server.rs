//! The server accept loop, bounded worker registry, and per-request
//! processor (C6 + C8).
//!
//! In place of the original's global singleton and fixed 512-slot linear
//! scan, an explicit [`Server`] value owns its [`Config`] and bounds
//! concurrent workers with a [`tokio::sync::Semaphore`]; shutdown is
//! cooperative via a [`CancellationToken`] rather than a shared abort flag.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::codec;
use crate::config::Config;
use crate::connection;
use crate::paths;
use crate::protocol::{self, KindMask, MessageKind};
use crate::result_code::ResultCode;

/// A running QuickFT server: its configuration and the admission-control
/// semaphore that bounds concurrently active workers to
/// `config.max_connections`.
pub struct Server {
    config: Arc<Config>,
}

impl Server {
    /// Builds a server from a validated configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Binds the listener and runs the accept loop until `shutdown` is
    /// cancelled, at which point the loop stops admitting new connections
    /// and waits for in-flight workers to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn run(&self, shutdown: CancellationToken) -> crate::error::Result<()> {
        let bind_addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(addr = %bind_addr, max_connections = self.config.max_connections, "quickft server listening");

        let semaphore = Arc::new(Semaphore::new(self.config.max_connections));
        let mut workers = JoinSet::new();

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(v) => v,
                        Err(e) => {
                            warn!(error = %e, "accept failed, continuing");
                            continue;
                        }
                    };

                    let permit = tokio::select! {
                        () = shutdown.cancelled() => break,
                        permit = Arc::clone(&semaphore).acquire_owned() => permit,
                    };
                    let Ok(permit) = permit else { break };

                    let config = Arc::clone(&self.config);
                    let worker_shutdown = shutdown.child_token();
                    workers.spawn(async move {
                        let _permit = permit;
                        handle_connection(stream, peer_addr, config, worker_shutdown).await;
                    });
                }
            }
        }

        while workers.join_next().await.is_some() {}
        info!("all workers finished, server stopped");
        Ok(())
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: std::net::SocketAddr,
    config: Arc<Config>,
    shutdown: CancellationToken,
) {
    let span = info_span!("connection", peer = %peer_addr);
    async move {
        let tframe = config.frame_timeout();
        let tack = config.ack_timeout();
        let max_var_len = config.max_content_length.saturating_add(4096);

        let frame = tokio::select! {
            () = shutdown.cancelled() => return,
            result = connection::recv_frame(&mut stream, KindMask::ANY_REQUEST, tframe, max_var_len) => result,
        };
        let frame = match frame {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "invalid header or framing error; closing without reply");
                return;
            }
        };

        if let Err(e) = connection::send_ack(&mut stream, tack).await {
            warn!(error = %e, "failed to send ACK; abandoning worker");
            return;
        }

        let response = dispatch(frame.kind, &frame.var_part, &config).await;

        if let Err(e) = connection::send_frame(&mut stream, &response, tframe).await {
            warn!(error = %e, "failed to send response frame");
        }
    }
    .instrument(span)
    .await;
}

async fn dispatch(kind: MessageKind, var_part: &[u8], config: &Config) -> Vec<u8> {
    match kind {
        MessageKind::Receive => handle_receive(var_part, config).await,
        MessageKind::Send => handle_send(var_part, config).await,
        MessageKind::Delete => handle_delete(var_part, config).await,
    }
}

async fn handle_receive(var_part: &[u8], config: &Config) -> Vec<u8> {
    let outcome: Result<Vec<u8>, ResultCode> = async {
        let filename = protocol::parse_filename_request(var_part).map_err(|_| ResultCode::InvalidRequest)?;
        let path = paths::resolve_within_root(&config.root_dir, &filename).map_err(|_| ResultCode::InvalidRequest)?;

        let data = tokio::fs::read(&path).await.map_err(|_| ResultCode::FileNotFound)?;
        if data.is_empty() {
            return Err(ResultCode::FileNotFound);
        }

        let packed = codec::gzip_pack(&data).map_err(|_| ResultCode::FileCompressError)?;
        Ok(codec::base64_encode(&packed, config.base64_line_wrap))
    }
    .await;

    match outcome {
        Ok(content) => {
            info!(bytes = content.len(), "receive request served");
            protocol::build_response_receive_success(&content)
        }
        Err(code) => {
            warn!(result = %code, "receive request failed");
            protocol::build_response_result_only(MessageKind::Receive, code)
        }
    }
}

async fn handle_send(var_part: &[u8], config: &Config) -> Vec<u8> {
    let outcome: Result<(), ResultCode> = async {
        let fields = protocol::parse_send_request(var_part).map_err(|_| ResultCode::InvalidRequest)?;
        let content_end = fields
            .content_offset
            .checked_add(usize::try_from(fields.length).unwrap_or(usize::MAX))
            .ok_or(ResultCode::InvalidRequest)?;
        if content_end > var_part.len() {
            return Err(ResultCode::InvalidRequest);
        }
        if fields.length > config.max_content_length {
            return Err(ResultCode::InvalidRequest);
        }

        let dest = paths::resolve_within_root(&config.root_dir, &fields.path)
            .map_err(|_| ResultCode::InvalidDestinationDirectory)?;
        let content = &var_part[fields.content_offset..content_end];

        if dest.exists() {
            let backup = backup_path(&dest);
            if let Err(e) = tokio::fs::copy(&dest, &backup).await {
                warn!(error = %e, dest = %dest.display(), "failed to create backup before overwrite (continuing)");
            }
        }

        ensure_destination_directory(&dest, &config.root_dir).await?;

        let decoded = codec::base64_decode(content).map_err(|_| ResultCode::FileDecodeError)?;
        let unpacked = codec::gzip_unpack(&decoded).map_err(|_| ResultCode::FileDecompressError)?;
        write_atomically(&dest, &unpacked).await.map_err(|_| ResultCode::FileWriteError)?;
        Ok(())
    }
    .await;

    match outcome {
        Ok(()) => {
            info!("send request served");
            protocol::build_response_result_only(MessageKind::Send, ResultCode::Success)
        }
        Err(code) => {
            warn!(result = %code, "send request failed");
            protocol::build_response_result_only(MessageKind::Send, code)
        }
    }
}

async fn handle_delete(var_part: &[u8], config: &Config) -> Vec<u8> {
    let outcome: Result<(), ResultCode> = async {
        let filename = protocol::parse_filename_request(var_part).map_err(|_| ResultCode::InvalidRequest)?;
        let path = paths::resolve_within_root(&config.root_dir, &filename).map_err(|_| ResultCode::InvalidRequest)?;
        if !path.exists() {
            return Err(ResultCode::FileNotFound);
        }
        tokio::fs::remove_file(&path).await.map_err(|_| ResultCode::FileDeleteError)?;
        Ok(())
    }
    .await;

    match outcome {
        Ok(()) => {
            info!("delete request served");
            protocol::build_response_result_only(MessageKind::Delete, ResultCode::Success)
        }
        Err(code) => {
            warn!(result = %code, "delete request failed");
            protocol::build_response_result_only(MessageKind::Delete, code)
        }
    }
}

/// Creates `dest`'s parent directory (mode 0700 on unix) if it is missing,
/// skipping the configured root itself. Every path segment that
/// `create_dir_all` has to create gets its own 0700, not just the
/// immediate parent, matching `file_mkdir_parent`'s component-by-component
/// `mkdir(tmp, 0700)` walk.
async fn ensure_destination_directory(dest: &Path, root: &Path) -> Result<(), ResultCode> {
    let Some(parent) = dest.parent() else {
        return Ok(());
    };
    if parent == root || parent.as_os_str().is_empty() || parent.exists() {
        return Ok(());
    }

    let mut missing = Vec::new();
    let mut cursor = Some(parent);
    while let Some(dir) = cursor {
        if dir == root || dir.as_os_str().is_empty() || dir.exists() {
            break;
        }
        missing.push(dir);
        cursor = dir.parent();
    }

    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|_| ResultCode::CouldNotCreateDestinationDirectory)?;

    for dir in missing {
        set_owner_only_permissions(dir);
    }
    Ok(())
}

#[cfg(unix)]
fn set_owner_only_permissions(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700));
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_dir: &Path) {}

fn backup_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".bkp");
    PathBuf::from(name)
}

/// Writes `content` to `dest` via a randomly-suffixed sibling temp file
/// followed by a rename, avoiding both partial-write visibility and the
/// original's tick-based temp-name collisions.
async fn write_atomically(dest: &Path, content: &[u8]) -> std::io::Result<()> {
    let suffix: u32 = rand::random();
    let mut tmp_name = dest.as_os_str().to_owned();
    tmp_name.push(format!(".tmp-{suffix:08x}"));
    let tmp_path = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, content).await?;
    tokio::fs::rename(&tmp_path, dest).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::net::TcpStream as ClientStream;

    async fn spawn_test_server(root: PathBuf) -> (std::net::SocketAddr, CancellationToken, tokio::task::JoinHandle<()>) {
        let mut config = Config::default();
        config.root_dir = root;
        config.bind_address = "127.0.0.1".to_string();
        config.port = 0;
        config.validate().unwrap();

        let listener = TcpListener::bind((config.bind_address.as_str(), 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        config.port = addr.port();

        let server = Server::new(config);
        let shutdown = CancellationToken::new();
        let shutdown_for_task = shutdown.clone();
        let handle = tokio::spawn(async move {
            server.run(shutdown_for_task).await.unwrap();
        });
        // Give the listener a moment to bind before tests connect.
        tokio::time::sleep(Duration::from_millis(20)).await;
        (addr, shutdown, handle)
    }

    #[tokio::test]
    async fn delete_of_missing_file_returns_file_not_found() {
        let dir = tempdir().unwrap();
        let (addr, shutdown, handle) = spawn_test_server(dir.path().to_path_buf()).await;

        let mut stream = ClientStream::connect(addr).await.unwrap();
        let request = protocol::build_request_delete("no-such-file");
        connection::send_frame(&mut stream, &request, Duration::from_secs(5)).await.unwrap();
        connection::await_ack(&mut stream, Duration::from_secs(5)).await.unwrap();
        let response = connection::recv_frame(
            &mut stream,
            KindMask::only(MessageKind::Delete),
            Duration::from_secs(5),
            1024 * 1024,
        )
        .await
        .unwrap();
        let fields = protocol::parse_response(MessageKind::Delete, &response.var_part).unwrap();
        assert_eq!(fields.result, ResultCode::FileNotFound);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn send_then_receive_round_trips_a_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("unused"), b"placeholder").unwrap();
        let (addr, shutdown, handle) = spawn_test_server(dir.path().to_path_buf()).await;

        let original = b"hello from the quickft test suite";
        let packed = codec::gzip_pack(original).unwrap();
        let encoded = codec::base64_encode(&packed, 72);

        let mut stream = ClientStream::connect(addr).await.unwrap();
        let request = protocol::build_request_send("uploaded.txt", &encoded);
        connection::send_frame(&mut stream, &request, Duration::from_secs(5)).await.unwrap();
        connection::await_ack(&mut stream, Duration::from_secs(5)).await.unwrap();
        let response = connection::recv_frame(
            &mut stream,
            KindMask::only(MessageKind::Send),
            Duration::from_secs(5),
            1024 * 1024,
        )
        .await
        .unwrap();
        let fields = protocol::parse_response(MessageKind::Send, &response.var_part).unwrap();
        assert_eq!(fields.result, ResultCode::Success);
        assert_eq!(std::fs::read(dir.path().join("uploaded.txt")).unwrap(), original);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn path_traversal_attempt_is_rejected() {
        let dir = tempdir().unwrap();
        let (addr, shutdown, handle) = spawn_test_server(dir.path().to_path_buf()).await;

        let mut stream = ClientStream::connect(addr).await.unwrap();
        let request = protocol::build_request_delete("../../etc/passwd");
        connection::send_frame(&mut stream, &request, Duration::from_secs(5)).await.unwrap();
        connection::await_ack(&mut stream, Duration::from_secs(5)).await.unwrap();
        let response = connection::recv_frame(
            &mut stream,
            KindMask::only(MessageKind::Delete),
            Duration::from_secs(5),
            1024 * 1024,
        )
        .await
        .unwrap();
        let fields = protocol::parse_response(MessageKind::Delete, &response.var_part).unwrap();
        assert_eq!(fields.result, ResultCode::InvalidRequest);

        shutdown.cancel();
        handle.await.unwrap();
    }
}

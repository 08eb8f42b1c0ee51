//! Unix domain socket listener - local front end for the exporter
//!
//! Serves the same exposition text as the HTTP listener over a local
//! socket, framed as a minimal HTTP/1.1 response the way the scrape
//! sidecars expect it. Each connection runs in its own task with a read
//! timeout so a stalled client cannot hold anything else up. Bind
//! failure (path in use, missing directory permissions) kills only this
//! listener; the HTTP side keeps serving.

use crate::exposition::{self, CONTENT_TYPE};
use crate::http::AppState;
use crate::health::ListenerState;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::{self, JoinHandle};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// How long a client gets to send its whole request line.
const READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on the request we are willing to buffer.
const MAX_REQUEST_BYTES: usize = 4096;

#[derive(Debug, Error)]
pub enum UdsError {
    #[error("failed to bind socket at {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("socket i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Remove a stale socket file and bind a fresh listener.
fn bind_socket(path: &Path) -> Result<UnixListener, UdsError> {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("could not remove stale socket {}: {e}", path.display());
        }
    }
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|source| UdsError::Bind {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }

    let listener = UnixListener::bind(path).map_err(|source| UdsError::Bind {
        path: path.to_path_buf(),
        source,
    })?;

    // Scrape sidecars run as other users; open up the socket like the
    // original deployment did.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o666)) {
            warn!("could not chmod socket {}: {e}", path.display());
        }
    }

    Ok(listener)
}

async fn write_response(stream: &mut UnixStream, status: &str, body: &str) -> Result<(), UdsError> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {CONTENT_TYPE}\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Read the request line, buffering at most MAX_REQUEST_BYTES.
async fn read_request_line(stream: &mut UnixStream) -> Option<String> {
    let mut buf = vec![0u8; MAX_REQUEST_BYTES];
    let mut filled = 0;

    loop {
        let read = match stream.read(&mut buf[filled..]).await {
            Ok(0) => return None,
            Ok(n) => n,
            Err(e) => {
                debug!("UDS read error: {e}");
                return None;
            }
        };
        filled += read;
        if let Some(pos) = buf[..filled].iter().position(|&b| b == b'\n') {
            return Some(String::from_utf8_lossy(&buf[..pos]).trim_end().to_string());
        }
        if filled == buf.len() {
            return None;
        }
    }
}

/// Handle one client: read a request line, answer with the current
/// snapshot. Anything that is not a GET gets a 400; a client that has
/// not produced a full request line within the deadline gets its
/// connection closed, however slowly it drips bytes in.
async fn handle_client(stream: UnixStream, app: AppState) {
    handle_client_with_timeout(stream, app, READ_TIMEOUT).await
}

async fn handle_client_with_timeout(mut stream: UnixStream, app: AppState, deadline: Duration) {
    let request_line = match timeout(deadline, read_request_line(&mut stream)).await {
        Ok(line) => line,
        Err(_) => {
            debug!("UDS client timed out before sending a full request");
            return;
        }
    };

    let result = match request_line.as_deref() {
        Some(line) if line.starts_with("GET ") => {
            let snapshot = app.store.current();
            let body = exposition::render(&snapshot, &app.registry, &app.hostname);
            write_response(&mut stream, "200 OK", &body).await
        }
        _ => write_response(&mut stream, "400 Bad Request", "bad request\n").await,
    };

    if let Err(e) = result {
        debug!("UDS write error: {e}");
    }
}

/// Spawn the socket listener task. Bind failure marks this listener
/// failed and returns without touching the rest of the process.
pub fn spawn_uds_listener(app_state: AppState, path: PathBuf) -> JoinHandle<()> {
    task::spawn(async move {
        let tracker = app_state.health_tracker.clone();
        tracker.set_uds_state(ListenerState::Starting);

        let listener = match bind_socket(&path) {
            Ok(l) => l,
            Err(e) => {
                error!("UDS listener failed: {e}");
                tracker.set_uds_state(ListenerState::Failed);
                return;
            }
        };

        tracker.set_uds_state(ListenerState::Serving);
        info!("UDS listener serving on {}", path.display());

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let app = app_state.clone();
                    task::spawn(handle_client(stream, app));
                }
                Err(e) => {
                    warn!("UDS accept error: {e}");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    })
}

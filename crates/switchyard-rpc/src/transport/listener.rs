//! Listener implementation for the JSONL transport.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use switchyard_wire::WireResponse;

use crate::errors::DispatchError;
use crate::reply;
use crate::service::Service;

use super::{LISTENER_TARGET, ListenerError};

/// Maximum size of a single request line in bytes.
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;

const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// JSONL listener exposing one service over a TCP socket.
///
/// The listener owns exactly one bound socket. [`RpcListener::start`] hands
/// the socket to a background accept task; calling it again fails with
/// [`ListenerError::AlreadyStarted`] instead of rebinding.
#[derive(Debug)]
pub struct RpcListener {
    service: Arc<Service>,
    local_addr: SocketAddr,
    listener: Mutex<Option<TcpListener>>,
}

impl RpcListener {
    /// Binds a listener for the given service.
    ///
    /// Bind to port 0 to let the OS choose a free port; the chosen address
    /// is available through [`RpcListener::local_addr`] before traffic is
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Bind`] when the socket cannot be bound.
    pub async fn bind(addr: &str, service: Arc<Service>) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::LocalAddr { source })?;
        Ok(Self {
            service,
            local_addr,
            listener: Mutex::new(Some(listener)),
        })
    }

    /// Returns the bound socket address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections in a background task.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::AlreadyStarted`] when the listener has
    /// already been started.
    pub fn start(&self) -> Result<ListenerHandle, ListenerError> {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ListenerError::AlreadyStarted)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let service = Arc::clone(&self.service);
        let handle = tokio::spawn(run_accept_loop(listener, service, shutdown_rx));
        Ok(ListenerHandle {
            shutdown: shutdown_tx,
            handle: Some(handle),
        })
    }
}

/// Handle to the background accept task.
///
/// Dropping the handle requests shutdown; [`ListenerHandle::join`] waits for
/// the task to finish.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Requests shutdown of the accept loop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Waits for the accept task to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::TaskPanic`] when the task panicked.
    pub async fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.await.map_err(|_| ListenerError::TaskPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn run_accept_loop(
    listener: TcpListener,
    service: Arc<Service>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        target: LISTENER_TARGET,
        addr = %listener.local_addr().map_or_else(|_| "unknown".to_owned(), |a| a.to_string()),
        "socket listener active"
    );
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(target: LISTENER_TARGET, peer = %peer, "accepted connection");
                    let service = Arc::clone(&service);
                    tokio::spawn(serve_connection(stream, service));
                }
                Err(error) => {
                    warn!(target: LISTENER_TARGET, %error, "socket accept error");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }
    debug!(target: LISTENER_TARGET, "socket listener stopped");
}

/// Serves one connection: answers request lines in order until the peer
/// closes the stream. Even unreadable requests are answered when a response
/// can still be framed (oversized lines get a parse error and the
/// connection stays usable).
async fn serve_connection(stream: TcpStream, service: Arc<Service>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let response = match read_request_line(&mut reader).await {
            Ok(Some(line)) => reply::respond_bytes(&service, &line).await,
            Ok(None) => {
                debug!(target: LISTENER_TARGET, "client closed connection");
                return;
            }
            Err(ReadError::TooLarge { size }) => {
                // Discard the rest of the line so the next read starts at a
                // line boundary instead of mid-request.
                drain_line(&mut reader).await;
                let error = DispatchError::protocol(format!(
                    "request too large: {size} bytes exceeds {MAX_REQUEST_BYTES} byte limit"
                ));
                WireResponse::failure(Value::Null, Value::Null, error.wire_error())
            }
            Err(ReadError::Io(error)) => {
                warn!(target: LISTENER_TARGET, %error, "failed to read request");
                return;
            }
        };

        if let Err(error) = write_response(&mut write_half, &response).await {
            warn!(target: LISTENER_TARGET, %error, "failed to write response");
            return;
        }
    }
}

enum ReadError {
    TooLarge { size: usize },
    Io(io::Error),
}

/// Reads one bounded request line.
///
/// Returns `Ok(None)` when the client disconnects without sending data and
/// `Ok(Some(bytes))` for a complete line (or EOF with partial data).
async fn read_request_line<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ReadError>
where
    R: AsyncBufRead + Unpin,
{
    let limit = u64::try_from(MAX_REQUEST_BYTES).unwrap_or(u64::MAX);
    let mut limited = (&mut *reader).take(limit.saturating_add(1));
    let mut buffer = Vec::new();
    let bytes_read = limited
        .read_until(b'\n', &mut buffer)
        .await
        .map_err(ReadError::Io)?;

    if bytes_read == 0 {
        return Ok(None);
    }
    if buffer.len() > MAX_REQUEST_BYTES {
        return Err(ReadError::TooLarge {
            size: buffer.len(),
        });
    }
    Ok(Some(buffer))
}

/// Discards input up to the end of the current line, bounded so a peer that
/// never sends a newline cannot pin the connection open.
async fn drain_line<R>(reader: &mut R)
where
    R: AsyncBufRead + Unpin,
{
    let mut scratch = Vec::new();
    let mut discarded = 0_usize;
    while discarded <= MAX_REQUEST_BYTES * 4 {
        scratch.clear();
        match (&mut *reader)
            .take(64 * 1024)
            .read_until(b'\n', &mut scratch)
            .await
        {
            Ok(0) | Err(_) => break,
            Ok(read) => {
                discarded = discarded.saturating_add(read);
                if scratch.last() == Some(&b'\n') {
                    break;
                }
            }
        }
    }
}

async fn write_response<W>(writer: &mut W, response: &WireResponse) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut body = serde_json::to_vec(response).map_err(io::Error::other)?;
    body.push(b'\n');
    writer.write_all(&body).await?;
    writer.flush().await
}

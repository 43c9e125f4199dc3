use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time::{self, Duration};
use tracing::{debug, error};

use crate::cluster::ClusterManager;
use crate::log::LogManager;
use crate::network::Connection;
use crate::request::{ApiRequest, RequestContext, RequestProcessor};
use crate::{AppError, AppResult};

use super::Shutdown;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    limit_connections: Arc<Semaphore>,
    notify_shutdown: broadcast::Sender<()>,
    shutdown_complete_tx: mpsc::Sender<()>,
    log_manager: Arc<LogManager>,
    cluster: Arc<ClusterManager>,
    max_frame_size: usize,
}

impl Server {
    pub fn new(
        listener: TcpListener,
        limit_connections: Arc<Semaphore>,
        notify_shutdown: broadcast::Sender<()>,
        shutdown_complete_tx: mpsc::Sender<()>,
        log_manager: Arc<LogManager>,
        cluster: Arc<ClusterManager>,
        max_frame_size: usize,
    ) -> Self {
        Server {
            listener,
            limit_connections,
            notify_shutdown,
            shutdown_complete_tx,
            log_manager,
            cluster,
            max_frame_size,
        }
    }

    /// Accepts connections until the task is cancelled, limiting concurrency
    /// with a semaphore permit per connection.
    pub async fn run(&self) -> AppResult<()> {
        loop {
            let permit = self
                .limit_connections
                .clone()
                .acquire_owned()
                .await
                .expect("connection semaphore closed");

            let socket = self.accept().await?;
            let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
            let client_ip = socket
                .peer_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            debug!("accepted connection {} from {}", connection_id, client_ip);

            let (reader, writer) = socket.into_split();
            let mut handler = ConnectionHandler {
                _shutdown_complete_tx: self.shutdown_complete_tx.clone(),
                notify_shutdown: self.notify_shutdown.clone(),
                connection_id,
                client_ip,
                connection: Connection::new(reader, self.max_frame_size),
                writer: BufWriter::new(writer),
                log_manager: self.log_manager.clone(),
                cluster: self.cluster.clone(),
            };

            tokio::spawn(async move {
                if let Err(err) = handler.handle_connection().await {
                    error!("connection {} error: {}", handler.connection_id, err);
                }
                drop(permit);
            });
        }
    }

    async fn accept(&self) -> AppResult<TcpStream> {
        let mut backoff = 1;
        loop {
            match self.listener.accept().await {
                Ok((socket, _)) => return Ok(socket),
                Err(err) => {
                    if backoff > 64 {
                        return Err(AppError::DetailedIoError(format!(
                            "accept tcp connection error: {}",
                            err
                        )));
                    }
                }
            }
            time::sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }
}

struct ConnectionHandler {
    notify_shutdown: broadcast::Sender<()>,
    _shutdown_complete_tx: mpsc::Sender<()>,
    connection_id: u64,
    client_ip: String,
    connection: Connection,
    writer: BufWriter<OwnedWriteHalf>,
    log_manager: Arc<LogManager>,
    cluster: Arc<ClusterManager>,
}

impl ConnectionHandler {
    /// Reads frames until the client disconnects or shutdown is signalled.
    /// Requests on one connection are serviced in order; a frame that fails
    /// to decode closes the connection without touching partition state.
    async fn handle_connection(&mut self) -> AppResult<()> {
        let mut shutdown = Shutdown::new(self.notify_shutdown.subscribe());
        loop {
            let maybe_frame = tokio::select! {
                res = self.connection.read_frame() => res?,
                _ = shutdown.recv() => {
                    debug!("connection {} stops reading on shutdown", self.connection_id);
                    return Ok(());
                }
            };

            let mut frame = match maybe_frame {
                Some(frame) => frame,
                None => break,
            };

            let request =
                ApiRequest::parse_from(&frame.request_header, &mut frame.request_body)?;
            let context = RequestContext {
                client_ip: self.client_ip.clone(),
                request_header: frame.request_header,
                log_manager: self.log_manager.clone(),
                cluster: self.cluster.clone(),
            };
            let response = RequestProcessor::process_request(request, &context).await;

            self.writer.write_all(&response).await?;
            self.writer.flush().await?;
        }
        debug!("connection {} closed by client", self.connection_id);
        Ok(())
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        debug!("connection handler {} dropped", self.connection_id);
    }
}

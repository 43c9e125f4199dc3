use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::signal;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tracing::{debug, error, info};

use crate::cluster::ClusterManager;
use crate::log::LogManager;
use crate::service::Server;
use crate::{global_config, AppError, AppResult};

#[derive(Clone, Debug)]
pub struct Node {
    pub node_id: i32,
    pub host: String,
    pub port: i32,
}

impl Node {
    pub fn new_localhost() -> Self {
        Node {
            node_id: global_config().general.id,
            host: global_config().network.ip.clone(),
            port: global_config().network.port as i32,
        }
    }
}

pub struct Broker;

impl Broker {
    /// Runs the broker to completion: recover all partition logs, serve the
    /// wire protocol until ctrl-c, then flush and close every log.
    pub fn start(rt: &Runtime) -> AppResult<()> {
        let (notify_shutdown, _) = broadcast::channel(1);
        let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel::<()>(1);

        let log_manager = Arc::new(rt.block_on(async {
            LogManager::startup(global_config().log.clone())
        })?);
        let cluster = Arc::new(ClusterManager::new_local(
            Node::new_localhost(),
            global_config().general.default_partitions,
        ));

        rt.block_on(Self::run_tcp_server(
            log_manager.clone(),
            cluster,
            notify_shutdown.clone(),
            shutdown_complete_tx.clone(),
        ))?;

        // server stopped: tell connection handlers, wait for them to drain
        let _ = notify_shutdown.send(());
        drop(shutdown_complete_tx);
        debug!("waiting for connection handlers to finish...");
        rt.block_on(async {
            shutdown_complete_rx.recv().await;
        });

        log_manager.close_all()?;
        info!("broker shutdown complete");
        Ok(())
    }

    async fn run_tcp_server(
        log_manager: Arc<LogManager>,
        cluster: Arc<ClusterManager>,
        notify_shutdown: broadcast::Sender<()>,
        shutdown_complete_tx: mpsc::Sender<()>,
    ) -> AppResult<()> {
        let network_conf = &global_config().network;
        let listen_address = format!("{}:{}", network_conf.ip, network_conf.port);

        let listener = TcpListener::bind(&listen_address).await.map_err(|e| {
            AppError::DetailedIoError(format!("bind to {} failed: {}", listen_address, e))
        })?;
        info!("listening on {}", listen_address);

        let server = Server::new(
            listener,
            Arc::new(Semaphore::new(network_conf.max_connection)),
            notify_shutdown,
            shutdown_complete_tx,
            log_manager,
            cluster,
            network_conf.max_package_size,
        );

        tokio::select! {
            res = server.run() => {
                if let Err(err) = res {
                    error!("server failed: {}", err);
                    return Err(err);
                }
            }
            _ = signal::ctrl_c() => {
                info!("received ctrl-c, shutting down");
            }
        }
        Ok(())
    }
}

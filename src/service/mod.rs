mod app_error;
mod broker;
mod config;
mod server;
mod shutdown;

pub use app_error::{AppError, AppResult};
pub use broker::{Broker, Node};
pub use config::{
    global_config, BrokerConfig, GeneralConfig, LogConfig, NetworkConfig, GLOBAL_CONFIG,
};
pub use server::Server;
pub use shutdown::Shutdown;

use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

pub fn setup_tracing() -> AppResult<()> {
    let timer = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.6f".to_string());
    let subscriber = tracing_subscriber::fmt()
        .with_timer(timer)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

use std::path::PathBuf;

use clap::Parser;
use tokio::runtime;
use tracing::error;
use vonnegut::{setup_tracing, AppResult, Broker, BrokerConfig, GLOBAL_CONFIG};

#[derive(Parser)]
#[command(version, about = "vonnegut commit-log broker")]
pub struct CommandLine {
    /// path to config file
    #[arg(short, long)]
    pub conf: Option<String>,
}

fn main() {
    if let Err(e) = run() {
        error!("vonnegut failed to start: {}", e);
        eprintln!("vonnegut failed to start: {}", e);
        std::process::exit(1);
    }
}

fn run() -> AppResult<()> {
    let commandline = CommandLine::parse();
    setup_tracing()?;

    let config_path = commandline
        .conf
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./conf.toml"));
    let broker_config = BrokerConfig::set_up_config(config_path)?;
    GLOBAL_CONFIG
        .set(broker_config)
        .expect("set broker config failed");

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    Broker::start(&rt)?;
    Ok(())
}

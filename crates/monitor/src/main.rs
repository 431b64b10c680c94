//! ArgusVision monitor - Main Entry Point

use monitor::{init_logging, run, MonitorConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MonitorConfig::load()?;
    init_logging(&config.log_level, config.log_json)?;

    info!("=== ArgusVision monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Collector: {}", config.collector.base_url);

    run(config).await
}

use anyhow::Result;
use pdf_to_cosense::config::{Config, DEFAULT_CONFIG_FILE};
use pdf_to_cosense::utils::logging;
use pdf_to_cosense::{App, ShutdownSignal};
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置（配置文件 + 环境变量）
    let config = Config::load(DEFAULT_CONFIG_FILE)?;

    // 初始化日志
    logging::init(config.verbose_logging);

    let shutdown = ShutdownSignal::new();
    shutdown.listen_for_ctrl_c();

    // 初始化并运行应用
    let app = App::initialize(config, shutdown).await?;
    if let Err(e) = app.run().await {
        error!("❌ 运行终止: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

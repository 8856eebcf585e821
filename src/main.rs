//! # EventHub 主程序

use std::sync::Arc;

use clap::Parser;
use eventhub::{
    Result,
    app::{AppContext, AppState},
    config, database, lerror, linfo,
    logging::{self, LogComponent, LogStage},
    web,
};

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "eventhub", version, about = "EventHub 认证服务")]
struct Cli {
    /// 日志级别，`RUST_LOG` 优先
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// 只执行数据库迁移后退出
    #[arg(long)]
    migrate_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.as_deref());

    if let Err(e) = run(&cli).await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "service_start_failed",
            &format!("服务启动失败: {e}"),
            code = e.error_code()
        );
        std::process::exit(1);
    }

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
    Ok(())
}

async fn run(cli: &Cli) -> Result<()> {
    let config = Arc::new(config::load_config()?);
    linfo!(
        "system",
        LogStage::Configuration,
        LogComponent::Config,
        "config_loaded",
        "配置加载完成",
        bind = %config.server.bind_address
    );

    let db = database::init_database(&config.database).await?;
    database::run_migrations(&db).await?;
    if cli.migrate_only {
        linfo!(
            "system",
            LogStage::Database,
            LogComponent::Main,
            "migrate_only_done",
            "数据库迁移完成，按参数退出"
        );
        return Ok(());
    }

    let context = AppContext::new(config, db)?;
    web::serve(AppState::new(context)).await
}

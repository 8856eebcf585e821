//! # HTTP 服务器

use std::time::Duration;

use tokio::net::TcpListener;

use super::routes::build_router;
use crate::app::AppState;
use crate::auth::SqlSessionStore;
use crate::error::{HubError, Result};
use crate::{lerror, linfo, logging::{LogComponent, LogStage}};

/// 过期会话清理间隔
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

/// 绑定监听地址并运行，直到收到退出信号
pub async fn serve(state: AppState) -> Result<()> {
    let addr = state.config.server.bind_address;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| HubError::network_with_source(format!("无法监听 {addr}"), e))?;

    let cleanup = tokio::spawn(
        SqlSessionStore::new(state.db.clone()).run_cleanup(SESSION_CLEANUP_INTERVAL),
    );
    let router = build_router(state);

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Server,
        "server_start",
        &format!("服务已启动: http://{addr}")
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    cleanup.abort();

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Server,
        "server_stopped",
        "服务已停止"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            lerror!(
                "system",
                LogStage::Shutdown,
                LogComponent::Server,
                "signal_handler_failed",
                &format!("无法监听 Ctrl+C: {e}")
            );
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let terminate = async {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(_) => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}

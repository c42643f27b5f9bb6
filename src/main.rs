//! 看板服务入口

use board_service::{
    cache::{spawn_purge_task, MemoryTokenCache, TokenCache},
    config::AppConfig,
    db,
    handlers::health,
    middleware::AppState,
    repository::PgStore,
    routes, telemetry,
};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};

/// 命令行只支持少量开关，其余配置全部走环境变量
enum Mode {
    Serve,
    /// 执行迁移并写入内置角色后退出，供部署流水线使用
    MigrateOnly,
}

fn parse_args() -> Option<Mode> {
    match std::env::args().nth(1).as_deref() {
        None => Some(Mode::Serve),
        Some("--migrate-only") => Some(Mode::MigrateOnly),
        Some("--version") => {
            println!("board-service {}", env!("CARGO_PKG_VERSION"));
            None
        }
        Some("--help") => {
            print_help();
            None
        }
        Some(other) => {
            eprintln!("未知参数: {}", other);
            print_help();
            std::process::exit(2);
        }
    }
}

fn load_dotenv() {
    // BOARD_ENV=staging 读取 .env.staging；否则 .env.local 优先于 .env
    match std::env::var("BOARD_ENV") {
        Ok(env) => {
            dotenv::from_filename(format!(".env.{}", env)).ok();
        }
        Err(_) => {
            dotenv::from_filename(".env.local").ok();
            dotenv::dotenv().ok();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(mode) = parse_args() else {
        return Ok(());
    };

    load_dotenv();
    health::set_start_time();

    let config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    telemetry::init_telemetry(&config.logging);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Board service starting");

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    let store = PgStore::new(pool);
    store.bootstrap_rbac().await?;

    if let Mode::MigrateOnly = mode {
        tracing::info!("Schema and role catalogue ready, exiting");
        return Ok(());
    }

    let shutdown_grace = Duration::from_secs(config.server.graceful_shutdown_timeout_secs);
    let listener = TcpListener::bind(&config.server.addr).await?;
    tracing::info!(addr = %config.server.addr, "Server listening");

    let tokens: Arc<dyn TokenCache> = Arc::new(MemoryTokenCache::new());
    let purge = spawn_purge_task(
        tokens.clone(),
        Duration::from_secs(config.invitations.purge_interval_secs),
    );

    let state = Arc::new(AppState::with_token_cache(config, Arc::new(store), tokens)?);
    axum::serve(listener, routes::create_router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown_grace))
        .await?;

    purge.abort();
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 收到 Ctrl+C 或 SIGTERM 后开始排空连接；超过宽限期仍未结束则强制退出
async fn shutdown_signal(grace: Duration) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received, draining connections"),
        _ = terminate => tracing::info!("SIGTERM received, draining connections"),
    }

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        tracing::warn!(grace_secs = grace.as_secs(), "Shutdown grace period elapsed, forcing exit");
        std::process::exit(1);
    });
}

fn print_help() {
    println!("board-service {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: board-service [--migrate-only | --version | --help]");
    println!();
    println!("  --migrate-only  执行数据库迁移、写入内置角色后退出");
    println!("  --version       打印版本信息");
    println!("  --help          打印此帮助信息");
    println!();
    println!("配置通过 BOARD_ 前缀的环境变量提供，参考 .env.example");
}

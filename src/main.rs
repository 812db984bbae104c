//! PromptStack Gateway 服务主入口
//!
//! 能力检测与多提供商LLM路由网关

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use promptstack_gateway::business::services::SharedRateLimitService;
use promptstack_gateway::shared::constants;
use promptstack_gateway::{create_routes, AppError, AppState, Config, EnvConfigSource};

/// 命令行参数，优先级高于环境变量
#[derive(Parser, Debug)]
#[command(name = "promptstack-gateway", version, about = "能力检测与多提供商LLM路由网关")]
struct Args {
    /// 监听地址
    #[arg(long)]
    host: Option<String>,

    /// 监听端口
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志 - 默认INFO等级，便于生产环境使用
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "promptstack_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("🚀 启动 PromptStack Gateway 服务");

    // 加载配置（包含 .env）
    let source = Arc::new(EnvConfigSource::load());
    let mut config = Config::from_source(source.as_ref());
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    info!("✅ 配置加载成功: environment={}", config.server.environment);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    // 构建应用状态，必需服务缺失时拒绝启动
    let state = match AppState::build(config, source).await {
        Ok(state) => state,
        Err(AppError::Configuration(msg)) => {
            error!("❌ 启动失败，必需服务未配置: {}", msg);
            return Err(anyhow::anyhow!("配置错误: {}", msg));
        }
        Err(e) => return Err(e.into()),
    };
    info!("✅ 应用状态初始化成功");

    spawn_rate_limit_cleanup(state.rate_limiter.clone());

    let app = create_routes(state);
    info!("✅ 路由创建成功");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("🌐 服务器启动成功，监听地址: {}", bind_addr);
    info!("📖 健康检查: http://{}/health", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 接收到关闭信号，正在优雅关闭服务器...");
    })
    .await?;

    Ok(())
}

/// 定期清理过期的限流窗口
fn spawn_rate_limit_cleanup(rate_limiter: SharedRateLimitService) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(
            constants::rate_limit::CLEANUP_INTERVAL_SECONDS,
        ));
        loop {
            interval.tick().await;
            let removed = rate_limiter.cleanup_expired_records().await;
            if removed > 0 {
                tracing::debug!("🧹 清理了 {} 个过期限流窗口", removed);
            }
        }
    });
}

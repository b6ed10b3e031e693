use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use guardian_backend::{
    AppState, config::Config, generator::GeminiGenerator, routes, scoring::ColorHeuristicScorer,
};
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // HTTP 客户端超时略大于建议截止时间，真正的截止由建议服务控制
    let advisory = config.advisory();
    let generator = GeminiGenerator::new(
        &config.gemini_api_base,
        &config.gemini_model_id,
        &config.gemini_api_key,
        advisory.generator_timeout + Duration::from_secs(1),
    )
    .expect("Failed to create Gemini client");

    // 设置应用状态
    let state = AppState::new(
        config.clone(),
        Arc::new(generator),
        Arc::new(ColorHeuristicScorer),
    );

    // 启动限流表的后台清理
    let _sweeper = state.admission.spawn_sweeper();

    let limits = config.rate_limit();
    tracing::info!(
        requests_per_window = limits.requests_per_window,
        burst_limit = limits.burst_limit,
        window_secs = limits.window_size.as_secs(),
        cache_ttl_secs = advisory.cache_ttl.as_secs(),
        max_concurrent_generations = advisory.max_concurrent_generations,
        "Resource governance configured"
    );

    let router = routes::create_router(state.clone());

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        // 设置开发环境的CORS，允许所有来源
        router.layer(CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}

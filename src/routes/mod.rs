use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::{
    AppState,
    middleware::{log_errors, rate_limit},
};

pub mod analysis;
pub mod health;

/// 上传体积之外留给 multipart 边界和其他字段的余量
const MULTIPART_OVERHEAD: usize = 64 * 1024;

// 创建主路由
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/analyze", post(analysis::analyze))
        .route("/advice", post(analysis::advise))
        .layer(DefaultBodyLimit::max(body_limit))
        // 添加日志中间件和限流中间件，限流在最外层
        .layer(axum::middleware::from_fn(log_errors))
        .layer(axum::middleware::from_fn_with_state(
            state.admission.clone(),
            rate_limit,
        ))
        .with_state(state)
}

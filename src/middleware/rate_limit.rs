use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{admission::AdmissionController, error::AppError};

/// 按 X-Real-IP、X-Forwarded-For、连接地址的顺序确定客户端标识
pub fn client_key<B>(req: &Request<B>) -> String {
    // 从连接信息获取原始IP
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .filter(|ip| !ip.trim().is_empty())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref()) // 降级使用连接IP
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(admission): State<AdmissionController>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let client = client_key(&req);
    let decision = admission.admit(&client);

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        tracing::debug!(
            client = %client,
            retry_after = decision.retry_after_secs(),
            "request rejected by admission control"
        );
        AppError::RateLimited {
            retry_after_secs: decision.retry_after_secs(),
        }
        .into_response()
    };

    decision.apply_headers(response.headers_mut());
    response
}

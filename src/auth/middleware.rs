//! 身份识别中间件
//!
//! 不拒绝任何请求，只把识别结果放入请求扩展，是否必须认证由认证守卫决定

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::debug;

use crate::business::domain::AuthUser;
use crate::presentation::routes::AppState;

/// 请求方身份（无效或缺失的Token为 None）
#[derive(Debug, Clone, Default)]
pub struct CallerIdentity(pub Option<AuthUser>);

/// 请求方IP
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

/// 身份识别中间件
pub async fn identity_middleware(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match extract_bearer_token(request.headers()) {
        Some(token) => match app_state.identity_verifier.verify(&token).await {
            Ok(user) => {
                debug!("🔑 已识别调用方: {}", user.id);
                Some(user)
            }
            Err(e) => {
                debug!("🔑 Token无效，按匿名请求处理: {}", e);
                None
            }
        },
        None => None,
    };

    let client_ip = extract_client_ip(
        request.headers(),
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0),
    );

    request.extensions_mut().insert(CallerIdentity(identity));
    request.extensions_mut().insert(ClientIp(client_ip));

    next.run(request).await
}

/// 从Authorization header中提取Bearer token
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|auth_header| auth_header.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// 来源IP：X-Forwarded-For 的第一个地址，其次 X-Real-IP，最后是连接地址
fn extract_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        })
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_extract_client_ip_precedence() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(extract_client_ip(&headers, None), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("172.16.0.1"));
        assert_eq!(extract_client_ip(&headers, Some(peer)), "172.16.0.1");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5, 10.0.0.1"));
        assert_eq!(extract_client_ip(&headers, Some(peer)), "203.0.113.5");
    }
}

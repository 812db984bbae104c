//! 适配器共用的HTTP调用
//!
//! 负责有界重试以及把HTTP层失败映射为 [`ProviderError`]

use rand::Rng;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::{AdapterContext, ProviderError, ProviderResult};
use crate::shared::utils::truncate_chars;

/// 400 响应体中表示内容策略拦截的关键字
const SAFETY_MARKERS: &[&str] = &["content_policy_violation", "content_filter"];

enum Failure {
    /// 5xx 与连接失败，可以重试
    Retryable(ProviderError),
    Final(ProviderError),
}

/// 发送JSON请求，5xx 和连接失败最多重试到 `max_attempts` 次
pub async fn send_json<F>(ctx: &AdapterContext, provider: &str, build: F) -> ProviderResult<Value>
where
    F: Fn() -> RequestBuilder,
{
    let max_attempts = ctx.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = match build().send().await {
            Ok(response) => read_response(response).await,
            Err(e) => Err(classify_transport(e)),
        };

        match outcome {
            Ok(value) => {
                debug!("✅ [{}] 上游调用成功 (第 {} 次尝试)", provider, attempt);
                return Ok(value);
            }
            Err(Failure::Retryable(err)) if attempt < max_attempts => {
                let delay = backoff_delay(ctx.retry_backoff, attempt);
                warn!(
                    "🔄 [{}] 上游暂时不可用，{:?} 后重试 ({}/{}): {}",
                    provider, delay, attempt, max_attempts, err
                );
                tokio::time::sleep(delay).await;
            }
            Err(Failure::Retryable(err)) | Err(Failure::Final(err)) => {
                warn!("❌ [{}] 上游调用失败 [{}]: {}", provider, err.code(), err);
                return Err(err);
            }
        }
    }
}

async fn read_response(response: Response) -> Result<Value, Failure> {
    let status = response.status();

    if status.is_success() {
        return response
            .json::<Value>()
            .await
            .map_err(|e| Failure::Final(ProviderError::Unknown(format!("响应解析失败: {}", e))));
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    Err(classify_status(status, retry_after, &body))
}

fn classify_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> Failure {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Failure::Final(ProviderError::AuthFailed),
        StatusCode::TOO_MANY_REQUESTS => Failure::Final(ProviderError::RateLimited { retry_after }),
        StatusCode::BAD_REQUEST if is_safety_body(body) => {
            Failure::Final(ProviderError::SafetyBlocked {
                reason: "content_policy".to_string(),
            })
        }
        s if s.is_server_error() => {
            Failure::Retryable(ProviderError::Unknown(format!("HTTP {}", s.as_u16())))
        }
        s => Failure::Final(ProviderError::Unknown(format!(
            "HTTP {}: {}",
            s.as_u16(),
            truncate_chars(body, 200)
        ))),
    }
}

fn is_safety_body(body: &str) -> bool {
    let lowered = body.to_lowercase();
    SAFETY_MARKERS.iter().any(|marker| lowered.contains(marker))
}

fn classify_transport(error: reqwest::Error) -> Failure {
    if error.is_timeout() {
        Failure::Final(ProviderError::Timeout)
    } else if error.is_connect() {
        Failure::Retryable(ProviderError::Unknown("无法连接上游提供商".to_string()))
    } else {
        Failure::Final(ProviderError::Unknown(error.to_string()))
    }
}

/// 指数退避加随机抖动
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis() as u64;
    let exp = base_ms.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(10));
    let jitter = rand::thread_rng().gen_range(0..=base_ms / 2);
    Duration::from_millis(exp + jitter)
}

/// 拼接基础地址与路径
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// 从JSON中读取Token数
pub fn token_field(value: &Value, path: &[&str]) -> Option<u32> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_u64().map(|n| n.min(u32::MAX as u64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, None, ""),
            Failure::Final(ProviderError::AuthFailed)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, Some(7), ""),
            Failure::Final(ProviderError::RateLimited { retry_after: Some(7) })
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, None, r#"{"error":{"code":"content_policy_violation"}}"#),
            Failure::Final(ProviderError::SafetyBlocked { .. })
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, None, "bad model"),
            Failure::Final(ProviderError::Unknown(_))
        ));
        assert!(matches!(
            classify_status(
                StatusCode::BAD_REQUEST,
                None,
                r#"{"error":{"message":"Invalid value at 'safety_settings[0].threshold'","status":"INVALID_ARGUMENT"}}"#
            ),
            Failure::Final(ProviderError::Unknown(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, None, ""),
            Failure::Retryable(_)
        ));
    }

    #[test]
    fn test_backoff_grows() {
        let base = Duration::from_millis(100);
        let first = backoff_delay(base, 1);
        let second = backoff_delay(base, 2);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(150));
        assert!(second >= Duration::from_millis(200) && second <= Duration::from_millis(250));
    }

    #[test]
    fn test_helpers() {
        assert_eq!(join_url("http://a/v1/", "/messages"), "http://a/v1/messages");
        let value = serde_json::json!({"usage": {"prompt_tokens": 12}});
        assert_eq!(token_field(&value, &["usage", "prompt_tokens"]), Some(12));
        assert_eq!(token_field(&value, &["usage", "missing"]), None);
    }
}

//! 网关指标
//!
//! 每个实例持有独立的 Registry，便于测试中并行创建

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use crate::shared::AppResult;

pub struct GatewayMetrics {
    registry: Registry,
    generations: IntCounterVec,
    rate_limited: IntCounterVec,
    fallbacks: IntCounterVec,
    latency: Histogram,
}

impl GatewayMetrics {
    pub fn new() -> AppResult<Self> {
        Self::build().map_err(|e| crate::internal_error!("指标注册失败: {}", e))
    }

    fn build() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("promptstack".to_string()), None)?;

        let generations = IntCounterVec::new(
            Opts::new("generations_total", "生成请求数（按实际提供商与结果）"),
            &["provider", "outcome"],
        )?;
        let rate_limited = IntCounterVec::new(
            Opts::new("rate_limited_total", "被限流拒绝的请求数"),
            &["limit_class"],
        )?;
        let fallbacks = IntCounterVec::new(
            Opts::new("provider_fallback_total", "回退到演示适配器的请求数"),
            &["requested"],
        )?;
        let latency = Histogram::with_opts(
            HistogramOpts::new("generation_latency_seconds", "适配器调用耗时")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        registry.register(Box::new(generations.clone()))?;
        registry.register(Box::new(rate_limited.clone()))?;
        registry.register(Box::new(fallbacks.clone()))?;
        registry.register(Box::new(latency.clone()))?;

        Ok(Self {
            registry,
            generations,
            rate_limited,
            fallbacks,
            latency,
        })
    }

    pub fn record_generation(&self, provider: &str, outcome: &str, latency_seconds: f64) {
        self.generations.with_label_values(&[provider, outcome]).inc();
        self.latency.observe(latency_seconds);
    }

    pub fn record_failure(&self, provider: &str, code: &str) {
        self.generations.with_label_values(&[provider, code]).inc();
    }

    pub fn record_rate_limited(&self, limit_class: &str) {
        self.rate_limited.with_label_values(&[limit_class]).inc();
    }

    pub fn record_fallback(&self, requested: &str) {
        self.fallbacks.with_label_values(&[requested]).inc();
    }

    /// Prometheus 文本格式
    pub fn render(&self) -> AppResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| crate::internal_error!("指标编码失败: {}", e))?;
        String::from_utf8(buffer).map_err(|e| crate::internal_error!("指标编码失败: {}", e))
    }
}

pub type SharedGatewayMetrics = Arc<GatewayMetrics>;

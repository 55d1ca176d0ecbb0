//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。
//! 未安装 recorder 时各记录函数是空操作，测试中可以直接调用。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册订单流水线的指标描述
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!("orders_consumed_total", "Messages read from the orders topic");
    metrics::describe_counter!(
        "orders_skipped_total",
        "Messages left uncommitted because they could not be handled"
    );
    metrics::describe_counter!("orders_committed_total", "Offsets committed after persistence");
    metrics::describe_counter!("orders_saved_total", "Orders written to the store");
    metrics::describe_counter!("orders_published_total", "Orders published to the orders topic");
    metrics::describe_counter!("orders_dead_lettered_total", "Messages forwarded to the DLQ");

    metrics::describe_counter!("order_cache_hits_total", "Order cache hits");
    metrics::describe_counter!("order_cache_misses_total", "Order cache misses");
    metrics::describe_counter!("order_cache_errors_total", "Order cache backend failures");
    metrics::describe_histogram!(
        "order_cache_restore_duration_seconds",
        "Time spent warming the order cache at startup"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

#[inline]
pub fn record_message_consumed(topic: &str) {
    metrics::counter!("orders_consumed_total", "topic" => topic.to_string()).increment(1);
}

/// 记录未提交的消息，`reason` 取值 decode / invalid / storage
#[inline]
pub fn record_message_skipped(reason: &'static str) {
    metrics::counter!("orders_skipped_total", "reason" => reason).increment(1);
}

#[inline]
pub fn record_message_committed(topic: &str) {
    metrics::counter!("orders_committed_total", "topic" => topic.to_string()).increment(1);
}

#[inline]
pub fn record_dead_lettered(topic: &str) {
    metrics::counter!("orders_dead_lettered_total", "topic" => topic.to_string()).increment(1);
}

/// 记录订单写入，重复投递的订单记为 duplicate
#[inline]
pub fn record_order_saved(inserted: bool) {
    let outcome = if inserted { "inserted" } else { "duplicate" };
    metrics::counter!("orders_saved_total", "outcome" => outcome).increment(1);
}

#[inline]
pub fn record_order_published(topic: &str, success: bool) {
    metrics::counter!(
        "orders_published_total",
        "topic" => topic.to_string(),
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}

#[inline]
pub fn record_cache_hit() {
    metrics::counter!("order_cache_hits_total").increment(1);
}

#[inline]
pub fn record_cache_miss() {
    metrics::counter!("order_cache_misses_total").increment(1);
}

/// 记录缓存后端故障，`operation` 取值 get / set
#[inline]
pub fn record_cache_error(operation: &'static str) {
    metrics::counter!("order_cache_errors_total", "operation" => operation).increment(1);
}

#[inline]
pub fn record_cache_restore(duration_secs: f64) {
    metrics::histogram!("order_cache_restore_duration_seconds").record(duration_secs);
}

//! 路由配置模块
//!
//! 定义订单查询接口的路由映射和中间件

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use order_shared::observability::middleware as obs_middleware;

use crate::handlers;
use crate::repository::OrderRepositoryTrait;
use crate::state::AppState;

/// 构建订单查询路由
pub fn order_routes<R>() -> Router<AppState<R>>
where
    R: OrderRepositoryTrait + 'static,
{
    Router::new()
        .route("/order/", get(handlers::order::get_order_without_uid::<R>))
        .route("/order/{order_uid}", get(handlers::order::get_order::<R>))
}

/// 构建完整应用
///
/// 中间件从外到内：请求 ID -> 追踪与指标 -> TraceLayer
pub fn app<R>(state: AppState<R>) -> Router
where
    R: OrderRepositoryTrait + 'static,
{
    Router::new()
        .merge(order_routes())
        .route("/health", get(handlers::health::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}

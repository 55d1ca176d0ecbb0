//! 订单查询 API 处理器

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use order_shared::models::Order;

use crate::error::ServiceError;
use crate::repository::OrderRepositoryTrait;
use crate::state::AppState;

/// 按订单号查询订单
///
/// GET /order/{order_uid}
///
/// 返回完整订单快照；不存在返回 404，订单号为空返回 400。
/// 订单号首尾空白在查询前去掉。
#[instrument(skip(state))]
pub async fn get_order<R>(
    State(state): State<AppState<R>>,
    Path(order_uid): Path<String>,
) -> Result<Json<Order>, ServiceError>
where
    R: OrderRepositoryTrait + 'static,
{
    let order = state.service.get_order(order_uid.trim()).await?;
    Ok(Json(order))
}

/// GET /order/
///
/// 路径中没有订单号，按空订单号走同一套校验。
pub async fn get_order_without_uid<R>(
    State(state): State<AppState<R>>,
) -> Result<Json<Order>, ServiceError>
where
    R: OrderRepositoryTrait + 'static,
{
    let order = state.service.get_order("").await?;
    Ok(Json(order))
}

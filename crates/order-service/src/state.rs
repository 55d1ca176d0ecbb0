//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::sync::Arc;

use crate::repository::OrderRepositoryTrait;
use crate::service::OrderService;

/// Axum 应用共享状态
///
/// 订单服务通过 Arc 在 handler 间共享
pub struct AppState<R>
where
    R: OrderRepositoryTrait,
{
    pub service: Arc<OrderService<R>>,
}

impl<R> AppState<R>
where
    R: OrderRepositoryTrait,
{
    pub fn new(service: Arc<OrderService<R>>) -> Self {
        Self { service }
    }
}

// 手动实现：derive 会要求 R: Clone
impl<R> Clone for AppState<R>
where
    R: OrderRepositoryTrait,
{
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

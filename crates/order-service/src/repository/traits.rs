//! 仓储 Trait 定义
//!
//! 服务层只依赖这里的抽象，具体实现由进程启动时注入，测试中使用 mock

use std::time::Duration;

use async_trait::async_trait;

use order_shared::error::Result;
use order_shared::models::Order;

/// 订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepositoryTrait: Send + Sync {
    /// 保存订单，同一订单号重复保存是空操作
    ///
    /// 返回本次调用是否真正写入
    async fn save_order(&self, order: &Order) -> Result<bool>;

    async fn get_order(&self, order_uid: &str) -> Result<Option<Order>>;

    async fn list_orders(&self) -> Result<Vec<Order>>;
}

/// 订单缓存接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderCacheTrait: Send + Sync {
    async fn get(&self, order_uid: &str) -> Result<Option<Order>>;

    async fn set(&self, order_uid: &str, order: &Order, ttl: Duration) -> Result<()>;
}

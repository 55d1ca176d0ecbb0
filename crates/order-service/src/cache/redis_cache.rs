use std::time::Duration;

use async_trait::async_trait;

use order_shared::cache::{Cache, CacheKey};
use order_shared::error::Result;
use order_shared::models::Order;

use crate::repository::OrderCacheTrait;

/// Redis 订单缓存
///
/// 订单以 JSON 存在 `order:{order_uid}` 下。连接或序列化失败以
/// `OrderError` 返回，由服务层按缓存未命中处理。
#[derive(Clone)]
pub struct RedisOrderCache {
    cache: Cache,
}

impl RedisOrderCache {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl OrderCacheTrait for RedisOrderCache {
    async fn get(&self, order_uid: &str) -> Result<Option<Order>> {
        self.cache.get(&CacheKey::order(order_uid)).await
    }

    async fn set(&self, order_uid: &str, order: &Order, ttl: Duration) -> Result<()> {
        self.cache.set(&CacheKey::order(order_uid), order, ttl).await
    }
}

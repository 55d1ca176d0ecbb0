use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use order_shared::error::Result;
use order_shared::models::Order;

use super::TtlCache;
use crate::repository::OrderCacheTrait;

/// 进程内订单缓存
///
/// 内存操作不会失败，`get`/`set` 总是返回 `Ok`
#[derive(Clone)]
pub struct MemoryOrderCache {
    inner: Arc<TtlCache<String, Order>>,
}

impl MemoryOrderCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(TtlCache::new(default_ttl)),
        }
    }

    pub fn start_janitor(&self, interval: Duration, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        self.inner.start_janitor(interval, shutdown)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl OrderCacheTrait for MemoryOrderCache {
    async fn get(&self, order_uid: &str) -> Result<Option<Order>> {
        Ok(self.inner.get(&order_uid.to_string()))
    }

    async fn set(&self, order_uid: &str, order: &Order, ttl: Duration) -> Result<()> {
        self.inner
            .set_with_ttl(order_uid.to_string(), order.clone(), ttl);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_order;

    #[tokio::test]
    async fn test_memory_cache_round_trip() {
        let cache = MemoryOrderCache::new(Duration::from_secs(60));
        let order = sample_order("o-1");

        cache.set("o-1", &order, Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("o-1").await.unwrap(), Some(order));
        assert_eq!(cache.get("o-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_cache_honours_call_ttl() {
        let cache = MemoryOrderCache::new(Duration::from_secs(60));
        cache
            .set("o-1", &sample_order("o-1"), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(cache.get("o-1").await.unwrap(), None);
        assert!(cache.is_empty());
    }
}

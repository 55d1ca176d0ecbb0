//! 订单服务
//!
//! 写路径：校验 -> 持久化 -> 写缓存。持久化成功即视为成功，缓存写入失败只记录日志。
//! 读路径（cache-aside）：先查缓存，未命中或缓存故障时回源数据库并回填缓存。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use order_shared::models::Order;
use order_shared::observability::metrics;

use crate::error::{Result, ServiceError};
use crate::repository::{OrderCacheTrait, OrderRepositoryTrait};
use crate::service::validation::{validate_order, validate_order_uid};

/// 缓存预热结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreStats {
    pub restored: usize,
    pub failed: usize,
}

/// 订单服务
///
/// 缓存可选：未配置时所有读请求直接访问仓储
pub struct OrderService<R>
where
    R: OrderRepositoryTrait,
{
    repo: Arc<R>,
    cache: Option<Arc<dyn OrderCacheTrait>>,
    cache_ttl: Duration,
}

impl<R> OrderService<R>
where
    R: OrderRepositoryTrait,
{
    pub fn new(repo: Arc<R>, cache: Option<Arc<dyn OrderCacheTrait>>, cache_ttl: Duration) -> Self {
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    /// 不带缓存的服务
    pub fn without_cache(repo: Arc<R>) -> Self {
        Self::new(repo, None, Duration::ZERO)
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// 写入缓存，失败只记录警告
    async fn fill_cache(&self, order: &Order) {
        let Some(cache) = &self.cache else {
            return;
        };

        if let Err(e) = cache.set(&order.order_uid, order, self.cache_ttl).await {
            metrics::record_cache_error("set");
            warn!(order_uid = %order.order_uid, error = %e, "Cache set failed");
        }
    }

    /// 保存订单
    ///
    /// 校验失败时直接返回，不触碰仓储和缓存。同一订单重复保存不报错。
    #[instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    pub async fn save_order(&self, order: &Order) -> Result<()> {
        validate_order(order)?;

        let inserted = self.repo.save_order(order).await?;
        metrics::record_order_saved(inserted);
        if inserted {
            info!("订单已保存");
        } else {
            info!("订单已存在，按幂等写入处理");
        }

        self.fill_cache(order).await;
        Ok(())
    }

    /// 查询订单
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_uid: &str) -> Result<Order> {
        validate_order_uid(order_uid)?;

        if let Some(cache) = &self.cache {
            match cache.get(order_uid).await {
                Ok(Some(order)) => {
                    metrics::record_cache_hit();
                    return Ok(order);
                }
                Ok(None) => metrics::record_cache_miss(),
                Err(e) => {
                    // 缓存故障按未命中处理
                    metrics::record_cache_error("get");
                    warn!(error = %e, "Cache get failed, falling back to database");
                }
            }
        }

        let order = self
            .repo
            .get_order(order_uid)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                order_uid: order_uid.to_string(),
            })?;

        self.fill_cache(&order).await;
        Ok(order)
    }

    /// 启动时用仓储中的全部订单预热缓存
    ///
    /// 单个订单写缓存失败不影响其余订单；未配置缓存时直接返回。
    #[instrument(skip(self))]
    pub async fn restore_cache(&self) -> Result<RestoreStats> {
        let Some(cache) = &self.cache else {
            info!("未配置缓存，跳过预热");
            return Ok(RestoreStats::default());
        };

        let start = Instant::now();
        let orders = self.repo.list_orders().await?;

        let mut stats = RestoreStats::default();
        for order in &orders {
            match cache.set(&order.order_uid, order, self.cache_ttl).await {
                Ok(()) => stats.restored += 1,
                Err(e) => {
                    stats.failed += 1;
                    metrics::record_cache_error("set");
                    warn!(order_uid = %order.order_uid, error = %e, "预热订单写入缓存失败");
                }
            }
        }

        metrics::record_cache_restore(start.elapsed().as_secs_f64());
        info!(
            restored = stats.restored,
            failed = stats.failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "缓存预热完成"
        );
        Ok(stats)
    }
}

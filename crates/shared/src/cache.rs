//! Redis 缓存管理模块
//!
//! 提供 Redis 连接管理和 JSON 值的读写封装。

use crate::config::RedisConfig;
use crate::error::{OrderError, Result};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{info, instrument};

/// Redis 缓存客户端
#[derive(Clone)]
pub struct Cache {
    client: Client,
}

impl Cache {
    /// 创建 Redis 客户端
    ///
    /// 只解析地址，不建立连接；连通性由 `health_check` 验证。
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!("Redis client created");
        Ok(Self { client })
    }

    /// 获取连接
    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(OrderError::from)
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get_conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(OrderError::from)
    }

    /// 获取值
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.get_conn().await?;
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(v) => Ok(Some(serde_json::from_str(&v)?)),
            None => Ok(None),
        }
    }

    /// 设置值
    ///
    /// 以毫秒精度写入过期时间（PSETEX）。不足一毫秒的 TTL 视为立即过期，
    /// 不写入 Redis，与内存缓存的行为一致。
    #[instrument(skip(self, value))]
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        if millis == 0 {
            return Ok(());
        }

        let serialized = serde_json::to_string(value)?;
        let mut conn = self.get_conn().await?;
        let _: () = conn.pset_ex(key, serialized, millis).await?;
        Ok(())
    }
}

/// 缓存键生成器
pub struct CacheKey;

impl CacheKey {
    pub fn order(order_uid: &str) -> String {
        format!("order:{}", order_uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_generation() {
        assert_eq!(CacheKey::order("b563feb7b2b84b6test"), "order:b563feb7b2b84b6test");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = RedisConfig {
            url: "not-a-redis-url".to_string(),
        };
        assert!(matches!(Cache::new(&config), Err(OrderError::Redis(_))));
    }

    #[tokio::test]
    async fn test_zero_ttl_skips_write() {
        // 端口 1 上没有 Redis，任何真实写入都会连接失败
        let cache = Cache::new(&RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
        })
        .unwrap();

        assert!(cache.set("order:o-1", &"v", Duration::ZERO).await.is_ok());
        assert!(cache.set("order:o-1", &"v", Duration::from_micros(500)).await.is_ok());
        assert!(cache.set("order:o-1", &"v", Duration::from_millis(1500)).await.is_err());
    }
}

//! 带过期时间的内存缓存
//!
//! 读多写少：读操作只持有读锁，互不阻塞；写入、惰性淘汰和后台清理共用同一把写锁。
//! 过期条目在两处被移除：`get` 发现过期时顺手删除，后台清理任务定期整表扫描。

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// TTL 缓存
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    default_ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    /// 写入条目，过期时间为当前时间加默认 TTL
    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// 写入条目并指定 TTL
    ///
    /// 重复写入同一个 key 会从本次调用时刻重新计算过期时间。
    /// TTL 为 0 的条目立即过期。
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or(now);
        self.entries
            .write()
            .insert(key, Entry { value, expires_at });
    }

    /// 读取未过期的条目
    ///
    /// 发现过期条目时升级为写锁删除；删除前重新检查，
    /// 避免误删在两次加锁之间被重新写入的新值。
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        if entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(Instant::now()))
        {
            entries.remove(key);
        }
        None
    }

    /// 清理所有过期条目，返回清理数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// 当前条目数（包含尚未被清理的过期条目）
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 启动后台清理任务
    ///
    /// 每隔 `interval` 扫描一次，收到关闭信号（或发送端被丢弃）后退出。
    pub fn start_janitor(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval 的第一次 tick 立即完成
            ticker.tick().await;

            info!(interval_ms = interval.as_millis() as u64, "缓存清理任务已启动");

            loop {
                if *shutdown.borrow() {
                    break;
                }

                tokio::select! {
                    biased;

                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let purged = cache.purge_expired();
                        if purged > 0 {
                            debug!(purged, remaining = cache.len(), "已清理过期缓存");
                        }
                    }
                }
            }

            info!("缓存清理任务已停止");
        })
    }
}

//! 订单缓存后端
//!
//! - `memory`: 进程内 TTL 缓存，过期由后台清理任务和读取时的惰性淘汰负责
//! - `redis`: 多实例共享，过期交给 Redis 的 EX

mod memory;
mod redis_cache;
pub mod ttl_cache;

pub use memory::MemoryOrderCache;
pub use redis_cache::RedisOrderCache;
pub use ttl_cache::TtlCache;

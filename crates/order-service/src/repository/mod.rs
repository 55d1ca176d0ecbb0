//! 数据访问层
//!
//! - 仓储只负责持久化，校验和缓存策略由服务层决定
//! - 服务层依赖 trait 接口，便于 mock 测试

mod order_repo;
mod traits;

pub use order_repo::PgOrderRepository;
pub use traits::*;

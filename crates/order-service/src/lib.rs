//! 订单服务
//!
//! 从消息流消费订单快照，持久化到 PostgreSQL，并通过缓存提供按订单号的快速查询。
//!
//! ## 模块结构
//!
//! - `service`: 校验与编排（保存、查询、缓存预热）
//! - `repository`: 仓储与缓存接口，PostgreSQL 实现
//! - `cache`: 进程内 TTL 缓存与 Redis 缓存后端
//! - `consumer`: 读取 -> 解码 -> 保存 -> 提交的消费循环
//! - `routes` / `handlers` / `state`: HTTP 查询接口
//! - `grpc`: 与 HTTP 等价的 gRPC `GetOrder`
//! - `test_utils`: 内存仓储、脚本化读取端等测试替身
//!
//! ## 投递语义
//!
//! offset 只在订单持久化成功后提交，配合幂等写入实现至少一次消费、恰好一次落库。

pub mod cache;
pub mod consumer;
pub mod error;
pub mod grpc;
pub mod handlers;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;
pub mod test_utils;

pub use consumer::{OrderConsumer, handle_message};
pub use grpc::{OrderGrpcService, OrderServiceServer};
pub use error::{ConsumeError, Result, ServiceError, ValidationError};
pub use repository::{OrderCacheTrait, OrderRepositoryTrait, PgOrderRepository};
pub use service::{OrderService, RestoreStats};
pub use state::AppState;

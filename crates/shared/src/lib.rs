//! 共享库
//!
//! 包含订单服务与生产者共用的配置、错误处理、数据库连接、缓存、Kafka 等基础设施代码，
//! 以及在消息流上传输的订单数据模型。

pub mod cache;
pub mod config;
pub mod database;
pub mod dlq;
pub mod error;
pub mod kafka;
pub mod models;
pub mod observability;
pub mod test_utils;

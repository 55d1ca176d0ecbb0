//! 订单生产者
//!
//! 把订单编码为 JSON 写入消息流，供订单服务消费。
//! 不做重试：编码或写入失败原样返回给调用方。

pub mod cli;
pub mod publisher;

pub use publisher::OrderPublisher;

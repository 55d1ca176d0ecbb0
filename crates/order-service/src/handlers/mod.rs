//! HTTP 请求处理器模块

pub mod health;
pub mod order;

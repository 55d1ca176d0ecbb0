//! 业务服务层

mod order_service;
pub mod validation;

pub use order_service::{OrderService, RestoreStats};
pub use validation::{validate_order, validate_order_uid};

//! 订单服务错误类型
//!
//! 定义服务层的业务错误、校验错误和消费流程的单条消息错误

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use order_shared::error::OrderError;

/// 订单校验错误
///
/// 只报告第一个不满足要求的字段
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("订单号不能为空")]
    EmptyOrderUid,

    #[error("缺少必填字段: {field}")]
    MissingField { field: &'static str },

    #[error("订单至少需要一个商品")]
    EmptyItems,
}

/// 订单服务错误类型
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("订单校验失败: {0}")]
    Validation(#[from] ValidationError),

    #[error("订单不存在: {order_uid}")]
    NotFound { order_uid: String },

    #[error("存储错误: {0}")]
    Storage(#[from] OrderError),
}

/// 订单服务 Result 类型别名
pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    /// 检查是否为可重试的错误
    ///
    /// 校验失败和订单不存在重试多少次结果都一样
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "ORDER_NOT_FOUND",
            Self::Storage(e) => e.code(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 存储错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Storage(e) => {
                tracing::error!(error = %e, "订单查询失败");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 单条消息的消费错误
///
/// 只用于记录日志和决定是否转发死信，不会让消费循环退出
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("消息解码失败: {0}")]
    Decode(#[source] OrderError),

    #[error("订单保存失败: {0}")]
    Save(#[source] ServiceError),

    #[error("offset 提交失败: {0}")]
    Commit(#[source] OrderError),
}

impl ConsumeError {
    /// 重投递也无法成功的毒消息
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::Save(ServiceError::Validation(_))
        )
    }

    /// 指标标签
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Save(ServiceError::Validation(_)) => "invalid",
            Self::Save(_) => "storage",
            Self::Commit(_) => "commit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            ServiceError::Validation(ValidationError::EmptyOrderUid).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::NotFound {
                order_uid: "x".to_string()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Storage(OrderError::Internal("boom".to_string())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = ServiceError::from(ValidationError::MissingField {
            field: "delivery.email",
        });
        assert_eq!(err.to_string(), "订单校验失败: 缺少必填字段: delivery.email");
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_retryable_only_for_io() {
        assert!(!ServiceError::Validation(ValidationError::EmptyItems).is_retryable());
        assert!(ServiceError::Storage(OrderError::Kafka("down".to_string())).is_retryable());
        assert!(!ServiceError::Storage(OrderError::Internal("bug".to_string())).is_retryable());
    }

    #[test]
    fn test_consume_error_classification() {
        let decode = ConsumeError::Decode(OrderError::Validation("bad json".to_string()));
        assert!(decode.is_permanent());
        assert_eq!(decode.reason(), "decode");

        let invalid = ConsumeError::Save(ServiceError::Validation(ValidationError::EmptyItems));
        assert!(invalid.is_permanent());
        assert_eq!(invalid.reason(), "invalid");

        let storage = ConsumeError::Save(ServiceError::Storage(OrderError::Internal(
            "pool closed".to_string(),
        )));
        assert!(!storage.is_permanent());
        assert_eq!(storage.reason(), "storage");

        let commit = ConsumeError::Commit(OrderError::Kafka("rebalance".to_string()));
        assert!(!commit.is_permanent());
        assert_eq!(commit.reason(), "commit");
    }

    #[tokio::test]
    async fn test_storage_error_response_hides_details() {
        let response =
            ServiceError::Storage(OrderError::Internal("secret dsn".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert!(!body["message"].as_str().unwrap().contains("secret"));
    }
}

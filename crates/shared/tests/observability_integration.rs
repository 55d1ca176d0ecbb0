//! 可观测性模块集成测试
//!
//! 测试 metrics、tracing 传播和 DLQ 信封的核心功能。

use std::collections::HashMap;

// ============================================================================
// 指标记录测试
// ============================================================================

mod metrics_tests {
    use order_shared::observability::metrics::{
        record_cache_error, record_cache_hit, record_cache_miss, record_cache_restore,
        record_dead_lettered, record_http_request, record_message_committed,
        record_message_consumed, record_message_skipped, record_order_published,
        record_order_saved,
    };

    // 未安装 recorder 时所有记录函数都是空操作，不能 panic
    #[test]
    fn test_record_pipeline_metrics() {
        record_message_consumed("orders_topic");
        record_message_skipped("decode");
        record_message_skipped("storage");
        record_message_committed("orders_topic");
        record_dead_lettered("orders_dlq");
        record_order_saved(true);
        record_order_saved(false);
        record_order_published("orders_topic", true);
        record_order_published("orders_topic", false);
    }

    #[test]
    fn test_record_cache_metrics() {
        record_cache_hit();
        record_cache_miss();
        record_cache_error("get");
        record_cache_error("set");
        record_cache_restore(0.25);
    }

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/order/{order_uid}", 200, 0.005);
        record_http_request("GET", "/order/{order_uid}", 404, 0.002);
        record_http_request("GET", "/health", 200, 0.001);
    }
}

// ============================================================================
// 追踪上下文传播测试
// ============================================================================

mod tracing_tests {
    use super::*;
    use opentelemetry::trace::TraceContextExt;
    use order_shared::observability::tracing::{
        extract_from_headers, inject_to_headers, set_parent_from_headers,
    };
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    const TRACEPARENT: &str = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";

    #[test]
    fn test_extract_valid_traceparent() {
        let headers = HashMap::from([("traceparent".to_string(), TRACEPARENT.to_string())]);

        let context = extract_from_headers(&headers);
        let span_context = context.span().span_context().clone();

        assert!(span_context.is_valid());
        assert!(span_context.is_remote());
        assert_eq!(
            span_context.trace_id().to_string(),
            "0af7651916cd43dd8448eb211c80319c"
        );
        assert_eq!(span_context.span_id().to_string(), "b7ad6b7169203331");
    }

    #[test]
    fn test_extract_invalid_traceparent() {
        for invalid in ["", "00-", "invalid-format", "00-invalid-b7ad6b7169203331-01"] {
            let headers = HashMap::from([("traceparent".to_string(), invalid.to_string())]);
            let context = extract_from_headers(&headers);
            assert!(!context.span().span_context().is_valid(), "{invalid}");
        }
    }

    #[test]
    fn test_inject_without_subscriber_adds_nothing() {
        let mut headers = HashMap::new();
        inject_to_headers(&mut headers);
        assert!(!headers.contains_key("traceparent"));
    }

    #[test]
    fn test_set_parent_without_subscriber_is_harmless() {
        let headers = HashMap::from([("traceparent".to_string(), TRACEPARENT.to_string())]);
        let span = tracing::info_span!("consume_order");
        set_parent_from_headers(&span, &headers);
        // 没有安装 OpenTelemetry layer 时 span 上不携带上下文
        assert!(!span.context().span().span_context().is_valid());
    }
}

// ============================================================================
// 死信信封测试
// ============================================================================

mod dlq_tests {
    use super::*;
    use order_shared::dlq::DeadLetterMessage;
    use order_shared::kafka::{ConsumerMessage, headers};

    #[test]
    fn test_dead_letter_envelope_keeps_source_position() {
        let msg = ConsumerMessage {
            topic: "orders_topic".to_string(),
            partition: 3,
            offset: 17,
            key: Some("o-1".to_string()),
            payload: b"{broken".to_vec(),
            timestamp: None,
            headers: HashMap::from([(headers::REQUEST_ID.to_string(), "req-1".to_string())]),
        };

        let envelope = DeadLetterMessage::from_consumer_message(&msg, "decode failed", "orders-service");
        let outbound = envelope.to_outbound("orders_dlq").unwrap();

        assert_eq!(outbound.topic, "orders_dlq");
        let decoded: DeadLetterMessage = serde_json::from_slice(&outbound.payload).unwrap();
        assert_eq!(decoded.source_topic, "orders_topic");
        assert_eq!(decoded.partition, 3);
        assert_eq!(decoded.offset, 17);
        assert_eq!(decoded.payload, "{broken");
        assert_eq!(decoded.error, "decode failed");
        assert_eq!(decoded.source_service, "orders-service");
        assert_eq!(decoded.request_id.as_deref(), Some("req-1"));
        assert_eq!(outbound.headers[headers::REQUEST_ID], "req-1");
    }
}

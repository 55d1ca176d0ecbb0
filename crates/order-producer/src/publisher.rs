//! 订单发布

use std::sync::Arc;

use tracing::{debug, instrument};

use order_shared::error::Result;
use order_shared::kafka::{OutboundMessage, StreamWriter, headers};
use order_shared::models::Order;
use order_shared::observability::{metrics, tracing as otel};

/// 订单发布器
///
/// 消息 key 为订单号，同一订单的消息落在同一分区
pub struct OrderPublisher {
    writer: Arc<dyn StreamWriter>,
    topic: String,
}

impl OrderPublisher {
    pub fn new(writer: Arc<dyn StreamWriter>, topic: impl Into<String>) -> Self {
        Self {
            writer,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 发布单个订单
    ///
    /// `request_id` 写入 `x-request-id` 头，当前追踪上下文写入 `traceparent` 头。
    #[instrument(skip(self, order), fields(order_uid = %order.order_uid, topic = %self.topic))]
    pub async fn publish(&self, order: &Order, request_id: Option<&str>) -> Result<()> {
        let mut msg = OutboundMessage::json(&self.topic, &order.order_uid, order)?;
        if let Some(request_id) = request_id.filter(|id| !id.is_empty()) {
            msg = msg.with_header(headers::REQUEST_ID, request_id);
        }
        otel::inject_to_headers(&mut msg.headers);

        let result = self.writer.write_message(msg).await;
        metrics::record_order_published(&self.topic, result.is_ok());
        result?;

        debug!("订单已发布");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use order_shared::error::OrderError;
    use order_shared::test_utils::sample_order;

    #[derive(Default)]
    struct RecordingWriter {
        sent: Mutex<Vec<OutboundMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl StreamWriter for RecordingWriter {
        async fn write_message(&self, msg: OutboundMessage) -> Result<()> {
            if self.fail {
                return Err(OrderError::Kafka("broker unavailable".to_string()));
            }
            self.sent.lock().push(msg);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publish_keys_by_order_uid() {
        let writer = Arc::new(RecordingWriter::default());
        let publisher = OrderPublisher::new(writer.clone(), "orders_topic");
        let order = sample_order("b563feb7b2b84b6test");

        publisher.publish(&order, Some("req-1")).await.unwrap();

        let sent = writer.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "orders_topic");
        assert_eq!(sent[0].key.as_deref(), Some("b563feb7b2b84b6test"));
        assert_eq!(sent[0].headers[headers::REQUEST_ID], "req-1");

        let decoded: Order = serde_json::from_slice(&sent[0].payload).unwrap();
        assert_eq!(decoded, order);
    }

    #[tokio::test]
    async fn test_publish_without_request_id() {
        let writer = Arc::new(RecordingWriter::default());
        let publisher = OrderPublisher::new(writer.clone(), "orders_topic");

        publisher.publish(&sample_order("o-1"), None).await.unwrap();
        publisher.publish(&sample_order("o-2"), Some("")).await.unwrap();

        for msg in writer.sent.lock().iter() {
            assert!(!msg.headers.contains_key(headers::REQUEST_ID));
        }
    }

    #[tokio::test]
    async fn test_publish_returns_writer_error_unchanged() {
        let writer = Arc::new(RecordingWriter {
            fail: true,
            ..Default::default()
        });
        let publisher = OrderPublisher::new(writer, "orders_topic");

        let err = publisher
            .publish(&sample_order("o-1"), Some("req-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Kafka(msg) if msg == "broker unavailable"));
    }
}

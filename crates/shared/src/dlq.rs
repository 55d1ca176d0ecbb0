//! 死信队列
//!
//! 无法解码或未通过校验的消息重放多少次都不会成功。
//! 配置了死信 topic 时，这类消息会连同失败原因一起转发过去，便于人工排查。
//! 转发只是旁路记录，原消息的 offset 依旧不提交。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::kafka::{ConsumerMessage, OutboundMessage, StreamWriter, headers};

// ---------------------------------------------------------------------------
// DeadLetterMessage: 死信消息信封
// ---------------------------------------------------------------------------

/// 死信消息信封
///
/// 包装原始消息并附加来源位置和失败原因。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterMessage {
    /// 原始消息 key，没有 key 时使用 `topic/partition/offset`
    pub message_id: String,
    pub source_topic: String,
    pub partition: i32,
    pub offset: i64,
    /// 原始消息内容，非 UTF-8 字节按替换字符保存
    pub payload: String,
    /// 失败原因
    pub error: String,
    pub failed_at: DateTime<Utc>,
    pub request_id: Option<String>,
    /// 来源服务
    pub source_service: String,
}

impl DeadLetterMessage {
    /// 从消费到的原始消息构造死信
    pub fn from_consumer_message(
        msg: &ConsumerMessage,
        error: impl Into<String>,
        source_service: impl Into<String>,
    ) -> Self {
        let message_id = msg
            .key
            .clone()
            .unwrap_or_else(|| format!("{}/{}/{}", msg.topic, msg.partition, msg.offset));

        Self {
            message_id,
            source_topic: msg.topic.clone(),
            partition: msg.partition,
            offset: msg.offset,
            payload: String::from_utf8_lossy(&msg.payload).into_owned(),
            error: error.into(),
            failed_at: Utc::now(),
            request_id: msg.request_id().map(str::to_string),
            source_service: source_service.into(),
        }
    }

    /// 编码为发往死信 topic 的消息，透传 request id
    pub fn to_outbound(&self, topic: &str) -> Result<OutboundMessage> {
        let outbound = OutboundMessage::json(topic, self.message_id.as_str(), self)?;
        Ok(match &self.request_id {
            Some(request_id) => outbound.with_header(headers::REQUEST_ID, request_id.as_str()),
            None => outbound,
        })
    }
}

// ---------------------------------------------------------------------------
// DlqProducer: 将失败消息发送到死信队列
// ---------------------------------------------------------------------------

/// DLQ 生产者
pub struct DlqProducer {
    writer: Arc<dyn StreamWriter>,
    topic: String,
    source_service: String,
}

impl DlqProducer {
    pub fn new(
        writer: Arc<dyn StreamWriter>,
        topic: impl Into<String>,
        source_service: impl Into<String>,
    ) -> Self {
        Self {
            writer,
            topic: topic.into(),
            source_service: source_service.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 将失败消息发送到死信队列
    pub async fn send_to_dlq(&self, msg: &ConsumerMessage, error: &str) -> Result<()> {
        let dead_letter = DeadLetterMessage::from_consumer_message(msg, error, &self.source_service);
        let outbound = dead_letter.to_outbound(&self.topic)?;

        self.writer.write_message(outbound).await?;

        warn!(
            message_id = %dead_letter.message_id,
            source_topic = %msg.topic,
            partition = msg.partition,
            offset = msg.offset,
            dlq_topic = %self.topic,
            error,
            "消息已发送到死信队列"
        );

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrderError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn consumer_message(key: Option<&str>, payload: &[u8]) -> ConsumerMessage {
        let mut headers = HashMap::new();
        headers.insert(headers::REQUEST_ID.to_string(), "req-42".to_string());
        ConsumerMessage {
            topic: "orders_topic".to_string(),
            partition: 2,
            offset: 17,
            key: key.map(str::to_string),
            payload: payload.to_vec(),
            timestamp: None,
            headers,
        }
    }

    #[derive(Default)]
    struct CapturingWriter {
        sent: Mutex<Vec<OutboundMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl StreamWriter for CapturingWriter {
        async fn write_message(&self, msg: OutboundMessage) -> Result<()> {
            if self.fail {
                return Err(OrderError::Kafka("broker unavailable".to_string()));
            }
            self.sent.lock().unwrap().push(msg);
            Ok(())
        }
    }

    #[test]
    fn test_dead_letter_from_message() {
        let msg = consumer_message(Some("order-1"), b"{not json");
        let dead_letter = DeadLetterMessage::from_consumer_message(&msg, "解码失败", "orders-service");

        assert_eq!(dead_letter.message_id, "order-1");
        assert_eq!(dead_letter.source_topic, "orders_topic");
        assert_eq!(dead_letter.partition, 2);
        assert_eq!(dead_letter.offset, 17);
        assert_eq!(dead_letter.payload, "{not json");
        assert_eq!(dead_letter.request_id.as_deref(), Some("req-42"));
        assert_eq!(dead_letter.source_service, "orders-service");
    }

    #[test]
    fn test_message_id_falls_back_to_position() {
        let msg = consumer_message(None, b"garbage");
        let dead_letter = DeadLetterMessage::from_consumer_message(&msg, "err", "svc");
        assert_eq!(dead_letter.message_id, "orders_topic/2/17");
    }

    #[test]
    fn test_dead_letter_serialization() {
        let msg = consumer_message(Some("order-1"), b"x");
        let dead_letter = DeadLetterMessage::from_consumer_message(&msg, "err", "svc");
        let json = serde_json::to_string(&dead_letter).unwrap();

        assert!(json.contains("messageId"));
        assert!(json.contains("sourceTopic"));
        assert!(json.contains("failedAt"));

        let back: DeadLetterMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dead_letter);
    }

    #[tokio::test]
    async fn test_send_to_dlq_writes_envelope() {
        let writer = Arc::new(CapturingWriter::default());
        let dlq = DlqProducer::new(writer.clone(), "orders_dlq", "orders-service");

        let msg = consumer_message(Some("order-1"), b"{not json");
        dlq.send_to_dlq(&msg, "expected value").await.unwrap();

        let sent = writer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "orders_dlq");
        assert_eq!(sent[0].key.as_deref(), Some("order-1"));
        assert_eq!(
            sent[0].headers.get(headers::REQUEST_ID).map(String::as_str),
            Some("req-42")
        );

        let envelope: DeadLetterMessage = serde_json::from_slice(&sent[0].payload).unwrap();
        assert_eq!(envelope.error, "expected value");
        assert_eq!(envelope.offset, 17);
    }

    #[tokio::test]
    async fn test_send_to_dlq_propagates_writer_error() {
        let writer = Arc::new(CapturingWriter {
            fail: true,
            ..Default::default()
        });
        let dlq = DlqProducer::new(writer, "orders_dlq", "orders-service");

        let result = dlq.send_to_dlq(&consumer_message(None, b"x"), "err").await;
        assert!(matches!(result, Err(OrderError::Kafka(_))));
    }
}

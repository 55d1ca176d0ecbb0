//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为面向业务的读写抽象：
//! - `StreamReader`：逐条读取消息并在处理成功后显式提交 offset
//! - `StreamWriter`：投递带 header 的消息
//!
//! 消费循环只依赖这两个 trait，测试中可以用内存实现替换真实的 Kafka。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Offset, TopicPartitionList};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::KafkaConfig;
use crate::error::{OrderError, Result};

// ---------------------------------------------------------------------------
// Header 常量
// ---------------------------------------------------------------------------

/// 约定的消息 header 名称
pub mod headers {
    /// 端到端关联 ID，生产者写入、消费者读取并挂到处理 span 上
    pub const REQUEST_ID: &str = "x-request-id";
    /// W3C Trace Context
    pub const TRACEPARENT: &str = "traceparent";
}

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息的统一表示
///
/// 将 rdkafka 的 `BorrowedMessage`（带生命周期约束）转换为拥有所有权的结构体，
/// 使消息可以安全地跨 await 点传递给异步处理函数。
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: Option<i64>,
    pub headers: HashMap<String, String>,
}

impl ConsumerMessage {
    /// 从 rdkafka 的借用消息构造，提取并拥有所有字段
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        let key = msg
            .key()
            .and_then(|k| std::str::from_utf8(k).ok())
            .map(String::from);

        let payload = msg.payload().map(|p| p.to_vec()).unwrap_or_default();

        let timestamp = msg.timestamp().to_millis();

        let mut headers = HashMap::new();
        if let Some(h) = msg.headers() {
            for idx in 0..h.count() {
                let header = h.get(idx);
                if let Some(raw) = header.value
                    && let Ok(value) = std::str::from_utf8(raw)
                {
                    headers.insert(header.key.to_string(), value.to_string());
                }
            }
        }

        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key,
            payload,
            timestamp,
            headers,
        }
    }

    /// 按名称查找 header，忽略大小写
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 消息携带的关联 ID，空字符串视为未携带
    pub fn request_id(&self) -> Option<&str> {
        self.header(headers::REQUEST_ID).filter(|v| !v.is_empty())
    }

    /// 将 JSON 格式负载反序列化为目标类型
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.payload).map_err(OrderError::from)
    }
}

// ---------------------------------------------------------------------------
// OutboundMessage
// ---------------------------------------------------------------------------

/// 待投递的消息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutboundMessage {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl OutboundMessage {
    /// 将值序列化为 JSON 负载
    pub fn json<T: Serialize>(
        topic: impl Into<String>,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self> {
        Ok(Self {
            topic: topic.into(),
            key: Some(key.into()),
            payload: serde_json::to_vec(value)?,
            headers: HashMap::new(),
        })
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// 读写契约
// ---------------------------------------------------------------------------

/// 消息读取端
///
/// `read_message` 阻塞等待下一条消息，必须可以被安全地取消（用于 `tokio::select!`）。
/// `commit_message` 确认该消息已完全处理，正常情况下不会再被投递。
#[async_trait]
pub trait StreamReader: Send + Sync {
    async fn read_message(&self) -> Result<ConsumerMessage>;
    async fn commit_message(&self, msg: &ConsumerMessage) -> Result<()>;
}

/// 消息写入端，提供至少一次投递语义，不在此层做重试
#[async_trait]
pub trait StreamWriter: Send + Sync {
    async fn write_message(&self, msg: OutboundMessage) -> Result<()>;
}

// ---------------------------------------------------------------------------
// KafkaProducer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 生产者
///
/// 封装 `FutureProducer` 并提供类型安全的 JSON 发送方法，
/// 内部已派生 Clone（`FutureProducer` 本身是 Arc 包装的）。
#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    /// 根据配置创建生产者
    ///
    /// `acks=all` 配合幂等生产者，保证 broker 确认即持久化。
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .create()
            .map_err(|e| OrderError::Kafka(format!("创建生产者失败: {e}")))?;

        info!(brokers = %config.brokers, "Kafka 生产者已初始化");
        Ok(Self { producer })
    }

    /// 发送原始字节消息
    pub async fn send(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<(i32, i64)> {
        let owned_headers = headers.iter().fold(
            OwnedHeaders::new_with_capacity(headers.len()),
            |acc, (k, v)| {
                acc.insert(Header {
                    key: k.as_str(),
                    value: Some(v.as_bytes()),
                })
            },
        );

        let mut record = FutureRecord::to(topic)
            .payload(payload)
            .headers(owned_headers);
        if let Some(key) = key {
            record = record.key(key);
        }

        // rdkafka 0.39+ 返回 Delivery 结构体而非元组
        let delivery = self
            .producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| OrderError::Kafka(format!("发送消息失败: {e}")))?;

        debug!(
            topic,
            key = ?key,
            partition = delivery.partition,
            offset = delivery.offset,
            "消息已发送"
        );
        Ok((delivery.partition, delivery.offset))
    }
}

#[async_trait]
impl StreamWriter for KafkaProducer {
    async fn write_message(&self, msg: OutboundMessage) -> Result<()> {
        self.send(&msg.topic, msg.key.as_deref(), &msg.payload, &msg.headers)
            .await
            .map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// KafkaStreamReader
// ---------------------------------------------------------------------------

/// 手动提交 offset 的 Kafka 读取端
///
/// 关闭自动提交：offset 只在调用方确认消息已持久化后才提交，
/// 处理失败的消息会在重平衡或重启后被重新投递。
pub struct KafkaStreamReader {
    consumer: Arc<StreamConsumer>,
}

impl KafkaStreamReader {
    /// 创建读取端并订阅配置中的 topic
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.consumer_group)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "false")
            .create()
            .map_err(|e| OrderError::Kafka(format!("创建消费者失败: {e}")))?;

        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| OrderError::Kafka(format!("订阅 topic 失败: {e}")))?;

        info!(
            brokers = %config.brokers,
            group_id = %config.consumer_group,
            topic = %config.topic,
            "Kafka 消费者已初始化"
        );
        Ok(Self {
            consumer: Arc::new(consumer),
        })
    }
}

#[async_trait]
impl StreamReader for KafkaStreamReader {
    async fn read_message(&self) -> Result<ConsumerMessage> {
        // recv() 可以安全取消，未返回的消息不会丢失
        let borrowed = self
            .consumer
            .recv()
            .await
            .map_err(|e| OrderError::Kafka(format!("接收消息失败: {e}")))?;

        Ok(ConsumerMessage::from_borrowed(&borrowed))
    }

    async fn commit_message(&self, msg: &ConsumerMessage) -> Result<()> {
        // 提交的是"下一条待消费"的位置
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(&msg.topic, msg.partition, Offset::Offset(msg.offset + 1))
            .map_err(|e| OrderError::Kafka(format!("构造提交位置失败: {e}")))?;

        // 同步提交会阻塞直到 broker 确认，放到阻塞线程池执行
        let consumer = Arc::clone(&self.consumer);
        tokio::task::spawn_blocking(move || consumer.commit(&tpl, CommitMode::Sync))
            .await
            .map_err(|e| OrderError::Internal(format!("提交任务异常终止: {e}")))?
            .map_err(|e| OrderError::Kafka(format!("提交 offset 失败: {e}")))
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn message(payload: &[u8], headers: HashMap<String, String>) -> ConsumerMessage {
        ConsumerMessage {
            topic: "orders_topic".to_string(),
            partition: 0,
            offset: 42,
            key: Some("b563feb7b2b84b6test".to_string()),
            payload: payload.to_vec(),
            timestamp: Some(1_700_000_000_000),
            headers,
        }
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let msg = message(
            b"{}",
            HashMap::from([("X-Request-ID".to_string(), "req-1".to_string())]),
        );

        assert_eq!(msg.header("x-request-id"), Some("req-1"));
        assert_eq!(msg.request_id(), Some("req-1"));
        assert_eq!(msg.header("traceparent"), None);
    }

    #[test]
    fn test_empty_request_id_is_absent() {
        let msg = message(
            b"{}",
            HashMap::from([(headers::REQUEST_ID.to_string(), String::new())]),
        );

        assert_eq!(msg.request_id(), None);
    }

    #[test]
    fn test_consumer_message_deserialize() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct Probe {
            order_uid: String,
        }

        let msg = message(br#"{"order_uid":"uid-1"}"#, HashMap::new());
        let probe: Probe = msg.deserialize_payload().unwrap();
        assert_eq!(
            probe,
            Probe {
                order_uid: "uid-1".to_string()
            }
        );
    }

    #[test]
    fn test_consumer_message_deserialize_invalid_json() {
        let msg = message(b"not json", HashMap::new());

        let result: Result<serde_json::Value> = msg.deserialize_payload();
        assert!(matches!(result, Err(OrderError::Serialization(_))));
    }

    #[test]
    fn test_outbound_message_json() {
        let msg = OutboundMessage::json("orders_topic", "uid-1", &serde_json::json!({"a": 1}))
            .unwrap()
            .with_header(headers::REQUEST_ID, "req-9");

        assert_eq!(msg.topic, "orders_topic");
        assert_eq!(msg.key.as_deref(), Some("uid-1"));
        assert_eq!(msg.payload, br#"{"a":1}"#);
        assert_eq!(msg.headers.get(headers::REQUEST_ID).unwrap(), "req-9");
    }
}

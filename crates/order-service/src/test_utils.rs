//! 测试工具模块
//!
//! 提供单元测试和集成测试共用的内存仓储、脚本化消息读取端和记录型写入端。
//! 样例订单从 `order_shared::test_utils` 重新导出。
//! 这些实现不依赖数据库和 Kafka，可以在任何环境运行。

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use order_shared::error::{OrderError, Result};
use order_shared::kafka::{
    ConsumerMessage, OutboundMessage, StreamReader, StreamWriter, headers,
};
use order_shared::models::Order;

use crate::repository::OrderRepositoryTrait;

pub use order_shared::test_utils::{random_order, sample_order, test_database_config};

// ==================== Kafka 消息 ====================

/// 分区 0 上指定 offset 的订单消息
pub fn order_message(offset: i64, order: &Order) -> ConsumerMessage {
    let payload = serde_json::to_vec(order).unwrap_or_default();
    let mut msg = raw_message(offset, &payload);
    msg.key = Some(order.order_uid.clone());
    msg
}

/// 分区 0 上指定 offset 的原始消息
pub fn raw_message(offset: i64, payload: &[u8]) -> ConsumerMessage {
    ConsumerMessage {
        topic: "orders_topic".to_string(),
        partition: 0,
        offset,
        key: None,
        payload: payload.to_vec(),
        timestamp: None,
        headers: HashMap::new(),
    }
}

/// 附带 request id 的消息
pub fn with_request_id(mut msg: ConsumerMessage, request_id: &str) -> ConsumerMessage {
    msg.headers
        .insert(headers::REQUEST_ID.to_string(), request_id.to_string());
    msg
}

// ==================== 内存仓储 ====================

/// 内存订单仓储
///
/// 与数据库实现一样按订单号幂等写入，支持故障注入和调用计数
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<HashMap<String, Order>>,
    fail_saves: AtomicUsize,
    unavailable: AtomicBool,
    save_calls: AtomicUsize,
    get_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let repo = Self::new();
        repo.orders
            .lock()
            .extend(orders.into_iter().map(|o| (o.order_uid.clone(), o)));
        repo
    }

    /// 接下来的 n 次保存返回存储错误
    pub fn fail_next_saves(&self, n: usize) {
        self.fail_saves.store(n, Ordering::SeqCst);
    }

    /// 模拟数据库整体不可用
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn contains(&self, order_uid: &str) -> bool {
        self.orders.lock().contains_key(order_uid)
    }

    pub fn len(&self) -> usize {
        self.orders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(OrderError::Internal("repository unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepositoryTrait for InMemoryOrderRepository {
    async fn save_order(&self, order: &Order) -> Result<bool> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let injected = self
            .fail_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(OrderError::Internal("injected save failure".to_string()));
        }

        let mut orders = self.orders.lock();
        if orders.contains_key(&order.order_uid) {
            return Ok(false);
        }
        orders.insert(order.order_uid.clone(), order.clone());
        Ok(true)
    }

    async fn get_order(&self, order_uid: &str) -> Result<Option<Order>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.orders.lock().get(order_uid).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.orders.lock().values().cloned().collect())
    }
}

// ==================== 脚本化读取端 ====================

#[derive(Default)]
struct ReaderState {
    queue: VecDeque<ConsumerMessage>,
    in_flight: Option<ConsumerMessage>,
    committed: Vec<(i32, i64)>,
    deliveries: HashMap<(i32, i64), usize>,
    read_failures: usize,
}

/// 脚本化消息读取端
///
/// 模拟 Kafka 的至少一次投递：读出后未提交的消息会在下一次读取时重新排到队尾，
/// 每条消息最多投递 `max_deliveries` 次。队列为空时 `read_message` 一直阻塞。
pub struct ScriptedStreamReader {
    state: Mutex<ReaderState>,
    notify: Notify,
    max_deliveries: usize,
}

impl Default for ScriptedStreamReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedStreamReader {
    pub fn new() -> Self {
        Self::with_max_deliveries(5)
    }

    pub fn with_max_deliveries(max_deliveries: usize) -> Self {
        Self {
            state: Mutex::new(ReaderState::default()),
            notify: Notify::new(),
            max_deliveries: max_deliveries.max(1),
        }
    }

    pub fn push(&self, msg: ConsumerMessage) {
        self.state.lock().queue.push_back(msg);
        self.notify.notify_one();
    }

    /// 接下来的 n 次读取返回 Kafka 错误
    pub fn fail_next_reads(&self, n: usize) {
        self.state.lock().read_failures = n;
        self.notify.notify_one();
    }

    /// 已提交的 (partition, offset)，按提交顺序
    pub fn committed(&self) -> Vec<(i32, i64)> {
        self.state.lock().committed.clone()
    }

    pub fn deliveries(&self, partition: i32, offset: i64) -> usize {
        self.state
            .lock()
            .deliveries
            .get(&(partition, offset))
            .copied()
            .unwrap_or(0)
    }

    /// 队列已空且没有待确认的消息
    pub fn is_drained(&self) -> bool {
        let state = self.state.lock();
        state.queue.is_empty() && state.in_flight.is_none()
    }

    fn next(&self) -> Option<Result<ConsumerMessage>> {
        let mut state = self.state.lock();

        if state.read_failures > 0 {
            state.read_failures -= 1;
            return Some(Err(OrderError::Kafka("scripted read failure".to_string())));
        }

        if let Some(previous) = state.in_flight.take() {
            let key = (previous.partition, previous.offset);
            let delivered = state.deliveries.get(&key).copied().unwrap_or(0);
            if !state.committed.contains(&key) && delivered < self.max_deliveries {
                state.queue.push_back(previous);
            }
        }

        let msg = state.queue.pop_front()?;
        *state
            .deliveries
            .entry((msg.partition, msg.offset))
            .or_default() += 1;
        state.in_flight = Some(msg.clone());
        Some(Ok(msg))
    }
}

#[async_trait]
impl StreamReader for ScriptedStreamReader {
    async fn read_message(&self) -> Result<ConsumerMessage> {
        loop {
            if let Some(result) = self.next() {
                return result;
            }
            self.notify.notified().await;
        }
    }

    async fn commit_message(&self, msg: &ConsumerMessage) -> Result<()> {
        self.state.lock().committed.push((msg.partition, msg.offset));
        Ok(())
    }
}

// ==================== 记录型写入端 ====================

/// 记录所有写出消息的写入端
#[derive(Default)]
pub struct RecordingStreamWriter {
    sent: Mutex<Vec<OutboundMessage>>,
    fail: AtomicBool,
}

impl RecordingStreamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl StreamWriter for RecordingStreamWriter {
    async fn write_message(&self, msg: OutboundMessage) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(OrderError::Kafka("broker unavailable".to_string()));
        }
        self.sent.lock().push(msg);
        Ok(())
    }
}

// ==================== 异步断言 ====================

/// 轮询直到条件成立或超时，返回条件最终是否成立
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let poll = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(timeout, poll).await.is_ok()
}

/// 在超时内运行 future，超时返回 None
pub async fn within<F: Future>(timeout: Duration, future: F) -> Option<F::Output> {
    tokio::time::timeout(timeout, future).await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::validate_order;

    #[test]
    fn test_sample_orders_are_valid() {
        assert_eq!(validate_order(&sample_order("o-1")), Ok(()));
        for _ in 0..20 {
            let order = random_order();
            assert_eq!(validate_order(&order), Ok(()), "{order:?}");
        }
    }

    #[tokio::test]
    async fn test_in_memory_repository_is_idempotent() {
        let repo = InMemoryOrderRepository::new();
        assert!(repo.save_order(&sample_order("o-1")).await.unwrap());
        assert!(!repo.save_order(&sample_order("o-1")).await.unwrap());
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.save_calls(), 2);
    }

    #[tokio::test]
    async fn test_scripted_reader_redelivers_uncommitted() {
        let reader = ScriptedStreamReader::with_max_deliveries(2);
        reader.push(raw_message(0, b"a"));
        reader.push(raw_message(1, b"b"));

        let first = reader.read_message().await.unwrap();
        assert_eq!(first.offset, 0);

        // offset 0 未提交，排到 offset 1 之后
        let second = reader.read_message().await.unwrap();
        assert_eq!(second.offset, 1);
        reader.commit_message(&second).await.unwrap();

        let third = reader.read_message().await.unwrap();
        assert_eq!(third.offset, 0);
        assert_eq!(reader.deliveries(0, 0), 2);

        // 达到投递上限后不再重投，读取阻塞
        assert!(within(Duration::from_millis(50), reader.read_message()).await.is_none());
        assert!(reader.is_drained());
    }
}

//! 订单消息消费循环
//!
//! 读取 -> 解码 -> 保存 -> 提交，按到达顺序逐条处理。
//! offset 只在订单持久化成功后提交：处理失败的消息不提交，等待重投递；
//! 持久化后、提交前崩溃导致的重投递由幂等写入吸收。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{Instrument, error, field, info, info_span, warn};
use uuid::Uuid;

use order_shared::dlq::DlqProducer;
use order_shared::kafka::{ConsumerMessage, StreamReader};
use order_shared::models::Order;
use order_shared::observability::{metrics, tracing as otel};

use crate::error::ConsumeError;
use crate::repository::OrderRepositoryTrait;
use crate::service::OrderService;

/// 读取失败后的等待时间，避免 broker 不可用时空转
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(200);

/// 订单消费者
pub struct OrderConsumer<R>
where
    R: OrderRepositoryTrait,
{
    reader: Arc<dyn StreamReader>,
    service: Arc<OrderService<R>>,
    dlq: Option<DlqProducer>,
}

impl<R> OrderConsumer<R>
where
    R: OrderRepositoryTrait,
{
    pub fn new(reader: Arc<dyn StreamReader>, service: Arc<OrderService<R>>) -> Self {
        Self {
            reader,
            service,
            dlq: None,
        }
    }

    /// 解码或校验失败的消息额外转发到死信 topic
    pub fn with_dead_letter(mut self, dlq: DlqProducer) -> Self {
        self.dlq = Some(dlq);
        self
    }

    /// 启动消费循环，直到收到 shutdown 信号
    ///
    /// 单条消息的任何失败都只记录日志，循环继续。
    /// 阻塞在读取上时收到关闭信号会立即返回。
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(dead_letter = ?self.dlq.as_ref().map(|d| d.topic()), "订单消费者已启动");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let result = tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                result = self.reader.read_message() => result,
            };

            match result {
                Ok(msg) => self.process(&msg).await,
                Err(e) => {
                    error!(error = %e, "读取消息失败");
                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(READ_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        info!("订单消费者已停止");
    }

    /// 在带 request id 的 span 中处理单条消息
    async fn process(&self, msg: &ConsumerMessage) {
        let request_id = msg
            .request_id()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::now_v7().to_string());

        let span = info_span!(
            "consume_order",
            request_id = %request_id,
            topic = %msg.topic,
            partition = msg.partition,
            offset = msg.offset,
            order_uid = field::Empty,
        );
        otel::set_parent_from_headers(&span, &msg.headers);

        async {
            let Err(e) = handle_message(&self.service, self.reader.as_ref(), msg).await else {
                return;
            };

            metrics::record_message_skipped(e.reason());
            error!(error = %e, permanent = e.is_permanent(), "处理订单消息失败，offset 未提交");

            if e.is_permanent()
                && let Some(dlq) = &self.dlq
            {
                match dlq.send_to_dlq(msg, &e.to_string()).await {
                    Ok(()) => metrics::record_dead_lettered(dlq.topic()),
                    Err(dlq_err) => warn!(error = %dlq_err, "转发死信失败"),
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// 处理单条消息的完整流程
///
/// 拆分为独立函数，便于在测试中直接调用而无需启动消费循环。
/// 只有保存成功后才提交 offset。
pub async fn handle_message<R>(
    service: &OrderService<R>,
    reader: &dyn StreamReader,
    msg: &ConsumerMessage,
) -> Result<(), ConsumeError>
where
    R: OrderRepositoryTrait,
{
    metrics::record_message_consumed(&msg.topic);

    let order: Order = msg.deserialize_payload().map_err(ConsumeError::Decode)?;
    tracing::Span::current().record("order_uid", order.order_uid.as_str());

    service.save_order(&order).await.map_err(ConsumeError::Save)?;

    reader.commit_message(msg).await.map_err(ConsumeError::Commit)?;
    metrics::record_message_committed(&msg.topic);

    info!(order_uid = %order.order_uid, "订单消息已处理并提交");
    Ok(())
}

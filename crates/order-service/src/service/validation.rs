//! 订单校验
//!
//! 必填字段以静态谓词表列出，按表顺序检查，报告第一个缺失的字段。
//! 校验是纯函数，消费流程和直接调用 `save_order` 走的是同一份规则。

use order_shared::models::{Delivery, Item, Order, Payment};

use crate::error::ValidationError;

type Check<T> = (&'static str, fn(&T) -> bool);

const ORDER_CHECKS: &[Check<Order>] = &[
    ("track_number", |o: &Order| !o.track_number.is_empty()),
    ("entry", |o: &Order| !o.entry.is_empty()),
    ("locale", |o: &Order| !o.locale.is_empty()),
    ("customer_id", |o: &Order| !o.customer_id.is_empty()),
    ("delivery_service", |o: &Order| !o.delivery_service.is_empty()),
    ("shardkey", |o: &Order| !o.shard_key.is_empty()),
    // Unix 纪元与 0001-01-01T00:00:00Z 都是上游的零值时间
    ("date_created", |o: &Order| o.date_created.timestamp() > 0),
];

const DELIVERY_CHECKS: &[Check<Delivery>] = &[
    ("delivery.name", |d: &Delivery| !d.name.is_empty()),
    ("delivery.phone", |d: &Delivery| !d.phone.is_empty()),
    ("delivery.zip", |d: &Delivery| !d.zip.is_empty()),
    ("delivery.city", |d: &Delivery| !d.city.is_empty()),
    ("delivery.address", |d: &Delivery| !d.address.is_empty()),
    ("delivery.region", |d: &Delivery| !d.region.is_empty()),
    ("delivery.email", |d: &Delivery| !d.email.is_empty()),
];

const PAYMENT_CHECKS: &[Check<Payment>] = &[
    ("payment.transaction", |p: &Payment| !p.transaction.is_empty()),
    ("payment.currency", |p: &Payment| !p.currency.is_empty()),
    ("payment.provider", |p: &Payment| !p.provider.is_empty()),
    ("payment.amount", |p: &Payment| p.amount != 0),
];

const ITEM_CHECKS: &[Check<Item>] = &[
    ("items.chrt_id", |i: &Item| i.chrt_id != 0),
    ("items.track_number", |i: &Item| !i.track_number.is_empty()),
    ("items.rid", |i: &Item| !i.rid.is_empty()),
    ("items.name", |i: &Item| !i.name.is_empty()),
];

fn first_missing<T>(value: &T, checks: &[Check<T>]) -> Result<(), ValidationError> {
    match checks.iter().find(|(_, present)| !present(value)) {
        Some((field, _)) => Err(ValidationError::MissingField { field: *field }),
        None => Ok(()),
    }
}

/// 校验订单号
///
/// 只含空白的订单号按空处理
pub fn validate_order_uid(order_uid: &str) -> Result<(), ValidationError> {
    if order_uid.trim().is_empty() {
        return Err(ValidationError::EmptyOrderUid);
    }
    Ok(())
}

/// 校验完整订单
pub fn validate_order(order: &Order) -> Result<(), ValidationError> {
    validate_order_uid(&order.order_uid)?;
    first_missing(order, ORDER_CHECKS)?;
    first_missing(&order.delivery, DELIVERY_CHECKS)?;
    first_missing(&order.payment, PAYMENT_CHECKS)?;

    if order.items.is_empty() {
        return Err(ValidationError::EmptyItems);
    }
    order
        .items
        .iter()
        .try_for_each(|item| first_missing(item, ITEM_CHECKS))
}

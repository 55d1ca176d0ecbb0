//! 订单数据模型
//!
//! 消息流、数据库、缓存和 HTTP 接口之间传递的同一份订单快照。
//! JSON 字段名与上游订单系统保持一致（如 `shardkey`、`payment_dt`）。
//!
//! 所有结构体都使用 `#[serde(default)]`：缺失字段反序列化为零值，
//! 由服务层的校验统一报告，而不是在解码阶段以含糊的 serde 错误失败。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 订单
///
/// `order_uid` 是全局唯一主键，创建后不可变。
/// Delivery 与 Payment 为一对一从属结构，没有独立身份；Items 归属于订单，不跨订单共享。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    #[serde(rename = "shardkey")]
    pub shard_key: String,
    pub sm_id: i64,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

/// 收货信息
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// 支付信息
///
/// 金额字段均为最小货币单位的整数，`payment_dt` 为 Unix 秒。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

/// 订单商品
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    /// 折扣百分比
    pub sale: i64,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "order_uid": "b563feb7b2b84b6test",
        "track_number": "WBILMTESTTRACK",
        "entry": "WBIL",
        "delivery": {
            "name": "Test Testov",
            "phone": "+9720000000",
            "zip": "2639809",
            "city": "Kiryat Mozkin",
            "address": "Ploshad Mira 15",
            "region": "Kraiot",
            "email": "test@gmail.com"
        },
        "payment": {
            "transaction": "b563feb7b2b84b6test",
            "request_id": "",
            "currency": "USD",
            "provider": "wbpay",
            "amount": 1817,
            "payment_dt": 1637907727,
            "bank": "alpha",
            "delivery_cost": 1500,
            "goods_total": 317,
            "custom_fee": 0
        },
        "items": [
            {
                "chrt_id": 9934930,
                "track_number": "WBILMTESTTRACK",
                "price": 453,
                "rid": "ab4219087a764ae0btest",
                "name": "Mascaras",
                "sale": 30,
                "size": "0",
                "total_price": 317,
                "nm_id": 2389212,
                "brand": "Vivienne Sabo",
                "status": 202
            }
        ],
        "locale": "en",
        "internal_signature": "",
        "customer_id": "test",
        "delivery_service": "meest",
        "shardkey": "9",
        "sm_id": 99,
        "date_created": "2021-11-26T06:22:19Z",
        "oof_shard": "1"
    }"#;

    #[test]
    fn test_deserialize_upstream_order() {
        let order: Order = serde_json::from_str(SAMPLE).unwrap();

        assert_eq!(order.order_uid, "b563feb7b2b84b6test");
        assert_eq!(order.shard_key, "9");
        assert_eq!(order.delivery.city, "Kiryat Mozkin");
        assert_eq!(order.payment.amount, 1817);
        assert_eq!(order.payment.payment_dt, 1_637_907_727);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].sale, 30);
        assert_eq!(order.date_created.to_rfc3339(), "2021-11-26T06:22:19+00:00");
    }

    #[test]
    fn test_shardkey_field_name_preserved() {
        let order: Order = serde_json::from_str(SAMPLE).unwrap();
        let value = serde_json::to_value(&order).unwrap();

        assert_eq!(value["shardkey"], "9");
        assert!(value.get("shard_key").is_none());
    }

    #[test]
    fn test_missing_fields_become_zero_values() {
        let order: Order = serde_json::from_str(r#"{"order_uid": "only-uid"}"#).unwrap();

        assert_eq!(order.order_uid, "only-uid");
        assert!(order.track_number.is_empty());
        assert!(order.items.is_empty());
        assert_eq!(order.date_created, DateTime::<Utc>::default());
    }
}

//! 测试工具模块
//!
//! 提供测试配置辅助和订单数据生成器。
//! 生产者的 `--generate` 模式同样使用这里的随机订单。

use chrono::{SubsecRound, TimeZone, Utc};
use fake::Fake;
use fake::faker::address::en::{CityName, StateName, StreetName, ZipCode};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::faker::phone_number::en::PhoneNumber;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::models::{Delivery, Item, Order, Payment};

// ==================== 测试配置辅助 ====================

/// 创建测试用数据库配置
///
/// 优先使用环境变量 `DATABASE_URL`，否则使用默认本地数据库
pub fn test_database_config() -> DatabaseConfig {
    DatabaseConfig {
        url: std::env::var("DATABASE_URL").unwrap_or_else(|_| DatabaseConfig::default().url),
        max_connections: 5,
        min_connections: 1,
        ..Default::default()
    }
}

// ==================== 订单数据生成器 ====================

/// 固定内容的完整订单，可以通过全部校验
pub fn sample_order(order_uid: &str) -> Order {
    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: order_uid.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1_637_907_727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![Item {
            chrt_id: 9_934_930,
            track_number: "WBILMTESTTRACK".to_string(),
            price: 453,
            rid: "ab4219087a764ae0btest".to_string(),
            name: "Mascaras".to_string(),
            sale: 30,
            size: "0".to_string(),
            total_price: 317,
            nm_id: 2_389_212,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shard_key: "9".to_string(),
        sm_id: 99,
        date_created: Utc
            .with_ymd_and_hms(2021, 11, 26, 6, 22, 19)
            .single()
            .unwrap_or_default(),
        oof_shard: "1".to_string(),
    }
}

/// 随机内容的完整订单，订单号唯一
///
/// 包含 1-3 个商品，金额字段之间保持一致
pub fn random_order() -> Order {
    let order_uid = Uuid::new_v4().simple().to_string();
    let track_number = format!("WB{}", (100_000..999_999).fake::<u32>());
    let item_count = (1..4).fake::<usize>();

    let items: Vec<Item> = (0..item_count)
        .map(|_| {
            let price = (100..5000).fake::<i64>();
            let sale = (0..50).fake::<i64>();
            Item {
                chrt_id: (1_000_000..9_999_999).fake::<i64>(),
                track_number: track_number.clone(),
                price,
                rid: Uuid::new_v4().simple().to_string(),
                name: CompanyName().fake(),
                sale,
                size: "0".to_string(),
                total_price: price * (100 - sale) / 100,
                nm_id: (1_000_000..9_999_999).fake::<i64>(),
                brand: CompanyName().fake(),
                status: 202,
            }
        })
        .collect();
    let goods_total: i64 = items.iter().map(|i| i.total_price).sum();

    let mut order = sample_order(&order_uid);
    order.track_number = track_number;
    order.customer_id = Name().fake();
    order.delivery = Delivery {
        name: Name().fake(),
        phone: PhoneNumber().fake(),
        zip: ZipCode().fake(),
        city: CityName().fake(),
        address: StreetName().fake(),
        region: StateName().fake(),
        email: SafeEmail().fake(),
    };
    order.payment.goods_total = goods_total;
    order.payment.amount = goods_total + order.payment.delivery_cost;
    order.payment.payment_dt = Utc::now().timestamp();
    order.items = items;
    // PostgreSQL 只保存到微秒
    order.date_created = Utc::now().trunc_subsecs(6);
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_orders_are_unique() {
        assert_ne!(random_order().order_uid, random_order().order_uid);
    }

    #[test]
    fn test_random_order_totals_are_consistent() {
        for _ in 0..20 {
            let order = random_order();
            assert!(!order.items.is_empty());
            assert_eq!(
                order.payment.goods_total,
                order.items.iter().map(|i| i.total_price).sum::<i64>()
            );
            assert_ne!(order.payment.amount, 0);
            assert_eq!(order.payment.transaction, order.order_uid);
        }
    }

    #[test]
    fn test_sample_order_is_deterministic() {
        assert_eq!(sample_order("o-1"), sample_order("o-1"));
        assert_eq!(sample_order("o-1").date_created.timestamp(), 1_637_907_739);
    }
}

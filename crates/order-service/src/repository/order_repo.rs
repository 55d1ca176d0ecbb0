//! 订单仓储
//!
//! 订单主表加三张从属表。一个订单的所有行在同一个事务内写入，
//! 订单号冲突时整笔写入跳过，重复投递不会产生重复的商品行。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};

use order_shared::error::Result;
use order_shared::models::{Delivery, Item, Order, Payment};

use super::traits::OrderRepositoryTrait;

// ---------------------------------------------------------------------------
// 数据库行
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    order_uid: String,
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: String,
    sm_id: i64,
    date_created: DateTime<Utc>,
    oof_shard: String,
}

#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    order_uid: String,
    name: String,
    phone: String,
    zip: String,
    city: String,
    address: String,
    region: String,
    email: String,
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    order_uid: String,
    transaction_id: String,
    request_id: String,
    currency: String,
    provider: String,
    amount: i64,
    payment_dt: i64,
    bank: String,
    delivery_cost: i64,
    goods_total: i64,
    custom_fee: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    order_uid: String,
    chrt_id: i64,
    track_number: String,
    price: i64,
    rid: String,
    name: String,
    sale: i64,
    size: String,
    total_price: i64,
    nm_id: i64,
    brand: String,
    status: i64,
}

impl From<DeliveryRow> for Delivery {
    fn from(row: DeliveryRow) -> Self {
        Self {
            name: row.name,
            phone: row.phone,
            zip: row.zip,
            city: row.city,
            address: row.address,
            region: row.region,
            email: row.email,
        }
    }
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            transaction: row.transaction_id,
            request_id: row.request_id,
            currency: row.currency,
            provider: row.provider,
            amount: row.amount,
            payment_dt: row.payment_dt,
            bank: row.bank,
            delivery_cost: row.delivery_cost,
            goods_total: row.goods_total,
            custom_fee: row.custom_fee,
        }
    }
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            chrt_id: row.chrt_id,
            track_number: row.track_number,
            price: row.price,
            rid: row.rid,
            name: row.name,
            sale: row.sale,
            size: row.size,
            total_price: row.total_price,
            nm_id: row.nm_id,
            brand: row.brand,
            status: row.status,
        }
    }
}

fn assemble(
    row: OrderRow,
    delivery: Option<DeliveryRow>,
    payment: Option<PaymentRow>,
    items: Vec<ItemRow>,
) -> Order {
    Order {
        order_uid: row.order_uid,
        track_number: row.track_number,
        entry: row.entry,
        delivery: delivery.map(Delivery::from).unwrap_or_default(),
        payment: payment.map(Payment::from).unwrap_or_default(),
        items: items.into_iter().map(Item::from).collect(),
        locale: row.locale,
        internal_signature: row.internal_signature,
        customer_id: row.customer_id,
        delivery_service: row.delivery_service,
        shard_key: row.shardkey,
        sm_id: row.sm_id,
        date_created: row.date_created,
        oof_shard: row.oof_shard,
    }
}

const SELECT_ORDERS: &str = r#"
    SELECT order_uid, track_number, entry, locale, internal_signature, customer_id,
           delivery_service, shardkey, sm_id, date_created, oof_shard
    FROM orders
"#;

const SELECT_DELIVERIES: &str = r#"
    SELECT order_uid, name, phone, zip, city, address, region, email
    FROM deliveries
"#;

const SELECT_PAYMENTS: &str = r#"
    SELECT order_uid, transaction_id, request_id, currency, provider, amount,
           payment_dt, bank, delivery_cost, goods_total, custom_fee
    FROM payments
"#;

const SELECT_ITEMS: &str = r#"
    SELECT order_uid, chrt_id, track_number, price, rid, name, sale, size,
           total_price, nm_id, brand, status
    FROM items
"#;

// ---------------------------------------------------------------------------
// PgOrderRepository
// ---------------------------------------------------------------------------

/// PostgreSQL 订单仓储
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderRepositoryTrait for PgOrderRepository {
    #[instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    async fn save_order(&self, order: &Order) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let inserted: Option<String> = sqlx::query_scalar(
            r#"
            INSERT INTO orders (
                order_uid, track_number, entry, locale, internal_signature, customer_id,
                delivery_service, shardkey, sm_id, date_created, oof_shard
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_uid) DO NOTHING
            RETURNING order_uid
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shard_key)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            // 订单已存在，从属表保持原样
            tx.rollback().await?;
            debug!("订单已存在，跳过写入");
            return Ok(false);
        }

        let delivery = &order.delivery;
        sqlx::query(
            r#"
            INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&order.order_uid)
        .bind(&delivery.name)
        .bind(&delivery.phone)
        .bind(&delivery.zip)
        .bind(&delivery.city)
        .bind(&delivery.address)
        .bind(&delivery.region)
        .bind(&delivery.email)
        .execute(&mut *tx)
        .await?;

        let payment = &order.payment;
        sqlx::query(
            r#"
            INSERT INTO payments (
                order_uid, transaction_id, request_id, currency, provider, amount,
                payment_dt, bank, delivery_cost, goods_total, custom_fee
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&order.order_uid)
        .bind(&payment.transaction)
        .bind(&payment.request_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .bind(payment.custom_fee)
        .execute(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO items (
                    order_uid, chrt_id, track_number, price, rid, name, sale, size,
                    total_price, nm_id, brand, status
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(&order.order_uid)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn get_order(&self, order_uid: &str) -> Result<Option<Order>> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDERS} WHERE order_uid = $1"))
            .bind(order_uid)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let delivery =
            sqlx::query_as::<_, DeliveryRow>(&format!("{SELECT_DELIVERIES} WHERE order_uid = $1"))
                .bind(order_uid)
                .fetch_optional(&self.pool)
                .await?;

        let payment =
            sqlx::query_as::<_, PaymentRow>(&format!("{SELECT_PAYMENTS} WHERE order_uid = $1"))
                .bind(order_uid)
                .fetch_optional(&self.pool)
                .await?;

        let items = sqlx::query_as::<_, ItemRow>(&format!(
            "{SELECT_ITEMS} WHERE order_uid = $1 ORDER BY id"
        ))
        .bind(order_uid)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(assemble(row, delivery, payment, items)))
    }

    /// 批量加载全部订单
    ///
    /// 四张表各查一次后在内存中按订单号拼装，避免逐个订单查询从属表
    #[instrument(skip(self))]
    async fn list_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{SELECT_ORDERS} ORDER BY date_created, order_uid"
        ))
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(vec![]);
        }

        let mut deliveries: HashMap<String, DeliveryRow> =
            sqlx::query_as::<_, DeliveryRow>(SELECT_DELIVERIES)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|d| (d.order_uid.clone(), d))
                .collect();

        let mut payments: HashMap<String, PaymentRow> =
            sqlx::query_as::<_, PaymentRow>(SELECT_PAYMENTS)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|p| (p.order_uid.clone(), p))
                .collect();

        let mut items: HashMap<String, Vec<ItemRow>> = HashMap::new();
        for item in sqlx::query_as::<_, ItemRow>(&format!("{SELECT_ITEMS} ORDER BY order_uid, id"))
            .fetch_all(&self.pool)
            .await?
        {
            items.entry(item.order_uid.clone()).or_default().push(item);
        }

        let orders: Vec<Order> = rows
            .into_iter()
            .map(|row| {
                let uid = row.order_uid.clone();
                assemble(
                    row,
                    deliveries.remove(&uid),
                    payments.remove(&uid),
                    items.remove(&uid).unwrap_or_default(),
                )
            })
            .collect();

        debug!(count = orders.len(), "已加载全部订单");
        Ok(orders)
    }
}

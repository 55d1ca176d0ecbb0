//! gRPC 查询接口
//!
//! 与 HTTP 接口共用 `OrderService`，只负责 Proto 类型与订单模型之间的转换

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use order_proto::order::{
    Delivery as ProtoDelivery, GetOrderRequest, GetOrderResponse, Item as ProtoItem,
    Order as ProtoOrder, Payment as ProtoPayment,
    order_service_server::OrderService as OrderQuery,
};
use order_shared::models::{Delivery, Item, Order, Payment};
use order_shared::observability::middleware::REQUEST_ID_HEADER;

use crate::error::ServiceError;
use crate::repository::OrderRepositoryTrait;
use crate::service::OrderService;

pub use order_proto::order::order_service_server::OrderServiceServer;

// ==================== 错误转换 ====================

impl From<ServiceError> for Status {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(_) => Status::invalid_argument(err.to_string()),
            ServiceError::NotFound { .. } => Status::not_found(err.to_string()),
            // 与 HTTP 接口一致，存储错误细节只写日志
            ServiceError::Storage(e) => {
                tracing::error!(error = %e, "订单查询失败");
                Status::internal("服务内部错误，请稍后重试")
            }
        }
    }
}

// ==================== 类型转换 ====================

fn datetime_to_timestamp(dt: chrono::DateTime<chrono::Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}

fn delivery_to_proto(d: Delivery) -> ProtoDelivery {
    ProtoDelivery {
        name: d.name,
        phone: d.phone,
        zip: d.zip,
        city: d.city,
        address: d.address,
        region: d.region,
        email: d.email,
    }
}

fn payment_to_proto(p: Payment) -> ProtoPayment {
    ProtoPayment {
        transaction: p.transaction,
        request_id: p.request_id,
        currency: p.currency,
        provider: p.provider,
        amount: p.amount,
        payment_dt: p.payment_dt,
        bank: p.bank,
        delivery_cost: p.delivery_cost,
        goods_total: p.goods_total,
        custom_fee: p.custom_fee,
    }
}

fn item_to_proto(i: Item) -> ProtoItem {
    ProtoItem {
        chrt_id: i.chrt_id,
        track_number: i.track_number,
        price: i.price,
        rid: i.rid,
        name: i.name,
        sale: i.sale,
        size: i.size,
        total_price: i.total_price,
        nm_id: i.nm_id,
        brand: i.brand,
        status: i.status,
    }
}

fn order_to_proto(o: Order) -> ProtoOrder {
    ProtoOrder {
        order_uid: o.order_uid,
        track_number: o.track_number,
        entry: o.entry,
        delivery: Some(delivery_to_proto(o.delivery)),
        payment: Some(payment_to_proto(o.payment)),
        items: o.items.into_iter().map(item_to_proto).collect(),
        locale: o.locale,
        internal_signature: o.internal_signature,
        customer_id: o.customer_id,
        delivery_service: o.delivery_service,
        shardkey: o.shard_key,
        sm_id: o.sm_id,
        date_created: Some(datetime_to_timestamp(o.date_created)),
        oof_shard: o.oof_shard,
    }
}

// ==================== 服务实现 ====================

/// gRPC 订单查询服务
pub struct OrderGrpcService<R>
where
    R: OrderRepositoryTrait,
{
    service: Arc<OrderService<R>>,
}

impl<R> OrderGrpcService<R>
where
    R: OrderRepositoryTrait,
{
    pub fn new(service: Arc<OrderService<R>>) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl<R> OrderQuery for OrderGrpcService<R>
where
    R: OrderRepositoryTrait + 'static,
{
    /// 按订单号查询订单
    ///
    /// 订单号为空返回 INVALID_ARGUMENT，不存在返回 NOT_FOUND。
    async fn get_order(
        &self,
        request: Request<GetOrderRequest>,
    ) -> Result<Response<GetOrderResponse>, Status> {
        let request_id = request
            .metadata()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(String::from)
            .unwrap_or_else(|| Uuid::now_v7().to_string());

        let order_uid = request.into_inner().order_uid;
        let order_uid = order_uid.trim();
        let span = info_span!("grpc_get_order", request_id = %request_id, order_uid = %order_uid);

        async {
            let order = self.service.get_order(order_uid).await?;
            Ok::<_, Status>(Response::new(GetOrderResponse {
                order: Some(order_to_proto(order)),
            }))
        }
        .instrument(span)
        .await
    }
}

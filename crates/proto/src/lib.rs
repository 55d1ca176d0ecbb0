//! 订单查询 gRPC 协议
//!
//! 由 `proto/order.proto` 在构建时生成。

pub mod order {
    tonic::include_proto!("order");
}

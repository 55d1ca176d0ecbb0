//! 订单生产者 CLI
//!
//! 从 JSON 文件发布一个订单，或生成并发布多个随机订单。

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use order_producer::OrderPublisher;
use order_producer::cli::Cli;
use order_shared::{
    config::AppConfig, kafka::KafkaProducer, models::Order, observability, test_utils::random_order,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load("orders-producer")?;
    if let Some(brokers) = &cli.brokers {
        config.kafka.brokers = brokers.clone();
    }
    if let Some(topic) = &cli.topic {
        config.kafka.topic = topic.clone();
    }

    // 短生命周期进程，不启动指标服务
    let mut obs_config = config.observability.clone().with_service_name(&config.service_name);
    obs_config.metrics_port = 0;
    let _guard = observability::init(&obs_config).await?;

    let producer = Arc::new(KafkaProducer::new(&config.kafka)?);
    let publisher = OrderPublisher::new(producer, config.kafka.topic.clone());

    let orders: Vec<Order> = match cli.generate {
        Some(n) => (0..n).map(|_| random_order()).collect(),
        None => {
            let raw = tokio::fs::read(&cli.file)
                .await
                .with_context(|| format!("读取订单文件失败: {}", cli.file.display()))?;
            let order: Order = serde_json::from_slice(&raw)
                .with_context(|| format!("解析订单文件失败: {}", cli.file.display()))?;
            vec![order]
        }
    };

    let mut failed = 0usize;
    for order in &orders {
        // 显式指定时所有订单共用同一个关联 ID
        let request_id = cli.request_id();
        match publisher.publish(order, Some(&request_id)).await {
            Ok(()) => info!(
                order_uid = %order.order_uid,
                request_id = %request_id,
                topic = %publisher.topic(),
                "Order published"
            ),
            Err(e) => {
                failed += 1;
                error!(order_uid = %order.order_uid, error = %e, "Failed to publish order");
            }
        }
    }

    info!(total = orders.len(), failed, "Publishing finished");
    if failed > 0 {
        anyhow::bail!("{failed} of {} orders failed to publish", orders.len());
    }
    Ok(())
}

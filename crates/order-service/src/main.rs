//! 订单服务
//!
//! 消费订单消息写入 PostgreSQL，并提供按订单号查询的 HTTP 与 gRPC 接口。

use std::net::SocketAddr;
use std::sync::Arc;

use order_service::cache::{MemoryOrderCache, RedisOrderCache};
use order_service::{
    AppState, OrderCacheTrait, OrderConsumer, OrderGrpcService, OrderService, OrderServiceServer,
    PgOrderRepository, routes,
};
use order_shared::{
    cache::Cache,
    config::{AppConfig, CacheBackend},
    database::Database,
    dlq::DlqProducer,
    kafka::{KafkaProducer, KafkaStreamReader},
    observability,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 从 config/{service_name}.toml 与 ORDERS_ 环境变量加载配置
    let config = AppConfig::load("orders-service")?;

    let obs_config = config.observability.clone().with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        addr = %config.server_addr(),
        grpc_addr = %config.grpc_addr(),
        cache = ?config.cache.backend,
        "Starting orders-service"
    );

    // 初始化基础设施
    let db = Database::connect(&config.database).await?;
    db.run_migrations().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    // 缓存后端
    let cache: Option<Arc<dyn OrderCacheTrait>> = match config.cache.backend {
        CacheBackend::Memory => {
            let memory = MemoryOrderCache::new(config.cache.ttl());
            tasks.push(memory.start_janitor(config.cache.janitor_interval(), shutdown_rx.clone()));
            Some(Arc::new(memory))
        }
        CacheBackend::Redis => {
            let redis = Cache::new(&config.redis)?;
            if let Err(e) = redis.health_check().await {
                // Redis 不可用时读请求回源数据库，不阻止启动
                warn!(error = %e, "Redis health check failed");
            }
            Some(Arc::new(RedisOrderCache::new(redis)))
        }
        CacheBackend::None => None,
    };

    let repo = Arc::new(PgOrderRepository::new(db.pool().clone()));
    let service = Arc::new(OrderService::new(repo, cache, config.cache.ttl()));

    // 预热失败只影响首批查询的延迟
    match service.restore_cache().await {
        Ok(stats) => info!(restored = stats.restored, failed = stats.failed, "Cache restored"),
        Err(e) => error!(error = %e, "Cache restore failed, continuing with cold cache"),
    }

    // 消费循环
    let reader = Arc::new(KafkaStreamReader::new(&config.kafka)?);
    let mut consumer = OrderConsumer::new(reader, Arc::clone(&service));
    if let Some(topic) = &config.kafka.dead_letter_topic {
        let producer = Arc::new(KafkaProducer::new(&config.kafka)?);
        consumer = consumer.with_dead_letter(DlqProducer::new(
            producer,
            topic.clone(),
            config.service_name.clone(),
        ));
    }
    tasks.push(tokio::spawn({
        let shutdown = shutdown_rx.clone();
        async move { consumer.run(shutdown).await }
    }));

    // HTTP 查询接口
    let app = routes::app(AppState::new(Arc::clone(&service)));
    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    let server = tokio::spawn({
        let mut shutdown = shutdown_rx.clone();
        async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.wait_for(|stop| *stop).await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "HTTP server exited with error");
            }
        }
    });
    tasks.push(server);

    // gRPC 查询接口
    let grpc_addr: SocketAddr = config.grpc_addr().parse()?;
    info!("gRPC server listening on {}", grpc_addr);

    let grpc_server = tokio::spawn({
        let mut shutdown = shutdown_rx.clone();
        let grpc_service = OrderGrpcService::new(Arc::clone(&service));
        async move {
            let result = tonic::transport::Server::builder()
                .add_service(OrderServiceServer::new(grpc_service))
                .serve_with_shutdown(grpc_addr, async move {
                    let _ = shutdown.wait_for(|stop| *stop).await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "gRPC server exited with error");
            }
        }
    });
    tasks.push(grpc_server);

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Background task panicked");
        }
    }

    db.close().await;
    info!("orders-service shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// K8s 通过 SIGTERM 通知 Pod 停止；本地开发通过 Ctrl+C。
/// 信号处理器注册失败时只监听另一种信号。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}

//! CLI 命令定义
//!
//! ```bash
//! # 发布 test.json 中的订单
//! orders-producer --file test.json
//!
//! # 生成并发布 100 个随机订单
//! orders-producer --generate 100
//! ```

use std::path::PathBuf;

use clap::Parser;

/// 订单生产者命令行工具
#[derive(Parser, Debug)]
#[command(name = "orders-producer")]
#[command(version, about = "向订单 topic 发布订单")]
pub struct Cli {
    /// 订单 JSON 文件
    #[arg(short, long, default_value = "test.json")]
    pub file: PathBuf,

    /// 生成并发布 n 个随机订单，忽略 --file
    #[arg(short, long, value_name = "N")]
    pub generate: Option<usize>,

    /// 关联 ID，缺省时为每个订单生成一个
    #[arg(long)]
    pub request_id: Option<String>,

    /// 覆盖配置中的 topic
    #[arg(long)]
    pub topic: Option<String>,

    /// 覆盖配置中的 Kafka brokers
    #[arg(long)]
    pub brokers: Option<String>,
}

impl Cli {
    /// 本次发布使用的关联 ID
    pub fn request_id(&self) -> String {
        self.request_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::now_v7().to_string())
    }
}

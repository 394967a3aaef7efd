use std::io::stdout;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing_appender::{non_blocking, rolling::never};
use tracing_subscriber::{EnvFilter, fmt::layer, layer::SubscriberExt, util::SubscriberInitExt};

pub mod export;
pub mod upload;
pub mod writer;

/// 单表查询描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableQuery {
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub filter: Option<String>,
}

/// 导出任务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub dest: String,
    pub queries: Vec<TableQuery>,
}

/// 对象存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageOptions {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub use_path_style: bool,
}

/// 上传任务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub storage: StorageOptions,
    pub prefix: String,
    pub source: String,
}

fn default_region() -> String {
    "us-east-1".into()
}

fn default_endpoint() -> String {
    "https://s3.amazonaws.com".into()
}

/// 进度输出消息（写入 stdout 的 JSON Lines）
#[derive(Debug, Serialize)]
pub struct ProgressMessage {
    kind: MessageKind,
    data: serde_json::Value,
}

/// 消息类型
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Progress,
    Status,
    Error,
    Completed,
}

/// 初始化任务日志系统
pub fn init_logging(log_dir: &Path) -> non_blocking::WorkerGuard {
    let log_file = never(log_dir, "task.log");
    let (non_blocking, guard) = non_blocking(log_file);

    tracing_subscriber::registry()
        .with(EnvFilter::new("info"))
        .with(layer().with_writer(stdout))
        .with(layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

pub fn print_error(
    severity: &str,
    message: &str,
) {
    print_progress(ProgressMessage {
        kind: MessageKind::Error,
        data: serde_json::json!({
            "severity": severity,
            "message": message,
        }),
    });
}

pub fn print_completed(data: serde_json::Value) {
    print_progress(ProgressMessage {
        kind: MessageKind::Completed,
        data,
    });
}

pub fn print_progress(msg: ProgressMessage) {
    if let Ok(json) = serde_json::to_string(&msg) {
        println!("{}", json);
    }
}

//! 转诊服务器主程序

mod config;

use clap::Parser;
use config::ServerConfig;
use referral_core::Result;
use referral_notify::NotificationHub;
use referral_predict::ScriptPredictor;
use referral_store::RecordStore;
use referral_web::{AppState, WebServer};
use referral_workflow::WorkflowEngine;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// 转诊服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "referral-server")]
#[command(about = "口腔癌患者转诊工作流服务器")]
struct Args {
    /// 服务器端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 监听地址
    #[arg(long)]
    host: Option<String>,

    /// 预测脚本路径
    #[arg(long)]
    predictor_script: Option<PathBuf>,

    /// ML模型文件路径
    #[arg(long)]
    model_path: Option<PathBuf>,

    /// 影像上传目录
    #[arg(long)]
    uploads_dir: Option<PathBuf>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .init();

    info!("启动转诊服务器...");

    // 加载配置并应用命令行覆盖
    let mut server_config = ServerConfig::load(args.config.as_ref())?;
    if let Some(port) = args.port {
        server_config.port = port;
    }
    if let Some(host) = args.host {
        server_config.host = host;
    }
    if let Some(predictor_script) = args.predictor_script {
        server_config.predictor_script = predictor_script;
    }
    if let Some(model_path) = args.model_path {
        server_config.model_path = model_path;
    }
    if let Some(uploads_dir) = args.uploads_dir {
        server_config.uploads_dir = uploads_dir;
    }

    info!("转诊服务器配置:");
    info!("  监听地址: {}:{}", server_config.host, server_config.port);
    info!("  预测脚本: {}", server_config.predictor_script.display());
    info!("  模型文件: {}", server_config.model_path.display());
    info!("  上传目录: {}", server_config.uploads_dir.display());

    // 组装协作方并注入引擎
    let store = Arc::new(RecordStore::new());
    let hub = Arc::new(NotificationHub::new());
    let predictor = Arc::new(ScriptPredictor::new(
        server_config.python_bin.clone(),
        server_config.predictor_script.clone(),
        server_config.model_path.clone(),
        server_config.uploads_dir.clone(),
    ));
    let engine = Arc::new(WorkflowEngine::new(
        store.clone(),
        hub.clone(),
        predictor,
    ));

    let addr: SocketAddr = format!("{}:{}", server_config.host, server_config.port)
        .parse()
        .map_err(|e| referral_core::ReferralError::Config(format!("Invalid bind address: {}", e)))?;

    let state = AppState { engine, hub, store };
    WebServer::new(addr, state).run().await
}

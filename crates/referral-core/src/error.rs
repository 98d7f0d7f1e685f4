//! 错误定义模块

use thiserror::Error;

/// 转诊系统统一错误类型
#[derive(Error, Debug)]
pub enum ReferralError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("权限错误: {0}")]
    Authorization(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("外部服务错误: {0}")]
    ExternalService(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("网络错误: {0}")]
    Network(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),

    #[error("无效状态转换: 从 {from} 到 {to}")]
    InvalidStateTransition { from: String, to: String },
}

/// 转诊系统统一结果类型
pub type Result<T> = std::result::Result<T, ReferralError>;

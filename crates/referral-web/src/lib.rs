//! # Web服务模块
//!
//! 把REST端点和WebSocket通知通道映射到工作流引擎。
//! 会话机制不在范围内：调用方身份由上游认证层放入 `X-User-Id` 头。

pub mod error;
pub mod handlers;
pub mod server;
pub mod ws;

pub use error::{ApiError, ApiResult};
pub use server::{AppState, WebServer};

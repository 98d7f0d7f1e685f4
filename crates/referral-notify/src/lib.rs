//! # 通知分发模块
//!
//! 按用户ID寻址的实时通知：每个用户一个"房间"，房间里是零个或多个
//! 活跃连接。投递是即发即弃的——没有离线缓冲，发送失败只记录日志，
//! 绝不影响触发它的业务操作。

pub mod hub;

pub use hub::{ConnectionId, Envelope, NotificationHub, NotifyEvent};

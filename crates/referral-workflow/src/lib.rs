//! # 转诊工作流模块
//!
//! 提供患者转诊流程的核心管理功能，包括：
//! - 状态转换表：按显式的(from, to)对管理患者状态生命周期
//! - 工作流引擎：角色门控的患者/诊断操作和通知分发
//! - 填充视图：把引用字段展开为用户摘要后的读取模型

pub mod engine;
pub mod status;
pub mod views;

// 重新导出主要类型
pub use engine::WorkflowEngine;
pub use status::StatusTransitions;
pub use views::{DiagnosisDetail, PatientDetail};

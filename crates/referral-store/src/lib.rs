//! # 转诊记录存储模块
//!
//! 进程内的文档存储，管理三个集合：用户、患者和诊断。
//! 引用字段是不透明的标识符，通过查找解析，不由存储本身强制。

pub mod store;

pub use store::{DiagnosisStats, PatientScope, RecordStore};

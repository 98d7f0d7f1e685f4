//! # 影像预测协作方模块
//!
//! 工作流引擎通过 [`ImagePredictor`] 契约请求ML辅助风险评估。
//! 生产实现把影像交给外部预测脚本，并在任何结果入库之前
//! 严格校验返回的形状——预测方按契约是不可信的。

pub mod predictor;

pub use predictor::{ImagePredictor, PredictionOutcome, ScriptPredictor};

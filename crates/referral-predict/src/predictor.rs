//! 外部预测脚本的调用与结果校验

use async_trait::async_trait;
use referral_core::{ReferralError, Result, RiskLevel};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// 校验通过的预测结果
///
/// 审计字段（analyzed_at / analyzed_by）由工作流引擎补充。
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutcome {
    pub is_cancerous: bool,
    pub confidence: f64,
    pub risk_level: RiskLevel,
}

/// 影像预测协作方契约
#[async_trait]
pub trait ImagePredictor: Send + Sync {
    /// 对一张影像做风险预测
    ///
    /// `locator` 是患者记录里保存的影像定位符。
    async fn predict(&self, locator: &str) -> Result<PredictionOutcome>;
}

/// 预测脚本的原始应答
///
/// 脚本标准输出约定为一个JSON对象：成功时带 `prediction` 子对象，
/// 失败时带 `error` 字段。这里的类型只用于解码，校验后才转换成
/// [`PredictionOutcome`]。
#[derive(Debug, Deserialize)]
struct WireResponse {
    error: Option<String>,
    prediction: Option<WirePrediction>,
}

#[derive(Debug, Deserialize)]
struct WirePrediction {
    is_cancerous: bool,
    confidence: f64,
    risk_level: String,
}

/// 解析并校验预测脚本的标准输出
///
/// 脚本可能在JSON前输出诊断噪声，取最后一个能解析的行。
/// 置信度越界或未知风险等级一律拒绝，绝不写入存储。
pub(crate) fn parse_prediction_output(stdout: &str) -> Result<PredictionOutcome> {
    let response: WireResponse = stdout
        .trim()
        .lines()
        .rev()
        .find_map(|line| serde_json::from_str(line.trim()).ok())
        .ok_or_else(|| {
            ReferralError::ExternalService("Predictor returned unparseable output".to_string())
        })?;

    if let Some(error) = response.error {
        return Err(ReferralError::ExternalService(format!(
            "Predictor reported an error: {}",
            error
        )));
    }

    let prediction = response.prediction.ok_or_else(|| {
        ReferralError::ExternalService("Predictor response missing prediction".to_string())
    })?;

    if !prediction.confidence.is_finite()
        || !(0.0..=1.0).contains(&prediction.confidence)
    {
        return Err(ReferralError::ExternalService(format!(
            "Predictor confidence {} out of range",
            prediction.confidence
        )));
    }

    let risk_level = match prediction.risk_level.as_str() {
        "low" => RiskLevel::Low,
        "medium" => RiskLevel::Medium,
        "high" => RiskLevel::High,
        other => {
            return Err(ReferralError::ExternalService(format!(
                "Predictor returned unknown risk level '{}'",
                other
            )))
        }
    };

    Ok(PredictionOutcome {
        is_cancerous: prediction.is_cancerous,
        confidence: prediction.confidence,
        risk_level,
    })
}

/// 调用外部Python脚本的预测实现
#[derive(Debug, Clone)]
pub struct ScriptPredictor {
    python_bin: String,
    script_path: PathBuf,
    model_path: PathBuf,
    uploads_root: PathBuf,
}

impl ScriptPredictor {
    pub fn new(
        python_bin: impl Into<String>,
        script_path: impl Into<PathBuf>,
        model_path: impl Into<PathBuf>,
        uploads_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            python_bin: python_bin.into(),
            script_path: script_path.into(),
            model_path: model_path.into(),
            uploads_root: uploads_root.into(),
        }
    }

    /// 把影像定位符映射到本地文件路径
    fn resolve_image_path(&self, locator: &str) -> Result<PathBuf> {
        if locator.contains("..") {
            return Err(ReferralError::Validation(format!(
                "Invalid image locator '{}'",
                locator
            )));
        }
        let relative = locator.trim_start_matches("/uploads/").trim_start_matches('/');
        Ok(self.uploads_root.join(relative))
    }
}

#[async_trait]
impl ImagePredictor for ScriptPredictor {
    async fn predict(&self, locator: &str) -> Result<PredictionOutcome> {
        let image_path = self.resolve_image_path(locator)?;
        if !Path::new(&image_path).exists() {
            return Err(ReferralError::NotFound(format!(
                "Image file {} not found",
                image_path.display()
            )));
        }

        tracing::info!(
            "Running predictor {} on {}",
            self.script_path.display(),
            image_path.display()
        );

        let output = Command::new(&self.python_bin)
            .arg(&self.script_path)
            .arg(&self.model_path)
            .arg(&image_path)
            .output()
            .await
            .map_err(|e| {
                ReferralError::ExternalService(format!("Failed to spawn predictor: {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!("Predictor exited with {}: {}", output.status, stderr);
            return Err(ReferralError::ExternalService(format!(
                "Predictor exited with {}",
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_prediction_output(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_prediction() {
        let stdout = r#"{"success": true, "prediction": {"is_cancerous": true, "confidence": 0.87, "risk_level": "high"}}"#;
        let outcome = parse_prediction_output(stdout).unwrap();
        assert!(outcome.is_cancerous);
        assert_eq!(outcome.confidence, 0.87);
        assert_eq!(outcome.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_parse_skips_diagnostic_noise() {
        let stdout = "loading model...\nfastai imported successfully\n{\"prediction\": {\"is_cancerous\": false, \"confidence\": 0.12, \"risk_level\": \"low\"}}\n";
        let outcome = parse_prediction_output(stdout).unwrap();
        assert!(!outcome.is_cancerous);
        assert_eq!(outcome.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_parse_error_response() {
        let stdout = r#"{"error": "model file corrupt"}"#;
        let result = parse_prediction_output(stdout);
        assert!(matches!(result, Err(ReferralError::ExternalService(_))));
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let stdout = r#"{"prediction": {"is_cancerous": true, "confidence": 1.7, "risk_level": "high"}}"#;
        assert!(matches!(
            parse_prediction_output(stdout),
            Err(ReferralError::ExternalService(_))
        ));
    }

    #[test]
    fn test_unknown_risk_level_rejected() {
        let stdout = r#"{"prediction": {"is_cancerous": true, "confidence": 0.5, "risk_level": "extreme"}}"#;
        assert!(matches!(
            parse_prediction_output(stdout),
            Err(ReferralError::ExternalService(_))
        ));
    }

    #[test]
    fn test_garbage_output_rejected() {
        assert!(matches!(
            parse_prediction_output("Traceback (most recent call last): ..."),
            Err(ReferralError::ExternalService(_))
        ));
    }

    #[test]
    fn test_locator_traversal_rejected() {
        let predictor = ScriptPredictor::new("python", "ml_predict.py", "model.pkl", "/srv/uploads");
        assert!(predictor.resolve_image_path("/uploads/../etc/passwd").is_err());
        let path = predictor.resolve_image_path("/uploads/mouth-1.jpg").unwrap();
        assert_eq!(path, PathBuf::from("/srv/uploads/mouth-1.jpg"));
    }
}

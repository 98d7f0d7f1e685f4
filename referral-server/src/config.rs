//! 服务器配置
//!
//! 默认值 < 配置文件 < REFERRAL_ 环境变量 < 命令行参数，逐层覆盖。

use referral_core::{ReferralError, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub python_bin: String,
    pub predictor_script: PathBuf,
    pub model_path: PathBuf,
    pub uploads_dir: PathBuf,
}

impl ServerConfig {
    /// 从可选的配置文件和环境变量加载配置
    pub fn load(config_file: Option<&PathBuf>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("host", "0.0.0.0")
            .map_err(|e| ReferralError::Config(e.to_string()))?
            .set_default("port", 5000i64)
            .map_err(|e| ReferralError::Config(e.to_string()))?
            .set_default("python_bin", "python3")
            .map_err(|e| ReferralError::Config(e.to_string()))?
            .set_default("predictor_script", "./scripts/ml_predict.py")
            .map_err(|e| ReferralError::Config(e.to_string()))?
            .set_default("model_path", "./models/oral_cancer_model.pkl")
            .map_err(|e| ReferralError::Config(e.to_string()))?
            .set_default("uploads_dir", "./data/uploads")
            .map_err(|e| ReferralError::Config(e.to_string()))?;

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path.clone()));
        }
        builder = builder.add_source(config::Environment::with_prefix("REFERRAL"));

        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| ReferralError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = ServerConfig::load(None).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.python_bin, "python3");
    }
}

//! 填充视图
//!
//! 引用字段是不透明的标识符，读取接口把它们展开成用户摘要和诊断记录。

use referral_core::{Diagnosis, Patient, UserSummary};
use serde::{Deserialize, Serialize};

/// 患者详情（引用已展开）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientDetail {
    #[serde(flatten)]
    pub patient: Patient,
    /// 登记该患者的工作者摘要
    pub recorded_by_user: Option<UserSummary>,
    /// 分配医生摘要
    pub assigned_doctor_user: Option<UserSummary>,
    /// 诊断记录（如果已诊断）
    pub diagnosis_record: Option<Diagnosis>,
}

/// 诊断详情（医生引用已展开）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisDetail {
    #[serde(flatten)]
    pub diagnosis: Diagnosis,
    pub doctor_user: Option<UserSummary>,
}

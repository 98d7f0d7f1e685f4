//! 核心数据模型定义

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 用户角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    FieldWorker, // 社区卫生工作者
    Physician,   // 医生
    Admin,       // 管理员
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::FieldWorker => "field_worker",
            Role::Physician => "physician",
            Role::Admin => "admin",
        }
    }
}

/// 角色专属信息
///
/// 角色字段和专属字段绑定在同一个变体中，保证"角色匹配时必填"的约束在构造时成立。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleProfile {
    Physician {
        specialization: String,
        license_number: String,
        hospital: String,
    },
    FieldWorker {
        work_area: String,
        employee_id: String,
    },
    Admin,
}

impl RoleProfile {
    pub fn role(&self) -> Role {
        match self {
            RoleProfile::Physician { .. } => Role::Physician,
            RoleProfile::FieldWorker { .. } => Role::FieldWorker,
            RoleProfile::Admin => Role::Admin,
        }
    }
}

/// 用户信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(flatten)]
    pub profile: RoleProfile,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Role {
        self.profile.role()
    }
}

/// 用户摘要（用于引用字段展开）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(flatten)]
    pub profile: RoleProfile,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            profile: user.profile.clone(),
        }
    }
}

/// 性别枚举
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// 烟草使用情况
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TobaccoUse {
    #[default]
    None,
    Smoking,
    Chewing,
    Both,
}

/// 饮酒情况
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlcoholConsumption {
    #[default]
    None,
    Occasional,
    Regular,
    Heavy,
}

/// 患者地址
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Address {
    pub street: Option<String>,
    pub village: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
}

/// 风险等级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// AI辅助影像分析结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiPrediction {
    pub is_cancerous: bool,
    pub confidence: f64, // [0, 1]
    pub risk_level: RiskLevel,
    pub analyzed_at: DateTime<Utc>,
    pub analyzed_by: Uuid,
}

/// 口腔影像记录
///
/// 文件内容由外部存储保管，这里只保存定位符。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MouthImage {
    pub locator: String,
    pub uploaded_at: DateTime<Utc>,
    pub description: Option<String>,
    pub ai_prediction: Option<AiPrediction>,
}

/// 患者状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    Pending,          // 待处理
    UnderReview,      // 审查中
    Diagnosed,        // 已诊断
    FollowUpRequired, // 需要随访
}

impl PatientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Pending => "pending",
            PatientStatus::UnderReview => "under_review",
            PatientStatus::Diagnosed => "diagnosed",
            PatientStatus::FollowUpRequired => "follow_up_required",
        }
    }
}

/// 患者优先级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// 患者记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,

    // 个人信息
    pub full_name: String,
    pub age: u16,
    pub gender: Gender,
    pub phone: String,
    pub alternate_phone: Option<String>,
    pub address: Option<Address>,

    // 医疗信息
    pub tobacco_use: TobaccoUse,
    pub tobacco_duration: Option<String>, // 例如 "5 years"
    pub alcohol_consumption: AlcoholConsumption,
    pub symptoms: Vec<String>,
    pub medical_history: Option<String>,

    // 口腔检查
    pub mouth_images: Vec<MouthImage>,
    pub oral_examination_notes: Option<String>,

    // 系统信息：两个引用在创建后不可变
    pub recorded_by: Uuid,
    pub assigned_doctor: Uuid,
    pub status: PatientStatus,
    pub priority: Priority,

    // 诊断引用：当且仅当状态到达 diagnosed 后才会被设置
    pub diagnosis: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 诊断结论
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosisResult {
    Negative,
    Suspicious,
    Positive,
    RequiresBiopsy,
}

impl DiagnosisResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosisResult::Negative => "negative",
            DiagnosisResult::Suspicious => "suspicious",
            DiagnosisResult::Positive => "positive",
            DiagnosisResult::RequiresBiopsy => "requires_biopsy",
        }
    }
}

/// 病情严重程度
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    None,
    Mild,
    Moderate,
    Severe,
}

/// 转诊详情
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReferralDetails {
    pub hospital: Option<String>,
    pub specialist: Option<String>,
    pub reason: Option<String>,
}

/// 诊断记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: Uuid,
    pub patient: Uuid, // 创建后不可变
    pub doctor: Uuid,  // 创建后不可变
    pub result: DiagnosisResult,
    pub findings: String,
    pub recommendations: String,
    pub severity: Severity,
    pub follow_up_required: bool,
    pub follow_up_date: Option<NaiveDate>,
    pub treatment_plan: Option<String>,
    pub referral_required: bool,
    pub referral_details: Option<ReferralDetails>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_profile_determines_role() {
        let profile = RoleProfile::Physician {
            specialization: "Oncology".to_string(),
            license_number: "LIC-1001".to_string(),
            hospital: "District Hospital".to_string(),
        };
        assert_eq!(profile.role(), Role::Physician);

        let profile = RoleProfile::FieldWorker {
            work_area: "Block 7".to_string(),
            employee_id: "FW-42".to_string(),
        };
        assert_eq!(profile.role(), Role::FieldWorker);
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&PatientStatus::FollowUpRequired).unwrap();
        assert_eq!(json, "\"follow_up_required\"");

        let status: PatientStatus = serde_json::from_str("\"under_review\"").unwrap();
        assert_eq!(status, PatientStatus::UnderReview);
    }

    #[test]
    fn test_user_serializes_flattened_profile() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Dr. Rao".to_string(),
            email: "rao@example.org".to_string(),
            phone: "9000000001".to_string(),
            profile: RoleProfile::Physician {
                specialization: "Oral Medicine".to_string(),
                license_number: "LIC-7".to_string(),
                hospital: "Civil Hospital".to_string(),
            },
            is_active: true,
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["role"], "physician");
        assert_eq!(value["specialization"], "Oral Medicine");
    }
}

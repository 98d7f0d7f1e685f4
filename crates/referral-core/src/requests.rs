//! 操作请求载荷定义
//!
//! 工作流引擎的输入类型，HTTP层直接反序列化后传入。

use crate::error::{ReferralError, Result};
use crate::models::*;
use crate::utils::is_valid_image_locator;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 新建用户请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserData {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(flatten)]
    pub profile: RoleProfile,
}

impl NewUserData {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ReferralError::Validation("Name is required".to_string()));
        }
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(ReferralError::Validation("Valid email is required".to_string()));
        }
        if self.phone.trim().is_empty() {
            return Err(ReferralError::Validation("Phone number is required".to_string()));
        }
        match &self.profile {
            RoleProfile::Physician {
                specialization,
                license_number,
                hospital,
            } => {
                if specialization.trim().is_empty()
                    || license_number.trim().is_empty()
                    || hospital.trim().is_empty()
                {
                    return Err(ReferralError::Validation(
                        "Specialization, license number and hospital are required for physicians"
                            .to_string(),
                    ));
                }
            }
            RoleProfile::FieldWorker {
                work_area,
                employee_id,
            } => {
                if work_area.trim().is_empty() || employee_id.trim().is_empty() {
                    return Err(ReferralError::Validation(
                        "Work area and employee id are required for field workers".to_string(),
                    ));
                }
            }
            RoleProfile::Admin => {}
        }
        Ok(())
    }
}

/// 新上传的口腔影像（还没有分析结果）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMouthImage {
    pub locator: String,
    pub description: Option<String>,
}

/// 新建患者请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatientData {
    pub full_name: String,
    pub age: u16,
    pub gender: Gender,
    pub phone: String,
    pub alternate_phone: Option<String>,
    pub address: Option<Address>,

    #[serde(default)]
    pub tobacco_use: TobaccoUse,
    pub tobacco_duration: Option<String>,
    #[serde(default)]
    pub alcohol_consumption: AlcoholConsumption,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub medical_history: Option<String>,

    #[serde(default)]
    pub mouth_images: Vec<NewMouthImage>,
    pub oral_examination_notes: Option<String>,

    pub assigned_doctor: Uuid,
    #[serde(default)]
    pub priority: Priority,
}

impl NewPatientData {
    pub fn validate(&self) -> Result<()> {
        if self.full_name.trim().is_empty() {
            return Err(ReferralError::Validation(
                "Patient name is required".to_string(),
            ));
        }
        if self.phone.trim().is_empty() {
            return Err(ReferralError::Validation(
                "Phone number is required".to_string(),
            ));
        }
        for image in &self.mouth_images {
            if !is_valid_image_locator(&image.locator) {
                return Err(ReferralError::Validation(format!(
                    "Invalid image locator '{}'",
                    image.locator
                )));
            }
        }
        Ok(())
    }
}

/// 患者记录修改（只覆盖字段为Some的部分）
///
/// 状态、诊断引用和两个所有者引用不在可修改范围内。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientPatch {
    pub full_name: Option<String>,
    pub age: Option<u16>,
    pub gender: Option<Gender>,
    pub phone: Option<String>,
    pub alternate_phone: Option<String>,
    pub address: Option<Address>,
    pub tobacco_use: Option<TobaccoUse>,
    pub tobacco_duration: Option<String>,
    pub alcohol_consumption: Option<AlcoholConsumption>,
    pub symptoms: Option<Vec<String>>,
    pub medical_history: Option<String>,
    pub mouth_images: Option<Vec<NewMouthImage>>,
    pub oral_examination_notes: Option<String>,
}

impl PatientPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.full_name {
            if name.trim().is_empty() {
                return Err(ReferralError::Validation(
                    "Patient name must not be empty".to_string(),
                ));
            }
        }
        if let Some(phone) = &self.phone {
            if phone.trim().is_empty() {
                return Err(ReferralError::Validation(
                    "Phone number must not be empty".to_string(),
                ));
            }
        }
        if let Some(images) = &self.mouth_images {
            for image in images {
                if !is_valid_image_locator(&image.locator) {
                    return Err(ReferralError::Validation(format!(
                        "Invalid image locator '{}'",
                        image.locator
                    )));
                }
            }
        }
        Ok(())
    }
}

/// 状态/优先级更新请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<PatientStatus>,
    pub priority: Option<Priority>,
}

/// 患者列表过滤器
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientFilter {
    pub status: Option<PatientStatus>,
    pub priority: Option<Priority>,
}

/// 新建诊断请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiagnosisData {
    pub patient: Uuid,
    pub result: DiagnosisResult,
    pub findings: String,
    pub recommendations: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub follow_up_required: bool,
    pub follow_up_date: Option<NaiveDate>,
    pub treatment_plan: Option<String>,
    #[serde(default)]
    pub referral_required: bool,
    pub referral_details: Option<ReferralDetails>,
    pub notes: Option<String>,
}

impl NewDiagnosisData {
    pub fn validate(&self) -> Result<()> {
        if self.findings.trim().is_empty() {
            return Err(ReferralError::Validation(
                "Findings are required".to_string(),
            ));
        }
        if self.recommendations.trim().is_empty() {
            return Err(ReferralError::Validation(
                "Recommendations are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// 诊断修改请求（patient/doctor引用不可修改）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosisPatch {
    pub result: Option<DiagnosisResult>,
    pub findings: Option<String>,
    pub recommendations: Option<String>,
    pub severity: Option<Severity>,
    pub follow_up_required: Option<bool>,
    pub follow_up_date: Option<NaiveDate>,
    pub treatment_plan: Option<String>,
    pub referral_required: Option<bool>,
    pub referral_details: Option<ReferralDetails>,
    pub notes: Option<String>,
}

impl DiagnosisPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(findings) = &self.findings {
            if findings.trim().is_empty() {
                return Err(ReferralError::Validation(
                    "Findings must not be empty".to_string(),
                ));
            }
        }
        if let Some(recommendations) = &self.recommendations {
            if recommendations.trim().is_empty() {
                return Err(ReferralError::Validation(
                    "Recommendations must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_patient_data(doctor: Uuid) -> NewPatientData {
        NewPatientData {
            full_name: "Ramesh Kumar".to_string(),
            age: 54,
            gender: Gender::Male,
            phone: "9876543210".to_string(),
            alternate_phone: None,
            address: None,
            tobacco_use: TobaccoUse::Chewing,
            tobacco_duration: Some("10 years".to_string()),
            alcohol_consumption: AlcoholConsumption::Occasional,
            symptoms: vec!["white patch".to_string()],
            medical_history: None,
            mouth_images: Vec::new(),
            oral_examination_notes: None,
            assigned_doctor: doctor,
            priority: Priority::Medium,
        }
    }

    #[test]
    fn test_patient_data_requires_name_and_phone() {
        let doctor = Uuid::new_v4();

        let mut data = sample_patient_data(doctor);
        data.full_name = "  ".to_string();
        assert!(data.validate().is_err());

        let mut data = sample_patient_data(doctor);
        data.phone = String::new();
        assert!(data.validate().is_err());

        assert!(sample_patient_data(doctor).validate().is_ok());
    }

    #[test]
    fn test_patient_data_rejects_invalid_image_locator() {
        let doctor = Uuid::new_v4();

        let mut data = sample_patient_data(doctor);
        data.mouth_images = vec![NewMouthImage {
            locator: "/uploads/../etc/passwd".to_string(),
            description: None,
        }];
        assert!(data.validate().is_err());

        let mut data = sample_patient_data(doctor);
        data.mouth_images = vec![NewMouthImage {
            locator: "  ".to_string(),
            description: None,
        }];
        assert!(data.validate().is_err());

        let patch = PatientPatch {
            mouth_images: Some(vec![NewMouthImage {
                locator: "/uploads/../secret.jpg".to_string(),
                description: None,
            }]),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_diagnosis_data_requires_findings_and_recommendations() {
        let data = NewDiagnosisData {
            patient: Uuid::new_v4(),
            result: DiagnosisResult::Suspicious,
            findings: String::new(),
            recommendations: "Biopsy advised".to_string(),
            severity: Severity::Moderate,
            follow_up_required: false,
            follow_up_date: None,
            treatment_plan: None,
            referral_required: false,
            referral_details: None,
            notes: None,
        };
        assert!(data.validate().is_err());
    }

    #[test]
    fn test_physician_profile_requires_license() {
        let data = NewUserData {
            name: "Dr. Mehta".to_string(),
            email: "mehta@example.org".to_string(),
            phone: "9000000002".to_string(),
            profile: RoleProfile::Physician {
                specialization: "Oncology".to_string(),
                license_number: String::new(),
                hospital: "Civil Hospital".to_string(),
            },
        };
        assert!(data.validate().is_err());
    }
}

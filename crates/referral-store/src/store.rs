//! 记录存储实现
//!
//! 三个集合共用一把读写锁。写入方遵循"每条记录单写者"假设，
//! 并发写同一条记录时后写者覆盖；诊断创建需要同时落两条记录，
//! 由 `commit_diagnosis` 在同一个写临界区内完成。

use referral_core::{
    Diagnosis, Patient, PatientFilter, PatientStatus, ReferralError, Result, Role, User,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// 患者查询范围（按角色限定可见性）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientScope {
    /// 某个工作者登记的患者
    RecordedBy(Uuid),
    /// 分配给某个医生的患者
    AssignedTo(Uuid),
    /// 全部患者（管理员）
    All,
}

/// 按医生统计的诊断数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisStats {
    pub total: usize,
    pub breakdown: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct Collections {
    users: HashMap<Uuid, User>,
    patients: HashMap<Uuid, Patient>,
    diagnoses: HashMap<Uuid, Diagnosis>,
}

/// 记录存储
#[derive(Debug, Default)]
pub struct RecordStore {
    inner: RwLock<Collections>,
}

impl RecordStore {
    /// 创建空的记录存储
    pub fn new() -> Self {
        Self::default()
    }

    // ========== 用户集合 ==========

    /// 插入用户记录
    ///
    /// 角色在创建后不可变：存储不提供任何修改用户角色的入口。
    pub async fn insert_user(&self, user: User) -> Result<User> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(ReferralError::Validation(format!(
                "Email {} is already registered",
                user.email
            )));
        }
        inner.users.insert(user.id, user.clone());
        tracing::debug!("Inserted user {} ({})", user.id, user.role().as_str());
        Ok(user)
    }

    /// 按ID获取用户
    pub async fn get_user(&self, user_id: Uuid) -> Result<User> {
        self.inner
            .read()
            .await
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| ReferralError::NotFound(format!("User {} not found", user_id)))
    }

    /// 按ID查找用户（不存在时返回None）
    pub async fn find_user(&self, user_id: Uuid) -> Option<User> {
        self.inner.read().await.users.get(&user_id).cloned()
    }

    /// 列出某个角色的活跃用户
    pub async fn list_active_users_by_role(&self, role: Role) -> Vec<User> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner
            .users
            .values()
            .filter(|u| u.is_active && u.role() == role)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        users
    }

    // ========== 患者集合 ==========

    /// 插入患者记录
    pub async fn insert_patient(&self, patient: Patient) -> Result<Patient> {
        let mut inner = self.inner.write().await;
        inner.patients.insert(patient.id, patient.clone());
        tracing::debug!("Inserted patient {}", patient.id);
        Ok(patient)
    }

    /// 按ID获取患者
    pub async fn get_patient(&self, patient_id: Uuid) -> Result<Patient> {
        self.inner
            .read()
            .await
            .patients
            .get(&patient_id)
            .cloned()
            .ok_or_else(|| ReferralError::NotFound(format!("Patient {} not found", patient_id)))
    }

    /// 整条覆盖患者记录（后写者胜出）
    pub async fn update_patient(&self, patient: Patient) -> Result<Patient> {
        let mut inner = self.inner.write().await;
        if !inner.patients.contains_key(&patient.id) {
            return Err(ReferralError::NotFound(format!(
                "Patient {} not found",
                patient.id
            )));
        }
        inner.patients.insert(patient.id, patient.clone());
        Ok(patient)
    }

    /// 删除患者记录及其关联诊断
    pub async fn delete_patient(&self, patient_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        let patient = inner
            .patients
            .remove(&patient_id)
            .ok_or_else(|| ReferralError::NotFound(format!("Patient {} not found", patient_id)))?;
        if let Some(diagnosis_id) = patient.diagnosis {
            inner.diagnoses.remove(&diagnosis_id);
        }
        tracing::debug!("Deleted patient {}", patient_id);
        Ok(())
    }

    /// 按范围和过滤器查询患者，按创建时间倒序
    pub async fn list_patients(&self, scope: PatientScope, filter: &PatientFilter) -> Vec<Patient> {
        let inner = self.inner.read().await;
        let mut patients: Vec<Patient> = inner
            .patients
            .values()
            .filter(|p| match scope {
                PatientScope::RecordedBy(worker_id) => p.recorded_by == worker_id,
                PatientScope::AssignedTo(doctor_id) => p.assigned_doctor == doctor_id,
                PatientScope::All => true,
            })
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .filter(|p| filter.priority.map_or(true, |pr| p.priority == pr))
            .cloned()
            .collect();
        patients.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        patients
    }

    // ========== 诊断集合 ==========

    /// 原子提交诊断
    ///
    /// 诊断插入和患者的 status/diagnosis 更新在同一个写临界区内完成，
    /// 两者要么都落盘要么都不落。"已有诊断"守卫在临界区内重新检查，
    /// 避免两个并发提交都通过引擎层的预检。
    pub async fn commit_diagnosis(&self, diagnosis: Diagnosis) -> Result<(Diagnosis, Patient)> {
        let mut inner = self.inner.write().await;

        let patient = inner.patients.get(&diagnosis.patient).ok_or_else(|| {
            ReferralError::NotFound(format!("Patient {} not found", diagnosis.patient))
        })?;
        if patient.diagnosis.is_some() {
            return Err(ReferralError::Validation(format!(
                "Patient {} already has a diagnosis",
                diagnosis.patient
            )));
        }

        let mut patient = patient.clone();
        patient.diagnosis = Some(diagnosis.id);
        patient.status = PatientStatus::Diagnosed;
        patient.updated_at = chrono::Utc::now();

        inner.diagnoses.insert(diagnosis.id, diagnosis.clone());
        inner.patients.insert(patient.id, patient.clone());

        tracing::debug!(
            "Committed diagnosis {} for patient {}",
            diagnosis.id,
            patient.id
        );
        Ok((diagnosis, patient))
    }

    /// 按ID获取诊断
    pub async fn get_diagnosis(&self, diagnosis_id: Uuid) -> Result<Diagnosis> {
        self.inner
            .read()
            .await
            .diagnoses
            .get(&diagnosis_id)
            .cloned()
            .ok_or_else(|| ReferralError::NotFound(format!("Diagnosis {} not found", diagnosis_id)))
    }

    /// 查找某个患者的诊断
    pub async fn find_diagnosis_by_patient(&self, patient_id: Uuid) -> Option<Diagnosis> {
        self.inner
            .read()
            .await
            .diagnoses
            .values()
            .find(|d| d.patient == patient_id)
            .cloned()
    }

    /// 整条覆盖诊断记录（patient/doctor引用由引擎保证不变）
    pub async fn update_diagnosis(&self, diagnosis: Diagnosis) -> Result<Diagnosis> {
        let mut inner = self.inner.write().await;
        if !inner.diagnoses.contains_key(&diagnosis.id) {
            return Err(ReferralError::NotFound(format!(
                "Diagnosis {} not found",
                diagnosis.id
            )));
        }
        inner.diagnoses.insert(diagnosis.id, diagnosis.clone());
        Ok(diagnosis)
    }

    /// 某个医生的诊断统计：总数加按结论的分布
    pub async fn diagnosis_stats(&self, doctor_id: Uuid) -> DiagnosisStats {
        let inner = self.inner.read().await;
        let mut breakdown: HashMap<String, usize> = HashMap::new();
        let mut total = 0usize;

        for diagnosis in inner.diagnoses.values().filter(|d| d.doctor == doctor_id) {
            total += 1;
            *breakdown
                .entry(diagnosis.result.as_str().to_string())
                .or_insert(0) += 1;
        }

        DiagnosisStats { total, breakdown }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use referral_core::{
        AlcoholConsumption, DiagnosisResult, Gender, Priority, RoleProfile, Severity, TobaccoUse,
    };

    fn make_user(profile: RoleProfile, email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: email.to_string(),
            phone: "9000000000".to_string(),
            profile,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn make_patient(recorded_by: Uuid, assigned_doctor: Uuid) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            full_name: "Sita Devi".to_string(),
            age: 47,
            gender: Gender::Female,
            phone: "9876500000".to_string(),
            alternate_phone: None,
            address: None,
            tobacco_use: TobaccoUse::Chewing,
            tobacco_duration: None,
            alcohol_consumption: AlcoholConsumption::None,
            symptoms: Vec::new(),
            medical_history: None,
            mouth_images: Vec::new(),
            oral_examination_notes: None,
            recorded_by,
            assigned_doctor,
            status: PatientStatus::Pending,
            priority: Priority::Medium,
            diagnosis: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn make_diagnosis(patient: Uuid, doctor: Uuid) -> Diagnosis {
        Diagnosis {
            id: Uuid::new_v4(),
            patient,
            doctor,
            result: DiagnosisResult::Suspicious,
            findings: "Leukoplakia on left buccal mucosa".to_string(),
            recommendations: "Biopsy advised".to_string(),
            severity: Severity::Moderate,
            follow_up_required: true,
            follow_up_date: None,
            treatment_plan: None,
            referral_required: false,
            referral_details: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = RecordStore::new();
        store
            .insert_user(make_user(RoleProfile::Admin, "a@example.org"))
            .await
            .unwrap();
        let result = store
            .insert_user(make_user(RoleProfile::Admin, "a@example.org"))
            .await;
        assert!(matches!(result, Err(ReferralError::Validation(_))));
    }

    #[tokio::test]
    async fn test_scope_filters_patients() {
        let store = RecordStore::new();
        let worker_a = Uuid::new_v4();
        let worker_b = Uuid::new_v4();
        let doctor = Uuid::new_v4();

        store
            .insert_patient(make_patient(worker_a, doctor))
            .await
            .unwrap();
        store
            .insert_patient(make_patient(worker_b, doctor))
            .await
            .unwrap();

        let filter = PatientFilter::default();
        let own = store
            .list_patients(PatientScope::RecordedBy(worker_a), &filter)
            .await;
        assert_eq!(own.len(), 1);

        let assigned = store
            .list_patients(PatientScope::AssignedTo(doctor), &filter)
            .await;
        assert_eq!(assigned.len(), 2);
    }

    #[tokio::test]
    async fn test_commit_diagnosis_is_atomic() {
        let store = RecordStore::new();
        let worker = Uuid::new_v4();
        let doctor = Uuid::new_v4();
        let patient = store
            .insert_patient(make_patient(worker, doctor))
            .await
            .unwrap();

        let (diagnosis, updated) = store
            .commit_diagnosis(make_diagnosis(patient.id, doctor))
            .await
            .unwrap();
        assert_eq!(updated.status, PatientStatus::Diagnosed);
        assert_eq!(updated.diagnosis, Some(diagnosis.id));

        // 第二次提交必须被拒绝，并且不留下孤儿诊断
        let second = store
            .commit_diagnosis(make_diagnosis(patient.id, doctor))
            .await;
        assert!(matches!(second, Err(ReferralError::Validation(_))));
        let stored = store.find_diagnosis_by_patient(patient.id).await.unwrap();
        assert_eq!(stored.id, diagnosis.id);
    }

    #[tokio::test]
    async fn test_commit_diagnosis_unknown_patient_persists_nothing() {
        let store = RecordStore::new();
        let diagnosis = make_diagnosis(Uuid::new_v4(), Uuid::new_v4());
        let diagnosis_id = diagnosis.id;

        let result = store.commit_diagnosis(diagnosis).await;
        assert!(matches!(result, Err(ReferralError::NotFound(_))));
        assert!(store.get_diagnosis(diagnosis_id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_patient_removes_diagnosis() {
        let store = RecordStore::new();
        let worker = Uuid::new_v4();
        let doctor = Uuid::new_v4();
        let patient = store
            .insert_patient(make_patient(worker, doctor))
            .await
            .unwrap();
        let (diagnosis, _) = store
            .commit_diagnosis(make_diagnosis(patient.id, doctor))
            .await
            .unwrap();

        store.delete_patient(patient.id).await.unwrap();
        assert!(store.get_patient(patient.id).await.is_err());
        assert!(store.get_diagnosis(diagnosis.id).await.is_err());
    }

    #[tokio::test]
    async fn test_diagnosis_stats_breakdown() {
        let store = RecordStore::new();
        let worker = Uuid::new_v4();
        let doctor = Uuid::new_v4();

        for _ in 0..2 {
            let patient = store
                .insert_patient(make_patient(worker, doctor))
                .await
                .unwrap();
            store
                .commit_diagnosis(make_diagnosis(patient.id, doctor))
                .await
                .unwrap();
        }

        let stats = store.diagnosis_stats(doctor).await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.breakdown.get("suspicious"), Some(&2));
    }
}

//! 工作流引擎
//!
//! 转诊流程的核心：角色门控的患者与诊断操作、状态转换校验、
//! 影像分析委托和通知分发。存储、通知中心和预测器作为显式依赖
//! 注入，引擎不依赖任何全局上下文。

use crate::status::StatusTransitions;
use crate::views::{DiagnosisDetail, PatientDetail};
use chrono::Utc;
use referral_core::{
    AiPrediction, Diagnosis, DiagnosisPatch, MouthImage, NewDiagnosisData, NewPatientData,
    NewUserData, Patient, PatientFilter, PatientPatch, PatientStatus, ReferralError, Result, Role,
    StatusUpdate, User, UserSummary,
};
use referral_notify::{NotificationHub, NotifyEvent};
use referral_predict::ImagePredictor;
use referral_store::{DiagnosisStats, PatientScope, RecordStore};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// 工作流引擎
pub struct WorkflowEngine {
    store: Arc<RecordStore>,
    hub: Arc<NotificationHub>,
    predictor: Arc<dyn ImagePredictor>,
    transitions: StatusTransitions,
}

impl WorkflowEngine {
    /// 创建新的工作流引擎
    pub fn new(
        store: Arc<RecordStore>,
        hub: Arc<NotificationHub>,
        predictor: Arc<dyn ImagePredictor>,
    ) -> Self {
        Self {
            store,
            hub,
            predictor,
            transitions: StatusTransitions::new(),
        }
    }

    /// 获取转换表实例
    pub fn transitions(&self) -> &StatusTransitions {
        &self.transitions
    }

    // ========== 用户操作 ==========

    /// 注册工作流参与者
    pub async fn register_user(&self, data: NewUserData) -> Result<User> {
        data.validate()?;

        let user = User {
            id: Uuid::new_v4(),
            name: data.name,
            email: data.email,
            phone: data.phone,
            profile: data.profile,
            is_active: true,
            created_at: Utc::now(),
        };

        let user = self.store.insert_user(user).await?;
        tracing::info!("Registered {} {}", user.role().as_str(), user.id);
        Ok(user)
    }

    /// 列出活跃医生（供分配选择）
    pub async fn list_physicians(&self) -> Vec<User> {
        self.store.list_active_users_by_role(Role::Physician).await
    }

    /// 列出活跃的社区卫生工作者
    pub async fn list_field_workers(&self) -> Vec<User> {
        self.store.list_active_users_by_role(Role::FieldWorker).await
    }

    // ========== 患者操作 ==========

    /// 创建患者记录
    ///
    /// 只有社区卫生工作者可以登记患者；分配医生必须是已存在的
    /// 活跃医生。创建成功后通知分配医生。
    pub async fn create_patient(
        &self,
        data: NewPatientData,
        recorder_id: Uuid,
    ) -> Result<PatientDetail> {
        let recorder = self.store.get_user(recorder_id).await?;
        if recorder.role() != Role::FieldWorker {
            return Err(ReferralError::Authorization(
                "Only field workers may create patient records".to_string(),
            ));
        }

        data.validate()?;

        let doctor = self
            .store
            .find_user(data.assigned_doctor)
            .await
            .filter(|u| u.role() == Role::Physician && u.is_active)
            .ok_or_else(|| {
                ReferralError::Validation(
                    "Assigned doctor must reference an existing physician".to_string(),
                )
            })?;

        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            full_name: data.full_name,
            age: data.age,
            gender: data.gender,
            phone: data.phone,
            alternate_phone: data.alternate_phone,
            address: data.address,
            tobacco_use: data.tobacco_use,
            tobacco_duration: data.tobacco_duration,
            alcohol_consumption: data.alcohol_consumption,
            symptoms: data.symptoms,
            medical_history: data.medical_history,
            mouth_images: data
                .mouth_images
                .into_iter()
                .map(|img| MouthImage {
                    locator: img.locator,
                    uploaded_at: now,
                    description: img.description,
                    ai_prediction: None,
                })
                .collect(),
            oral_examination_notes: data.oral_examination_notes,
            recorded_by: recorder_id,
            assigned_doctor: doctor.id,
            status: PatientStatus::Pending,
            priority: data.priority,
            diagnosis: None,
            created_at: now,
            updated_at: now,
        };

        let patient = self.store.insert_patient(patient).await?;
        tracing::info!(
            "Patient {} created by field worker {} for doctor {}",
            patient.id,
            recorder_id,
            doctor.id
        );

        let detail = self.populate_patient(patient).await;
        self.hub
            .emit(
                doctor.id,
                NotifyEvent::NewPatient,
                "New patient assigned to you",
                json!({ "patient": detail }),
            )
            .await;

        Ok(detail)
    }

    /// 获取患者详情（角色限定可见性）
    pub async fn get_patient(&self, patient_id: Uuid, actor_id: Uuid) -> Result<PatientDetail> {
        let actor = self.store.get_user(actor_id).await?;
        let patient = self.store.get_patient(patient_id).await?;
        Self::ensure_can_view(&actor, &patient)?;
        Ok(self.populate_patient(patient).await)
    }

    /// 按角色范围列出患者
    pub async fn list_patients(
        &self,
        actor_id: Uuid,
        filter: &PatientFilter,
    ) -> Result<Vec<PatientDetail>> {
        let actor = self.store.get_user(actor_id).await?;
        let scope = match actor.role() {
            Role::FieldWorker => PatientScope::RecordedBy(actor.id),
            Role::Physician => PatientScope::AssignedTo(actor.id),
            Role::Admin => PatientScope::All,
        };

        let patients = self.store.list_patients(scope, filter).await;
        let mut details = Vec::with_capacity(patients.len());
        for patient in patients {
            details.push(self.populate_patient(patient).await);
        }
        Ok(details)
    }

    /// 修改患者记录
    ///
    /// 只有登记该患者的工作者可以修改，并且只允许在 pending 状态下修改。
    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        actor_id: Uuid,
        patch: PatientPatch,
    ) -> Result<PatientDetail> {
        let mut patient = self.store.get_patient(patient_id).await?;
        if patient.recorded_by != actor_id {
            return Err(ReferralError::Authorization(
                "Not authorized to update this patient record".to_string(),
            ));
        }
        if patient.status != PatientStatus::Pending {
            return Err(ReferralError::Validation(
                "Patient record can only be edited while pending".to_string(),
            ));
        }

        patch.validate()?;

        let now = Utc::now();
        if let Some(full_name) = patch.full_name {
            patient.full_name = full_name;
        }
        if let Some(age) = patch.age {
            patient.age = age;
        }
        if let Some(gender) = patch.gender {
            patient.gender = gender;
        }
        if let Some(phone) = patch.phone {
            patient.phone = phone;
        }
        if let Some(alternate_phone) = patch.alternate_phone {
            patient.alternate_phone = Some(alternate_phone);
        }
        if let Some(address) = patch.address {
            patient.address = Some(address);
        }
        if let Some(tobacco_use) = patch.tobacco_use {
            patient.tobacco_use = tobacco_use;
        }
        if let Some(tobacco_duration) = patch.tobacco_duration {
            patient.tobacco_duration = Some(tobacco_duration);
        }
        if let Some(alcohol_consumption) = patch.alcohol_consumption {
            patient.alcohol_consumption = alcohol_consumption;
        }
        if let Some(symptoms) = patch.symptoms {
            patient.symptoms = symptoms;
        }
        if let Some(medical_history) = patch.medical_history {
            patient.medical_history = Some(medical_history);
        }
        if let Some(images) = patch.mouth_images {
            patient.mouth_images = images
                .into_iter()
                .map(|img| MouthImage {
                    locator: img.locator,
                    uploaded_at: now,
                    description: img.description,
                    ai_prediction: None,
                })
                .collect();
        }
        if let Some(notes) = patch.oral_examination_notes {
            patient.oral_examination_notes = Some(notes);
        }
        patient.updated_at = now;

        let patient = self.store.update_patient(patient).await?;
        Ok(self.populate_patient(patient).await)
    }

    /// 删除患者记录（系统中唯一的硬删除）
    pub async fn delete_patient(&self, patient_id: Uuid, actor_id: Uuid) -> Result<()> {
        let patient = self.store.get_patient(patient_id).await?;
        if patient.recorded_by != actor_id {
            return Err(ReferralError::Authorization(
                "Not authorized to delete this patient record".to_string(),
            ));
        }
        self.store.delete_patient(patient_id).await?;
        tracing::info!("Patient {} deleted by field worker {}", patient_id, actor_id);
        Ok(())
    }

    /// 更新患者状态/优先级
    ///
    /// 只有分配医生可以调用；状态变化按转换表校验。
    /// 成功后通知登记该患者的工作者。
    pub async fn update_status(
        &self,
        patient_id: Uuid,
        actor_id: Uuid,
        update: StatusUpdate,
    ) -> Result<PatientDetail> {
        let mut patient = self.store.get_patient(patient_id).await?;
        if patient.assigned_doctor != actor_id {
            return Err(ReferralError::Authorization(
                "Not authorized to update this patient".to_string(),
            ));
        }

        if let Some(new_status) = update.status {
            if new_status != patient.status {
                self.transitions
                    .check(patient.status, new_status, patient.diagnosis.is_some())?;
                tracing::info!(
                    "Patient {} status {} -> {}",
                    patient.id,
                    patient.status.as_str(),
                    new_status.as_str()
                );
                patient.status = new_status;
            }
        }
        if let Some(priority) = update.priority {
            patient.priority = priority;
        }
        patient.updated_at = Utc::now();

        let patient = self.store.update_patient(patient).await?;
        let worker_id = patient.recorded_by;
        let detail = self.populate_patient(patient).await;

        self.hub
            .emit(
                worker_id,
                NotifyEvent::PatientStatusUpdated,
                "Patient status updated",
                json!({ "patient": detail }),
            )
            .await;

        Ok(detail)
    }

    // ========== 诊断操作 ==========

    /// 创建诊断
    ///
    /// 只有分配医生可以诊断；诊断插入和患者状态更新原子提交。
    /// 已有诊断的患者拒绝第二次诊断。成功后通知登记工作者。
    pub async fn create_diagnosis(
        &self,
        data: NewDiagnosisData,
        actor_id: Uuid,
    ) -> Result<DiagnosisDetail> {
        let patient = self.store.get_patient(data.patient).await?;
        if patient.assigned_doctor != actor_id {
            return Err(ReferralError::Authorization(
                "Not authorized to diagnose this patient".to_string(),
            ));
        }

        data.validate()?;

        if patient.diagnosis.is_some() || !self.transitions.can_diagnose(patient.status) {
            return Err(ReferralError::Validation(format!(
                "Patient {} already has a diagnosis",
                patient.id
            )));
        }

        let now = Utc::now();
        let diagnosis = Diagnosis {
            id: Uuid::new_v4(),
            patient: data.patient,
            doctor: actor_id,
            result: data.result,
            findings: data.findings,
            recommendations: data.recommendations,
            severity: data.severity,
            follow_up_required: data.follow_up_required,
            follow_up_date: data.follow_up_date,
            treatment_plan: data.treatment_plan,
            referral_required: data.referral_required,
            referral_details: data.referral_details,
            notes: data.notes,
            created_at: now,
            updated_at: now,
        };

        // 诊断与患者更新要么都提交要么都不提交
        let (diagnosis, patient) = self.store.commit_diagnosis(diagnosis).await?;
        tracing::info!(
            "Diagnosis {} ({}) created for patient {} by doctor {}",
            diagnosis.id,
            diagnosis.result.as_str(),
            patient.id,
            actor_id
        );

        let detail = self.populate_diagnosis(diagnosis).await;
        let patient_detail = self.populate_patient(patient).await;
        self.hub
            .emit(
                patient_detail.patient.recorded_by,
                NotifyEvent::DiagnosisCompleted,
                "Diagnosis completed for patient",
                json!({ "diagnosis": detail, "patient": patient_detail }),
            )
            .await;

        Ok(detail)
    }

    /// 获取患者的诊断（角色限定可见性）
    pub async fn get_patient_diagnosis(
        &self,
        patient_id: Uuid,
        actor_id: Uuid,
    ) -> Result<DiagnosisDetail> {
        let actor = self.store.get_user(actor_id).await?;
        let patient = self.store.get_patient(patient_id).await?;
        Self::ensure_can_view(&actor, &patient)?;

        let diagnosis = self
            .store
            .find_diagnosis_by_patient(patient_id)
            .await
            .ok_or_else(|| {
                ReferralError::NotFound(format!("Diagnosis not found for patient {}", patient_id))
            })?;

        Ok(self.populate_diagnosis(diagnosis).await)
    }

    /// 修改诊断
    ///
    /// 只有撰写该诊断的医生可以修改；patient/doctor 引用不可变。
    /// 成功后通知登记工作者。
    pub async fn update_diagnosis(
        &self,
        diagnosis_id: Uuid,
        actor_id: Uuid,
        patch: DiagnosisPatch,
    ) -> Result<DiagnosisDetail> {
        let mut diagnosis = self.store.get_diagnosis(diagnosis_id).await?;
        if diagnosis.doctor != actor_id {
            return Err(ReferralError::Authorization(
                "Not authorized to update this diagnosis".to_string(),
            ));
        }

        patch.validate()?;

        if let Some(result) = patch.result {
            diagnosis.result = result;
        }
        if let Some(findings) = patch.findings {
            diagnosis.findings = findings;
        }
        if let Some(recommendations) = patch.recommendations {
            diagnosis.recommendations = recommendations;
        }
        if let Some(severity) = patch.severity {
            diagnosis.severity = severity;
        }
        if let Some(follow_up_required) = patch.follow_up_required {
            diagnosis.follow_up_required = follow_up_required;
        }
        if let Some(follow_up_date) = patch.follow_up_date {
            diagnosis.follow_up_date = Some(follow_up_date);
        }
        if let Some(treatment_plan) = patch.treatment_plan {
            diagnosis.treatment_plan = Some(treatment_plan);
        }
        if let Some(referral_required) = patch.referral_required {
            diagnosis.referral_required = referral_required;
        }
        if let Some(referral_details) = patch.referral_details {
            diagnosis.referral_details = Some(referral_details);
        }
        if let Some(notes) = patch.notes {
            diagnosis.notes = Some(notes);
        }
        diagnosis.updated_at = Utc::now();

        let diagnosis = self.store.update_diagnosis(diagnosis).await?;
        let detail = self.populate_diagnosis(diagnosis).await;

        // 患者可能已被其登记者删除，此时只更新诊断、不再通知
        if let Ok(patient) = self.store.get_patient(detail.diagnosis.patient).await {
            self.hub
                .emit(
                    patient.recorded_by,
                    NotifyEvent::DiagnosisUpdated,
                    "Diagnosis updated",
                    json!({ "diagnosis": detail }),
                )
                .await;
        }

        Ok(detail)
    }

    /// 某个医生的诊断统计
    pub async fn diagnosis_stats(&self, actor_id: Uuid) -> Result<DiagnosisStats> {
        let actor = self.store.get_user(actor_id).await?;
        if actor.role() != Role::Physician {
            return Err(ReferralError::Authorization(
                "Diagnosis statistics are available to physicians only".to_string(),
            ));
        }
        Ok(self.store.diagnosis_stats(actor_id).await)
    }

    // ========== 影像分析 ==========

    /// 分析患者的一张口腔影像
    ///
    /// 委托给外部预测器；预测器输出先经过严格校验，畸形结果
    /// 不会污染已存储的状态。成功时把预测结果连同审计字段写回
    /// 对应影像的子记录。
    pub async fn analyze_image(
        &self,
        patient_id: Uuid,
        image_index: usize,
        actor_id: Uuid,
    ) -> Result<AiPrediction> {
        let actor = self.store.get_user(actor_id).await?;
        let patient = self.store.get_patient(patient_id).await?;

        let image = patient.mouth_images.get(image_index).ok_or_else(|| {
            ReferralError::NotFound(format!(
                "Image {} not found for patient {}",
                image_index, patient_id
            ))
        })?;

        let outcome = self.predictor.predict(&image.locator).await?;

        let prediction = AiPrediction {
            is_cancerous: outcome.is_cancerous,
            confidence: outcome.confidence,
            risk_level: outcome.risk_level,
            analyzed_at: Utc::now(),
            analyzed_by: actor.id,
        };

        // 预测期间记录可能已被并发修改，写回前重新读取
        let mut patient = self.store.get_patient(patient_id).await?;
        let image = patient.mouth_images.get_mut(image_index).ok_or_else(|| {
            ReferralError::NotFound(format!(
                "Image {} not found for patient {}",
                image_index, patient_id
            ))
        })?;
        image.ai_prediction = Some(prediction.clone());
        patient.updated_at = Utc::now();
        self.store.update_patient(patient).await?;

        tracing::info!(
            "Image {} of patient {} analyzed by {}: risk {:?}, confidence {:.2}",
            image_index,
            patient_id,
            actor_id,
            prediction.risk_level,
            prediction.confidence
        );
        Ok(prediction)
    }

    // ========== 内部辅助 ==========

    fn ensure_can_view(actor: &User, patient: &Patient) -> Result<()> {
        let allowed = match actor.role() {
            Role::FieldWorker => patient.recorded_by == actor.id,
            Role::Physician => patient.assigned_doctor == actor.id,
            Role::Admin => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(ReferralError::Authorization(
                "Not authorized to view this patient".to_string(),
            ))
        }
    }

    async fn populate_patient(&self, patient: Patient) -> PatientDetail {
        let recorded_by_user = self
            .store
            .find_user(patient.recorded_by)
            .await
            .as_ref()
            .map(UserSummary::from);
        let assigned_doctor_user = self
            .store
            .find_user(patient.assigned_doctor)
            .await
            .as_ref()
            .map(UserSummary::from);
        let diagnosis_record = match patient.diagnosis {
            Some(diagnosis_id) => self.store.get_diagnosis(diagnosis_id).await.ok(),
            None => None,
        };

        PatientDetail {
            patient,
            recorded_by_user,
            assigned_doctor_user,
            diagnosis_record,
        }
    }

    async fn populate_diagnosis(&self, diagnosis: Diagnosis) -> DiagnosisDetail {
        let doctor_user = self
            .store
            .find_user(diagnosis.doctor)
            .await
            .as_ref()
            .map(UserSummary::from);
        DiagnosisDetail {
            diagnosis,
            doctor_user,
        }
    }
}

//! 转诊工作流演示程序
//!
//! 展示完整的转诊流程：工作者登记患者、医生接诊、影像分析、出具诊断，
//! 以及双方收到的实时通知

use async_trait::async_trait;
use referral_core::{
    AlcoholConsumption, DiagnosisResult, Gender, NewDiagnosisData, NewMouthImage, NewPatientData,
    NewUserData, PatientStatus, Priority, Result, RiskLevel, RoleProfile, Severity, StatusUpdate,
    TobaccoUse,
};
use referral_notify::NotificationHub;
use referral_predict::{ImagePredictor, PredictionOutcome};
use referral_store::RecordStore;
use referral_workflow::WorkflowEngine;
use std::sync::Arc;

/// 演示用的固定结果预测器
struct DemoPredictor;

#[async_trait]
impl ImagePredictor for DemoPredictor {
    async fn predict(&self, _locator: &str) -> Result<PredictionOutcome> {
        Ok(PredictionOutcome {
            is_cancerous: true,
            confidence: 0.87,
            risk_level: RiskLevel::High,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("🚀 转诊工作流演示\n");

    let store = Arc::new(RecordStore::new());
    let hub = Arc::new(NotificationHub::new());
    let engine = WorkflowEngine::new(store, hub.clone(), Arc::new(DemoPredictor));

    // 1. 注册参与者
    let worker = engine
        .register_user(NewUserData {
            name: "Asha Devi".to_string(),
            email: "asha@example.org".to_string(),
            phone: "9000000001".to_string(),
            profile: RoleProfile::FieldWorker {
                work_area: "Block 7".to_string(),
                employee_id: "FW-42".to_string(),
            },
        })
        .await?;
    let doctor = engine
        .register_user(NewUserData {
            name: "Dr. Rao".to_string(),
            email: "rao@example.org".to_string(),
            phone: "9000000002".to_string(),
            profile: RoleProfile::Physician {
                specialization: "Oral Medicine".to_string(),
                license_number: "LIC-7".to_string(),
                hospital: "Civil Hospital".to_string(),
            },
        })
        .await?;
    println!("✅ 注册完成: 工作者 {}, 医生 {}", worker.name, doctor.name);

    // 双方加入各自的通知房间
    let (_, mut doctor_rx) = hub.join(doctor.id).await;
    let (_, mut worker_rx) = hub.join(worker.id).await;

    // 2. 工作者登记患者
    let patient = engine
        .create_patient(
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
                symptoms: vec!["non-healing ulcer".to_string()],
                medical_history: None,
                mouth_images: vec![NewMouthImage {
                    locator: "/uploads/mouth-demo.jpg".to_string(),
                    description: Some("left buccal mucosa".to_string()),
                }],
                oral_examination_notes: None,
                assigned_doctor: doctor.id,
                priority: Priority::High,
            },
            worker.id,
        )
        .await?
        .patient;
    println!(
        "✅ 患者 {} 已登记 (状态: {})",
        patient.full_name,
        patient.status.as_str()
    );

    let envelope = doctor_rx.recv().await.expect("doctor notification");
    println!("🔔 医生收到通知: {}", envelope.message);

    // 3. 医生接诊
    engine
        .update_status(
            patient.id,
            doctor.id,
            StatusUpdate {
                status: Some(PatientStatus::UnderReview),
                priority: None,
            },
        )
        .await?;
    let envelope = worker_rx.recv().await.expect("worker notification");
    println!("🔔 工作者收到通知: {}", envelope.message);

    // 4. 医生请求影像分析
    let prediction = engine.analyze_image(patient.id, 0, doctor.id).await?;
    println!(
        "🧠 影像分析结果: 风险 {:?}, 置信度 {:.0}%",
        prediction.risk_level,
        prediction.confidence * 100.0
    );

    // 5. 医生出具诊断
    let diagnosis = engine
        .create_diagnosis(
            NewDiagnosisData {
                patient: patient.id,
                result: DiagnosisResult::Positive,
                findings: "Ulceroproliferative growth on left buccal mucosa".to_string(),
                recommendations: "Immediate biopsy and staging".to_string(),
                severity: Severity::Severe,
                follow_up_required: true,
                follow_up_date: None,
                treatment_plan: None,
                referral_required: true,
                referral_details: None,
                notes: None,
            },
            doctor.id,
        )
        .await?
        .diagnosis;
    println!(
        "✅ 诊断 {} 已出具 ({})",
        diagnosis.id,
        diagnosis.result.as_str()
    );

    let envelope = worker_rx.recv().await.expect("worker notification");
    println!("🔔 工作者收到通知: {}", envelope.message);

    // 6. 最终状态
    let detail = engine.get_patient(patient.id, worker.id).await?;
    println!("\n📊 最终状态:");
    println!("   患者状态: {}", detail.patient.status.as_str());
    println!("   诊断引用: {:?}", detail.patient.diagnosis);
    println!("   医生统计: {:?}", engine.diagnosis_stats(doctor.id).await?);

    println!("\n🎉 演示完成！");
    Ok(())
}

//! HTTP处理器

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json},
};
use referral_core::{
    DiagnosisPatch, NewDiagnosisData, NewPatientData, NewUserData, PatientFilter, PatientPatch,
    ReferralError, StatusUpdate,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

/// 发起请求的用户身份
///
/// 从 `X-User-Id` 头解析。认证/会话机制在上游完成，这里只接收
/// 认证之后的身份。
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError(ReferralError::Authorization(
                    "Missing X-User-Id header".to_string(),
                ))
            })?;

        let user_id = header.parse::<Uuid>().map_err(|_| {
            ApiError(ReferralError::Validation(
                "X-User-Id must be a valid UUID".to_string(),
            ))
        })?;

        Ok(Actor(user_id))
    }
}

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "Referral Workflow API",
        "version": "1.0.0",
        "status": "running",
        "endpoints": {
            "health": "/health",
            "api": "/api",
            "notifications": "/ws"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": "1.0.0"
    }))
}

// ========== 用户 ==========

/// 注册工作流参与者
pub async fn create_user(
    State(state): State<AppState>,
    Json(data): Json<NewUserData>,
) -> ApiResult<impl IntoResponse> {
    let user = state.engine.register_user(data).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully",
            "data": user
        })),
    ))
}

/// 列出活跃医生
pub async fn get_doctors(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let doctors = state.engine.list_physicians().await;
    Ok(Json(json!({
        "success": true,
        "count": doctors.len(),
        "data": doctors
    })))
}

/// 列出活跃的社区卫生工作者
pub async fn get_field_workers(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let workers = state.engine.list_field_workers().await;
    Ok(Json(json!({
        "success": true,
        "count": workers.len(),
        "data": workers
    })))
}

// ========== 患者 ==========

/// 创建患者记录
pub async fn create_patient(
    State(state): State<AppState>,
    actor: Actor,
    Json(data): Json<NewPatientData>,
) -> ApiResult<impl IntoResponse> {
    info!("Creating patient record for worker {}", actor.0);
    let detail = state.engine.create_patient(data, actor.0).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Patient record created successfully",
            "data": detail
        })),
    ))
}

/// 按角色范围列出患者
pub async fn get_patients(
    State(state): State<AppState>,
    actor: Actor,
    Query(filter): Query<PatientFilter>,
) -> ApiResult<impl IntoResponse> {
    let patients = state.engine.list_patients(actor.0, &filter).await?;
    Ok(Json(json!({
        "success": true,
        "count": patients.len(),
        "data": patients
    })))
}

/// 获取单个患者详情
pub async fn get_patient(
    State(state): State<AppState>,
    actor: Actor,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let detail = state.engine.get_patient(patient_id, actor.0).await?;
    Ok(Json(json!({
        "success": true,
        "data": detail
    })))
}

/// 修改患者记录
pub async fn update_patient(
    State(state): State<AppState>,
    actor: Actor,
    Path(patient_id): Path<Uuid>,
    Json(patch): Json<PatientPatch>,
) -> ApiResult<impl IntoResponse> {
    let detail = state.engine.update_patient(patient_id, actor.0, patch).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Patient record updated successfully",
        "data": detail
    })))
}

/// 更新患者状态/优先级
pub async fn update_patient_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(patient_id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<impl IntoResponse> {
    let detail = state.engine.update_status(patient_id, actor.0, update).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Patient status updated successfully",
        "data": detail
    })))
}

/// 删除患者记录
pub async fn delete_patient(
    State(state): State<AppState>,
    actor: Actor,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.engine.delete_patient(patient_id, actor.0).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Patient record deleted successfully"
    })))
}

// ========== 诊断 ==========

/// 创建诊断
pub async fn create_diagnosis(
    State(state): State<AppState>,
    actor: Actor,
    Json(data): Json<NewDiagnosisData>,
) -> ApiResult<impl IntoResponse> {
    let detail = state.engine.create_diagnosis(data, actor.0).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Diagnosis created successfully",
            "data": detail
        })),
    ))
}

/// 获取患者的诊断
pub async fn get_patient_diagnosis(
    State(state): State<AppState>,
    actor: Actor,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let detail = state
        .engine
        .get_patient_diagnosis(patient_id, actor.0)
        .await?;
    Ok(Json(json!({
        "success": true,
        "data": detail
    })))
}

/// 修改诊断
pub async fn update_diagnosis(
    State(state): State<AppState>,
    actor: Actor,
    Path(diagnosis_id): Path<Uuid>,
    Json(patch): Json<DiagnosisPatch>,
) -> ApiResult<impl IntoResponse> {
    let detail = state
        .engine
        .update_diagnosis(diagnosis_id, actor.0, patch)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Diagnosis updated successfully",
        "data": detail
    })))
}

/// 医生的诊断统计
pub async fn diagnosis_stats(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<impl IntoResponse> {
    let stats = state.engine.diagnosis_stats(actor.0).await?;
    Ok(Json(json!({
        "success": true,
        "data": stats
    })))
}

// ========== 影像分析 ==========

/// 影像分析请求
#[derive(Debug, Deserialize)]
pub struct AnalyzeImageRequest {
    pub patient_id: Uuid,
    pub image_index: usize,
}

/// 分析患者的一张口腔影像
pub async fn analyze_patient_image(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<AnalyzeImageRequest>,
) -> ApiResult<impl IntoResponse> {
    let prediction = state
        .engine
        .analyze_image(request.patient_id, request.image_index, actor.0)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Image analyzed and results saved to patient record",
        "prediction": prediction
    })))
}

//! Web服务器

use axum::{
    routing::{get, post, put},
    Router,
};
use referral_core::Result;
use referral_notify::NotificationHub;
use referral_store::RecordStore;
use referral_workflow::WorkflowEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers::{
    analyze_patient_image, api_root, create_diagnosis, create_patient, create_user,
    delete_patient, diagnosis_stats, get_doctors, get_field_workers, get_patient,
    get_patient_diagnosis, get_patients, health, update_diagnosis, update_patient,
    update_patient_status,
};
use crate::ws::ws_handler;

/// 共享应用状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub hub: Arc<NotificationHub>,
    pub store: Arc<RecordStore>,
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        let app = Self::create_app(state);
        Self { addr, app }
    }

    fn create_app(state: AppState) -> Router {
        Router::new()
            // 根路径
            .route("/", get(api_root))
            // 健康检查
            .route("/health", get(health))
            // 实时通知
            .route("/ws", get(ws_handler))
            // API路由
            .nest("/api", api_routes())
            .with_state(state)
            // 全局中间件
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(
                        CorsLayer::new()
                            .allow_origin(Any)
                            .allow_methods(Any)
                            .allow_headers(Any),
                    ),
            )
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app).await?;

        Ok(())
    }
}

/// API 路由
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/doctors", get(get_doctors))
        .route("/asha-workers", get(get_field_workers))
        .route("/patients", post(create_patient).get(get_patients))
        .route(
            "/patients/:id",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .route("/patients/:id/status", put(update_patient_status))
        .route("/diagnoses", post(create_diagnosis))
        .route("/diagnoses/patient/:patient_id", get(get_patient_diagnosis))
        .route("/diagnoses/:id", put(update_diagnosis))
        .route("/diagnoses/stats/summary", get(diagnosis_stats))
        .route("/oral-cancer/analyze-patient-image", post(analyze_patient_image))
}

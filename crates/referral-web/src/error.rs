//! 错误到HTTP应答的映射

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use referral_core::ReferralError;
use serde_json::json;

/// HTTP层的错误包装
///
/// `ReferralError` 定义在核心crate里，孤儿规则不允许直接为它实现
/// `IntoResponse`，所以处理器统一返回这个新类型。
#[derive(Debug)]
pub struct ApiError(pub ReferralError);

impl From<ReferralError> for ApiError {
    fn from(err: ReferralError) -> Self {
        Self(err)
    }
}

/// HTTP处理器统一结果类型
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ReferralError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ReferralError::InvalidStateTransition { .. } => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            ReferralError::Authorization(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ReferralError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ReferralError::ExternalService(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()),
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }

        let body = Json(json!({
            "error": true,
            "message": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError(ReferralError::Validation("bad".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError(ReferralError::Authorization("no".into())),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError(ReferralError::NotFound("missing".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError(ReferralError::ExternalService("down".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError(ReferralError::InvalidStateTransition {
                    from: "pending".into(),
                    to: "diagnosed".into(),
                }),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}

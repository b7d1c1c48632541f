/// 서비스 오류 타입
/// 협상 규칙 위반은 안정적인 코드와 함께 호출자에게 노출된다.
// region:    --- Imports
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

// endregion: --- Imports

// region:    --- Store Error

/// 저장소 계층 오류
#[derive(Debug, Error)]
pub enum StoreError {
    /// 데이터베이스 오류
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 트랜잭션 충돌 (직렬화 실패 등)
    #[error("transaction conflict: {0}")]
    Conflict(String),
}

// endregion: --- Store Error

// region:    --- Service Error

/// 협상 도메인 오류 분류
#[derive(Debug, Error)]
pub enum ServiceError {
    /// 잘못된 입력
    #[error("{0}")]
    Validation(String),

    /// 역할 또는 당사자 불일치
    #[error("{0}")]
    Forbidden(String),

    /// 대상 없음
    #[error("{0}")]
    NotFound(String),

    /// 중복 입찰 등 충돌
    #[error("{0}")]
    Conflict(String),

    /// 현재 상태에서 허용되지 않는 전이
    #[error("{0}")]
    InvalidState(String),

    /// 저장소 내부 오류 (원인은 로그로만 노출)
    #[error("internal storage error")]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// 안정적인 오류 코드
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::InvalidState(_) => "INVALID_STATE",
            ServiceError::Store(_) => "INTERNAL",
        }
    }

    /// HTTP 상태 코드 매핑
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::InvalidState(_) => StatusCode::BAD_REQUEST,
            ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let message = match &self {
            // 저장소 내부 사정은 호출자에게 그대로 노출하지 않는다
            ServiceError::Store(cause) => {
                error!("{:<12} --> 저장소 오류: {:?}", "Error", cause);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            self.status(),
            Json(serde_json::json!({
                "error": message,
                "code": self.code(),
            })),
        )
            .into_response()
    }
}

// endregion: --- Service Error

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ServiceError::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(ServiceError::Forbidden("x".into()).code(), "FORBIDDEN");
        assert_eq!(ServiceError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(ServiceError::Conflict("x".into()).code(), "CONFLICT");
        assert_eq!(ServiceError::InvalidState("x".into()).code(), "INVALID_STATE");
        assert_eq!(
            ServiceError::Store(StoreError::Conflict("x".into())).code(),
            "INTERNAL"
        );
    }

    #[test]
    fn domain_messages_are_specific() {
        let err = ServiceError::InvalidState("Maximum 2 rounds of negotiation allowed".into());
        assert_eq!(err.to_string(), "Maximum 2 rounds of negotiation allowed");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}

// endregion: --- Tests

/// 활동 감사 로그
/// audit_log 테이블에 베스트 에포트로 기록한다. 실패는 경고 로그로만 남기고
/// 본 연산의 성공/실패에는 절대 관여하지 않는다.
// region:    --- Imports
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};

// endregion: --- Imports

// region:    --- Activity Log Trait

#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// 활동 기록 (실패해도 전파하지 않는다)
    async fn record(&self, user_id: Option<i64>, action: &str, metadata: serde_json::Value);
}

/// 테스트/비활성 환경용
#[derive(Default)]
pub struct NoopActivityLog;

#[async_trait]
impl ActivityLog for NoopActivityLog {
    async fn record(&self, user_id: Option<i64>, action: &str, metadata: serde_json::Value) {
        debug!(
            "{:<12} --> 감사 기록 생략: user={:?}, action={}, meta={}",
            "Audit", user_id, action, metadata
        );
    }
}

// endregion: --- Activity Log Trait

// region:    --- Postgres Activity Log

pub struct PgActivityLog {
    pool: PgPool,
}

impl PgActivityLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INSERT_AUDIT: &str =
    "INSERT INTO audit_log (user_id, action, metadata) VALUES ($1, $2, $3)";

#[async_trait]
impl ActivityLog for PgActivityLog {
    async fn record(&self, user_id: Option<i64>, action: &str, metadata: serde_json::Value) {
        let pool = self.pool.clone();
        let action = action.to_string();
        // 본 연산의 커밋과 무관한 분리된 태스크
        tokio::spawn(async move {
            if let Err(e) = sqlx::query(INSERT_AUDIT)
                .bind(user_id)
                .bind(&action)
                .bind(&metadata)
                .execute(&pool)
                .await
            {
                warn!(
                    "{:<12} --> 감사 기록 실패: action={}, err={:?}",
                    "Audit", action, e
                );
            }
        });
    }
}

// endregion: --- Postgres Activity Log

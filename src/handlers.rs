// region:    --- Imports
use crate::audit::ActivityLog;
use crate::bidding::commands::{
    handle_cancel_bid, handle_counter_bid, handle_create_bid, handle_expire_old_bids,
    handle_respond_to_bid, CancelBidCommand, CounterBidCommand, CreateBidCommand,
    RespondToBidCommand,
};
use crate::bidding::model::BidStatus;
use crate::bidding::queries;
use crate::error::ServiceError;
use crate::ledger::{BidFilter, Ledger};
use crate::notify::Notifier;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

// endregion: --- Imports

// region:    --- App State

/// 핸들러가 공유하는 협력자 묶음
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn Ledger>,
    pub notifier: Arc<dyn Notifier>,
    pub activity: Arc<dyn ActivityLog>,
}

// endregion: --- App State

// region:    --- Request Params

/// 요청 주체 (인증 계층은 범위 밖이라 명시적으로 전달받는다)
#[derive(Debug, Deserialize)]
pub struct ActorQuery {
    pub user_id: i64,
}

/// 목록 조회 파라미터
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<BidStatus>,
}

impl ListQuery {
    fn filter(&self) -> BidFilter {
        let default = BidFilter::default();
        BidFilter {
            page: self.page.unwrap_or(default.page).max(1),
            limit: self.limit.unwrap_or(default.limit).clamp(1, 100),
            status: self.status,
        }
    }
}

// endregion: --- Request Params

// region:    --- Command Handlers

/// 입찰 생성 요청 처리
pub async fn handle_post_bid(
    State(state): State<AppState>,
    Json(cmd): Json<CreateBidCommand>,
) -> Result<impl IntoResponse, ServiceError> {
    let bid = handle_create_bid(
        cmd,
        state.ledger.as_ref(),
        state.notifier.as_ref(),
        state.activity.as_ref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(bid)))
}

/// 판매자 응답 요청 처리
pub async fn handle_post_respond(
    State(state): State<AppState>,
    Path(bid_id): Path<i64>,
    Json(cmd): Json<RespondToBidCommand>,
) -> Result<impl IntoResponse, ServiceError> {
    let bid = handle_respond_to_bid(
        bid_id,
        cmd,
        state.ledger.as_ref(),
        state.notifier.as_ref(),
        state.activity.as_ref(),
    )
    .await?;
    Ok(Json(bid))
}

/// 구매자 역제안 요청 처리
pub async fn handle_post_counter(
    State(state): State<AppState>,
    Path(bid_id): Path<i64>,
    Json(cmd): Json<CounterBidCommand>,
) -> Result<impl IntoResponse, ServiceError> {
    let bid = handle_counter_bid(
        bid_id,
        cmd,
        state.ledger.as_ref(),
        state.notifier.as_ref(),
        state.activity.as_ref(),
    )
    .await?;
    Ok(Json(bid))
}

/// 입찰 취소 요청 처리
pub async fn handle_delete_bid(
    State(state): State<AppState>,
    Path(bid_id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let bid = handle_cancel_bid(
        bid_id,
        CancelBidCommand {
            buyer_id: actor.user_id,
        },
        state.ledger.as_ref(),
        state.activity.as_ref(),
    )
    .await?;
    Ok(Json(bid))
}

/// 만료 일괄 처리 트리거 (외부 스케줄러용)
pub async fn handle_post_expire(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let expired = handle_expire_old_bids(state.ledger.as_ref()).await?;
    Ok(Json(serde_json::json!({ "expired": expired })))
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 입찰 단건 조회
pub async fn handle_get_bid(
    State(state): State<AppState>,
    Path(bid_id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let bid = queries::get_bid_by_id(bid_id, actor.user_id, state.ledger.as_ref()).await?;
    Ok(Json(bid))
}

/// 입찰 이력 조회
pub async fn handle_get_bid_history(
    State(state): State<AppState>,
    Path(bid_id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let history =
        queries::get_bid_history(bid_id, actor.user_id, state.ledger.as_ref()).await?;
    Ok(Json(history))
}

/// 상품 입찰 목록 조회 (소유자만)
pub async fn handle_get_product_bids(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let owner_id = query
        .user_id
        .ok_or_else(|| ServiceError::Validation("user_id is required".to_string()))?;
    let page = queries::get_product_bids(
        product_id,
        owner_id,
        query.filter(),
        state.ledger.as_ref(),
    )
    .await?;
    Ok(Json(page))
}

/// 구매자 입찰 목록 조회
pub async fn handle_get_buyer_bids(
    State(state): State<AppState>,
    Path(buyer_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page =
        queries::get_buyer_bids(buyer_id, query.filter(), state.ledger.as_ref()).await?;
    Ok(Json(page))
}

/// 입찰 통계 조회
pub async fn handle_get_bid_stats(
    State(state): State<AppState>,
    Query(actor): Query<ActorQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let stats = queries::get_bid_stats(actor.user_id, state.ledger.as_ref()).await?;
    Ok(Json(stats))
}

// endregion: --- Query Handlers

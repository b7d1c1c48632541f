/// 입찰 조회 핸들러 (읽기 전용)
/// 접근 제어: 입찰 당사자(구매자 또는 상품 소유자)만 개별 입찰과 이력을 볼 수 있다.
// region:    --- Imports
use crate::bidding::model::{Bid, BidHistoryEntry, BidStatus, UserRole};
use crate::error::ServiceError;
use crate::ledger::{BidFilter, Ledger, LedgerSession};
use serde::{Deserialize, Serialize};
use tracing::info;

// endregion: --- Imports

// region:    --- Read Models

/// 페이지네이션 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };
        Self {
            page,
            limit,
            total,
            pages,
            has_next: page < pages,
            has_prev: page > 1,
        }
    }
}

/// 입찰 목록 페이지
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidPage {
    pub bids: Vec<Bid>,
    pub pagination: Pagination,
}

/// 입찰 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BidStats {
    pub total_bids: i64,
    pub pending_bids: i64,
    pub accepted_bids: i64,
    pub rejected_bids: i64,
}

impl BidStats {
    fn from_counts(counts: Vec<(BidStatus, i64)>) -> Self {
        let mut stats = BidStats::default();
        for (status, count) in counts {
            stats.total_bids += count;
            match status {
                BidStatus::Pending | BidStatus::Countered => stats.pending_bids += count,
                BidStatus::Accepted => stats.accepted_bids += count,
                BidStatus::Rejected => stats.rejected_bids += count,
                _ => {}
            }
        }
        stats
    }
}

// endregion: --- Read Models

// region:    --- Query Handlers

/// 입찰 단건 조회 (당사자만)
pub async fn get_bid_by_id(
    bid_id: i64,
    user_id: i64,
    ledger: &dyn Ledger,
) -> Result<Bid, ServiceError> {
    info!("{:<12} --> 입찰 조회 id: {}", "Query", bid_id);
    let mut session = ledger.begin().await?;
    let bid = session
        .bid_by_id(bid_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bid not found".to_string()))?;
    let product = session
        .product_by_id(bid.product_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
    session.rollback().await?;

    if bid.buyer_id != user_id && product.owner_id != user_id {
        return Err(ServiceError::Forbidden("Access denied".to_string()));
    }
    Ok(bid)
}

/// 상품의 입찰 목록 조회 (상품 소유자만)
pub async fn get_product_bids(
    product_id: i64,
    owner_id: i64,
    filter: BidFilter,
    ledger: &dyn Ledger,
) -> Result<BidPage, ServiceError> {
    info!("{:<12} --> 상품 입찰 목록 조회 id: {}", "Query", product_id);
    let mut session = ledger.begin().await?;
    let product = session
        .product_by_id(product_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
    if product.owner_id != owner_id {
        return Err(ServiceError::Forbidden(
            "Product not found or access denied".to_string(),
        ));
    }
    let (bids, total) = session.bids_for_product(product_id, &filter).await?;
    session.rollback().await?;

    Ok(BidPage {
        bids,
        pagination: Pagination::new(filter.page, filter.limit, total),
    })
}

/// 구매자의 입찰 목록 조회
pub async fn get_buyer_bids(
    buyer_id: i64,
    filter: BidFilter,
    ledger: &dyn Ledger,
) -> Result<BidPage, ServiceError> {
    info!("{:<12} --> 구매자 입찰 목록 조회 id: {}", "Query", buyer_id);
    let mut session = ledger.begin().await?;
    let (bids, total) = session.bids_for_buyer(buyer_id, &filter).await?;
    session.rollback().await?;

    Ok(BidPage {
        bids,
        pagination: Pagination::new(filter.page, filter.limit, total),
    })
}

/// 입찰 이력 조회 (당사자만)
pub async fn get_bid_history(
    bid_id: i64,
    user_id: i64,
    ledger: &dyn Ledger,
) -> Result<Vec<BidHistoryEntry>, ServiceError> {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "Query", bid_id);
    let mut session = ledger.begin().await?;
    let bid = session
        .bid_by_id(bid_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bid not found".to_string()))?;
    let product = session
        .product_by_id(bid.product_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
    if bid.buyer_id != user_id && product.owner_id != user_id {
        return Err(ServiceError::Forbidden("Access denied".to_string()));
    }
    let history = session.history_for_bid(bid_id).await?;
    session.rollback().await?;
    Ok(history)
}

/// 입찰 통계 조회 (역할에 따라 판매자/구매자 관점)
pub async fn get_bid_stats(user_id: i64, ledger: &dyn Ledger) -> Result<BidStats, ServiceError> {
    info!("{:<12} --> 입찰 통계 조회 id: {}", "Query", user_id);
    let mut session = ledger.begin().await?;
    let user = session
        .user_by_id(user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
    let counts = match user.role {
        UserRole::Seller => session.status_counts_for_seller(user_id).await?,
        UserRole::Buyer => session.status_counts_for_buyer(user_id).await?,
    };
    session.rollback().await?;
    Ok(BidStats::from_counts(counts))
}

// endregion: --- Query Handlers

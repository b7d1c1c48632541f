/// 원장 저장소 추상화
/// 모든 협상 연산은 명시적으로 주입된 세션(트랜잭션) 안에서 실행된다.
/// Postgres 구현과 테스트용 인메모리 구현을 제공한다.
// region:    --- Imports
use crate::bidding::model::{
    Bid, BidHistoryEntry, BidStatus, NewBid, NewHistoryEntry, NewOrder, Order, Product,
    ProductStatus, User,
};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;
pub mod postgres;
mod sql;

pub use memory::MemoryLedger;
pub use postgres::PostgresLedger;

// endregion: --- Imports

// region:    --- Filters

/// 목록 조회 필터 (페이지네이션 + 상태)
#[derive(Debug, Clone, Copy)]
pub struct BidFilter {
    pub page: i64,
    pub limit: i64,
    pub status: Option<BidStatus>,
}

impl Default for BidFilter {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            status: None,
        }
    }
}

impl BidFilter {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

// endregion: --- Filters

// region:    --- Ledger Trait

/// 원장 저장소: 트랜잭션 세션 팩토리
#[async_trait]
pub trait Ledger: Send + Sync {
    /// 일반 트랜잭션 시작
    async fn begin(&self) -> Result<Box<dyn LedgerSession>, StoreError>;

    /// 직렬화 가능 트랜잭션 시작 (낙찰 경로 전용)
    async fn begin_serializable(&self) -> Result<Box<dyn LedgerSession>, StoreError>;
}

/// 원장 세션: 하나의 원자적 트랜잭션
/// commit 전의 모든 변경은 외부에서 관측되지 않는다.
#[async_trait]
pub trait LedgerSession: Send {
    // -- 사용자
    async fn user_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError>;

    // -- 상품
    async fn product_by_id(&mut self, id: i64) -> Result<Option<Product>, StoreError>;

    /// 행 잠금을 잡고 상품 조회 (Postgres: SELECT ... FOR UPDATE)
    async fn product_for_update(&mut self, id: i64) -> Result<Option<Product>, StoreError>;

    async fn update_product_status(
        &mut self,
        id: i64,
        status: ProductStatus,
        final_price: Option<i64>,
    ) -> Result<(), StoreError>;

    // -- 입찰
    async fn insert_bid(&mut self, bid: NewBid) -> Result<Bid, StoreError>;

    async fn bid_by_id(&mut self, id: i64) -> Result<Option<Bid>, StoreError>;

    /// 행 잠금을 잡고 입찰 조회
    async fn bid_for_update(&mut self, id: i64) -> Result<Option<Bid>, StoreError>;

    async fn update_bid(&mut self, bid: &Bid) -> Result<(), StoreError>;

    /// 상품의 PENDING/COUNTERED 입찰 전체
    async fn open_bids_for_product(&mut self, product_id: i64) -> Result<Vec<Bid>, StoreError>;

    /// 해당 구매자의 열린 입찰 (중복 입찰 검사)
    async fn find_open_bid(
        &mut self,
        product_id: i64,
        buyer_id: i64,
    ) -> Result<Option<Bid>, StoreError>;

    /// 만료 시각이 지난 열린 입찰 전체 (스위퍼 전용)
    async fn expired_open_bids(&mut self, now: DateTime<Utc>) -> Result<Vec<Bid>, StoreError>;

    // -- 목록 조회
    async fn bids_for_product(
        &mut self,
        product_id: i64,
        filter: &BidFilter,
    ) -> Result<(Vec<Bid>, i64), StoreError>;

    async fn bids_for_buyer(
        &mut self,
        buyer_id: i64,
        filter: &BidFilter,
    ) -> Result<(Vec<Bid>, i64), StoreError>;

    /// 판매자 상품에 걸린 입찰의 상태별 건수
    async fn status_counts_for_seller(
        &mut self,
        seller_id: i64,
    ) -> Result<Vec<(BidStatus, i64)>, StoreError>;

    /// 구매자 입찰의 상태별 건수
    async fn status_counts_for_buyer(
        &mut self,
        buyer_id: i64,
    ) -> Result<Vec<(BidStatus, i64)>, StoreError>;

    // -- 이력
    async fn append_history(&mut self, entry: NewHistoryEntry) -> Result<(), StoreError>;

    async fn history_for_bid(
        &mut self,
        bid_id: i64,
    ) -> Result<Vec<BidHistoryEntry>, StoreError>;

    // -- 주문
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, StoreError>;

    async fn order_for_product(&mut self, product_id: i64) -> Result<Option<Order>, StoreError>;

    // -- 트랜잭션 종료
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

// endregion: --- Ledger Trait

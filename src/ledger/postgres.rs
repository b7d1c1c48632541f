/// Postgres 원장 구현
/// 세션 하나가 sqlx 트랜잭션 하나를 소유한다. 낙찰 경로는 직렬화 가능
/// 격리 수준으로 시작해 두 개의 동시 낙찰이 모두 UNDER_BID를 관측하는 일을 막는다.
// region:    --- Imports
use super::sql;
use super::{BidFilter, Ledger, LedgerSession};
use crate::bidding::model::{
    Bid, BidHistoryEntry, BidStatus, NewBid, NewHistoryEntry, NewOrder, Order, Product,
    ProductStatus, User,
};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};

// endregion: --- Imports

// region:    --- Postgres Ledger

pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Ledger for PostgresLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerSession>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession { tx }))
    }

    async fn begin_serializable(&self) -> Result<Box<dyn LedgerSession>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PgSession { tx }))
    }
}

// endregion: --- Postgres Ledger

// region:    --- Postgres Session

pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerSession for PgSession {
    async fn user_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(sql::GET_USER)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn product_by_id(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        let product = sqlx::query_as::<_, Product>(sql::GET_PRODUCT)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(product)
    }

    async fn product_for_update(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        let product = sqlx::query_as::<_, Product>(sql::GET_PRODUCT_FOR_UPDATE)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(product)
    }

    async fn update_product_status(
        &mut self,
        id: i64,
        status: ProductStatus,
        final_price: Option<i64>,
    ) -> Result<(), StoreError> {
        sqlx::query(sql::UPDATE_PRODUCT_STATUS)
            .bind(id)
            .bind(status)
            .bind(final_price)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_bid(&mut self, bid: NewBid) -> Result<Bid, StoreError> {
        let bid = sqlx::query_as::<_, Bid>(sql::INSERT_BID)
            .bind(bid.product_id)
            .bind(bid.buyer_id)
            .bind(bid.offered_price)
            .bind(bid.quantity)
            .bind(bid.expires_at)
            .bind(bid.message)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(bid)
    }

    async fn bid_by_id(&mut self, id: i64) -> Result<Option<Bid>, StoreError> {
        let bid = sqlx::query_as::<_, Bid>(sql::GET_BID)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(bid)
    }

    async fn bid_for_update(&mut self, id: i64) -> Result<Option<Bid>, StoreError> {
        let bid = sqlx::query_as::<_, Bid>(sql::GET_BID_FOR_UPDATE)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(bid)
    }

    async fn update_bid(&mut self, bid: &Bid) -> Result<(), StoreError> {
        sqlx::query(sql::UPDATE_BID)
            .bind(bid.id)
            .bind(bid.offered_price)
            .bind(bid.counter_price)
            .bind(bid.status)
            .bind(bid.negotiation_round)
            .bind(bid.expires_at)
            .bind(&bid.message)
            .bind(&bid.counter_message)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn open_bids_for_product(&mut self, product_id: i64) -> Result<Vec<Bid>, StoreError> {
        let bids = sqlx::query_as::<_, Bid>(sql::GET_OPEN_BIDS)
            .bind(product_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(bids)
    }

    async fn find_open_bid(
        &mut self,
        product_id: i64,
        buyer_id: i64,
    ) -> Result<Option<Bid>, StoreError> {
        let bid = sqlx::query_as::<_, Bid>(sql::FIND_OPEN_BID)
            .bind(product_id)
            .bind(buyer_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(bid)
    }

    async fn expired_open_bids(&mut self, now: DateTime<Utc>) -> Result<Vec<Bid>, StoreError> {
        let bids = sqlx::query_as::<_, Bid>(sql::GET_EXPIRED_OPEN_BIDS)
            .bind(now)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(bids)
    }

    async fn bids_for_product(
        &mut self,
        product_id: i64,
        filter: &BidFilter,
    ) -> Result<(Vec<Bid>, i64), StoreError> {
        let bids = sqlx::query_as::<_, Bid>(sql::LIST_PRODUCT_BIDS)
            .bind(product_id)
            .bind(filter.status)
            .bind(filter.limit)
            .bind(filter.offset())
            .fetch_all(&mut *self.tx)
            .await?;
        let total = sqlx::query_scalar::<_, i64>(sql::COUNT_PRODUCT_BIDS)
            .bind(product_id)
            .bind(filter.status)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok((bids, total))
    }

    async fn bids_for_buyer(
        &mut self,
        buyer_id: i64,
        filter: &BidFilter,
    ) -> Result<(Vec<Bid>, i64), StoreError> {
        let bids = sqlx::query_as::<_, Bid>(sql::LIST_BUYER_BIDS)
            .bind(buyer_id)
            .bind(filter.status)
            .bind(filter.limit)
            .bind(filter.offset())
            .fetch_all(&mut *self.tx)
            .await?;
        let total = sqlx::query_scalar::<_, i64>(sql::COUNT_BUYER_BIDS)
            .bind(buyer_id)
            .bind(filter.status)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok((bids, total))
    }

    async fn status_counts_for_seller(
        &mut self,
        seller_id: i64,
    ) -> Result<Vec<(BidStatus, i64)>, StoreError> {
        let rows = sqlx::query(sql::SELLER_STATUS_COUNTS)
            .bind(seller_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("status"), row.get("count")))
            .collect())
    }

    async fn status_counts_for_buyer(
        &mut self,
        buyer_id: i64,
    ) -> Result<Vec<(BidStatus, i64)>, StoreError> {
        let rows = sqlx::query(sql::BUYER_STATUS_COUNTS)
            .bind(buyer_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("status"), row.get("count")))
            .collect())
    }

    async fn append_history(&mut self, entry: NewHistoryEntry) -> Result<(), StoreError> {
        sqlx::query(sql::INSERT_HISTORY)
            .bind(entry.bid_id)
            .bind(&entry.action)
            .bind(entry.price)
            .bind(&entry.message)
            .bind(entry.user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn history_for_bid(
        &mut self,
        bid_id: i64,
    ) -> Result<Vec<BidHistoryEntry>, StoreError> {
        let history = sqlx::query_as::<_, BidHistoryEntry>(sql::GET_BID_HISTORY)
            .bind(bid_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(history)
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, StoreError> {
        let order = sqlx::query_as::<_, Order>(sql::INSERT_ORDER)
            .bind(&order.order_number)
            .bind(order.product_id)
            .bind(order.buyer_id)
            .bind(order.seller_id)
            .bind(order.quantity)
            .bind(order.price)
            .bind(order.total_amount)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(order)
    }

    async fn order_for_product(&mut self, product_id: i64) -> Result<Option<Order>, StoreError> {
        let order = sqlx::query_as::<_, Order>(sql::GET_ORDER_FOR_PRODUCT)
            .bind(product_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(order)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// endregion: --- Postgres Session

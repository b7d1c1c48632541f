/// 인메모리 원장 구현 (테스트 대체물)
/// 세션이 뮤텍스 가드를 쥐고 있는 동안 전체 상태의 작업 사본을 수정하고,
/// commit 시에만 공유 상태에 반영한다. 트랜잭션 전체가 직렬화되므로
/// Postgres의 직렬화 가능 격리와 동등 이상이다.
// region:    --- Imports
use super::{BidFilter, Ledger, LedgerSession};
use crate::bidding::model::{
    Bid, BidHistoryEntry, BidStatus, NewBid, NewHistoryEntry, NewOrder, Order, OrderStatus,
    PaymentStatus, Product, ProductStatus, User,
};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

// endregion: --- Imports

// region:    --- Memory State

#[derive(Debug, Default, Clone)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    products: BTreeMap<i64, Product>,
    bids: BTreeMap<i64, Bid>,
    history: Vec<BidHistoryEntry>,
    orders: Vec<Order>,
    next_id: i64,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

// endregion: --- Memory State

// region:    --- Memory Ledger

#[derive(Default, Clone)]
pub struct MemoryLedger {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 테스트 시드: 사용자 추가
    pub async fn seed_user(&self, name: &str, role: crate::bidding::model::UserRole, contact_verified: bool) -> User {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let user = User {
            id,
            name: name.to_string(),
            role,
            contact_verified,
        };
        state.users.insert(id, user.clone());
        user
    }

    /// 테스트 시드: 상품 추가
    pub async fn seed_product(&self, owner_id: i64, title: &str, quantity: i64) -> Product {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let product = Product {
            id,
            owner_id,
            title: title.to_string(),
            status: ProductStatus::Active,
            quantity,
            final_price: None,
            created_at: Utc::now(),
        };
        state.products.insert(id, product.clone());
        product
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerSession>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemorySession { guard, work }))
    }

    async fn begin_serializable(&self) -> Result<Box<dyn LedgerSession>, StoreError> {
        // 모든 인메모리 트랜잭션이 이미 직렬화되어 있다
        self.begin().await
    }
}

// endregion: --- Memory Ledger

// region:    --- Memory Session

pub struct MemorySession {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

fn page<T: Clone>(items: Vec<T>, filter: &BidFilter) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let start = filter.offset().max(0) as usize;
    let paged = items
        .into_iter()
        .skip(start)
        .take(filter.limit.max(0) as usize)
        .collect();
    (paged, total)
}

fn status_counts(bids: Vec<&Bid>) -> Vec<(BidStatus, i64)> {
    let mut counts: BTreeMap<&'static str, (BidStatus, i64)> = BTreeMap::new();
    for bid in bids {
        let key = match bid.status {
            BidStatus::Pending => "PENDING",
            BidStatus::Countered => "COUNTERED",
            BidStatus::Accepted => "ACCEPTED",
            BidStatus::Rejected => "REJECTED",
            BidStatus::Cancelled => "CANCELLED",
            BidStatus::Expired => "EXPIRED",
        };
        counts.entry(key).or_insert((bid.status, 0)).1 += 1;
    }
    counts.into_values().collect()
}

#[async_trait]
impl LedgerSession for MemorySession {
    async fn user_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.work.users.get(&id).cloned())
    }

    async fn product_by_id(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        Ok(self.work.products.get(&id).cloned())
    }

    async fn product_for_update(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        // 세션이 전역 잠금을 이미 쥐고 있다
        self.product_by_id(id).await
    }

    async fn update_product_status(
        &mut self,
        id: i64,
        status: ProductStatus,
        final_price: Option<i64>,
    ) -> Result<(), StoreError> {
        if let Some(product) = self.work.products.get_mut(&id) {
            product.status = status;
            if final_price.is_some() {
                product.final_price = final_price;
            }
        }
        Ok(())
    }

    async fn insert_bid(&mut self, bid: NewBid) -> Result<Bid, StoreError> {
        let id = self.work.allocate_id();
        let row = Bid {
            id,
            product_id: bid.product_id,
            buyer_id: bid.buyer_id,
            offered_price: bid.offered_price,
            counter_price: None,
            quantity: bid.quantity,
            status: BidStatus::Pending,
            negotiation_round: 1,
            expires_at: bid.expires_at,
            message: bid.message,
            counter_message: None,
            created_at: Utc::now(),
        };
        self.work.bids.insert(id, row.clone());
        Ok(row)
    }

    async fn bid_by_id(&mut self, id: i64) -> Result<Option<Bid>, StoreError> {
        Ok(self.work.bids.get(&id).cloned())
    }

    async fn bid_for_update(&mut self, id: i64) -> Result<Option<Bid>, StoreError> {
        self.bid_by_id(id).await
    }

    async fn update_bid(&mut self, bid: &Bid) -> Result<(), StoreError> {
        if let Some(row) = self.work.bids.get_mut(&bid.id) {
            row.offered_price = bid.offered_price;
            row.counter_price = bid.counter_price;
            row.status = bid.status;
            row.negotiation_round = bid.negotiation_round;
            row.expires_at = bid.expires_at;
            row.message = bid.message.clone();
            row.counter_message = bid.counter_message.clone();
        }
        Ok(())
    }

    async fn open_bids_for_product(&mut self, product_id: i64) -> Result<Vec<Bid>, StoreError> {
        Ok(self
            .work
            .bids
            .values()
            .filter(|b| b.product_id == product_id && b.status.is_open())
            .cloned()
            .collect())
    }

    async fn find_open_bid(
        &mut self,
        product_id: i64,
        buyer_id: i64,
    ) -> Result<Option<Bid>, StoreError> {
        Ok(self
            .work
            .bids
            .values()
            .find(|b| b.product_id == product_id && b.buyer_id == buyer_id && b.status.is_open())
            .cloned())
    }

    async fn expired_open_bids(&mut self, now: DateTime<Utc>) -> Result<Vec<Bid>, StoreError> {
        Ok(self
            .work
            .bids
            .values()
            .filter(|b| b.status.is_open() && b.expires_at < now)
            .cloned()
            .collect())
    }

    async fn bids_for_product(
        &mut self,
        product_id: i64,
        filter: &BidFilter,
    ) -> Result<(Vec<Bid>, i64), StoreError> {
        let mut bids: Vec<Bid> = self
            .work
            .bids
            .values()
            .filter(|b| {
                b.product_id == product_id
                    && filter.status.map_or(true, |status| b.status == status)
            })
            .cloned()
            .collect();
        bids.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page(bids, filter))
    }

    async fn bids_for_buyer(
        &mut self,
        buyer_id: i64,
        filter: &BidFilter,
    ) -> Result<(Vec<Bid>, i64), StoreError> {
        let mut bids: Vec<Bid> = self
            .work
            .bids
            .values()
            .filter(|b| {
                b.buyer_id == buyer_id && filter.status.map_or(true, |status| b.status == status)
            })
            .cloned()
            .collect();
        bids.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page(bids, filter))
    }

    async fn status_counts_for_seller(
        &mut self,
        seller_id: i64,
    ) -> Result<Vec<(BidStatus, i64)>, StoreError> {
        let product_ids: Vec<i64> = self
            .work
            .products
            .values()
            .filter(|p| p.owner_id == seller_id)
            .map(|p| p.id)
            .collect();
        Ok(status_counts(
            self.work
                .bids
                .values()
                .filter(|b| product_ids.contains(&b.product_id))
                .collect(),
        ))
    }

    async fn status_counts_for_buyer(
        &mut self,
        buyer_id: i64,
    ) -> Result<Vec<(BidStatus, i64)>, StoreError> {
        Ok(status_counts(
            self.work
                .bids
                .values()
                .filter(|b| b.buyer_id == buyer_id)
                .collect(),
        ))
    }

    async fn append_history(&mut self, entry: NewHistoryEntry) -> Result<(), StoreError> {
        let id = self.work.allocate_id();
        self.work.history.push(BidHistoryEntry {
            id,
            bid_id: entry.bid_id,
            action: entry.action,
            price: entry.price,
            message: entry.message,
            user_id: entry.user_id,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn history_for_bid(
        &mut self,
        bid_id: i64,
    ) -> Result<Vec<BidHistoryEntry>, StoreError> {
        Ok(self
            .work
            .history
            .iter()
            .filter(|h| h.bid_id == bid_id)
            .cloned()
            .collect())
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, StoreError> {
        if self
            .work
            .orders
            .iter()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(StoreError::Conflict(format!(
                "duplicate order number {}",
                order.order_number
            )));
        }
        let id = self.work.allocate_id();
        let row = Order {
            id,
            order_number: order.order_number,
            product_id: order.product_id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            quantity: order.quantity,
            price: order.price,
            total_amount: order.total_amount,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: Utc::now(),
        };
        self.work.orders.push(row.clone());
        Ok(row)
    }

    async fn order_for_product(&mut self, product_id: i64) -> Result<Option<Order>, StoreError> {
        Ok(self
            .work
            .orders
            .iter()
            .find(|o| o.product_id == product_id)
            .cloned())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        *self.guard = self.work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // 작업 사본을 버리면 끝
        Ok(())
    }
}

// endregion: --- Memory Session

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidding::model::{bid_expiry, UserRole};

    #[tokio::test]
    async fn rollback_discards_uncommitted_writes() {
        let ledger = MemoryLedger::new();
        let seller = ledger.seed_user("seller", UserRole::Seller, true).await;
        let product = ledger.seed_product(seller.id, "onions", 100).await;

        let mut session = ledger.begin().await.unwrap();
        session
            .insert_bid(NewBid {
                product_id: product.id,
                buyer_id: 99,
                offered_price: 100,
                quantity: 10,
                message: None,
                expires_at: bid_expiry(Utc::now()),
            })
            .await
            .unwrap();
        session.rollback().await.unwrap();

        let mut session = ledger.begin().await.unwrap();
        let open = session.open_bids_for_product(product.id).await.unwrap();
        assert!(open.is_empty());
        session.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn commit_publishes_writes() {
        let ledger = MemoryLedger::new();
        let seller = ledger.seed_user("seller", UserRole::Seller, true).await;
        let product = ledger.seed_product(seller.id, "onions", 100).await;

        let mut session = ledger.begin().await.unwrap();
        let bid = session
            .insert_bid(NewBid {
                product_id: product.id,
                buyer_id: 99,
                offered_price: 100,
                quantity: 10,
                message: None,
                expires_at: bid_expiry(Utc::now()),
            })
            .await
            .unwrap();
        session.commit().await.unwrap();

        let mut session = ledger.begin().await.unwrap();
        let found = session.bid_by_id(bid.id).await.unwrap().unwrap();
        assert_eq!(found.status, BidStatus::Pending);
        assert_eq!(found.negotiation_round, 1);
        session.rollback().await.unwrap();
    }
}

// endregion: --- Tests

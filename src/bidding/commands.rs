/// 입찰 수명주기 커맨드 처리
/// 1. 입찰 생성
/// 2. 판매자 응답 (수락 / 거절 / 역제안)
/// 3. 구매자 역제안
/// 4. 입찰 취소
/// 5. 만료 일괄 처리
///
/// 모든 전이는 하나의 원장 세션(트랜잭션) 안에서 검증하고 기록한다.
/// 낙찰만이 경쟁 입찰과 상품을 동시에 건드릴 수 있다.
// region:    --- Imports
use crate::audit::ActivityLog;
use crate::bidding::model::{
    actions, bid_expiry, Bid, BidStatus, NewBid, NewHistoryEntry, ProductStatus, UserRole,
};
use crate::error::ServiceError;
use crate::ledger::{Ledger, LedgerSession};
use crate::notify::{NotificationMessage, Notifier};
use crate::orders::materialize_order;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

// endregion: --- Imports

// region:    --- Commands

/// 입찰 생성 명령
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBidCommand {
    pub product_id: i64,
    pub buyer_id: i64,
    pub offered_price: i64,
    pub quantity: i64,
    pub message: Option<String>,
}

/// 판매자 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BidDecision {
    Accept,
    Reject,
    Counter,
}

/// 판매자 응답 명령
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondToBidCommand {
    pub seller_id: i64,
    pub decision: BidDecision,
    pub counter_price: Option<i64>,
    pub message: Option<String>,
}

/// 구매자 역제안 명령
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterBidCommand {
    pub buyer_id: i64,
    pub counter_price: i64,
    pub message: Option<String>,
}

/// 입찰 취소 명령
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBidCommand {
    pub buyer_id: i64,
}

// endregion: --- Commands

// region:    --- Create

/// 1. 입찰 생성
pub async fn handle_create_bid(
    cmd: CreateBidCommand,
    ledger: &dyn Ledger,
    notifier: &dyn Notifier,
    activity: &dyn ActivityLog,
) -> Result<Bid, ServiceError> {
    info!("{:<12} --> 입찰 생성 처리 시작: {:?}", "Command", cmd);

    if cmd.offered_price < 1 {
        return Err(ServiceError::Validation(
            "Offered price must be positive".to_string(),
        ));
    }
    if cmd.quantity < 1 {
        return Err(ServiceError::Validation(
            "Bid quantity must be at least 1".to_string(),
        ));
    }

    let mut session = ledger.begin().await?;

    let buyer = session
        .user_by_id(cmd.buyer_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Buyer not found".to_string()))?;
    if buyer.role != UserRole::Buyer {
        return Err(ServiceError::Forbidden(
            "Only buyers can place bids".to_string(),
        ));
    }
    if !buyer.contact_verified {
        return Err(ServiceError::Forbidden(
            "Please verify your contact details before placing bids".to_string(),
        ));
    }

    let product = session
        .product_for_update(cmd.product_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
    if product.status == ProductStatus::Sold {
        return Err(ServiceError::InvalidState(
            "Product is not available for bidding".to_string(),
        ));
    }
    if product.owner_id == cmd.buyer_id {
        return Err(ServiceError::Forbidden(
            "Cannot bid on your own product".to_string(),
        ));
    }
    if cmd.quantity > product.quantity {
        return Err(ServiceError::Validation(
            "Bid quantity exceeds available quantity".to_string(),
        ));
    }

    if session
        .find_open_bid(cmd.product_id, cmd.buyer_id)
        .await?
        .is_some()
    {
        return Err(ServiceError::Conflict(
            "You already have an active bid on this product".to_string(),
        ));
    }

    let now = Utc::now();
    let bid = session
        .insert_bid(NewBid {
            product_id: cmd.product_id,
            buyer_id: cmd.buyer_id,
            offered_price: cmd.offered_price,
            quantity: cmd.quantity,
            message: cmd.message.clone(),
            expires_at: bid_expiry(now),
        })
        .await?;

    session
        .append_history(NewHistoryEntry {
            bid_id: bid.id,
            action: actions::BID_PLACED.to_string(),
            price: Some(cmd.offered_price),
            message: cmd.message.clone(),
            user_id: Some(cmd.buyer_id),
        })
        .await?;

    // 첫 열린 입찰이면 상품을 UNDER_BID로 전환
    if product.status == ProductStatus::Active {
        session
            .update_product_status(product.id, ProductStatus::UnderBid, None)
            .await?;
    }

    session.commit().await?;

    notifier
        .publish(NotificationMessage::BidReceived {
            seller_id: product.owner_id,
            buyer_label: buyer.name,
            product_label: product.title,
            price: cmd.offered_price,
        })
        .await;
    activity
        .record(
            Some(cmd.buyer_id),
            actions::BID_PLACED,
            serde_json::json!({
                "bid_id": bid.id,
                "product_id": cmd.product_id,
                "offered_price": cmd.offered_price,
                "quantity": cmd.quantity,
            }),
        )
        .await;

    Ok(bid)
}

// endregion: --- Create

// region:    --- Respond

/// 2. 판매자 응답 (수락 / 거절 / 역제안)
pub async fn handle_respond_to_bid(
    bid_id: i64,
    cmd: RespondToBidCommand,
    ledger: &dyn Ledger,
    notifier: &dyn Notifier,
    activity: &dyn ActivityLog,
) -> Result<Bid, ServiceError> {
    info!(
        "{:<12} --> 판매자 응답 처리 시작: bid={}, {:?}",
        "Command", bid_id, cmd
    );

    // 낙찰은 경쟁 입찰·상품·주문을 한 번에 건드리므로 직렬화 가능 격리로 실행
    let mut session = match cmd.decision {
        BidDecision::Accept => ledger.begin_serializable().await?,
        _ => ledger.begin().await?,
    };

    let mut bid = session
        .bid_for_update(bid_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bid not found".to_string()))?;
    let product = session
        .product_for_update(bid.product_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

    if product.owner_id != cmd.seller_id {
        return Err(ServiceError::Forbidden(
            "Bid not found or access denied".to_string(),
        ));
    }
    if !bid.status.is_open() {
        return Err(ServiceError::InvalidState(
            "Can only update pending or countered bids".to_string(),
        ));
    }
    let now = Utc::now();
    if bid.is_expired(now) {
        return Err(ServiceError::InvalidState("Bid has expired".to_string()));
    }
    if product.status == ProductStatus::Sold {
        return Err(ServiceError::InvalidState(
            "Product is no longer available for bidding".to_string(),
        ));
    }

    match cmd.decision {
        BidDecision::Accept => {
            // 승자 이외의 열린 입찰을 먼저 수집
            let siblings: Vec<Bid> = session
                .open_bids_for_product(bid.product_id)
                .await?
                .into_iter()
                .filter(|sibling| sibling.id != bid.id)
                .collect();

            bid.status = BidStatus::Accepted;
            if cmd.message.is_some() {
                bid.counter_message = cmd.message.clone();
            }
            session.update_bid(&bid).await?;

            let mut foreclosed_buyers: Vec<i64> = Vec::new();
            for mut sibling in siblings {
                sibling.status = BidStatus::Rejected;
                session.update_bid(&sibling).await?;
                session
                    .append_history(NewHistoryEntry {
                        bid_id: sibling.id,
                        action: actions::BID_REJECTED.to_string(),
                        price: Some(sibling.offered_price),
                        message: None,
                        user_id: Some(cmd.seller_id),
                    })
                    .await?;
                foreclosed_buyers.push(sibling.buyer_id);
            }

            session
                .update_product_status(product.id, ProductStatus::Sold, Some(bid.offered_price))
                .await?;

            // 주문 구체화가 실패하면 위의 모든 변경이 함께 롤백된다
            let order = materialize_order(session.as_mut(), &bid, &product).await?;

            session
                .append_history(NewHistoryEntry {
                    bid_id: bid.id,
                    action: actions::BID_ACCEPTED.to_string(),
                    price: Some(bid.offered_price),
                    message: cmd.message.clone(),
                    user_id: Some(cmd.seller_id),
                })
                .await?;

            session.commit().await?;

            notifier
                .publish(NotificationMessage::BidStatusUpdate {
                    buyer_id: bid.buyer_id,
                    product_label: product.title.clone(),
                    status: BidStatus::Accepted,
                })
                .await;
            for buyer_id in foreclosed_buyers {
                notifier
                    .publish(NotificationMessage::BidStatusUpdate {
                        buyer_id,
                        product_label: product.title.clone(),
                        status: BidStatus::Rejected,
                    })
                    .await;
            }
            notifier
                .publish(NotificationMessage::OrderCreated {
                    buyer_id: bid.buyer_id,
                    seller_id: product.owner_id,
                    product_label: product.title.clone(),
                    order_number: order.order_number.clone(),
                })
                .await;
            activity
                .record(
                    Some(cmd.seller_id),
                    actions::BID_ACCEPTED,
                    serde_json::json!({
                        "bid_id": bid.id,
                        "product_id": bid.product_id,
                        "buyer_id": bid.buyer_id,
                        "price": bid.offered_price,
                        "order_number": order.order_number,
                    }),
                )
                .await;
        }
        BidDecision::Reject => {
            bid.status = BidStatus::Rejected;
            if cmd.message.is_some() {
                bid.counter_message = cmd.message.clone();
            }
            session.update_bid(&bid).await?;
            session
                .append_history(NewHistoryEntry {
                    bid_id: bid.id,
                    action: actions::BID_REJECTED.to_string(),
                    price: Some(bid.offered_price),
                    message: cmd.message.clone(),
                    user_id: Some(cmd.seller_id),
                })
                .await?;

            // 마지막 열린 입찰이었다면 상품을 다시 ACTIVE로
            if session.open_bids_for_product(bid.product_id).await?.is_empty() {
                session
                    .update_product_status(product.id, ProductStatus::Active, None)
                    .await?;
            }

            session.commit().await?;

            notifier
                .publish(NotificationMessage::BidStatusUpdate {
                    buyer_id: bid.buyer_id,
                    product_label: product.title.clone(),
                    status: BidStatus::Rejected,
                })
                .await;
            activity
                .record(
                    Some(cmd.seller_id),
                    actions::BID_REJECTED,
                    serde_json::json!({
                        "bid_id": bid.id,
                        "product_id": bid.product_id,
                        "buyer_id": bid.buyer_id,
                        "price": bid.offered_price,
                    }),
                )
                .await;
        }
        BidDecision::Counter => {
            let counter_price = cmd.counter_price.ok_or_else(|| {
                ServiceError::Validation(
                    "Counter price is required for counter bids".to_string(),
                )
            })?;
            if counter_price < 1 {
                return Err(ServiceError::Validation(
                    "Counter price must be positive".to_string(),
                ));
            }
            // 라운드 상한은 양측 합산 2회
            if bid.negotiation_round >= 2 {
                return Err(ServiceError::InvalidState(
                    "Maximum 2 rounds of negotiation allowed".to_string(),
                ));
            }

            bid.counter_price = Some(counter_price);
            bid.counter_message = cmd.message.clone();
            bid.negotiation_round += 1;
            bid.status = BidStatus::Countered;
            session.update_bid(&bid).await?;
            session
                .append_history(NewHistoryEntry {
                    bid_id: bid.id,
                    action: actions::BID_COUNTERED.to_string(),
                    price: Some(counter_price),
                    message: cmd.message.clone(),
                    user_id: Some(cmd.seller_id),
                })
                .await?;

            session.commit().await?;

            notifier
                .publish(NotificationMessage::BidStatusUpdate {
                    buyer_id: bid.buyer_id,
                    product_label: product.title.clone(),
                    status: BidStatus::Countered,
                })
                .await;
            activity
                .record(
                    Some(cmd.seller_id),
                    actions::BID_COUNTERED,
                    serde_json::json!({
                        "bid_id": bid.id,
                        "product_id": bid.product_id,
                        "buyer_id": bid.buyer_id,
                        "price": counter_price,
                    }),
                )
                .await;
        }
    }

    Ok(bid)
}

// endregion: --- Respond

// region:    --- Buyer Counter

/// 3. 구매자 역제안 (판매자 역제안에 대한 응답)
pub async fn handle_counter_bid(
    bid_id: i64,
    cmd: CounterBidCommand,
    ledger: &dyn Ledger,
    notifier: &dyn Notifier,
    activity: &dyn ActivityLog,
) -> Result<Bid, ServiceError> {
    info!(
        "{:<12} --> 구매자 역제안 처리 시작: bid={}, {:?}",
        "Command", bid_id, cmd
    );

    if cmd.counter_price < 1 {
        return Err(ServiceError::Validation(
            "Counter price must be positive".to_string(),
        ));
    }

    let mut session = ledger.begin().await?;

    let mut bid = session
        .bid_for_update(bid_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bid not found".to_string()))?;
    if bid.buyer_id != cmd.buyer_id {
        return Err(ServiceError::Forbidden(
            "Bid not found or access denied".to_string(),
        ));
    }
    // COUNTERED는 판매자 역제안으로만 진입하므로 여기서 라운드는 항상 2다.
    // 구매자의 응답은 그 라운드를 마무리할 뿐, 라운드를 늘리지 않는다.
    if bid.status != BidStatus::Countered {
        return Err(ServiceError::InvalidState(
            "Can only counter a countered bid".to_string(),
        ));
    }

    let product = session
        .product_for_update(bid.product_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
    if product.status != ProductStatus::UnderBid {
        return Err(ServiceError::InvalidState(
            "Product is no longer available for bidding".to_string(),
        ));
    }

    let now = Utc::now();
    if bid.is_expired(now) {
        return Err(ServiceError::InvalidState("Bid has expired".to_string()));
    }

    let buyer = session
        .user_by_id(cmd.buyer_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Buyer not found".to_string()))?;

    bid.offered_price = cmd.counter_price;
    bid.message = cmd.message.clone();
    bid.status = BidStatus::Pending;
    bid.expires_at = bid_expiry(now);
    session.update_bid(&bid).await?;

    session
        .append_history(NewHistoryEntry {
            bid_id: bid.id,
            action: actions::BID_COUNTERED_BY_BUYER.to_string(),
            price: Some(cmd.counter_price),
            message: cmd.message.clone(),
            user_id: Some(cmd.buyer_id),
        })
        .await?;

    session.commit().await?;

    notifier
        .publish(NotificationMessage::BidReceived {
            seller_id: product.owner_id,
            buyer_label: buyer.name,
            product_label: product.title,
            price: cmd.counter_price,
        })
        .await;
    activity
        .record(
            Some(cmd.buyer_id),
            "BID_COUNTER_OFFER",
            serde_json::json!({
                "bid_id": bid.id,
                "product_id": bid.product_id,
                "new_price": cmd.counter_price,
                "round": bid.negotiation_round,
            }),
        )
        .await;

    Ok(bid)
}

// endregion: --- Buyer Counter

// region:    --- Cancel

/// 4. 입찰 취소 (구매자, PENDING 상태에서만)
pub async fn handle_cancel_bid(
    bid_id: i64,
    cmd: CancelBidCommand,
    ledger: &dyn Ledger,
    activity: &dyn ActivityLog,
) -> Result<Bid, ServiceError> {
    info!(
        "{:<12} --> 입찰 취소 처리 시작: bid={}, buyer={}",
        "Command", bid_id, cmd.buyer_id
    );

    let mut session = ledger.begin().await?;

    let mut bid = session
        .bid_for_update(bid_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bid not found".to_string()))?;
    if bid.buyer_id != cmd.buyer_id {
        return Err(ServiceError::Forbidden(
            "Bid not found or access denied".to_string(),
        ));
    }
    if bid.status != BidStatus::Pending {
        return Err(ServiceError::InvalidState(
            "Can only cancel pending bids".to_string(),
        ));
    }
    let now = Utc::now();
    if bid.is_expired(now) {
        return Err(ServiceError::InvalidState("Bid has expired".to_string()));
    }

    let product = session
        .product_for_update(bid.product_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

    bid.status = BidStatus::Cancelled;
    session.update_bid(&bid).await?;
    session
        .append_history(NewHistoryEntry {
            bid_id: bid.id,
            action: actions::BID_CANCELLED.to_string(),
            price: None,
            message: None,
            user_id: Some(cmd.buyer_id),
        })
        .await?;

    // 마지막 열린 입찰이었다면 상품을 다시 ACTIVE로
    if product.status == ProductStatus::UnderBid
        && session.open_bids_for_product(bid.product_id).await?.is_empty()
    {
        session
            .update_product_status(product.id, ProductStatus::Active, None)
            .await?;
    }

    session.commit().await?;

    activity
        .record(
            Some(cmd.buyer_id),
            actions::BID_CANCELLED,
            serde_json::json!({
                "bid_id": bid.id,
                "product_id": bid.product_id,
            }),
        )
        .await;

    Ok(bid)
}

// endregion: --- Cancel

// region:    --- Expire

/// 5. 만료 일괄 처리
/// PENDING/COUNTERED 상태로 expires_at이 지난 입찰을 EXPIRED로 전환하고,
/// 열린 입찰이 사라진 상품을 다시 ACTIVE로 되돌린다. 멱등 연산이다.
pub async fn handle_expire_old_bids(ledger: &dyn Ledger) -> Result<u64, ServiceError> {
    let mut session = ledger.begin().await?;
    let now = Utc::now();

    let expired = session.expired_open_bids(now).await?;
    let count = expired.len() as u64;

    let mut product_ids: Vec<i64> = Vec::new();
    for mut bid in expired {
        bid.status = BidStatus::Expired;
        session.update_bid(&bid).await?;
        // user_id 없음 = 시스템 전이
        session
            .append_history(NewHistoryEntry {
                bid_id: bid.id,
                action: actions::BID_EXPIRED.to_string(),
                price: None,
                message: None,
                user_id: None,
            })
            .await?;
        if !product_ids.contains(&bid.product_id) {
            product_ids.push(bid.product_id);
        }
    }

    for product_id in product_ids {
        if let Some(product) = session.product_for_update(product_id).await? {
            if product.status == ProductStatus::UnderBid
                && session.open_bids_for_product(product_id).await?.is_empty()
            {
                session
                    .update_product_status(product_id, ProductStatus::Active, None)
                    .await?;
            }
        }
    }

    session.commit().await?;

    info!("{:<12} --> 만료된 입찰 {}건 처리", "Command", count);
    Ok(count)
}

// endregion: --- Expire

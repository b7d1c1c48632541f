use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use negotiation_service::audit::NoopActivityLog;
use negotiation_service::bidding::commands::{
    handle_cancel_bid, handle_counter_bid, handle_create_bid, handle_expire_old_bids,
    handle_respond_to_bid, BidDecision, CancelBidCommand, CounterBidCommand, CreateBidCommand,
    RespondToBidCommand,
};
use negotiation_service::bidding::model::{
    actions, Bid, BidHistoryEntry, BidStatus, NewBid, NewHistoryEntry, NewOrder, Order, Product,
    ProductStatus, User, UserRole,
};
use negotiation_service::bidding::queries;
use negotiation_service::error::{ServiceError, StoreError};
use negotiation_service::ledger::{BidFilter, Ledger, LedgerSession, MemoryLedger};
use negotiation_service::notify::NoopNotifier;

/// 테스트 환경: 인메모리 원장 + 무동작 알림/감사
struct TestEnv {
    ledger: MemoryLedger,
    notifier: NoopNotifier,
    activity: NoopActivityLog,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            ledger: MemoryLedger::new(),
            notifier: NoopNotifier,
            activity: NoopActivityLog,
        }
    }
}

/// 입찰 생성 헬퍼
async fn place_bid(env: &TestEnv, product_id: i64, buyer_id: i64, price: i64, qty: i64) -> Bid {
    handle_create_bid(
        CreateBidCommand {
            product_id,
            buyer_id,
            offered_price: price,
            quantity: qty,
            message: None,
        },
        &env.ledger,
        &env.notifier,
        &env.activity,
    )
    .await
    .expect("입찰 생성 실패")
}

/// 판매자 응답 헬퍼
async fn respond(
    env: &TestEnv,
    bid_id: i64,
    seller_id: i64,
    decision: BidDecision,
    counter_price: Option<i64>,
) -> Result<Bid, ServiceError> {
    handle_respond_to_bid(
        bid_id,
        RespondToBidCommand {
            seller_id,
            decision,
            counter_price,
            message: None,
        },
        &env.ledger,
        &env.notifier,
        &env.activity,
    )
    .await
}

/// 현재 입찰 상태 조회 헬퍼
async fn fetch_bid(env: &TestEnv, bid_id: i64) -> Bid {
    let mut session = env.ledger.begin().await.unwrap();
    let bid = session.bid_by_id(bid_id).await.unwrap().unwrap();
    session.rollback().await.unwrap();
    bid
}

/// 현재 상품 상태 조회 헬퍼
async fn fetch_product(env: &TestEnv, product_id: i64) -> Product {
    let mut session = env.ledger.begin().await.unwrap();
    let product = session.product_by_id(product_id).await.unwrap().unwrap();
    session.rollback().await.unwrap();
    product
}

/// 만료 시각을 과거로 되돌리는 헬퍼
async fn backdate_bid(env: &TestEnv, bid_id: i64, hours: i64) {
    let mut session = env.ledger.begin().await.unwrap();
    let mut bid = session.bid_for_update(bid_id).await.unwrap().unwrap();
    bid.expires_at = Utc::now() - Duration::hours(hours);
    session.update_bid(&bid).await.unwrap();
    session.commit().await.unwrap();
}

/// 입찰 생성: 상품 전이와 이력 기록
#[tokio::test]
async fn create_bid_marks_product_under_bid() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let buyer = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 100).await;

    let before = Utc::now();
    let bid = place_bid(&env, product.id, buyer.id, 1_000, 10).await;

    assert_eq!(bid.status, BidStatus::Pending);
    assert_eq!(bid.negotiation_round, 1);
    assert_eq!(bid.offered_price, 1_000);
    // 만료 시한은 생성 시점 + 24시간
    let window = bid.expires_at - before;
    assert!(window >= Duration::hours(24));
    assert!(window < Duration::hours(24) + Duration::minutes(1));

    let product = fetch_product(&env, product.id).await;
    assert_eq!(product.status, ProductStatus::UnderBid);

    let history = queries::get_bid_history(bid.id, buyer.id, &env.ledger)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, actions::BID_PLACED);
    assert_eq!(history[0].user_id, Some(buyer.id));
    assert_eq!(history[0].price, Some(1_000));
}

/// 입찰 생성 사전조건 위반
#[tokio::test]
async fn create_bid_rejects_invalid_actors_and_quantities() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let buyer = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let unverified = env.ledger.seed_user("newcomer", UserRole::Buyer, false).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 50).await;

    // 판매자 역할은 입찰 불가
    let err = handle_create_bid(
        CreateBidCommand {
            product_id: product.id,
            buyer_id: seller.id,
            offered_price: 100,
            quantity: 1,
            message: None,
        },
        &env.ledger,
        &env.notifier,
        &env.activity,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    assert_eq!(err.to_string(), "Only buyers can place bids");

    // 연락처 미검증 구매자는 입찰 불가
    let err = handle_create_bid(
        CreateBidCommand {
            product_id: product.id,
            buyer_id: unverified.id,
            offered_price: 100,
            quantity: 1,
            message: None,
        },
        &env.ledger,
        &env.notifier,
        &env.activity,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    // 보유 수량 초과
    let err = handle_create_bid(
        CreateBidCommand {
            product_id: product.id,
            buyer_id: buyer.id,
            offered_price: 100,
            quantity: 51,
            message: None,
        },
        &env.ledger,
        &env.notifier,
        &env.activity,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(err.to_string(), "Bid quantity exceeds available quantity");

    // 가격과 수량은 양수
    let err = handle_create_bid(
        CreateBidCommand {
            product_id: product.id,
            buyer_id: buyer.id,
            offered_price: 0,
            quantity: 1,
            message: None,
        },
        &env.ledger,
        &env.notifier,
        &env.activity,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    // 실패한 시도는 아무 것도 남기지 않는다
    let product = fetch_product(&env, product.id).await;
    assert_eq!(product.status, ProductStatus::Active);
}

/// 자기 상품에는 입찰 불가
#[tokio::test]
async fn create_bid_rejects_own_product() {
    let env = TestEnv::new();
    let buyer = env.ledger.seed_user("trader", UserRole::Buyer, true).await;
    let product = env.ledger.seed_product(buyer.id, "garlic 5kg", 10).await;

    let err = handle_create_bid(
        CreateBidCommand {
            product_id: product.id,
            buyer_id: buyer.id,
            offered_price: 100,
            quantity: 1,
            message: None,
        },
        &env.ledger,
        &env.notifier,
        &env.activity,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    assert_eq!(err.to_string(), "Cannot bid on your own product");
}

/// 같은 상품에 열린 입찰은 구매자당 하나
#[tokio::test]
async fn duplicate_open_bid_is_a_conflict() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let buyer = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 100).await;

    place_bid(&env, product.id, buyer.id, 1_000, 10).await;

    let err = handle_create_bid(
        CreateBidCommand {
            product_id: product.id,
            buyer_id: buyer.id,
            offered_price: 1_100,
            quantity: 10,
            message: None,
        },
        &env.ledger,
        &env.notifier,
        &env.activity,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

/// 협상 왕복: 생성 -> 판매자 역제안 -> 구매자 역제안 -> 수락
#[tokio::test]
async fn full_negotiation_round_trip() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let buyer = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 100).await;

    let bid = place_bid(&env, product.id, buyer.id, 1_000, 10).await;

    // 판매자 역제안이 라운드 2를 연다
    let countered = respond(&env, bid.id, seller.id, BidDecision::Counter, Some(1_200))
        .await
        .unwrap();
    assert_eq!(countered.status, BidStatus::Countered);
    assert_eq!(countered.negotiation_round, 2);
    assert_eq!(countered.counter_price, Some(1_200));

    // 구매자 역제안은 라운드를 마무리하고 만료 시한을 갱신한다
    let old_expiry = countered.expires_at;
    let replied = handle_counter_bid(
        bid.id,
        CounterBidCommand {
            buyer_id: buyer.id,
            counter_price: 1_100,
            message: Some("meet in the middle".to_string()),
        },
        &env.ledger,
        &env.notifier,
        &env.activity,
    )
    .await
    .unwrap();
    assert_eq!(replied.status, BidStatus::Pending);
    assert_eq!(replied.negotiation_round, 2);
    assert_eq!(replied.offered_price, 1_100);
    assert!(replied.expires_at >= old_expiry);

    // 수락으로 협상이 종결된다
    let accepted = respond(&env, bid.id, seller.id, BidDecision::Accept, None)
        .await
        .unwrap();
    assert_eq!(accepted.status, BidStatus::Accepted);

    let product = fetch_product(&env, product.id).await;
    assert_eq!(product.status, ProductStatus::Sold);
    assert_eq!(product.final_price, Some(1_100));

    // 주문은 정확히 하나, 총액 = 단가 * 수량
    let mut session = env.ledger.begin().await.unwrap();
    let order = session
        .order_for_product(product.id)
        .await
        .unwrap()
        .expect("주문 누락");
    session.rollback().await.unwrap();
    assert_eq!(order.buyer_id, buyer.id);
    assert_eq!(order.seller_id, seller.id);
    assert_eq!(order.price, 1_100);
    assert_eq!(order.quantity, 10);
    assert_eq!(order.total_amount, 11_000);
    assert!(order.order_number.starts_with("ORD-"));

    // 이력에 양측 역제안과 수락이 모두 남는다
    let history = queries::get_bid_history(bid.id, seller.id, &env.ledger)
        .await
        .unwrap();
    let recorded: Vec<&str> = history.iter().map(|h| h.action.as_str()).collect();
    assert!(recorded.contains(&actions::BID_PLACED));
    assert!(recorded.contains(&actions::BID_COUNTERED));
    assert!(recorded.contains(&actions::BID_COUNTERED_BY_BUYER));
    assert!(recorded.contains(&actions::BID_ACCEPTED));
}

/// 라운드 상한: 양측 모두 세 번째 역제안은 불가
#[tokio::test]
async fn third_counter_is_rejected_for_both_sides() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let buyer = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 100).await;

    let bid = place_bid(&env, product.id, buyer.id, 1_000, 10).await;
    respond(&env, bid.id, seller.id, BidDecision::Counter, Some(1_200))
        .await
        .unwrap();
    handle_counter_bid(
        bid.id,
        CounterBidCommand {
            buyer_id: buyer.id,
            counter_price: 1_100,
            message: None,
        },
        &env.ledger,
        &env.notifier,
        &env.activity,
    )
    .await
    .unwrap();

    // 판매자의 두 번째 역제안은 라운드 상한에 걸린다
    let err = respond(&env, bid.id, seller.id, BidDecision::Counter, Some(1_150))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert_eq!(err.to_string(), "Maximum 2 rounds of negotiation allowed");

    // 구매자는 COUNTERED 상태가 아니면 역제안 자체가 불가
    let err = handle_counter_bid(
        bid.id,
        CounterBidCommand {
            buyer_id: buyer.id,
            counter_price: 1_050,
            message: None,
        },
        &env.ledger,
        &env.notifier,
        &env.activity,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert_eq!(err.to_string(), "Can only counter a countered bid");

    // 상한에 걸려도 기존 상태는 그대로
    let bid = fetch_bid(&env, bid.id).await;
    assert_eq!(bid.negotiation_round, 2);
    assert_eq!(bid.status, BidStatus::Pending);
}

/// 낙찰은 경쟁 입찰을 원자적으로 배제한다
#[tokio::test]
async fn accept_forecloses_sibling_bids() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let b1 = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let b2 = env.ledger.seed_user("grocer", UserRole::Buyer, true).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 50).await;

    let bid1 = place_bid(&env, product.id, b1.id, 100, 10).await;
    let bid2 = place_bid(&env, product.id, b2.id, 105, 20).await;

    // 패자 입찰을 먼저 역제안해 둔 상태에서도 낙찰이 덮는다
    respond(&env, bid1.id, seller.id, BidDecision::Counter, Some(110))
        .await
        .unwrap();

    let winner = respond(&env, bid2.id, seller.id, BidDecision::Accept, None)
        .await
        .unwrap();
    assert_eq!(winner.status, BidStatus::Accepted);

    let loser = fetch_bid(&env, bid1.id).await;
    assert_eq!(loser.status, BidStatus::Rejected);

    let product = fetch_product(&env, product.id).await;
    assert_eq!(product.status, ProductStatus::Sold);
    assert_eq!(product.final_price, Some(105));

    let mut session = env.ledger.begin().await.unwrap();
    let order = session
        .order_for_product(product.id)
        .await
        .unwrap()
        .expect("주문 누락");
    session.rollback().await.unwrap();
    assert_eq!(order.buyer_id, b2.id);
    assert_eq!(order.total_amount, 2_100);

    // 패자 이력에는 시스템 거절이 남는다
    let loser_history = queries::get_bid_history(bid1.id, seller.id, &env.ledger)
        .await
        .unwrap();
    assert!(loser_history
        .iter()
        .any(|h| h.action == actions::BID_REJECTED));

    // 이미 팔린 상품에는 어떤 응답도 불가
    let err = respond(&env, bid1.id, seller.id, BidDecision::Accept, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    // 새 입찰도 불가
    let b3 = env.ledger.seed_user("latecomer", UserRole::Buyer, true).await;
    let err = handle_create_bid(
        CreateBidCommand {
            product_id: product.id,
            buyer_id: b3.id,
            offered_price: 200,
            quantity: 1,
            message: None,
        },
        &env.ledger,
        &env.notifier,
        &env.activity,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

/// 마지막 열린 입찰이 거절되면 상품은 다시 판매 가능 상태로
#[tokio::test]
async fn rejecting_last_open_bid_reopens_product() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let b1 = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let b2 = env.ledger.seed_user("grocer", UserRole::Buyer, true).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 100).await;

    let bid1 = place_bid(&env, product.id, b1.id, 100, 10).await;
    let bid2 = place_bid(&env, product.id, b2.id, 105, 20).await;

    respond(&env, bid1.id, seller.id, BidDecision::Reject, None)
        .await
        .unwrap();
    // 아직 열린 입찰이 남아 있다
    let p = fetch_product(&env, product.id).await;
    assert_eq!(p.status, ProductStatus::UnderBid);

    respond(&env, bid2.id, seller.id, BidDecision::Reject, None)
        .await
        .unwrap();
    let p = fetch_product(&env, product.id).await;
    assert_eq!(p.status, ProductStatus::Active);
}

/// 취소는 PENDING에서만, 마지막이면 상품을 되돌린다
#[tokio::test]
async fn cancel_requires_pending_and_reopens_product() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let buyer = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 100).await;

    let bid = place_bid(&env, product.id, buyer.id, 1_000, 10).await;

    // 다른 구매자는 취소 불가
    let stranger = env.ledger.seed_user("stranger", UserRole::Buyer, true).await;
    let err = handle_cancel_bid(
        bid.id,
        CancelBidCommand { buyer_id: stranger.id },
        &env.ledger,
        &env.activity,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let cancelled = handle_cancel_bid(
        bid.id,
        CancelBidCommand { buyer_id: buyer.id },
        &env.ledger,
        &env.activity,
    )
    .await
    .unwrap();
    assert_eq!(cancelled.status, BidStatus::Cancelled);

    let p = fetch_product(&env, product.id).await;
    assert_eq!(p.status, ProductStatus::Active);

    // COUNTERED 상태에서는 취소 불가
    let bid = place_bid(&env, product.id, buyer.id, 1_000, 10).await;
    respond(&env, bid.id, seller.id, BidDecision::Counter, Some(1_200))
        .await
        .unwrap();
    let err = handle_cancel_bid(
        bid.id,
        CancelBidCommand { buyer_id: buyer.id },
        &env.ledger,
        &env.activity,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert_eq!(err.to_string(), "Can only cancel pending bids");
}

/// 만료 스윕: 멱등하며 상품을 되돌리고 시스템 이력을 남긴다
#[tokio::test]
async fn expire_sweep_is_idempotent() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let buyer = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 100).await;

    let bid = place_bid(&env, product.id, buyer.id, 1_000, 10).await;
    backdate_bid(&env, bid.id, 1).await;

    let count = handle_expire_old_bids(&env.ledger).await.unwrap();
    assert_eq!(count, 1);

    let bid_after = fetch_bid(&env, bid.id).await;
    assert_eq!(bid_after.status, BidStatus::Expired);

    let p = fetch_product(&env, product.id).await;
    assert_eq!(p.status, ProductStatus::Active);

    // 시스템 전이는 행위자 없이 기록된다
    let history = queries::get_bid_history(bid.id, buyer.id, &env.ledger)
        .await
        .unwrap();
    let expired_entry = history
        .iter()
        .find(|h| h.action == actions::BID_EXPIRED)
        .expect("만료 이력 누락");
    assert_eq!(expired_entry.user_id, None);

    // 두 번째 스윕은 아무 것도 하지 않는다
    let count = handle_expire_old_bids(&env.ledger).await.unwrap();
    assert_eq!(count, 0);
}

/// 만료된 입찰에는 어떤 전이도 불가 (스윕 전이라도)
#[tokio::test]
async fn expired_bid_rejects_mutations() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let buyer = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 100).await;

    let bid = place_bid(&env, product.id, buyer.id, 1_000, 10).await;
    backdate_bid(&env, bid.id, 1).await;

    let err = respond(&env, bid.id, seller.id, BidDecision::Accept, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert_eq!(err.to_string(), "Bid has expired");

    let err = handle_cancel_bid(
        bid.id,
        CancelBidCommand { buyer_id: buyer.id },
        &env.ledger,
        &env.activity,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    // 상태 전이는 스윕만이 수행한다
    let bid = fetch_bid(&env, bid.id).await;
    assert_eq!(bid.status, BidStatus::Pending);
}

/// Counter에는 counter_price가 필수
#[tokio::test]
async fn counter_requires_price() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let buyer = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 100).await;

    let bid = place_bid(&env, product.id, buyer.id, 1_000, 10).await;

    let err = respond(&env, bid.id, seller.id, BidDecision::Counter, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(err.to_string(), "Counter price is required for counter bids");
}

/// 판매자 응답은 상품 소유자만 가능
#[tokio::test]
async fn respond_requires_product_owner() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let other = env.ledger.seed_user("rival", UserRole::Seller, true).await;
    let buyer = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 100).await;

    let bid = place_bid(&env, product.id, buyer.id, 1_000, 10).await;

    let err = respond(&env, bid.id, other.id, BidDecision::Accept, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    assert_eq!(err.to_string(), "Bid not found or access denied");
}

/// 조회 접근 제어: 당사자가 아니면 입찰과 이력을 볼 수 없다
#[tokio::test]
async fn queries_enforce_participant_access() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let buyer = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let stranger = env.ledger.seed_user("stranger", UserRole::Buyer, true).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 100).await;

    let bid = place_bid(&env, product.id, buyer.id, 1_000, 10).await;

    // 당사자는 모두 조회 가능
    assert!(queries::get_bid_by_id(bid.id, buyer.id, &env.ledger).await.is_ok());
    assert!(queries::get_bid_by_id(bid.id, seller.id, &env.ledger).await.is_ok());

    let err = queries::get_bid_by_id(bid.id, stranger.id, &env.ledger)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = queries::get_bid_history(bid.id, stranger.id, &env.ledger)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    // 상품 입찰 목록은 소유자만
    let err = queries::get_product_bids(product.id, stranger.id, BidFilter::default(), &env.ledger)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

/// 목록 조회: 상태 필터와 페이지네이션
#[tokio::test]
async fn listing_supports_status_filter_and_pagination() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 100).await;

    let mut rejected_id = 0;
    for i in 0..5 {
        let buyer = env
            .ledger
            .seed_user(&format!("buyer-{i}"), UserRole::Buyer, true)
            .await;
        let bid = place_bid(&env, product.id, buyer.id, 100 + i, 1).await;
        if i == 0 {
            rejected_id = bid.id;
        }
    }
    respond(&env, rejected_id, seller.id, BidDecision::Reject, None)
        .await
        .unwrap();

    let page = queries::get_product_bids(
        product.id,
        seller.id,
        BidFilter {
            page: 1,
            limit: 2,
            status: None,
        },
        &env.ledger,
    )
    .await
    .unwrap();
    assert_eq!(page.bids.len(), 2);
    assert_eq!(page.pagination.total, 5);
    assert_eq!(page.pagination.pages, 3);
    assert!(page.pagination.has_next);
    assert!(!page.pagination.has_prev);

    let page = queries::get_product_bids(
        product.id,
        seller.id,
        BidFilter {
            page: 1,
            limit: 20,
            status: Some(BidStatus::Rejected),
        },
        &env.ledger,
    )
    .await
    .unwrap();
    assert_eq!(page.pagination.total, 1);
    assert_eq!(page.bids[0].id, rejected_id);
}

/// 통계: 역할에 따라 판매자/구매자 관점으로 집계
#[tokio::test]
async fn stats_follow_the_user_role() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let buyer = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let other = env.ledger.seed_user("grocer", UserRole::Buyer, true).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 100).await;

    let bid1 = place_bid(&env, product.id, buyer.id, 100, 10).await;
    place_bid(&env, product.id, other.id, 105, 20).await;
    respond(&env, bid1.id, seller.id, BidDecision::Counter, Some(110))
        .await
        .unwrap();

    // 판매자는 자기 상품에 달린 모든 입찰을 본다
    let stats = queries::get_bid_stats(seller.id, &env.ledger).await.unwrap();
    assert_eq!(stats.total_bids, 2);
    assert_eq!(stats.pending_bids, 2);

    // 구매자는 자기 입찰만 본다
    let stats = queries::get_bid_stats(buyer.id, &env.ledger).await.unwrap();
    assert_eq!(stats.total_bids, 1);
    assert_eq!(stats.pending_bids, 1);
}

/// 구매자 입찰 목록은 본인 것만 담는다
#[tokio::test]
async fn buyer_listing_contains_only_own_bids() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let buyer = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let other = env.ledger.seed_user("grocer", UserRole::Buyer, true).await;
    let p1 = env.ledger.seed_product(seller.id, "onions 1kg", 100).await;
    let p2 = env.ledger.seed_product(seller.id, "garlic 5kg", 30).await;

    place_bid(&env, p1.id, buyer.id, 100, 10).await;
    place_bid(&env, p2.id, buyer.id, 200, 5).await;
    place_bid(&env, p1.id, other.id, 105, 20).await;

    let page = queries::get_buyer_bids(buyer.id, BidFilter::default(), &env.ledger)
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 2);
    assert!(page.bids.iter().all(|b| b.buyer_id == buyer.id));
}

/// 주문 생성만 실패하는 원장 (낙찰 트랜잭션 검증용)
struct OrderRejectingLedger {
    inner: MemoryLedger,
}

#[async_trait]
impl Ledger for OrderRejectingLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerSession>, StoreError> {
        Ok(Box::new(OrderRejectingSession {
            inner: self.inner.begin().await?,
        }))
    }

    async fn begin_serializable(&self) -> Result<Box<dyn LedgerSession>, StoreError> {
        Ok(Box::new(OrderRejectingSession {
            inner: self.inner.begin_serializable().await?,
        }))
    }
}

struct OrderRejectingSession {
    inner: Box<dyn LedgerSession>,
}

#[async_trait]
impl LedgerSession for OrderRejectingSession {
    async fn user_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        self.inner.user_by_id(id).await
    }

    async fn product_by_id(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        self.inner.product_by_id(id).await
    }

    async fn product_for_update(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        self.inner.product_for_update(id).await
    }

    async fn update_product_status(
        &mut self,
        id: i64,
        status: ProductStatus,
        final_price: Option<i64>,
    ) -> Result<(), StoreError> {
        self.inner.update_product_status(id, status, final_price).await
    }

    async fn insert_bid(&mut self, bid: NewBid) -> Result<Bid, StoreError> {
        self.inner.insert_bid(bid).await
    }

    async fn bid_by_id(&mut self, id: i64) -> Result<Option<Bid>, StoreError> {
        self.inner.bid_by_id(id).await
    }

    async fn bid_for_update(&mut self, id: i64) -> Result<Option<Bid>, StoreError> {
        self.inner.bid_for_update(id).await
    }

    async fn update_bid(&mut self, bid: &Bid) -> Result<(), StoreError> {
        self.inner.update_bid(bid).await
    }

    async fn open_bids_for_product(&mut self, product_id: i64) -> Result<Vec<Bid>, StoreError> {
        self.inner.open_bids_for_product(product_id).await
    }

    async fn find_open_bid(
        &mut self,
        product_id: i64,
        buyer_id: i64,
    ) -> Result<Option<Bid>, StoreError> {
        self.inner.find_open_bid(product_id, buyer_id).await
    }

    async fn expired_open_bids(&mut self, now: DateTime<Utc>) -> Result<Vec<Bid>, StoreError> {
        self.inner.expired_open_bids(now).await
    }

    async fn bids_for_product(
        &mut self,
        product_id: i64,
        filter: &BidFilter,
    ) -> Result<(Vec<Bid>, i64), StoreError> {
        self.inner.bids_for_product(product_id, filter).await
    }

    async fn bids_for_buyer(
        &mut self,
        buyer_id: i64,
        filter: &BidFilter,
    ) -> Result<(Vec<Bid>, i64), StoreError> {
        self.inner.bids_for_buyer(buyer_id, filter).await
    }

    async fn status_counts_for_seller(
        &mut self,
        seller_id: i64,
    ) -> Result<Vec<(BidStatus, i64)>, StoreError> {
        self.inner.status_counts_for_seller(seller_id).await
    }

    async fn status_counts_for_buyer(
        &mut self,
        buyer_id: i64,
    ) -> Result<Vec<(BidStatus, i64)>, StoreError> {
        self.inner.status_counts_for_buyer(buyer_id).await
    }

    async fn append_history(&mut self, entry: NewHistoryEntry) -> Result<(), StoreError> {
        self.inner.append_history(entry).await
    }

    async fn history_for_bid(&mut self, bid_id: i64) -> Result<Vec<BidHistoryEntry>, StoreError> {
        self.inner.history_for_bid(bid_id).await
    }

    async fn insert_order(&mut self, _order: NewOrder) -> Result<Order, StoreError> {
        Err(StoreError::Conflict("order insert failed".to_string()))
    }

    async fn order_for_product(&mut self, product_id: i64) -> Result<Option<Order>, StoreError> {
        self.inner.order_for_product(product_id).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}

/// 주문 생성이 실패하면 낙찰 전체가 롤백된다 — 주문 없는 낙찰은 없다
#[tokio::test]
async fn failed_order_insert_rolls_back_the_accept() {
    let env = TestEnv::new();
    let seller = env.ledger.seed_user("farmer", UserRole::Seller, true).await;
    let b1 = env.ledger.seed_user("restaurant", UserRole::Buyer, true).await;
    let b2 = env.ledger.seed_user("grocer", UserRole::Buyer, true).await;
    let product = env.ledger.seed_product(seller.id, "onions 1kg", 50).await;

    let bid1 = place_bid(&env, product.id, b1.id, 100, 10).await;
    let bid2 = place_bid(&env, product.id, b2.id, 105, 20).await;

    let failing = OrderRejectingLedger {
        inner: env.ledger.clone(),
    };
    let err = handle_respond_to_bid(
        bid2.id,
        RespondToBidCommand {
            seller_id: seller.id,
            decision: BidDecision::Accept,
            counter_price: None,
            message: None,
        },
        &failing,
        &env.notifier,
        &env.activity,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Store(_)));

    // 승자도, 배제될 뻔한 경쟁 입찰도, 상품도 그대로다
    let winner = fetch_bid(&env, bid2.id).await;
    assert_eq!(winner.status, BidStatus::Pending);
    let sibling = fetch_bid(&env, bid1.id).await;
    assert_eq!(sibling.status, BidStatus::Pending);

    let product = fetch_product(&env, product.id).await;
    assert_eq!(product.status, ProductStatus::UnderBid);
    assert_eq!(product.final_price, None);

    // 주문도, 낙찰/거절 이력도 남지 않는다
    let mut session = env.ledger.begin().await.unwrap();
    let order = session.order_for_product(product.id).await.unwrap();
    session.rollback().await.unwrap();
    assert!(order.is_none());

    let history = queries::get_bid_history(bid2.id, seller.id, &env.ledger)
        .await
        .unwrap();
    assert!(history.iter().all(|h| h.action == actions::BID_PLACED));

    // 실패 원인이 사라지면 같은 낙찰이 그대로 성공한다
    let accepted = respond(&env, bid2.id, seller.id, BidDecision::Accept, None)
        .await
        .unwrap();
    assert_eq!(accepted.status, BidStatus::Accepted);
}

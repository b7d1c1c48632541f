/// 주문 구체화 (Order Materializer)
/// 낙찰 트랜잭션 안에서 동기적으로 호출되어 구속력 있는 주문 레코드를 만든다.
/// 주문 생성이 실패하면 낙찰 트랜잭션 전체가 롤백된다 — 주문 없는 낙찰은 없다.
// region:    --- Imports
use crate::bidding::model::{Bid, NewOrder, Order, Product};
use crate::error::ServiceError;
use crate::ledger::LedgerSession;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::info;

// endregion: --- Imports

// region:    --- Order Materializer

/// 주문 번호 생성: ORD-<epoch millis>-<영숫자 6자리>
pub fn generate_order_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();
    format!("ORD-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// 낙찰된 입찰로부터 주문 생성
/// 같은 세션(트랜잭션)을 공유하므로 실패 시 입찰/상품/경쟁 입찰 변경까지 함께 롤백된다.
pub async fn materialize_order(
    session: &mut dyn LedgerSession,
    bid: &Bid,
    product: &Product,
) -> Result<Order, ServiceError> {
    let total_amount = bid
        .offered_price
        .checked_mul(bid.quantity)
        .ok_or_else(|| {
            ServiceError::Validation("Order total exceeds the supported amount".to_string())
        })?;

    let order_number = generate_order_number();
    let order = session
        .insert_order(NewOrder {
            order_number,
            product_id: bid.product_id,
            buyer_id: bid.buyer_id,
            seller_id: product.owner_id,
            quantity: bid.quantity,
            price: bid.offered_price,
            total_amount,
        })
        .await?;

    info!(
        "{:<12} --> 주문 생성: number={}, total={}",
        "Order", order.order_number, order.total_amount
    );
    Ok(order)
}

// endregion: --- Order Materializer

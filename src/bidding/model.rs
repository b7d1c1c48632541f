use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// 사용자 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role")]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    #[sqlx(rename = "BUYER")]
    Buyer,
    #[sqlx(rename = "SELLER")]
    Seller,
}

// 상품 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "product_status")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    #[sqlx(rename = "ACTIVE")]
    Active,
    #[sqlx(rename = "UNDER_BID")]
    UnderBid,
    #[sqlx(rename = "SOLD")]
    Sold,
}

// 입찰 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "bid_status")]
#[serde(rename_all = "UPPERCASE")]
pub enum BidStatus {
    #[sqlx(rename = "PENDING")]
    Pending,
    #[sqlx(rename = "COUNTERED")]
    Countered,
    #[sqlx(rename = "ACCEPTED")]
    Accepted,
    #[sqlx(rename = "REJECTED")]
    Rejected,
    #[sqlx(rename = "CANCELLED")]
    Cancelled,
    #[sqlx(rename = "EXPIRED")]
    Expired,
}

impl BidStatus {
    /// 아직 협상 중인 상태인지 (PENDING / COUNTERED)
    pub fn is_open(&self) -> bool {
        matches!(self, BidStatus::Pending | BidStatus::Countered)
    }
}

// 주문 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    #[sqlx(rename = "PENDING")]
    Pending,
    #[sqlx(rename = "CONFIRMED")]
    Confirmed,
    #[sqlx(rename = "CANCELLED")]
    Cancelled,
}

// 결제 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    #[sqlx(rename = "PENDING")]
    Pending,
    #[sqlx(rename = "PAID")]
    Paid,
    #[sqlx(rename = "REFUNDED")]
    Refunded,
}

// 사용자 모델 (신원 시스템의 읽기 전용 프로젝션)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub role: UserRole,
    pub contact_verified: bool,
}

// 상품 모델
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub status: ProductStatus,
    pub quantity: i64,
    pub final_price: Option<i64>,
    pub created_at: DateTime<Utc>,
}

// 입찰 모델
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: i64,
    pub product_id: i64,
    pub buyer_id: i64,
    pub offered_price: i64,
    pub counter_price: Option<i64>,
    pub quantity: i64,
    pub status: BidStatus,
    pub negotiation_round: i32,
    pub expires_at: DateTime<Utc>,
    pub message: Option<String>,
    pub counter_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Bid {
    /// 만료 시각이 지났는지
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// 새 입찰의 유효 기간 (24시간)
pub fn bid_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(24)
}

// 입찰 생성 페이로드
#[derive(Debug, Clone)]
pub struct NewBid {
    pub product_id: i64,
    pub buyer_id: i64,
    pub offered_price: i64,
    pub quantity: i64,
    pub message: Option<String>,
    pub expires_at: DateTime<Utc>,
}

// 입찰 이력 모델 (append-only)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BidHistoryEntry {
    pub id: i64,
    pub bid_id: i64,
    pub action: String,
    pub price: Option<i64>,
    pub message: Option<String>,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

// 입찰 이력 추가 페이로드
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub bid_id: i64,
    pub action: String,
    pub price: Option<i64>,
    pub message: Option<String>,
    /// None이면 시스템(만료 스위퍼)에 의한 전이
    pub user_id: Option<i64>,
}

// 주문 모델
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub product_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub quantity: i64,
    pub price: i64,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

// 주문 생성 페이로드
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub product_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub quantity: i64,
    pub price: i64,
    pub total_amount: i64,
}

// region:    --- History Actions

/// 입찰 이력 액션 식별자
pub mod actions {
    pub const BID_PLACED: &str = "BID_PLACED";
    pub const BID_ACCEPTED: &str = "BID_ACCEPTED";
    pub const BID_REJECTED: &str = "BID_REJECTED";
    pub const BID_COUNTERED: &str = "BID_COUNTERED";
    pub const BID_COUNTERED_BY_BUYER: &str = "BID_COUNTERED_BY_BUYER";
    pub const BID_CANCELLED: &str = "BID_CANCELLED";
    pub const BID_EXPIRED: &str = "BID_EXPIRED";
}

// endregion: --- History Actions

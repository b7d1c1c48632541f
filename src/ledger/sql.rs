/// 사용자 조회
pub const GET_USER: &str = "SELECT id, name, role, contact_verified FROM users WHERE id = $1";

/// 상품 조회
pub const GET_PRODUCT: &str =
    "SELECT id, owner_id, title, status, quantity, final_price, created_at FROM products WHERE id = $1";

/// 상품 조회 (행 잠금)
pub const GET_PRODUCT_FOR_UPDATE: &str =
    "SELECT id, owner_id, title, status, quantity, final_price, created_at FROM products WHERE id = $1 FOR UPDATE";

/// 상품 상태 갱신 (final_price는 전달된 경우에만 변경)
pub const UPDATE_PRODUCT_STATUS: &str =
    "UPDATE products SET status = $2, final_price = COALESCE($3, final_price) WHERE id = $1";

/// 입찰 생성
pub const INSERT_BID: &str = r#"
    INSERT INTO bids (product_id, buyer_id, offered_price, quantity, status, negotiation_round, expires_at, message)
    VALUES ($1, $2, $3, $4, 'PENDING', 1, $5, $6)
    RETURNING id, product_id, buyer_id, offered_price, counter_price, quantity, status, negotiation_round, expires_at, message, counter_message, created_at
"#;

/// 입찰 조회
pub const GET_BID: &str = r#"
    SELECT id, product_id, buyer_id, offered_price, counter_price, quantity, status, negotiation_round, expires_at, message, counter_message, created_at
    FROM bids WHERE id = $1
"#;

/// 입찰 조회 (행 잠금)
pub const GET_BID_FOR_UPDATE: &str = r#"
    SELECT id, product_id, buyer_id, offered_price, counter_price, quantity, status, negotiation_round, expires_at, message, counter_message, created_at
    FROM bids WHERE id = $1 FOR UPDATE
"#;

/// 입찰 갱신
pub const UPDATE_BID: &str = r#"
    UPDATE bids
    SET offered_price = $2, counter_price = $3, status = $4, negotiation_round = $5,
        expires_at = $6, message = $7, counter_message = $8
    WHERE id = $1
"#;

/// 상품의 열린 입찰 전체
pub const GET_OPEN_BIDS: &str = r#"
    SELECT id, product_id, buyer_id, offered_price, counter_price, quantity, status, negotiation_round, expires_at, message, counter_message, created_at
    FROM bids
    WHERE product_id = $1 AND status IN ('PENDING', 'COUNTERED')
    ORDER BY id
"#;

/// 구매자의 열린 입찰 (중복 검사)
pub const FIND_OPEN_BID: &str = r#"
    SELECT id, product_id, buyer_id, offered_price, counter_price, quantity, status, negotiation_round, expires_at, message, counter_message, created_at
    FROM bids
    WHERE product_id = $1 AND buyer_id = $2 AND status IN ('PENDING', 'COUNTERED')
    LIMIT 1
"#;

/// 만료된 열린 입찰 전체 (행 잠금)
pub const GET_EXPIRED_OPEN_BIDS: &str = r#"
    SELECT id, product_id, buyer_id, offered_price, counter_price, quantity, status, negotiation_round, expires_at, message, counter_message, created_at
    FROM bids
    WHERE status IN ('PENDING', 'COUNTERED') AND expires_at < $1
    ORDER BY id
    FOR UPDATE
"#;

/// 상품 입찰 목록 (페이지네이션)
pub const LIST_PRODUCT_BIDS: &str = r#"
    SELECT id, product_id, buyer_id, offered_price, counter_price, quantity, status, negotiation_round, expires_at, message, counter_message, created_at
    FROM bids
    WHERE product_id = $1 AND ($2::bid_status IS NULL OR status = $2)
    ORDER BY created_at DESC, id DESC
    LIMIT $3 OFFSET $4
"#;

/// 상품 입찰 건수
pub const COUNT_PRODUCT_BIDS: &str =
    "SELECT COUNT(*) FROM bids WHERE product_id = $1 AND ($2::bid_status IS NULL OR status = $2)";

/// 구매자 입찰 목록 (페이지네이션)
pub const LIST_BUYER_BIDS: &str = r#"
    SELECT id, product_id, buyer_id, offered_price, counter_price, quantity, status, negotiation_round, expires_at, message, counter_message, created_at
    FROM bids
    WHERE buyer_id = $1 AND ($2::bid_status IS NULL OR status = $2)
    ORDER BY created_at DESC, id DESC
    LIMIT $3 OFFSET $4
"#;

/// 구매자 입찰 건수
pub const COUNT_BUYER_BIDS: &str =
    "SELECT COUNT(*) FROM bids WHERE buyer_id = $1 AND ($2::bid_status IS NULL OR status = $2)";

/// 판매자 상품 입찰의 상태별 건수
pub const SELLER_STATUS_COUNTS: &str = r#"
    SELECT b.status, COUNT(*) AS count
    FROM bids b
    JOIN products p ON p.id = b.product_id
    WHERE p.owner_id = $1
    GROUP BY b.status
"#;

/// 구매자 입찰의 상태별 건수
pub const BUYER_STATUS_COUNTS: &str =
    "SELECT status, COUNT(*) AS count FROM bids WHERE buyer_id = $1 GROUP BY status";

/// 입찰 이력 추가
pub const INSERT_HISTORY: &str = r#"
    INSERT INTO bid_history (bid_id, action, price, message, user_id)
    VALUES ($1, $2, $3, $4, $5)
"#;

/// 입찰 이력 조회
pub const GET_BID_HISTORY: &str = r#"
    SELECT id, bid_id, action, price, message, user_id, created_at
    FROM bid_history
    WHERE bid_id = $1
    ORDER BY created_at, id
"#;

/// 주문 생성
pub const INSERT_ORDER: &str = r#"
    INSERT INTO orders (order_number, product_id, buyer_id, seller_id, quantity, price, total_amount, status, payment_status)
    VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING', 'PENDING')
    RETURNING id, order_number, product_id, buyer_id, seller_id, quantity, price, total_amount, status, payment_status, created_at
"#;

/// 상품 주문 조회
pub const GET_ORDER_FOR_PRODUCT: &str = r#"
    SELECT id, order_number, product_id, buyer_id, seller_id, quantity, price, total_amount, status, payment_status, created_at
    FROM orders
    WHERE product_id = $1
"#;

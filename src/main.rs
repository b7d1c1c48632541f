// region:    --- Imports
use crate::audit::PgActivityLog;
use crate::database::DatabaseManager;
use crate::handlers::AppState;
use crate::ledger::PostgresLedger;
use crate::notify::KafkaNotifier;
use crate::sweeper::ExpirationSweeper;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
// endregion: --- Imports

// region:    --- Modules
mod audit;
mod bidding;
mod database;
mod error;
mod handlers;
mod ledger;
mod notify;
mod orders;
mod sweeper;

// endregion: --- Modules

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // DatabaseManager 생성
    let db_manager = DatabaseManager::new().await?;

    // 데이터베이스 초기화 (INIT_DB=1 일 때만 스키마 재생성)
    if std::env::var("INIT_DB").map(|v| v == "1").unwrap_or(false) {
        if let Err(e) = db_manager.initialize_database().await {
            error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
            return Err(e.into());
        }
        info!("{:<12} --> 데이터베이스 초기화 성공", "Main");
    }

    // 알림 게이트웨이 생성
    let brokers = std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
    if let Err(e) = KafkaNotifier::ensure_topic(&brokers).await {
        // 알림은 베스트 에포트라 기동을 막지 않는다
        warn!("{:<12} --> 알림 토픽 준비 실패: {}", "Main", e);
    }
    let notifier = Arc::new(KafkaNotifier::new(&brokers).map_err(Box::<dyn std::error::Error>::from)?);

    // 원장 / 감사 로그
    let ledger = Arc::new(PostgresLedger::new(db_manager.pool()));
    let activity = Arc::new(PgActivityLog::new(db_manager.pool()));

    let state = AppState {
        ledger: ledger.clone(),
        notifier,
        activity,
    };

    // 만료 스위퍼: 주기 설정이 있으면 프로세스 내 루프, 없으면 외부 트리거 전용
    let sweeper = ExpirationSweeper::new(ledger);
    if let Ok(secs) = std::env::var("SWEEP_INTERVAL_SECS") {
        let secs: u64 = secs.parse()?;
        sweeper.start(secs);
        info!("{:<12} --> 만료 스위퍼 시작: {}초 간격", "Main", secs);
    }

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 라우터 설정
    let routes_all = Router::new()
        .route("/bids", post(handlers::handle_post_bid))
        .route("/bids/stats", get(handlers::handle_get_bid_stats))
        .route("/bids/expire", post(handlers::handle_post_expire))
        .route(
            "/bids/:id",
            get(handlers::handle_get_bid).delete(handlers::handle_delete_bid),
        )
        .route("/bids/:id/respond", post(handlers::handle_post_respond))
        .route("/bids/:id/counter", post(handlers::handle_post_counter))
        .route("/bids/:id/history", get(handlers::handle_get_bid_history))
        .route(
            "/products/:id/bids",
            get(handlers::handle_get_product_bids),
        )
        .route("/buyers/:id/bids", get(handlers::handle_get_buyer_bids))
        .layer(cors)
        .with_state(state);

    // 리스너 생성
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main

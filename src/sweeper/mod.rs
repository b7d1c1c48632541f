/// 입찰 만료 스위퍼
/// 만료 처리는 자체 트랜잭션으로 완결되는 멱등 연산이라 외부 스케줄러(크론 등)가
/// HTTP 트리거로 호출해도 되고, SWEEP_INTERVAL_SECS가 설정된 배포에서는
/// 프로세스 내 주기 루프로도 돌릴 수 있다.
// region:    --- Imports
use crate::bidding::commands::handle_expire_old_bids;
use crate::ledger::Ledger;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error};

// endregion: --- Imports

// region:    --- Expiration Sweeper

pub struct ExpirationSweeper {
    ledger: Arc<dyn Ledger>,
}

impl ExpirationSweeper {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// 1회 실행: 만료된 입찰 수를 반환
    pub async fn run_once(&self) -> Result<u64, crate::error::ServiceError> {
        handle_expire_old_bids(self.ledger.as_ref()).await
    }

    /// 주기 실행 루프 시작
    pub fn start(&self, interval_secs: u64) {
        let ledger = Arc::clone(&self.ledger);
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                match handle_expire_old_bids(ledger.as_ref()).await {
                    Ok(count) if count > 0 => {
                        debug!("{:<12} --> 만료된 입찰 {}건 정리", "Sweeper", count)
                    }
                    Ok(_) => {}
                    Err(e) => error!("{:<12} --> 만료 처리 중 오류 발생: {:?}", "Sweeper", e),
                }
            }
        });
    }
}

// endregion: --- Expiration Sweeper

/// 알림 게이트웨이
/// 상태 전이 시 베스트 에포트로 알림 메시지를 발행한다.
/// 실패는 로그로만 관측되고 호출한 트랜잭션의 결과에는 영향을 주지 않는다.
// region:    --- Imports
use crate::bidding::model::BidStatus;
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

// endregion: --- Imports

/// 알림 토픽 이름
pub const NOTIFICATIONS_TOPIC: &str = "notifications";

// region:    --- Notification Messages

/// 발행되는 알림 페이로드
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationMessage {
    BidReceived {
        seller_id: i64,
        buyer_label: String,
        product_label: String,
        price: i64,
    },
    BidStatusUpdate {
        buyer_id: i64,
        product_label: String,
        status: BidStatus,
    },
    OrderCreated {
        buyer_id: i64,
        seller_id: i64,
        product_label: String,
        order_number: String,
    },
}

impl NotificationMessage {
    /// 파티셔닝 키 (수신자 기준)
    pub fn key(&self) -> String {
        match self {
            NotificationMessage::BidReceived { seller_id, .. } => seller_id.to_string(),
            NotificationMessage::BidStatusUpdate { buyer_id, .. } => buyer_id.to_string(),
            NotificationMessage::OrderCreated { buyer_id, .. } => buyer_id.to_string(),
        }
    }
}

// endregion: --- Notification Messages

// region:    --- Notifier Trait

/// 알림 발행자
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 메시지 발행 (실패해도 호출자에게 전파하지 않는다)
    async fn publish(&self, message: NotificationMessage);
}

/// 테스트/비활성 환경용
#[derive(Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn publish(&self, message: NotificationMessage) {
        debug!("{:<12} --> 알림 생략: {:?}", "Notifier", message);
    }
}

// endregion: --- Notifier Trait

// region:    --- Kafka Notifier

pub struct KafkaNotifier {
    producer: Arc<FutureProducer>,
}

impl KafkaNotifier {
    pub fn new(brokers: &str) -> Result<Self, String> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| format!("Producer creation error: {:?}", e))?;

        Ok(KafkaNotifier {
            producer: Arc::new(producer),
        })
    }

    /// 알림 토픽 생성 (이미 있으면 무시)
    pub async fn ensure_topic(brokers: &str) -> Result<(), String> {
        info!(
            "{:<12} --> 알림 토픽 생성 시작: {}",
            "Notifier", NOTIFICATIONS_TOPIC
        );

        let admin_client: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .create()
            .map_err(|e| format!("AdminClient 생성 실패: {:?}", e))?;

        let new_topic = NewTopic::new(NOTIFICATIONS_TOPIC, 1, TopicReplication::Fixed(1));
        admin_client
            .create_topics(&[new_topic], &AdminOptions::new())
            .await
            .map_err(|e| format!("토픽 생성 실패: {:?}", e))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for KafkaNotifier {
    async fn publish(&self, message: NotificationMessage) {
        let producer = Arc::clone(&self.producer);
        // 분리된 태스크로 발행해 호출 경로를 막지 않는다
        tokio::spawn(async move {
            let key = message.key();
            let payload = match serde_json::to_string(&message) {
                Ok(payload) => payload,
                Err(e) => {
                    error!("{:<12} --> 알림 직렬화 오류: {:?}", "Notifier", e);
                    return;
                }
            };

            let record = FutureRecord::to(NOTIFICATIONS_TOPIC)
                .key(&key)
                .payload(&payload);

            match producer.send(record, Duration::from_secs(0)).await {
                Ok(_) => info!(
                    "{:<12} --> 알림 발행: topic={}, key={}",
                    "Notifier", NOTIFICATIONS_TOPIC, key
                ),
                Err((e, _)) => error!("{:<12} --> 알림 발행 실패: {:?}", "Notifier", e),
            }
        });
    }
}

// endregion: --- Kafka Notifier

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_key_targets_the_recipient() {
        let msg = NotificationMessage::BidReceived {
            seller_id: 7,
            buyer_label: "Acme Traders".into(),
            product_label: "Tomatoes".into(),
            price: 105,
        };
        assert_eq!(msg.key(), "7");

        let msg = NotificationMessage::BidStatusUpdate {
            buyer_id: 11,
            product_label: "Tomatoes".into(),
            status: BidStatus::Accepted,
        };
        assert_eq!(msg.key(), "11");
    }

    #[test]
    fn payload_is_tagged_json() {
        let msg = NotificationMessage::OrderCreated {
            buyer_id: 1,
            seller_id: 2,
            product_label: "Wheat".into(),
            order_number: "ORD-1-ABC123".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "ORDER_CREATED");
        assert_eq!(json["order_number"], "ORD-1-ABC123");
    }
}

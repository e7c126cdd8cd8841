//! Message bus publish contract
//!
//! The bus itself is an external collaborator; this module carries the
//! publish contract, the producer tuning the deployment expects (acks=all,
//! idempotence, bounded in-flight), and a retrying publisher that hands
//! records to the bus gateway over HTTP. Records are keyed
//! `client_id-record_id` so one client's records route consistently.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::BusConfig;
use crate::models::UserRecord;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("record could not be serialized: {0}")]
    Serialization(String),
    #[error("publish failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Acknowledgement from the bus; partition/offset are best-effort metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishAck {
    pub partition: Option<i32>,
    pub offset: Option<i64>,
}

#[async_trait]
pub trait RecordPublisher: Send + Sync {
    async fn publish(&self, record: &UserRecord) -> Result<PublishAck, PublishError>;
}

/// Message key for a record: `client_id-record_id`.
pub fn record_key(record: &UserRecord) -> String {
    format!("{}-{}", record.client_id, record.id)
}

#[derive(Debug, Serialize)]
struct GatewayMessage {
    key: String,
    value: serde_json::Value,
}

/// Publishes records to the bus gateway with exponential backoff
/// (base 1s, doubled per attempt, 3 attempts by default).
pub struct GatewayPublisher {
    http: reqwest::Client,
    config: BusConfig,
    publish_url: String,
}

impl GatewayPublisher {
    pub fn new(config: BusConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.publish_timeout_secs))
            .build()?;
        let publish_url = format!(
            "{}/topics/{}",
            config.gateway_url.trim_end_matches('/'),
            config.topic
        );
        info!(
            "bus publisher configured: topic={}, acks={}, idempotence={}, max_in_flight={}, producer_retries={}",
            config.topic,
            config.acks,
            config.idempotence,
            config.max_in_flight,
            config.producer_retries
        );
        Ok(Self {
            http,
            config,
            publish_url,
        })
    }

    async fn attempt(&self, message: &GatewayMessage) -> Result<PublishAck, String> {
        let response = self
            .http
            .post(&self.publish_url)
            .json(message)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("gateway returned {}", response.status()));
        }
        // Gateways that return no body still count as acknowledged
        Ok(response.json::<PublishAck>().await.unwrap_or_default())
    }
}

#[async_trait]
impl RecordPublisher for GatewayPublisher {
    async fn publish(&self, record: &UserRecord) -> Result<PublishAck, PublishError> {
        let value = serde_json::to_value(record)
            .map_err(|e| PublishError::Serialization(e.to_string()))?;
        let message = GatewayMessage {
            key: record_key(record),
            value,
        };

        let attempts = self.config.publish_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.attempt(&message).await {
                Ok(ack) => {
                    debug!(
                        "record {} published to {} (partition {:?}, offset {:?})",
                        record.id, self.config.topic, ack.partition, ack.offset
                    );
                    return Ok(ack);
                }
                Err(e) => {
                    warn!(
                        "publish attempt {}/{} for record {} failed: {}",
                        attempt, attempts, record.id, e
                    );
                    last_error = e;
                    if attempt < attempts {
                        let backoff = Duration::from_secs(self.config.publish_backoff_secs)
                            * 2u32.pow(attempt - 1);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
        Err(PublishError::Exhausted {
            attempts,
            last_error,
        })
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-process publisher capturing keys and values, optionally failing
    /// every record of chosen clients.
    #[derive(Default)]
    pub struct MemoryPublisher {
        published: Mutex<Vec<(String, serde_json::Value)>>,
        fail_clients: Mutex<HashSet<String>>,
    }

    impl MemoryPublisher {
        pub fn published(&self) -> Vec<(String, serde_json::Value)> {
            self.published.lock().unwrap().clone()
        }

        pub fn published_count(&self) -> usize {
            self.published.lock().unwrap().len()
        }

        pub fn fail_client(&self, client_id: &str) {
            self.fail_clients
                .lock()
                .unwrap()
                .insert(client_id.to_string());
        }
    }

    #[async_trait]
    impl RecordPublisher for MemoryPublisher {
        async fn publish(&self, record: &UserRecord) -> Result<PublishAck, PublishError> {
            if self.fail_clients.lock().unwrap().contains(&record.client_id) {
                return Err(PublishError::Exhausted {
                    attempts: 1,
                    last_error: "simulated publish failure".to_string(),
                });
            }
            let value = serde_json::to_value(record)
                .map_err(|e| PublishError::Serialization(e.to_string()))?;
            let mut published = self.published.lock().unwrap();
            published.push((record_key(record), value));
            Ok(PublishAck {
                partition: Some(0),
                offset: Some(published.len() as i64 - 1),
            })
        }
    }
}

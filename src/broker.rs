use std::future::Future;

use async_nats::{Client, HeaderMap, ServerAddr};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use crate::metric::{Fields, MetricKey};

/// NATS header carrying the JSON encoded [`MetricKey`].
pub const KEY_HEADER: &str = "Metric-Key";

/// One outbound unit: a key identifying the metric and its field map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyedMessage {
    pub topic: String,
    pub key: MetricKey,
    pub value: Fields,
}

/// Destination of published metric batches.
pub trait Broker: Send + 'static {
    type Error: std::fmt::Display + Send;

    /// Sends the whole batch, resolving once it has been handed to the transport.
    fn send(
        &mut self,
        batch: Vec<KeyedMessage>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Possible failure while sending a batch over NATS.
#[derive(Debug, Error)]
pub enum NatsBrokerError {
    #[error("Connect; err={0}")]
    Connect(#[from] async_nats::ConnectError),
    #[error("Serialize; err={0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Publish; err={0}")]
    Publish(#[from] async_nats::client::PublishError),
    #[error("Flush; err={0}")]
    Flush(#[from] async_nats::client::FlushError),
}

/// Publishes batches to NATS, connecting on first use.
#[derive(Debug)]
pub struct NatsBroker {
    servers: Vec<ServerAddr>,
    client: OnceCell<Client>,
}

impl NatsBroker {
    #[must_use]
    pub fn new(servers: Vec<ServerAddr>) -> NatsBroker {
        NatsBroker { servers, client: OnceCell::new() }
    }

    async fn client(&self) -> Result<&Client, NatsBrokerError> {
        self.client
            .get_or_try_init(|| async {
                let client = async_nats::connect(&self.servers).await?;
                info!(servers = ?self.servers, "Connected to NATS");

                Ok::<_, NatsBrokerError>(client)
            })
            .await
    }
}

impl Broker for NatsBroker {
    type Error = NatsBrokerError;

    async fn send(&mut self, batch: Vec<KeyedMessage>) -> Result<(), Self::Error> {
        let client = self.client().await?;

        for KeyedMessage { topic, key, value } in batch {
            let mut headers = HeaderMap::new();
            headers.insert(KEY_HEADER, serde_json::to_string(&key)?.as_str());
            let payload = serde_json::to_vec(&value)?;

            client
                .publish_with_headers(topic, headers, payload.into())
                .await?;
        }

        // Publishes are fire-and-forget; flushing bounds the send to the socket write.
        client.flush().await?;

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;
    use crate::metric::{FieldValue, MetricKind};

    #[test]
    fn serialize_keyed_message() {
        let message = KeyedMessage {
            topic: "metrics".to_string(),
            key: MetricKey {
                name: "requests.count".to_string(),
                kind: MetricKind::Counter,
                timestamp_ms: 123,
            },
            value: Fields::from_iter([("count", FieldValue::Count(42))]),
        };

        expect![[r#"
            {
              "topic": "metrics",
              "key": {
                "name": "requests.count",
                "kind": "counter",
                "timestamp_ms": 123
              },
              "value": {
                "count": 42
              }
            }"#]]
        .assert_eq(&serde_json::to_string_pretty(&message).unwrap());
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connect_error() {
        let mut broker = NatsBroker::new(vec!["nats://127.0.0.1:1".parse().unwrap()]);

        let err = broker.send(Vec::new()).await.unwrap_err();

        assert!(matches!(err, NatsBrokerError::Connect(_)), "{err}");
    }
}

//! Redis pub/sub-backed event bus (optional).
//!
//! Pub/sub is not durable: subscribers that are offline miss messages. That is
//! acceptable for ledger events because the movement log remains the source of
//! truth and consumers already tolerate gaps.

use std::marker::PhantomData;
use std::sync::mpsc;
use std::thread;

use redis::Commands;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use stockledger_events::{EventBus, Subscription};

#[derive(Debug, Error)]
pub enum RedisBusError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Redis pub/sub bus publishing JSON-encoded messages on one channel.
#[derive(Debug)]
pub struct RedisPubSubEventBus<M> {
    client: redis::Client,
    channel: String,
    _message: PhantomData<fn() -> M>,
}

impl<M> Clone for RedisPubSubEventBus<M> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            channel: self.channel.clone(),
            _message: PhantomData,
        }
    }
}

impl<M> RedisPubSubEventBus<M> {
    pub fn new(redis_url: impl AsRef<str>, channel: impl Into<String>) -> Result<Self, RedisBusError> {
        let client = redis::Client::open(redis_url.as_ref())?;
        Ok(Self {
            client,
            channel: channel.into(),
            _message: PhantomData,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl<M> EventBus<M> for RedisPubSubEventBus<M>
where
    M: Serialize + DeserializeOwned + Send + 'static,
{
    type Error = RedisBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let payload = serde_json::to_string(&message)?;

        let mut conn = self.client.get_connection()?;
        let receivers: i64 = conn.publish(&self.channel, payload)?;
        debug!(channel = %self.channel, receivers, "published to redis");

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        let client = self.client.clone();
        let channel = self.channel.clone();

        // Forwarding thread; ends when the subscription is dropped or the connection fails.
        thread::spawn(move || {
            let mut conn = match client.get_connection() {
                Ok(c) => c,
                Err(err) => {
                    warn!(error = %err, "redis subscription could not connect");
                    return;
                }
            };

            let mut pubsub = conn.as_pubsub();
            if let Err(err) = pubsub.subscribe(&channel) {
                warn!(channel = %channel, error = %err, "redis subscribe failed");
                return;
            }

            loop {
                let msg = match pubsub.get_message() {
                    Ok(m) => m,
                    Err(err) => {
                        warn!(channel = %channel, error = %err, "redis subscription closed");
                        return;
                    }
                };

                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };

                let message: M = match serde_json::from_str(&payload) {
                    Ok(m) => m,
                    Err(err) => {
                        warn!(channel = %channel, error = %err, "skipping undecodable message");
                        continue;
                    }
                };

                if tx.send(message).is_err() {
                    return;
                }
            }
        });

        Subscription::new(rx)
    }
}

//! # Redis
//!
//! Durable backing for leader documents.
//!
//! ## Requirements
//!
//! - One small JSON document per tracking session
//! - Reads every couple of seconds from every polling follower
//! - Writes every few seconds from each leader device
//! - Must survive server restarts, unlike process memory or `/tmp`
//!
//! ## Implementation
//!
//! - One string key per session, `<prefix>:<session>`, holding the whole
//!   document as JSON
//! - A read or write is a single round trip
//! - Connection manager handles reconnects; timeouts are bounded so a
//!   dead backend surfaces as `StoreError::Unavailable` instead of a
//!   hung request

use std::time::Duration;

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::warn;

use crate::{
    leader::LeaderState,
    store::{LeaderStore, StoreError},
};

pub async fn init_redis(redis_url: &str) -> ConnectionManager {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100))
        .set_response_timeout(Duration::from_millis(250));

    let client = Client::open(redis_url).unwrap();

    client
        .get_connection_manager_with_config(config)
        .await
        .unwrap()
}

pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Self {
        Self {
            connection: init_redis(redis_url).await,
        }
    }
}

#[async_trait]
impl LeaderStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<LeaderState>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection
            .get(key)
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(document) => Ok(Some(document)),
            Err(err) => {
                // An unreadable blob reads as absent; the next update
                // rewrites it.
                warn!("Discarding unreadable document at {key}: {err}");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, document: &LeaderState) -> Result<(), StoreError> {
        let raw = serde_json::to_string(document)?;

        let mut connection = self.connection.clone();
        let () = connection
            .set(key, raw)
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        Ok(())
    }
}

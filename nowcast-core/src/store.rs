//! Durable token persistence
//!
//! The engine never caches tokens in memory across ticks: both tokens are
//! re-read from the store on every use, so an external update (or a process
//! restart) is always observed on the very next cycle.

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands};

use crate::error::Result;

/// Store key for the upstream access token.
pub const ACCESS_TOKEN_KEY: &str = "spotify_access_token";
/// Store key for the upstream refresh token.
pub const REFRESH_TOKEN_KEY: &str = "spotify_refresh_token";

/// Durable key/value persistence for the token pair.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Redis-backed token store over a multiplexed connection.
pub struct RedisTokenStore {
    connection: MultiplexedConnection,
}

impl RedisTokenStore {
    /// Connect to Redis. A failure here is fatal to the process: without
    /// the store there is no refresh token to poll with.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }
}

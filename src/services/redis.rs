//! Redis access for short-lived records

use redis::{AsyncCommands, Client};

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct RedisService {
    client: Client,
}

impl RedisService {
    /// Create a new Redis service
    pub async fn new(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

        // Test connection
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;

        Ok(Self { client })
    }

    /// Client that connects on first use
    pub fn lazy(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;
        Ok(Self { client })
    }

    /// Get a Redis connection
    pub async fn get_connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))
    }

    /// Store a value that expires after `ttl_seconds`
    pub async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> AppResult<()> {
        let mut conn = self.get_connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store {} in Redis: {}", key, e)))
    }

    /// Atomically bump a counter and (re)arm its expiry; returns the new value
    pub async fn incr_ex(&self, key: &str, ttl_seconds: u64) -> AppResult<u32> {
        let mut conn = self.get_connection().await?;
        let (count,): (u32,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_seconds)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to increment {} in Redis: {}", key, e)))?;
        Ok(count)
    }

    pub async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.get_connection().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read {} from Redis: {}", key, e)))
    }

    /// Delete a key; false when it was already gone
    pub async fn del(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.get_connection().await?;
        let removed: u32 = conn
            .del(key)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to delete {} from Redis: {}", key, e)))?;
        Ok(removed > 0)
    }
}

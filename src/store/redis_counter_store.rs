use std::collections::HashMap;

use async_trait::async_trait;
use redis::{Client, Script, aio::ConnectionManager};

use crate::{CounterStore, LimitCacheError, StoreError};

// INCRBY on its own would create the key without a TTL, so only existing keys are
// incremented here and absent ones go through create_if_absent.
const INCREMENT_EXISTING_SCRIPT: &str = r#"
    local key = KEYS[1]
    local by = tonumber(ARGV[1])

    if redis.call("EXISTS", key) == 0 then
        return -1
    end

    return redis.call("INCRBY", key, by)
"#;

/// [`CounterStore`] backed by Redis.
///
/// - `batch_get`: a single `MGET`
/// - `increment`: Lua script incrementing existing keys only
/// - `create_if_absent`: `SET key value NX EX ttl`
///
/// Connection pooling and reconnection are handled by
/// [`ConnectionManager`]; timeouts and retries are whatever it is configured with.
#[derive(Clone)]
pub struct RedisCounterStore {
    connection_manager: ConnectionManager,
    increment_script: Script,
}

impl RedisCounterStore {
    /// Wrap an existing connection manager.
    pub fn new(connection_manager: ConnectionManager) -> Self {
        Self {
            connection_manager,
            increment_script: Script::new(INCREMENT_EXISTING_SCRIPT),
        }
    }

    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/`).
    ///
    /// Fails if the URL is invalid or the server cannot be reached, so a
    /// misconfigured endpoint surfaces at startup rather than per request.
    pub async fn from_url(url: &str) -> Result<Self, LimitCacheError> {
        let client = Client::open(url)?;
        let connection_manager = client.get_connection_manager().await?;

        Ok(Self::new(connection_manager))
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn batch_get(&self, keys: &[String]) -> Result<HashMap<String, u64>, StoreError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut connection_manager = self.connection_manager.clone();

        let values: Vec<Option<u64>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut connection_manager)
            .await?;

        Ok(keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|value| (key.clone(), value)))
            .collect())
    }

    async fn increment(&self, key: &str, by: u64) -> Result<u64, StoreError> {
        let mut connection_manager = self.connection_manager.clone();

        let value: i64 = self
            .increment_script
            .key(key)
            .arg(by)
            .invoke_async(&mut connection_manager)
            .await?;

        u64::try_from(value).map_err(|_| StoreError::NotFound)
    }

    async fn create_if_absent(
        &self,
        key: &str,
        initial: u64,
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        let mut connection_manager = self.connection_manager.clone();

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(initial)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut connection_manager)
            .await?;

        match reply {
            Some(_) => Ok(()),
            None => Err(StoreError::AlreadyExists),
        }
    }

    async fn flush(&self) -> Result<(), StoreError> {
        tracing::debug!("redis counter store has no buffered writes to flush");
        Ok(())
    }
}

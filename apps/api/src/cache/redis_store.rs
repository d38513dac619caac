use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::FromRedisValue;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{CacheError, CacheKey, CacheStore};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);
/// After a failure, calls skip the network for this long.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Link {
    conn: Option<MultiplexedConnection>,
    down_until: Option<Instant>,
}

impl Link {
    fn mark_down(&mut self) {
        self.conn = None;
        self.down_until = Some(Instant::now() + RECONNECT_BACKOFF);
    }
}

/// Shared store on a Redis server (plain `GET`, atomic `SETEX`, `FLUSHDB`).
///
/// Strings are stored verbatim, everything else as JSON text. On read, JSON objects and arrays
/// come back parsed and any other text comes back as a string.
pub struct RedisCache {
    client: redis::Client,
    link: Mutex<Link>,
    default_ttl: Duration,
}

impl RedisCache {
    /// Opening the client only validates the URL; the first command connects.
    pub fn new(url: &str, default_ttl: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Unavailable(format!("invalid redis URL: {e}")))?;
        let info = client.get_connection_info();
        info!(
            "RedisCache initialized at {} (db={})",
            info.addr, info.redis.db
        );
        Ok(Self {
            client,
            link: Mutex::new(Link::default()),
            default_ttl,
        })
    }

    /// Callers queued behind a failing connect find the backoff set and return at once.
    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut link = self.link.lock().await;
        if let Some(conn) = link.conn.as_ref() {
            return Ok(conn.clone());
        }
        if let Some(until) = link.down_until {
            if Instant::now() < until {
                return Err(CacheError::Unavailable(
                    "backing off after a failed connection".to_string(),
                ));
            }
        }

        let outcome = tokio::time::timeout(
            CONNECT_TIMEOUT,
            self.client.get_multiplexed_async_connection(),
        )
        .await;
        let err = match outcome {
            Ok(Ok(conn)) => {
                link.conn = Some(conn.clone());
                link.down_until = None;
                return Ok(conn);
            }
            Ok(Err(e)) => CacheError::Unavailable(format!("connect failed: {e}")),
            Err(_) => CacheError::Unavailable(format!(
                "connect timed out after {}s",
                CONNECT_TIMEOUT.as_secs()
            )),
        };
        link.mark_down();
        Err(err)
    }

    /// Runs one command. Any failure drops the connection and starts the backoff.
    async fn run<T>(&self, cmd: redis::Cmd) -> Result<T, CacheError>
    where
        T: FromRedisValue + Send,
    {
        let mut conn = self.connection().await?;
        let outcome = tokio::time::timeout(COMMAND_TIMEOUT, cmd.query_async::<_, T>(&mut conn)).await;

        let err = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => CacheError::Unavailable(e.to_string()),
            Err(_) => CacheError::Unavailable(format!(
                "command timed out after {}s",
                COMMAND_TIMEOUT.as_secs()
            )),
        };
        self.link.lock().await.mark_down();
        Err(err)
    }

    async fn try_get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key.as_str());
        let raw: Option<String> = self.run(cmd).await?;
        Ok(raw.map(decode_value))
    }

    async fn try_set(&self, key: &CacheKey, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let encoded = encode_value(value)?;
        let mut cmd = redis::cmd("SETEX");
        cmd.arg(key.as_str()).arg(ttl_seconds(ttl)).arg(encoded);
        self.run::<()>(cmd).await
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &CacheKey) -> Option<Value> {
        match self.try_get(key).await {
            Ok(Some(value)) => {
                debug!(cache_key = %key, "[CACHE HIT] redis");
                Some(value)
            }
            Ok(None) => {
                debug!(cache_key = %key, "[CACHE MISS] redis");
                None
            }
            Err(e) => {
                warn!(cache_key = %key, "Cache read degraded to miss: {e}");
                None
            }
        }
    }

    async fn set(&self, key: &CacheKey, value: &Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        match self.try_set(key, value, ttl).await {
            Ok(()) => debug!(cache_key = %key, ttl_secs = ttl_seconds(ttl), "[CACHE SET] redis"),
            Err(e) => warn!(cache_key = %key, "Cache write skipped: {e}"),
        }
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.run::<()>(redis::cmd("FLUSHDB")).await?;
        info!("[CACHE CLEAR] redis (all keys in current db deleted)");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

fn encode_value(value: &Value) -> Result<String, CacheError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}

fn decode_value(raw: String) -> Value {
    match serde_json::from_str(&raw) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        _ => Value::String(raw),
    }
}

/// `SETEX` rejects 0, and sub-second TTLs round up.
fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

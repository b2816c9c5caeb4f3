//! # Redis Remote Store
//!
//! Redis-backed [`RemoteStore`]. The connection is opened lazily by the
//! first command and then reused; AUTH and SELECT happen as part of the
//! handshake. A failed handshake marks the store unreachable so later
//! commands fail fast instead of waiting out the connect timeout again.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{
    AsyncCommands, Client, ConnectionAddr, ConnectionInfo, ProtocolVersion, RedisConnectionInfo,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::timeout;

use super::traits::RemoteStore;
use crate::config::{RedisConfig, Transport};
use crate::error::{PersistenceError, Result};

/// Redis store with a lazily established connection manager
pub struct RedisStore {
    conn: OnceCell<ConnectionManager>,
    unreachable: AtomicBool,
    config: RedisConfig,
}

impl RedisStore {
    /// Create a store. No connection is made until the first command.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidConfig`] if the configuration
    /// cannot describe a connection.
    pub fn new(config: RedisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            conn: OnceCell::new(),
            unreachable: AtomicBool::new(false),
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Whether a connection has been established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.conn.initialized()
    }

    fn connection_info(&self) -> ConnectionInfo {
        let addr = match self.config.scheme {
            Transport::Tcp => ConnectionAddr::Tcp(self.config.host.clone(), self.config.port),
            Transport::Tls => ConnectionAddr::TcpTls {
                host: self.config.host.clone(),
                port: self.config.port,
                insecure: self.config.tls_insecure,
                tls_params: None,
            },
            Transport::Unix => {
                ConnectionAddr::Unix(self.config.path.clone().unwrap_or_default())
            }
        };

        ConnectionInfo {
            addr,
            redis: RedisConnectionInfo {
                db: self.config.database,
                username: self.config.username.clone(),
                password: self.config.password.clone(),
                protocol: ProtocolVersion::RESP2,
            },
        }
    }

    async fn connect(&self) -> Result<ConnectionManager> {
        let client = Client::open(self.connection_info())?;
        let connect_timeout = self.config.connect_timeout();

        tracing::debug!(endpoint = %self.config.endpoint(), "Connecting to Redis");
        match timeout(connect_timeout, ConnectionManager::new(client)).await {
            Ok(Ok(conn)) => {
                tracing::info!(endpoint = %self.config.endpoint(), "Redis connected");
                Ok(conn)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(PersistenceError::Timeout {
                op: "connect",
                timeout_ms: millis(connect_timeout),
            }),
        }
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        if self.unreachable.load(Ordering::Relaxed) {
            return Err(PersistenceError::Unavailable(self.config.endpoint()));
        }

        match self.conn.get_or_try_init(|| self.connect()).await {
            Ok(conn) => Ok(conn.clone()),
            Err(e) => {
                self.unreachable.store(true, Ordering::Relaxed);
                tracing::error!(
                    endpoint = %self.config.endpoint(),
                    error = %e,
                    "Redis connection failed, remote tier disabled for this handle"
                );
                Err(e)
            }
        }
    }

    /// Run one command against the shared connection with the read timeout.
    async fn run<T, F, Fut>(&self, op: &'static str, command: F) -> Result<T>
    where
        F: FnOnce(ConnectionManager) -> Fut + Send,
        Fut: Future<Output = redis::RedisResult<T>> + Send,
    {
        let conn = self.connection().await?;
        let read_timeout = self.config.read_timeout();

        match timeout(read_timeout, command(conn)).await {
            Ok(result) => result.map_err(PersistenceError::from),
            Err(_) => Err(PersistenceError::Timeout {
                op,
                timeout_ms: millis(read_timeout),
            }),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl RemoteStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run("get", |mut conn| async move { conn.get(key).await })
            .await
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        // explicit MGET: the typed helper downgrades a one-key slice to GET
        self.run("mget", |mut conn| async move {
            redis::cmd("MGET").arg(keys).query_async(&mut conn).await
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        match ttl {
            Some(ttl) => {
                let secs = ttl.as_secs().max(1);
                self.run("setex", |mut conn| async move {
                    conn.set_ex::<_, _, ()>(key, value, secs).await
                })
                .await
            }
            None => {
                self.run("set", |mut conn| async move {
                    conn.set::<_, _, ()>(key, value).await
                })
                .await
            }
        }
    }

    async fn set_keep_ttl(&self, key: &str, value: &str) -> Result<()> {
        self.run("set", |mut conn| async move {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("KEEPTTL")
                .query_async(&mut conn)
                .await
        })
        .await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.run("incrby", |mut conn| async move {
            redis::cmd("INCRBY").arg(key).arg(delta).query_async(&mut conn).await
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let deleted: i64 = self
            .run("del", |mut conn| async move { conn.del(key).await })
            .await?;
        Ok(deleted > 0)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.run("del", |mut conn| async move { conn.del(keys).await })
            .await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.run("exists", |mut conn| async move { conn.exists(key).await })
            .await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.run("keys", |mut conn| async move { conn.keys(pattern).await })
            .await
    }

    async fn flush_db(&self) -> Result<()> {
        self.run("flushdb", |mut conn| async move {
            redis::cmd("FLUSHDB").query_async(&mut conn).await
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        let pong: String = self
            .run("ping", |mut conn| async move {
                redis::cmd("PING").query_async(&mut conn).await
            })
            .await?;
        tracing::trace!(reply = %pong, "Redis ping");
        Ok(())
    }

    async fn db_size(&self) -> Result<u64> {
        self.run("dbsize", |mut conn| async move {
            redis::cmd("DBSIZE").query_async(&mut conn).await
        })
        .await
    }

    async fn server_version(&self) -> Result<Option<String>> {
        let info: String = self
            .run("info", |mut conn| async move {
                redis::cmd("INFO").arg("server").query_async(&mut conn).await
            })
            .await?;
        Ok(parse_server_version(&info))
    }
}

/// Pull `redis_version` out of an `INFO server` reply.
fn parse_server_version(info: &str) -> Option<String> {
    info.lines()
        .find_map(|line| line.strip_prefix("redis_version:"))
        .map(|v| v.trim().to_string())
}

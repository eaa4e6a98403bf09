use std::time::{Duration, Instant};

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Executor, PgPool};

use pgslice_core::{Error, Result};

use crate::postgres::{session_is_read_only, PostgresAdapter};

/// Where and as whom to connect.
#[derive(Clone)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
    pub password: Option<String>,
}

impl ConnectionParams {
    fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database)
            .application_name("pgslice");
        match &self.password {
            Some(password) => options.password(password),
            None => options,
        }
    }

    /// `user@host:port/database`, never including the password.
    pub fn describe(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

struct LiveConnection {
    pool: PgPool,
    opened_at: Instant,
}

/// Owns the single read-only connection and renews it once it outlives its TTL.
pub struct ConnectionManager {
    params: ConnectionParams,
    ttl: Duration,
    live: Option<LiveConnection>,
}

impl ConnectionManager {
    pub fn new(params: ConnectionParams, ttl: Duration) -> Self {
        Self {
            params,
            ttl,
            live: None,
        }
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// The live pool, reconnecting first when it has expired.
    pub async fn pool(&mut self) -> Result<PgPool> {
        if let Some(live) = &self.live {
            if !is_expired(live.opened_at, Instant::now(), self.ttl) {
                return Ok(live.pool.clone());
            }
            tracing::info!(
                target_db = %self.params.describe(),
                ttl_secs = self.ttl.as_secs(),
                "connection expired, reconnecting"
            );
            live.pool.close().await;
            self.live = None;
        }

        let pool = self.connect().await?;
        self.live = Some(LiveConnection {
            pool: pool.clone(),
            opened_at: Instant::now(),
        });
        Ok(pool)
    }

    /// Adapter over the live pool.
    pub async fn adapter(&mut self) -> Result<PostgresAdapter> {
        Ok(PostgresAdapter::new(self.pool().await?))
    }

    pub async fn close(&mut self) {
        if let Some(live) = self.live.take() {
            live.pool.close().await;
        }
    }

    async fn connect(&self) -> Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY")
                        .await?;
                    Ok(())
                })
            })
            .connect_with(self.params.connect_options())
            .await
            .map_err(|err| {
                Error::Connection(format!(
                    "failed to connect to {}: {err}",
                    self.params.describe()
                ))
            })?;

        if !session_is_read_only(&pool).await? {
            pool.close().await;
            return Err(Error::ReadOnlyEnforcement(format!(
                "session on {} is not read-only",
                self.params.describe()
            )));
        }

        tracing::info!(target_db = %self.params.describe(), "connected (read-only)");
        Ok(pool)
    }
}

fn is_expired(opened_at: Instant, now: Instant, ttl: Duration) -> bool {
    now.saturating_duration_since(opened_at) >= ttl
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParams {
        ConnectionParams {
            host: "db.internal".to_string(),
            port: 5433,
            user: "reader".to_string(),
            database: "shop".to_string(),
            password: Some("hunter2".to_string()),
        }
    }

    #[test]
    fn describes_without_password() {
        let params = params();
        assert_eq!(params.describe(), "reader@db.internal:5433/shop");
        assert!(!format!("{params:?}").contains("hunter2"));
    }

    #[test]
    fn expires_after_ttl() {
        let opened = Instant::now();
        let ttl = Duration::from_secs(30 * 60);
        assert!(!is_expired(opened, opened + Duration::from_secs(60), ttl));
        assert!(is_expired(opened, opened + ttl, ttl));
        assert!(is_expired(opened, opened + ttl + Duration::from_secs(1), ttl));
    }

    #[test]
    fn starts_without_a_live_connection() {
        let manager = ConnectionManager::new(params(), Duration::from_secs(60));
        assert!(manager.live.is_none());
        assert_eq!(manager.params().port, 5433);
    }
}

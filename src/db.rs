use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbBackend,
    IsolationLevel, TransactionTrait,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::AtelierConfig;
use crate::errors::{classify_db_err, ServiceError};

/// Type alias for a database connection pool.
pub type DbPool = DatabaseConnection;

/// Retry cap for serialization conflicts. Deployments bound the whole
/// operation with an outer timeout; the cap keeps a pathological conflict
/// loop from spinning forever in tests.
const MAX_TX_ATTEMPTS: u32 = 32;

/// Configuration for the database connection pool.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl From<&AtelierConfig> for DbConfig {
    fn from(cfg: &AtelierConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db.max_connections,
            min_connections: cfg.db.min_connections,
            connect_timeout: Duration::from_secs(cfg.db.connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db.idle_timeout_secs),
        }
    }
}

/// Establishes the connection pool.
pub async fn establish_connection(config: &DbConfig) -> Result<DbPool, ServiceError> {
    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    info!(
        max_connections = config.max_connections,
        "connecting to database"
    );

    let pool = Database::connect(opt).await.map_err(classify_db_err)?;

    info!("database connection pool established");
    Ok(pool)
}

tokio::task_local! {
    static IN_TX: ();
}

fn inside_tx() -> bool {
    IN_TX.try_with(|_| ()).is_ok()
}

/// Transactional repository facade.
///
/// `within_tx` runs the closure under serializable isolation and re-invokes
/// it from scratch when the database reports a serialization conflict. The
/// timestamp handed to the closure is frozen at the start of each attempt,
/// so every write inside one attempt sees the same "now". Unique violations
/// and all other errors are surfaced unchanged.
#[derive(Clone)]
pub struct TxRunner {
    db: Arc<DatabaseConnection>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl TxRunner {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db, shutdown: None }
    }

    /// Attach a shutdown signal; the retry loop checks it between attempts.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn shutting_down(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }

    /// Runs `op` inside a single serializable transaction.
    ///
    /// `op` may be invoked several times; each invocation must hand back a
    /// future that owns everything it captures apart from the transaction
    /// handle (clone services and request data in the closure body).
    ///
    /// Nested calls are a programming error and fail immediately; composite
    /// operations must be expressed as one top-level transaction.
    pub async fn within_tx<T, F>(&self, op: F) -> Result<T, ServiceError>
    where
        T: Send,
        F: for<'t> Fn(
                &'t DatabaseTransaction,
                DateTime<Utc>,
            ) -> BoxFuture<'t, Result<T, ServiceError>>
            + Send
            + Sync,
    {
        if inside_tx() {
            return Err(ServiceError::InvalidOperation(
                "nested within_tx is not supported".to_string(),
            ));
        }

        IN_TX
            .scope((), async {
                let mut attempt: u32 = 0;
                loop {
                    if self.shutting_down() {
                        return Err(ServiceError::InvalidOperation(
                            "transaction aborted by shutdown".to_string(),
                        ));
                    }

                    let now = Utc::now();
                    let txn = self.begin().await?;

                    match op(&txn, now).await {
                        Ok(value) => match txn.commit().await {
                            Ok(()) => return Ok(value),
                            Err(e) => {
                                let classified = classify_db_err(e);
                                if classified.is_retryable() && attempt < MAX_TX_ATTEMPTS {
                                    attempt += 1;
                                    self.backoff(attempt).await;
                                    continue;
                                }
                                return Err(classified);
                            }
                        },
                        Err(e) => {
                            if let Err(rollback_err) = txn.rollback().await {
                                warn!(err = %rollback_err, "transaction rollback failed");
                            }
                            if e.is_retryable() && attempt < MAX_TX_ATTEMPTS {
                                attempt += 1;
                                debug!(attempt, "retrying transaction after serialization conflict");
                                self.backoff(attempt).await;
                                continue;
                            }
                            return Err(e);
                        }
                    }
                }
            })
            .await
    }

    async fn begin(&self) -> Result<DatabaseTransaction, ServiceError> {
        // SQLite transactions are serializable by default and the sqlx
        // driver rejects explicit isolation configuration.
        let txn = if self.db.get_database_backend() == DbBackend::Postgres {
            self.db
                .begin_with_config(Some(IsolationLevel::Serializable), None)
                .await
        } else {
            self.db.begin().await
        };
        txn.map_err(classify_db_err)
    }

    async fn backoff(&self, attempt: u32) {
        use rand::Rng;
        let jitter_ms = rand::thread_rng().gen_range(1..=20);
        let delay = Duration::from_millis(u64::from(attempt.min(8)) * jitter_ms);
        tokio::time::sleep(delay).await;
    }
}

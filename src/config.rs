use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_BASE_CURRENCY: &str = "USD";
const CONFIG_DIR: &str = "config";

const DEFAULT_WORKER_INTERVAL_SECS: u64 = 15 * 60;
const DEFAULT_PLACED_THRESHOLD_SECS: u64 = 24 * 60 * 60;
const DEFAULT_PRE_ORDER_THRESHOLD_SECS: u64 = 24 * 60 * 60;
const DEFAULT_PI_SESSION_TTL_SECS: u64 = 30 * 60;
const DEFAULT_PI_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_AWAITING_PAYMENT_TTL_SECS: u64 = 60 * 60;

/// Tuning for the stuck-order cleanup worker.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct OrderCleanupConfig {
    /// Tick interval in seconds.
    #[serde(default = "default_worker_interval")]
    pub interval_secs: u64,

    /// Orders still in `Placed` older than this are cancelled.
    #[serde(default = "default_placed_threshold")]
    pub placed_threshold_secs: u64,
}

impl Default for OrderCleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_worker_interval(),
            placed_threshold_secs: default_placed_threshold(),
        }
    }
}

/// Tuning for the payment-intent reconciler worker.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PiReconcileConfig {
    #[serde(default = "default_worker_interval")]
    pub interval_secs: u64,

    /// Pre-order intents older than this with no matching order are
    /// cancelled on the provider.
    #[serde(default = "default_pre_order_threshold")]
    pub pre_order_threshold_secs: u64,
}

impl Default for PiReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_worker_interval(),
            pre_order_threshold_secs: default_pre_order_threshold(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    #[serde(default)]
    pub order_cleanup: OrderCleanupConfig,

    #[serde(default)]
    pub pi_reconcile: PiReconcileConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            order_cleanup: OrderCleanupConfig::default(),
            pi_reconcile: PiReconcileConfig::default(),
        }
    }
}

/// Tuning for the in-memory payment-intent session store.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PiSessionConfig {
    #[serde(default = "default_pi_session_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_pi_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for PiSessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_pi_session_ttl(),
            sweep_interval_secs: default_pi_sweep_interval(),
        }
    }
}

/// Database pool tuning.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DbTuningConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for DbTuningConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

/// Application configuration, layered as defaults -> config file ->
/// `ATELIER_*` environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AtelierConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Logging level filter.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON (structured logging).
    #[serde(default)]
    pub log_json: bool,

    /// Run migrations on startup.
    #[serde(default)]
    pub auto_migrate: bool,

    /// Reference currency for product prices and rate conversion.
    #[serde(default = "default_base_currency")]
    #[validate(length(min = 3, max = 3, message = "base currency must be a 3-letter code"))]
    pub base_currency: String,

    /// How long an order may sit in `AwaitingPayment` before expiring.
    #[serde(default = "default_awaiting_payment_ttl")]
    pub awaiting_payment_ttl_secs: u64,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub pi_session: PiSessionConfig,

    #[serde(default)]
    pub db: DbTuningConfig,
}

impl AtelierConfig {
    pub fn awaiting_payment_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.awaiting_payment_ttl_secs as i64)
    }

    pub fn pi_session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.pi_session.ttl_secs as i64)
    }

    pub fn pi_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.pi_session.sweep_interval_secs)
    }

    pub fn order_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.worker.order_cleanup.interval_secs)
    }

    pub fn placed_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.worker.order_cleanup.placed_threshold_secs as i64)
    }

    pub fn pi_reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.worker.pi_reconcile.interval_secs)
    }

    pub fn pre_order_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.worker.pi_reconcile.pre_order_threshold_secs as i64)
    }

    /// Minimal configuration for tests and tooling.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            base_currency: default_base_currency(),
            awaiting_payment_ttl_secs: default_awaiting_payment_ttl(),
            worker: WorkerConfig::default(),
            pi_session: PiSessionConfig::default(),
            db: DbTuningConfig::default(),
        }
    }
}

/// Loads configuration from `config/{default,local}.toml` plus `ATELIER_*`
/// environment overrides (`ATELIER_DATABASE_URL`,
/// `ATELIER_WORKER__ORDER_CLEANUP__INTERVAL_SECS`, ...).
pub fn load_config() -> Result<AtelierConfig, ConfigError> {
    let run_env = std::env::var("ATELIER_ENV").unwrap_or_else(|_| "development".to_string());

    let cfg = Config::builder()
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/local")).required(false))
        .add_source(Environment::with_prefix("ATELIER").separator("__"))
        .build()?;

    let config: AtelierConfig = cfg.try_deserialize()?;

    config
        .validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;

    Ok(config)
}

/// Installs the global tracing subscriber. `RUST_LOG` overrides the
/// configured level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("atelier_api={level}");
    let filter_directive = std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::try_new(filter_directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        let _ = registry.with(fmt::layer().json()).try_init();
    } else {
        let _ = registry.with(fmt::layer()).try_init();
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_base_currency() -> String {
    DEFAULT_BASE_CURRENCY.to_string()
}

fn default_worker_interval() -> u64 {
    DEFAULT_WORKER_INTERVAL_SECS
}

fn default_placed_threshold() -> u64 {
    DEFAULT_PLACED_THRESHOLD_SECS
}

fn default_pre_order_threshold() -> u64 {
    DEFAULT_PRE_ORDER_THRESHOLD_SECS
}

fn default_pi_session_ttl() -> u64 {
    DEFAULT_PI_SESSION_TTL_SECS
}

fn default_pi_sweep_interval() -> u64 {
    DEFAULT_PI_SWEEP_INTERVAL_SECS
}

fn default_awaiting_payment_ttl() -> u64 {
    DEFAULT_AWAITING_PAYMENT_TTL_SECS
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use custodia_application::{CacheTtlPolicy, CompliancePolicy};
use custodia_core::{AppError, AppResult};
use sqlx::postgres::PgConnectOptions;

/// Where the retention ledger and inventory are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local store for local runs; state is lost on exit.
    InMemory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" | "in_memory" => Ok(Self::InMemory),
            _ => Err(AppError::Validation(format!(
                "invalid STORE_BACKEND value '{value}', expected 'postgres' or 'memory'"
            ))),
        }
    }
}

/// Where report payloads, counters and dedup markers are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    /// Per-process cache; dedup markers are not shared between workers.
    InMemory,
}

impl FromStr for CacheBackend {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" | "in_memory" => Ok(Self::InMemory),
            _ => Err(AppError::Validation(format!(
                "invalid CACHE_BACKEND value '{value}', expected 'redis' or 'memory'"
            ))),
        }
    }
}

/// Runtime settings for the compliance worker, read once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub store_backend: StoreBackend,
    pub cache_backend: CacheBackend,
    /// Required for the postgres store backend.
    pub database_url: Option<String>,
    pub redis_url: String,
    pub database_max_connections: u32,
    pub store_timeout: Duration,
    pub cache_timeout: Duration,
    pub cache_key_prefix: String,
    pub consumer_group: String,
    pub consumer_name: String,
    pub consumer_batch_size: usize,
    pub consumer_block: Duration,
    pub pending_retry_interval: Duration,
    pub policy: CompliancePolicy,
    pub cache_ttl: CacheTtlPolicy,
}

impl WorkerConfig {
    /// Loads configuration from the process environment.
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CompliancePolicy::default();
        let ttl_defaults = CacheTtlPolicy::default();

        let store_backend = parse_or(&lookup, "STORE_BACKEND", StoreBackend::Postgres)?;
        let cache_backend = parse_or(&lookup, "CACHE_BACKEND", CacheBackend::Redis)?;
        let database_url = match store_backend {
            StoreBackend::Postgres => Some(required(&lookup, "DATABASE_URL")?),
            StoreBackend::InMemory => lookup("DATABASE_URL").filter(|value| !value.trim().is_empty()),
        };
        let redis_url = required(&lookup, "REDIS_URL")?;
        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5_u32)?;
        let store_timeout_ms = parse_or(&lookup, "STORE_TIMEOUT_MS", 5000_u64)?;
        let cache_timeout_ms = parse_or(&lookup, "CACHE_TIMEOUT_MS", 1000_u64)?;
        let cache_key_prefix = non_empty_or(&lookup, "CACHE_KEY_PREFIX", "compliance");
        let consumer_group = non_empty_or(&lookup, "CONSUMER_GROUP", "compliance-service-group");
        let consumer_name = lookup("CONSUMER_NAME")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format!("worker-{}", std::process::id()));
        let consumer_batch_size = parse_or(&lookup, "CONSUMER_BATCH_SIZE", 50_usize)?;
        let consumer_block_ms = parse_or(&lookup, "CONSUMER_BLOCK_MS", 2000_u64)?;
        let pending_retry_seconds = parse_or(&lookup, "CONSUMER_PENDING_RETRY_SECONDS", 60_u64)?;

        let policy = CompliancePolicy {
            default_retention_days: parse_or(
                &lookup,
                "DEFAULT_RETENTION_DAYS",
                defaults.default_retention_days,
            )?,
            retention_warning_days: parse_or(
                &lookup,
                "RETENTION_WARNING_DAYS",
                defaults.retention_warning_days,
            )?,
            dedup_ttl_seconds: parse_or(&lookup, "DEDUP_TTL_SECONDS", defaults.dedup_ttl_seconds)?,
        };
        let cache_ttl = CacheTtlPolicy {
            inventory_seconds: parse_or(
                &lookup,
                "CACHE_TTL_INVENTORY_SECONDS",
                ttl_defaults.inventory_seconds,
            )?,
            retention_seconds: parse_or(
                &lookup,
                "CACHE_TTL_RETENTION_SECONDS",
                ttl_defaults.retention_seconds,
            )?,
            subject_seconds: parse_or(
                &lookup,
                "CACHE_TTL_SUBJECT_SECONDS",
                ttl_defaults.subject_seconds,
            )?,
            access_controls_seconds: parse_or(
                &lookup,
                "CACHE_TTL_ACCESS_CONTROLS_SECONDS",
                ttl_defaults.access_controls_seconds,
            )?,
            categories_seconds: parse_or(
                &lookup,
                "CACHE_TTL_CATEGORIES_SECONDS",
                ttl_defaults.categories_seconds,
            )?,
            counter_seconds: parse_or(&lookup, "COUNTER_TTL_SECONDS", ttl_defaults.counter_seconds)?,
        };

        if database_max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        if consumer_batch_size == 0 {
            return Err(AppError::Validation(
                "CONSUMER_BATCH_SIZE must be greater than zero".to_owned(),
            ));
        }

        if consumer_block_ms == 0 {
            return Err(AppError::Validation(
                "CONSUMER_BLOCK_MS must be greater than zero, redis treats 0 as block forever"
                    .to_owned(),
            ));
        }

        if cache_timeout_ms == 0 || store_timeout_ms == 0 {
            return Err(AppError::Validation(
                "STORE_TIMEOUT_MS and CACHE_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }

        if policy.dedup_ttl_seconds == 0 {
            return Err(AppError::Validation(
                "DEDUP_TTL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            store_backend,
            cache_backend,
            database_url,
            redis_url,
            database_max_connections,
            store_timeout: Duration::from_millis(store_timeout_ms),
            cache_timeout: Duration::from_millis(cache_timeout_ms),
            cache_key_prefix,
            consumer_group,
            consumer_name,
            consumer_batch_size,
            consumer_block: Duration::from_millis(consumer_block_ms),
            pending_retry_interval: Duration::from_secs(pending_retry_seconds),
            policy,
            cache_ttl,
        })
    }

    /// Connection options for the ledger database.
    ///
    /// Every session carries a `statement_timeout` of `STORE_TIMEOUT_MS`, so a
    /// query stuck on a lock fails its event instead of stalling the worker.
    pub fn pg_connect_options(&self) -> AppResult<PgConnectOptions> {
        let database_url = self.database_url.as_deref().ok_or_else(|| {
            AppError::Validation("DATABASE_URL is required when STORE_BACKEND=postgres".to_owned())
        })?;
        let options = PgConnectOptions::from_str(database_url)
            .map_err(|error| AppError::Validation(format!("invalid DATABASE_URL: {error}")))?;

        Ok(options.options([("statement_timeout", self.store_timeout.as_millis())]))
    }
}

fn required<F>(lookup: &F, name: &str) -> AppResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn non_empty_or<F>(lookup: &F, name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{CacheBackend, StoreBackend, WorkerConfig};

    fn lookup_from(
        pairs: &[(&str, &str)],
    ) -> impl Fn(&str) -> Option<String> + use<> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_urls_are_set() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/custodia"),
            ("REDIS_URL", "redis://localhost"),
            ("CONSUMER_NAME", "worker-a"),
        ]));
        let Ok(config) = config else {
            panic!("config should load");
        };

        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.cache_backend, CacheBackend::Redis);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.cache_timeout, Duration::from_millis(1000));
        assert_eq!(config.cache_key_prefix, "compliance");
        assert_eq!(config.consumer_group, "compliance-service-group");
        assert_eq!(config.consumer_name, "worker-a");
        assert_eq!(config.consumer_batch_size, 50);
        assert_eq!(config.pending_retry_interval, Duration::from_secs(60));
        assert_eq!(config.policy.default_retention_days, 365);
        assert_eq!(config.policy.dedup_ttl_seconds, 604_800);
        assert_eq!(config.cache_ttl.categories_seconds, 3600);
        assert_eq!(config.cache_ttl.access_controls_seconds, 600);
    }

    #[test]
    fn missing_urls_are_rejected() {
        let config = WorkerConfig::from_lookup(lookup_from(&[("REDIS_URL", "redis://localhost")]));
        assert!(config.is_err());
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/custodia"),
            ("REDIS_URL", "redis://localhost"),
            ("RETENTION_WARNING_DAYS", "soon"),
        ]));
        assert!(config.is_err());

        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/custodia"),
            ("REDIS_URL", "redis://localhost"),
            ("CONSUMER_BATCH_SIZE", "0"),
        ]));
        assert!(config.is_err());

        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/custodia"),
            ("REDIS_URL", "redis://localhost"),
            ("CONSUMER_BLOCK_MS", "0"),
        ]));
        assert!(config.is_err());
    }

    #[test]
    fn database_sessions_carry_the_store_timeout() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://custodia@localhost:5432/custodia"),
            ("REDIS_URL", "redis://localhost"),
            ("STORE_TIMEOUT_MS", "2500"),
        ]));
        let Ok(config) = config else {
            panic!("config should load");
        };

        let options = config.pg_connect_options();
        assert!(matches!(
            options,
            Ok(options) if options
                .get_options()
                .is_some_and(|startup| startup.contains("statement_timeout=2500"))
        ));
    }

    #[test]
    fn overrides_flow_into_policies() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/custodia"),
            ("REDIS_URL", "redis://localhost"),
            ("DEFAULT_RETENTION_DAYS", "730"),
            ("CACHE_TTL_RETENTION_SECONDS", "60"),
            ("CONSUMER_BLOCK_MS", "250"),
        ]));

        assert!(matches!(
            config,
            Ok(config) if config.policy.default_retention_days == 730
                && config.cache_ttl.retention_seconds == 60
                && config.consumer_block == Duration::from_millis(250)
        ));
    }

    #[test]
    fn in_memory_store_does_not_need_a_database() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("REDIS_URL", "redis://localhost"),
            ("STORE_BACKEND", "memory"),
            ("CACHE_BACKEND", "Memory"),
        ]));
        let Ok(config) = config else {
            panic!("config should load");
        };

        assert_eq!(config.store_backend, StoreBackend::InMemory);
        assert_eq!(config.cache_backend, CacheBackend::InMemory);
        assert_eq!(config.database_url, None);
        assert!(config.pg_connect_options().is_err());
    }

    #[test]
    fn unknown_backends_are_rejected() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/custodia"),
            ("REDIS_URL", "redis://localhost"),
            ("CACHE_BACKEND", "memcached"),
        ]));
        assert!(config.is_err());
    }
}

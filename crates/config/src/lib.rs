use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "roomsync.toml",
    "config/roomsync.toml",
    "crates/config/roomsync.toml",
    "../roomsync.toml",
    "../config/roomsync.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://roomsync.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Which document store backs the synchronization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Which conflict policy decides whether an incoming edit is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicyKind {
    #[default]
    LastWriteWins,
    VersionChecked,
}

/// Tuning for the real-time synchronization engine.
///
/// ```
/// use roomsync_config::{ConflictPolicyKind, StoreBackend, SyncConfig};
///
/// let sync = SyncConfig::default();
/// assert_eq!(sync.store, StoreBackend::Sqlite);
/// assert_eq!(sync.conflict_policy, ConflictPolicyKind::LastWriteWins);
/// assert_eq!(sync.history_limit, 0);
/// assert!(sync.announce_departures);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub store: StoreBackend,
    #[serde(default = "SyncConfig::default_outbox_capacity")]
    pub outbox_capacity: usize,
    /// Maximum retained history entries per document, 0 keeps everything.
    #[serde(default)]
    pub history_limit: u64,
    #[serde(default = "SyncConfig::default_store_timeout")]
    pub store_timeout_ms: u64,
    #[serde(default = "SyncConfig::default_announce_departures")]
    pub announce_departures: bool,
    #[serde(default)]
    pub conflict_policy: ConflictPolicyKind,
    /// Rooms placed in the memory store at startup.
    #[serde(default)]
    pub rooms: Vec<SeedRoom>,
}

/// A room declared in configuration, keyed by a fixed id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRoom {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub owner: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

impl SyncConfig {
    const fn default_outbox_capacity() -> usize {
        256
    }

    const fn default_store_timeout() -> u64 {
        5_000
    }

    const fn default_announce_departures() -> bool {
        true
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::default(),
            outbox_capacity: Self::default_outbox_capacity(),
            history_limit: 0,
            store_timeout_ms: Self::default_store_timeout(),
            announce_departures: Self::default_announce_departures(),
            conflict_policy: ConflictPolicyKind::default(),
            rooms: Vec::new(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use roomsync_config::load;
///
/// std::env::remove_var("ROOMSYNC_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let outbox_capacity = i64::try_from(defaults.sync.outbox_capacity).unwrap_or(i64::MAX);
    let history_limit = i64::try_from(defaults.sync.history_limit).unwrap_or(i64::MAX);
    let store_timeout = i64::try_from(defaults.sync.store_timeout_ms).unwrap_or(i64::MAX);

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("sync.store", "sqlite")?
        .set_default("sync.outbox_capacity", outbox_capacity)?
        .set_default("sync.history_limit", history_limit)?
        .set_default("sync.store_timeout_ms", store_timeout)?
        .set_default("sync.announce_departures", defaults.sync.announce_departures)?
        .set_default("sync.conflict_policy", "last-write-wins")?;

    let environment_overrides = config::Environment::with_prefix("ROOMSYNC").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("ROOMSYNC_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via ROOMSYNC_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.sync.outbox_capacity == 0 {
        config.sync.outbox_capacity = 1;
    }

    debug!(?config, "loaded roomsync configuration");
    Ok(config)
}

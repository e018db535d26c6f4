//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Remote blob storage configuration.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Identity provider configuration.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Public addressing used for absolute URLs.
    #[serde(default)]
    pub public: PublicConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Hard cap on request bodies, above the file size limit so that
    /// oversized uploads still get a structured 413.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Take the client address from `X-Forwarded-For`. Only enable behind a
    /// reverse proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            trust_forwarded_for: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    9_000_000
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Apply pending migrations on startup.
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// Which blob backend the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Discord guild used as a blob store.
    #[default]
    Discord,
    /// Process-local store, development only.
    Memory,
}

/// Remote blob storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Selected backend.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Discord credentials and endpoints. Required for the Discord backend.
    #[serde(default)]
    pub discord: Option<DiscordConfig>,
    /// Deadline for every outbound storage request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Retries after a rate limit or transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Concurrent in-flight requests to the remote backend.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Name given to a freshly created storage container.
    #[serde(default = "default_container_name")]
    pub container_name: String,
    /// Name of the single text channel blobs are written to.
    #[serde(default = "default_channel_name")]
    pub channel_name: String,
    /// Startup debug switches.
    #[serde(default)]
    pub debug: DebugFlags,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            discord: None,
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            max_in_flight: default_max_in_flight(),
            container_name: default_container_name(),
            channel_name: default_channel_name(),
            debug: DebugFlags::default(),
        }
    }
}

fn default_request_timeout() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_in_flight() -> usize {
    4
}

fn default_container_name() -> String {
    "Debris Storage".to_string()
}

fn default_channel_name() -> String {
    "storage-0".to_string()
}

/// Discord bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    /// Bot token used for every storage call.
    pub bot_token: String,
    /// REST API base URL.
    #[serde(default = "default_discord_api_base")]
    pub api_base: String,
    /// CDN base URL that serves attachments.
    #[serde(default = "default_discord_cdn_base")]
    pub cdn_base: String,
}

fn default_discord_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_discord_cdn_base() -> String {
    "https://cdn.discordapp.com".to_string()
}

/// Debug switches applied when the storage adapter becomes ready.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DebugFlags {
    /// Delete the owned container and create a fresh one.
    #[serde(default)]
    pub reset_container: bool,
    /// Delete every stored message before serving.
    #[serde(default)]
    pub purge_on_start: bool,
    /// Log an invite link to the storage container.
    #[serde(default)]
    pub print_invite_on_ready: bool,
}

/// Identity provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// REST API base URL used to resolve bearer credentials.
    #[serde(default = "default_discord_api_base")]
    pub api_base: String,
    /// Deadline for identity lookups.
    #[serde(default = "default_identity_timeout")]
    pub request_timeout_secs: u64,
    /// How long a resolved credential is trusted without asking again.
    #[serde(default = "default_identity_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_base: default_discord_api_base(),
            request_timeout_secs: default_identity_timeout(),
            cache_ttl_secs: default_identity_cache_ttl(),
        }
    }
}

fn default_identity_timeout() -> u64 {
    10
}

fn default_identity_cache_ttl() -> u64 {
    60
}

/// Public addressing of this service.
#[derive(Debug, Clone, Deserialize)]
pub struct PublicConfig {
    /// `http` or `https`.
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Fully qualified domain name, absolute URLs are unavailable without it.
    #[serde(default)]
    pub fqdn: Option<String>,
}

impl Default for PublicConfig {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            fqdn: None,
        }
    }
}

fn default_protocol() -> String {
    "http".to_string()
}

impl PublicConfig {
    /// Returns `{protocol}://{fqdn}` when a domain is configured.
    #[must_use]
    pub fn base_url(&self) -> Option<String> {
        self.fqdn
            .as_deref()
            .filter(|fqdn| !fqdn.is_empty())
            .map(|fqdn| format!("{}://{fqdn}", self.protocol.to_lowercase()))
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("DEBRIS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

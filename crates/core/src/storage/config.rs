//! Storage configuration types.

use std::time::Duration;

use debris_shared::config::{StorageBackend, StorageSettings};
use serde::{Deserialize, Serialize};

use super::error::StorageError;

/// Storage provider configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageProvider {
    /// A Discord guild owned by the bot acts as the container.
    Discord {
        /// Bot token.
        bot_token: String,
        /// REST API base URL.
        api_base: String,
        /// CDN base URL serving attachments.
        cdn_base: String,
    },
    /// Process-local store (development and tests only)
    Memory,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discord {
                api_base, cdn_base, ..
            } => f
                .debug_struct("Discord")
                .field("bot_token", &"[redacted]")
                .field("api_base", api_base)
                .field("cdn_base", cdn_base)
                .finish(),
            Self::Memory => f.write_str("Memory"),
        }
    }
}

impl StorageProvider {
    /// Create a Discord provider.
    #[must_use]
    pub fn discord(
        bot_token: impl Into<String>,
        api_base: impl Into<String>,
        cdn_base: impl Into<String>,
    ) -> Self {
        Self::Discord {
            bot_token: bot_token.into(),
            api_base: trim_base(api_base.into()),
            cdn_base: trim_base(cdn_base.into()),
        }
    }

    /// Get the provider name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Discord { .. } => "discord",
            Self::Memory => "memory",
        }
    }
}

fn trim_base(mut base: String) -> String {
    while base.ends_with('/') {
        base.pop();
    }
    base
}

/// Switches applied once while the adapter is connecting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugOptions {
    /// Delete the owned container and create a fresh one.
    pub reset_container: bool,
    /// Delete every message in the container before serving.
    pub purge_on_start: bool,
    /// Log an invite link to the container.
    pub print_invite_on_ready: bool,
}

/// Storage adapter configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage provider configuration.
    pub provider: StorageProvider,
    /// Deadline for a single remote call.
    pub request_timeout: Duration,
    /// Retries after a rate limit or transient failure.
    pub max_retries: u32,
    /// Maximum concurrent remote calls.
    pub max_in_flight: usize,
    /// Name of a freshly created container.
    pub container_name: String,
    /// Name of the text channel blobs are posted to.
    pub channel_name: String,
    /// Startup debug switches.
    pub debug: DebugOptions,
}

impl StorageConfig {
    /// Default request deadline: 15 seconds.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
    /// Default retry budget.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    /// Default in-flight cap.
    pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

    /// Create a new storage config with default settings.
    #[must_use]
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            request_timeout: Self::DEFAULT_TIMEOUT,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            max_in_flight: Self::DEFAULT_MAX_IN_FLIGHT,
            container_name: "Debris Storage".to_string(),
            channel_name: "storage-0".to_string(),
            debug: DebugOptions::default(),
        }
    }

    /// Build from the application settings.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when the Discord backend is selected without
    /// credentials.
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, StorageError> {
        let provider = match settings.backend {
            StorageBackend::Memory => StorageProvider::Memory,
            StorageBackend::Discord => {
                let discord = settings.discord.as_ref().ok_or_else(|| {
                    StorageError::configuration("storage.discord section is required")
                })?;
                if discord.bot_token.trim().is_empty() {
                    return Err(StorageError::configuration(
                        "storage.discord.bot_token is empty",
                    ));
                }
                StorageProvider::discord(
                    discord.bot_token.trim(),
                    &discord.api_base,
                    &discord.cdn_base,
                )
            }
        };

        Ok(Self::new(provider)
            .with_request_timeout(Duration::from_secs(settings.request_timeout_secs))
            .with_max_retries(settings.max_retries)
            .with_max_in_flight(settings.max_in_flight)
            .with_names(&settings.container_name, &settings.channel_name)
            .with_debug(DebugOptions {
                reset_container: settings.debug.reset_container,
                purge_on_start: settings.debug.purge_on_start,
                print_invite_on_ready: settings.debug.print_invite_on_ready,
            }))
    }

    /// Set the per-call deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the in-flight cap. Zero is treated as one.
    #[must_use]
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.max(1);
        self
    }

    /// Set container and channel names.
    #[must_use]
    pub fn with_names(mut self, container: &str, channel: &str) -> Self {
        self.container_name = container.to_string();
        self.channel_name = channel.to_string();
        self
    }

    /// Set debug switches.
    #[must_use]
    pub fn with_debug(mut self, debug: DebugOptions) -> Self {
        self.debug = debug;
        self
    }
}

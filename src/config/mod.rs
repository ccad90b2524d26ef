use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    pub resources: ResourceConfig,
    pub generation: GenerationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the hosted backend (REST, auth and functions live under it)
    pub url: String,
    /// Public API key sent as `apikey` on every request
    pub anon_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Where the route gate sends unauthenticated navigation
    pub sign_in_path: String,
    /// Access tokens expiring within this window are refreshed on resolve
    pub refresh_margin_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub list_ordering: ListOrdering,
    /// Number of glyphs shown in place of a hidden secret value
    pub mask_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub function_name: String,
    pub fallback_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub default_filter: String,
}

/// Which completion of overlapping list queries is allowed to land
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListOrdering {
    /// Only the most recently issued list may replace the collection
    LatestIssued,
    /// Every completion replaces the collection, so the last to arrive wins
    LatestCompleted,
}

impl FromStr for ListOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest-issued" | "issued" => Ok(ListOrdering::LatestIssued),
            "latest-completed" | "completed" => Ok(ListOrdering::LatestCompleted),
            other => Err(format!("unknown list ordering '{}'", other)),
        }
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            list_ordering: ListOrdering::LatestIssued,
            mask_length: 20,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            function_name: "generate-code".to_string(),
            fallback_message: "Failed to generate code".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            sign_in_path: "/auth".to_string(),
            refresh_margin_secs: 60,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Backend overrides
        if let Ok(v) = env::var("HOMEBASE_BACKEND_URL") {
            self.backend.url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("HOMEBASE_ANON_KEY") {
            self.backend.anon_key = v;
        }

        // Auth overrides
        if let Ok(v) = env::var("HOMEBASE_SIGN_IN_PATH") {
            self.auth.sign_in_path = v;
        }
        if let Ok(v) = env::var("HOMEBASE_REFRESH_MARGIN_SECS") {
            self.auth.refresh_margin_secs = v.parse().unwrap_or(self.auth.refresh_margin_secs);
        }

        // Resource overrides
        if let Ok(v) = env::var("HOMEBASE_LIST_ORDERING") {
            self.resources.list_ordering = v.parse().unwrap_or(self.resources.list_ordering);
        }
        if let Ok(v) = env::var("HOMEBASE_MASK_LENGTH") {
            self.resources.mask_length = v.parse().unwrap_or(self.resources.mask_length);
        }

        // Generation overrides
        if let Ok(v) = env::var("HOMEBASE_GENERATE_FUNCTION") {
            self.generation.function_name = v;
        }

        // Logging overrides
        if let Ok(v) = env::var("HOMEBASE_LOG_FILTER") {
            self.logging.default_filter = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            backend: BackendConfig {
                url: "http://localhost:54321".to_string(),
                anon_key: String::new(),
            },
            auth: AuthConfig::default(),
            resources: ResourceConfig::default(),
            generation: GenerationConfig::default(),
            logging: LoggingConfig {
                default_filter: "homebase=debug,warn".to_string(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            backend: BackendConfig {
                url: "https://staging.example.com".to_string(),
                anon_key: String::new(),
            },
            auth: AuthConfig::default(),
            resources: ResourceConfig::default(),
            generation: GenerationConfig::default(),
            logging: LoggingConfig {
                default_filter: "homebase=info,warn".to_string(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            backend: BackendConfig {
                url: "https://app.example.com".to_string(),
                anon_key: String::new(),
            },
            auth: AuthConfig {
                sign_in_path: "/auth".to_string(),
                refresh_margin_secs: 120,
            },
            resources: ResourceConfig::default(),
            generation: GenerationConfig::default(),
            logging: LoggingConfig {
                default_filter: "homebase=warn".to_string(),
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

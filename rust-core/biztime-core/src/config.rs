//! # Configuration
//!
//! Explicit application settings passed to the bootstrapper and handlers.
//! Only [`AppConfig::from_env`] looks at the process environment.

use std::env;

/// Runtime mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Test runs: `_test` database suffix, no demo seeding
    Test,
    /// Normal runs
    #[default]
    Production,
}

impl Mode {
    /// Parse a mode name; anything other than `test` is production
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("test") {
            Self::Test
        } else {
            Self::Production
        }
    }

    /// Whether this is the test mode
    #[must_use]
    pub const fn is_test(self) -> bool {
        matches!(self, Self::Test)
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Active mode
    pub mode: Mode,
    /// Force every handler storage call to fail (fault injection)
    pub inject_storage_fault: bool,
    /// Engine URL without a database name, e.g. `postgres://localhost`
    /// or `sqlite:///var/lib/biztime` (a directory for SQLite files)
    pub database_url: String,
    /// Base database name; `_test` is appended in test mode
    pub database_name: String,
    /// Maximum pool size
    pub max_connections: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Production,
            inject_storage_fault: false,
            database_url: "postgres://localhost".to_string(),
            database_name: "biztime".to_string(),
            max_connections: 10,
        }
    }
}

impl AppConfig {
    /// Read settings from `BIZTIME_*` environment variables
    ///
    /// Unset variables keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(mode) = env::var("BIZTIME_ENV") {
            config.mode = Mode::from_name(&mode);
        }
        if let Ok(flag) = env::var("BIZTIME_INJECT_STORAGE_FAULT") {
            config.inject_storage_fault = parse_flag(&flag);
        }
        if let Ok(url) = env::var("BIZTIME_DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(name) = env::var("BIZTIME_DATABASE_NAME") {
            config.database_name = name;
        }
        if let Some(max) = env::var("BIZTIME_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.max_connections = max;
        }
        config
    }

    /// Builder: set the mode
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder: set the fault-injection flag
    #[must_use]
    pub fn with_storage_fault(mut self, inject: bool) -> Self {
        self.inject_storage_fault = inject;
        self
    }

    /// Builder: set the engine URL
    #[must_use]
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    /// Name of the database for the active mode
    #[must_use]
    pub fn target_database(&self) -> String {
        if self.mode.is_test() {
            format!("{}_test", self.database_name)
        } else {
            self.database_name.clone()
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

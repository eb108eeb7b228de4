//! Session configuration.

use std::path::PathBuf;

/// Configuration for a [`crate::TransactionSession`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether prepared statements are cached for the life of a connection.
    pub cache_statements: bool,

    /// Base directory for relative asset paths.
    pub asset_root: Option<PathBuf>,

    /// Whether trace events include generated query text.
    pub log_statements: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_statements: true,
            asset_root: None,
            log_statements: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether prepared statements are cached.
    #[must_use]
    pub const fn cache_statements(mut self, value: bool) -> Self {
        self.cache_statements = value;
        self
    }

    /// Sets the base directory for relative asset paths.
    #[must_use]
    pub fn asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    /// Sets whether trace events include query text.
    #[must_use]
    pub const fn log_statements(mut self, value: bool) -> Self {
        self.log_statements = value;
        self
    }
}

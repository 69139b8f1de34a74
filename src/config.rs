use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub activity: ActivityConfig,
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// JSON file replacing the built-in activity type table
    pub registry_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    pub sample_data: bool,
}

/// Which store a database URL selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Postgres,
    Sqlite,
}

impl DatabaseConfig {
    pub fn backend(&self) -> DatabaseBackend {
        if self.url.starts_with("postgres://") || self.url.starts_with("postgresql://") {
            DatabaseBackend::Postgres
        } else {
            DatabaseBackend::Sqlite
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            activity: ActivityConfig {
                registry_path: env::var("ACTIVITY_TYPES_PATH").ok().filter(|p| !p.is_empty()),
            },
            seed: SeedConfig {
                sample_data: env::var("SEED_SAMPLE_DATA")
                    .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                    .unwrap_or(false),
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            activity: ActivityConfig { registry_path: None },
            seed: SeedConfig { sample_data: false },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_url() {
        let mut config = Config::default();
        assert_eq!(config.database.backend(), DatabaseBackend::Sqlite);

        config.database.url = "postgres://localhost/answer".to_string();
        assert_eq!(config.database.backend(), DatabaseBackend::Postgres);

        config.database.url = "postgresql://localhost/answer".to_string();
        assert_eq!(config.database.backend(), DatabaseBackend::Postgres);

        config.database.url = "sqlite:data/answer.db".to_string();
        assert_eq!(config.database.backend(), DatabaseBackend::Sqlite);
    }
}

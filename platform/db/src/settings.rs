use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use serde::Deserialize;

/// Shared connection handle alias.
pub type DbPool = DatabaseConnection;

/// Environment-driven database settings.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_url_key")]
    env_key: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_url_key() -> String {
    "DATABASE_URL".to_string()
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            env_key: default_url_key(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseSettings {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_env_key(env_key: impl Into<String>) -> Self {
        Self {
            env_key: env_key.into(),
            ..Self::default()
        }
    }

    pub fn database_url(&self) -> Result<String, DbErr> {
        std::env::var(&self.env_key)
            .map_err(|_| DbErr::Custom(format!("environment variable {} not set", self.env_key)))
    }
}

/// Connect to the configured database.
pub async fn connect(settings: &DatabaseSettings) -> Result<DbPool, DbErr> {
    let url = settings.database_url()?;
    let mut options = ConnectOptions::new(url);
    options.max_connections(settings.max_connections);
    Database::connect(options).await
}

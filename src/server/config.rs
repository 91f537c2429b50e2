use std::net::SocketAddr;

use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub secret_key: String,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    /// Reads `DATABASE_URL`, `SECRET_KEY`, `HOST` and `PORT`. Call `dotenvy::dotenv()` first to
    /// pick up a `.env` file.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let secret_key = lookup("SECRET_KEY")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Internal("SECRET_KEY not set".to_string()))?;

        let port = match lookup("PORT") {
            Some(port) => port
                .parse()
                .map_err(|_| AppError::Internal(format!("Invalid PORT: {}", port)))?,
            None => 3000,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://rmessenger.db?mode=rwc".to_string()),
            secret_key,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
        })
    }

    pub fn bind_addr(&self) -> AppResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| AppError::Internal(format!("Invalid bind address {}:{}", self.host, self.port)))
    }
}

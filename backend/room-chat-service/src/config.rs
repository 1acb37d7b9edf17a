use crate::error::AppError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use dotenvy::dotenv;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_HISTORY_PAGE_SIZE: i64 = 50;
pub const MAX_HISTORY_PAGE_SIZE: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// `LOG_FORMAT=json` selects JSON lines; anything else is plain text.
    pub fn from_env() -> Self {
        match env::var("LOG_FORMAT") {
            Ok(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_algorithm: String,
    pub encryption_key: [u8; 32],
    pub cors_allow_origins: Vec<String>,
    pub history_page_size: i64,
    pub log_format: LogFormat,
}

impl Config {
    fn parse_origins(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }

    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        let database_url =
            env::var("DATABASE_URL").map_err(|_| AppError::Config("DATABASE_URL missing".into()))?;
        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8000);

        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| AppError::Config("JWT_SECRET missing".into()))?;
        if jwt_secret.trim().is_empty() {
            return Err(AppError::Config("JWT_SECRET must not be empty".into()));
        }
        let jwt_algorithm = env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".into());

        let encryption_key = match env::var("MESSAGE_ENCRYPTION_MASTER_KEY") {
            Ok(encoded) if !encoded.trim().is_empty() => decode_key(&encoded)?,
            _ => {
                let path = env::var("MESSAGE_ENCRYPTION_KEY_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(".message_key"));
                load_or_create_key_file(&path)?
            }
        };

        let cors_allow_origins =
            Self::parse_origins(&env::var("CORS_ALLOW_ORIGINS").unwrap_or_else(|_| "*".into()));

        let history_page_size = match env::var("HISTORY_PAGE_SIZE") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|n| (1..=MAX_HISTORY_PAGE_SIZE).contains(n))
                .ok_or_else(|| {
                    AppError::Config(format!(
                        "HISTORY_PAGE_SIZE must be between 1 and {MAX_HISTORY_PAGE_SIZE}"
                    ))
                })?,
            Err(_) => DEFAULT_HISTORY_PAGE_SIZE,
        };

        let log_format = LogFormat::from_env();

        Ok(Self {
            database_url,
            db_max_connections,
            port,
            jwt_secret,
            jwt_algorithm,
            encryption_key,
            cors_allow_origins,
            history_page_size,
            log_format,
        })
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_allow_origins.iter().any(|o| o == "*")
    }

    /// Defaults for tests and local tooling. Never read from the environment.
    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/chat_test".into(),
            db_max_connections: 2,
            port: 8000,
            jwt_secret: "test-jwt-secret".into(),
            jwt_algorithm: "HS256".into(),
            encryption_key: [7u8; 32],
            cors_allow_origins: vec!["*".into()],
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
            log_format: LogFormat::Text,
        }
    }
}

/// Decode a base64 key that must be exactly 32 bytes.
pub fn decode_key(encoded: &str) -> Result<[u8; 32], AppError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AppError::Config("MESSAGE_ENCRYPTION_MASTER_KEY invalid base64".into()))?;
    if bytes.len() != 32 {
        return Err(AppError::Config(
            "MESSAGE_ENCRYPTION_MASTER_KEY must decode to 32 bytes".into(),
        ));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

/// Read the message key from `path`, generating and persisting one if absent.
pub fn load_or_create_key_file(path: &Path) -> Result<[u8; 32], AppError> {
    if path.exists() {
        let encoded = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("read {}: {e}", path.display())))?;
        return decode_key(&encoded);
    }

    let key = crypto_core::generate_key();
    fs::write(path, STANDARD.encode(key))
        .map_err(|e| AppError::Config(format!("write {}: {e}", path.display())))?;
    tracing::warn!(
        path = %path.display(),
        "generated a new message encryption key; back it up, stored messages are unreadable without it"
    );
    Ok(key)
}

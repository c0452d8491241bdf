//! Error types for Astrumverse

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AstrumError>;

#[derive(Error, Debug)]
pub enum AstrumError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("AI provider error: {0}")]
    Ai(#[from] AiError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AstrumError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AstrumError::InvalidInput(_) => 3,
            AstrumError::Platform(PlatformError::ConfigMissing(_)) => 2,
            AstrumError::Ai(AiError::NoProviderConfigured) => 2,
            AstrumError::Config(_) => 2,
            AstrumError::Platform(_) => 1,
            AstrumError::Ai(_) => 1,
            AstrumError::Storage(_) => 1,
            AstrumError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored document '{key}' is not valid JSON: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    /// Required platform credentials are absent from the credential set
    #[error("{0}")]
    ConfigMissing(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    /// Transport failure or non-2xx answer from a platform API
    #[error("{0}")]
    Transport(String),

    #[error("Unknown platform: {0}")]
    Unknown(String),
}

#[derive(Error, Debug, Clone)]
pub enum AiError {
    #[error("No AI provider configured with remaining quota")]
    NoProviderConfigured,

    #[error("{0}")]
    Transport(String),

    #[error("Could not update AI usage counters: {0}")]
    QuotaStore(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = AstrumError::InvalidInput("Empty title".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_missing_credentials() {
        let error = AstrumError::Platform(PlatformError::ConfigMissing(
            "LinkedIn credentials are not configured".to_string(),
        ));
        assert_eq!(error.exit_code(), 2);

        let error = AstrumError::Ai(AiError::NoProviderConfigured);
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_transport_errors() {
        let error = AstrumError::Platform(PlatformError::Transport(
            "Dev.to API error: 500 - boom".to_string(),
        ));
        assert_eq!(error.exit_code(), 1);

        let error = AstrumError::Ai(AiError::Transport("OpenAI API error: 429".to_string()));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_transport_message_is_passed_through() {
        let error = PlatformError::Transport("LinkedIn API error: 401 - invalid token".to_string());
        assert_eq!(error.to_string(), "LinkedIn API error: 401 - invalid token");

        let wrapped: AstrumError = error.into();
        assert_eq!(
            wrapped.to_string(),
            "Platform error: LinkedIn API error: 401 - invalid token"
        );
    }

    #[test]
    fn test_config_error_formatting() {
        let config_error = ConfigError::MissingField("database.path".to_string());
        let error = AstrumError::Config(config_error);
        assert_eq!(
            error.to_string(),
            "Configuration error: Missing required field: database.path"
        );

        let invalid = ConfigError::InvalidValue {
            field: "scheduler.daily_time".to_string(),
            reason: "expected HH:MM".to_string(),
        };
        assert_eq!(
            invalid.to_string(),
            "Invalid value for scheduler.daily_time: expected HH:MM"
        );
    }

    #[test]
    fn test_storage_error_formatting() {
        let error = StorageError::NotFound("media abc".to_string());
        assert_eq!(error.to_string(), "Record not found: media abc");

        let io = StorageError::Io {
            key: "credentials".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(io.to_string().contains("credentials"));
    }

    #[test]
    fn test_error_conversion_from_db_error() {
        let db_error = DbError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "test"));
        let error: AstrumError = db_error.into();
        assert!(matches!(error, AstrumError::Database(_)));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Transport("Twitter API error: network - refused".to_string());
        let cloned = original.clone();
        assert_eq!(original.to_string(), cloned.to_string());
    }
}

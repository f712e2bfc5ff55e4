use secrecy::{ExposeSecret, SecretBox};
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::speech::Credentials;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for {variable}: {reason}")]
    InvalidValue { variable: String, reason: String },
    #[error("Environment error: {0}")]
    EnvError(#[from] env::VarError),
}

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 2;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

/// Configuration for the cloud services and timeouts.
#[derive(Debug)]
pub struct ApiConfig {
    pub asr_app_id: String,
    pub asr_api_key: SecretBox<String>,
    pub asr_api_secret: SecretBox<String>,

    pub tts_app_id: String,
    pub tts_api_key: SecretBox<String>,
    pub tts_api_secret: SecretBox<String>,

    pub chat_url: String,
    pub chat_model: String,
    pub chat_api_key: SecretBox<String>,

    /// How long a facade call waits for the background connection.
    pub connect_timeout: Duration,
    /// Per-exchange budget for recognition and synthesis.
    pub request_timeout: Duration,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env if present (for development).
        dotenvy::dotenv().ok();

        Ok(Self {
            asr_app_id: Self::required("ASR_APP_ID")?,
            asr_api_key: Self::secret("ASR_API_KEY")?,
            asr_api_secret: Self::secret("ASR_API_SECRET")?,
            tts_app_id: Self::required("TTS_APP_ID")?,
            tts_api_key: Self::secret("TTS_API_KEY")?,
            tts_api_secret: Self::secret("TTS_API_SECRET")?,
            chat_url: Self::required("OPENAI_URL")?,
            chat_model: Self::required("OPENAI_MODEL")?,
            chat_api_key: Self::secret("OPENAI_API_KEY")?,
            connect_timeout: Self::seconds("WS_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
            request_timeout: Self::seconds("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
        })
    }

    fn required(variable: &str) -> Result<String, ConfigError> {
        let value =
            env::var(variable).map_err(|_| ConfigError::MissingEnvVar(variable.to_string()))?;
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                variable: variable.to_string(),
                reason: "value cannot be empty".to_string(),
            });
        }
        Ok(value)
    }

    fn secret(variable: &str) -> Result<SecretBox<String>, ConfigError> {
        Ok(SecretBox::new(Box::new(Self::required(variable)?)))
    }

    fn seconds(variable: &str, default: u64) -> Result<Duration, ConfigError> {
        match env::var(variable) {
            Err(_) => Ok(Duration::from_secs(default)),
            Ok(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    variable: variable.to_string(),
                    reason: format!("expected a whole number of seconds, got '{}'", raw),
                })?;
                Ok(Duration::from_secs(secs))
            }
        }
    }

    /// Credentials for the recognition service.
    pub fn asr_credentials(&self) -> Credentials {
        Credentials::new(
            self.asr_app_id.clone(),
            self.asr_api_key.expose_secret().clone(),
            self.asr_api_secret.expose_secret().clone(),
        )
    }

    /// Credentials for the synthesis service.
    pub fn tts_credentials(&self) -> Credentials {
        Credentials::new(
            self.tts_app_id.clone(),
            self.tts_api_key.expose_secret().clone(),
            self.tts_api_secret.expose_secret().clone(),
        )
    }

    /// Get the chat API key (use only when making API calls).
    pub fn chat_api_key(&self) -> &str {
        self.chat_api_key.expose_secret()
    }
}

/// Load configuration with helpful error messages for development.
pub fn load_config() -> Result<ApiConfig, ConfigError> {
    match ApiConfig::load() {
        Ok(config) => {
            log::info!("Successfully loaded API configuration");
            Ok(config)
        }
        Err(ConfigError::MissingEnvVar(var)) => {
            log::error!("Missing required environment variable: {}", var);
            log::error!("Create a .env file in the project root with:");
            log::error!("{}=your_value_here", var);
            Err(ConfigError::MissingEnvVar(var))
        }
        Err(e) => {
            log::error!("Configuration error: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn set_all_required() {
        for (var, value) in [
            ("ASR_APP_ID", "app"),
            ("ASR_API_KEY", "key"),
            ("ASR_API_SECRET", "secret"),
            ("TTS_APP_ID", "app"),
            ("TTS_API_KEY", "key"),
            ("TTS_API_SECRET", "secret"),
            ("OPENAI_URL", "http://127.0.0.1:9/v1"),
            ("OPENAI_MODEL", "test-model"),
            ("OPENAI_API_KEY", "key"),
        ] {
            env::set_var(var, value);
        }
    }

    #[test]
    #[serial]
    fn missing_variable_is_named() {
        set_all_required();
        env::remove_var("ASR_API_SECRET");

        match ApiConfig::load() {
            Err(ConfigError::MissingEnvVar(var)) => assert_eq!(var, "ASR_API_SECRET"),
            other => panic!("expected MissingEnvVar, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    #[serial]
    fn timeouts_default_and_parse() {
        set_all_required();
        env::remove_var("WS_CONNECT_TIMEOUT_SECS");
        env::set_var("REQUEST_TIMEOUT_SECS", "45");

        let config = ApiConfig::load().unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.request_timeout, Duration::from_secs(45));

        env::remove_var("REQUEST_TIMEOUT_SECS");
    }

    #[test]
    #[serial]
    fn bad_timeout_is_rejected() {
        set_all_required();
        env::set_var("WS_CONNECT_TIMEOUT_SECS", "soon");

        assert!(matches!(
            ApiConfig::load(),
            Err(ConfigError::InvalidValue { .. })
        ));

        env::remove_var("WS_CONNECT_TIMEOUT_SECS");
    }
}

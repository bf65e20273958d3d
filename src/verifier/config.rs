use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::{
    ConfigError, parse_from_env, parse_optional_string_from_env, parse_string_from_env,
};
use crate::constants::DEFAULT_VERIFIER_TIMEOUT_MS;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llava:13b";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifierBackend {
    #[default]
    None,
    Ollama,
    OpenAi,
}

impl FromStr for VerifierBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "off" => Ok(Self::None),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            _ => Err(ConfigError::UnknownBackend {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for VerifierBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Ollama => write!(f, "ollama"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// Verifier settings.
///
/// Read from `SWATCH_VERIFIER_*`, `SWATCH_OLLAMA_*` and `SWATCH_OPENAI_*` with [`VerifierConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    pub backend: VerifierBackend,
    pub timeout: Duration,
    pub ollama_url: String,
    pub ollama_model: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_api_key: Option<String>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            backend: VerifierBackend::None,
            timeout: Duration::from_millis(DEFAULT_VERIFIER_TIMEOUT_MS),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_api_key: None,
        }
    }
}

impl VerifierConfig {
    pub const ENV_BACKEND: &'static str = "SWATCH_VERIFIER_BACKEND";
    pub const ENV_TIMEOUT_MS: &'static str = "SWATCH_VERIFIER_TIMEOUT_MS";
    pub const ENV_OLLAMA_URL: &'static str = "SWATCH_OLLAMA_URL";
    pub const ENV_OLLAMA_MODEL: &'static str = "SWATCH_OLLAMA_MODEL";
    pub const ENV_OPENAI_BASE_URL: &'static str = "SWATCH_OPENAI_BASE_URL";
    pub const ENV_OPENAI_MODEL: &'static str = "SWATCH_OPENAI_MODEL";
    pub const ENV_OPENAI_API_KEY: &'static str = "SWATCH_OPENAI_API_KEY";

    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let backend = match parse_optional_string_from_env(Self::ENV_BACKEND) {
            Some(value) => value.parse()?,
            None => defaults.backend,
        };
        let timeout_ms = parse_from_env(Self::ENV_TIMEOUT_MS, DEFAULT_VERIFIER_TIMEOUT_MS)?;

        Ok(Self {
            backend,
            timeout: Duration::from_millis(timeout_ms),
            ollama_url: parse_string_from_env(Self::ENV_OLLAMA_URL, defaults.ollama_url),
            ollama_model: parse_string_from_env(Self::ENV_OLLAMA_MODEL, defaults.ollama_model),
            openai_base_url: parse_string_from_env(
                Self::ENV_OPENAI_BASE_URL,
                defaults.openai_base_url,
            ),
            openai_model: parse_string_from_env(Self::ENV_OPENAI_MODEL, defaults.openai_model),
            openai_api_key: parse_optional_string_from_env(Self::ENV_OPENAI_API_KEY),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroCount {
                name: "verifier_timeout_ms",
            });
        }
        if self.backend == VerifierBackend::OpenAi && self.openai_api_key.is_none() {
            return Err(ConfigError::MissingEnvVar {
                name: Self::ENV_OPENAI_API_KEY,
            });
        }
        Ok(())
    }
}

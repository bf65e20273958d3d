//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `SWATCH_*` environment variables. Values that are
//! present but malformed are errors rather than silently falling back.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_CLOSE_GAP, DEFAULT_LANG, DEFAULT_LOW_CONFIDENCE, DEFAULT_MIN_SAMPLES,
    DEFAULT_QUERY_CACHE_CAPACITY, DEFAULT_TOP_C, DEFAULT_TOP_K,
};
use crate::store::{StoreOptions, StorePaths};

/// Retrieval configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `SWATCH_*` overrides on top of defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Class-sample archive. Default: `./data/fabric_bank.npz`.
    pub bank_path: PathBuf,

    /// Class-centroid archive. Default: `./data/fabric_centroids.npz`.
    pub centroids_path: PathBuf,

    /// Display names (JSON object id -> name). Default: `./data/fabric_labels.json`.
    pub labels_path: PathBuf,

    /// Aliases (JSON object id -> [alias]). Default: `./data/fabric_aliases.json`.
    pub aliases_path: PathBuf,

    /// Classes with fewer samples are not loaded. Default: `3`.
    pub min_samples: usize,

    /// Labels returned per query. Default: `5`.
    pub top_k: usize,

    /// Classes kept by the coarse stage. Default: `12`.
    pub top_c: usize,

    /// Escalate when the top score is below this cosine. Default: `0.30`.
    pub low_confidence: f32,

    /// Escalate when the top-2 gap is below this. Default: `0.03`.
    pub close_gap: f32,

    /// Use partial selection instead of a full sort. Default: `true`.
    pub accelerate: bool,

    /// Treat a missing centroid file as an error. Default: `false`.
    pub require_centroids: bool,

    /// Query-result cache entries; `0` disables the cache. Default: `1024`.
    pub query_cache_capacity: u64,

    /// Display language for labels. Default: `zh`.
    pub lang: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bank_path: PathBuf::from("./data/fabric_bank.npz"),
            centroids_path: PathBuf::from("./data/fabric_centroids.npz"),
            labels_path: PathBuf::from("./data/fabric_labels.json"),
            aliases_path: PathBuf::from("./data/fabric_aliases.json"),
            min_samples: DEFAULT_MIN_SAMPLES,
            top_k: DEFAULT_TOP_K,
            top_c: DEFAULT_TOP_C,
            low_confidence: DEFAULT_LOW_CONFIDENCE,
            close_gap: DEFAULT_CLOSE_GAP,
            accelerate: true,
            require_centroids: false,
            query_cache_capacity: DEFAULT_QUERY_CACHE_CAPACITY,
            lang: DEFAULT_LANG.to_string(),
        }
    }
}

impl Config {
    const ENV_BANK_PATH: &'static str = "SWATCH_BANK_PATH";
    const ENV_CENTROIDS_PATH: &'static str = "SWATCH_CENTROIDS_PATH";
    const ENV_LABELS_PATH: &'static str = "SWATCH_LABELS_PATH";
    const ENV_ALIASES_PATH: &'static str = "SWATCH_ALIASES_PATH";
    const ENV_MIN_SAMPLES: &'static str = "SWATCH_MIN_SAMPLES";
    const ENV_TOP_K: &'static str = "SWATCH_TOPK";
    const ENV_TOP_C: &'static str = "SWATCH_TOPC";
    const ENV_LOW_CONF: &'static str = "SWATCH_LOW_CONF";
    const ENV_CLOSE_GAP: &'static str = "SWATCH_CLOSE_GAP";
    const ENV_ACCELERATE: &'static str = "SWATCH_ACCELERATE";
    const ENV_REQUIRE_CENTROIDS: &'static str = "SWATCH_REQUIRE_CENTROIDS";
    const ENV_QUERY_CACHE_CAPACITY: &'static str = "SWATCH_QUERY_CACHE_CAPACITY";
    const ENV_LANG: &'static str = "SWATCH_LANG";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            bank_path: parse_path_from_env(Self::ENV_BANK_PATH, defaults.bank_path),
            centroids_path: parse_path_from_env(Self::ENV_CENTROIDS_PATH, defaults.centroids_path),
            labels_path: parse_path_from_env(Self::ENV_LABELS_PATH, defaults.labels_path),
            aliases_path: parse_path_from_env(Self::ENV_ALIASES_PATH, defaults.aliases_path),
            min_samples: parse_from_env(Self::ENV_MIN_SAMPLES, defaults.min_samples)?,
            top_k: parse_from_env(Self::ENV_TOP_K, defaults.top_k)?,
            top_c: parse_from_env(Self::ENV_TOP_C, defaults.top_c)?,
            low_confidence: parse_from_env(Self::ENV_LOW_CONF, defaults.low_confidence)?,
            close_gap: parse_from_env(Self::ENV_CLOSE_GAP, defaults.close_gap)?,
            accelerate: parse_bool_from_env(Self::ENV_ACCELERATE, defaults.accelerate)?,
            require_centroids: parse_bool_from_env(
                Self::ENV_REQUIRE_CENTROIDS,
                defaults.require_centroids,
            )?,
            query_cache_capacity: parse_from_env(
                Self::ENV_QUERY_CACHE_CAPACITY,
                defaults.query_cache_capacity,
            )?,
            lang: parse_string_from_env(Self::ENV_LANG, defaults.lang),
        })
    }

    /// Validates thresholds, counts and paths (missing data files are reported at load time).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_samples == 0 {
            return Err(ConfigError::ZeroCount {
                name: "min_samples",
            });
        }
        if self.top_k == 0 {
            return Err(ConfigError::ZeroCount { name: "top_k" });
        }
        if self.top_c == 0 {
            return Err(ConfigError::ZeroCount { name: "top_c" });
        }
        if self.top_k > self.top_c {
            return Err(ConfigError::TopKExceedsTopC {
                top_k: self.top_k,
                top_c: self.top_c,
            });
        }

        if !self.low_confidence.is_finite() {
            return Err(ConfigError::InvalidThreshold {
                name: "low_confidence",
                value: self.low_confidence,
                reason: "must be finite",
            });
        }
        if !self.close_gap.is_finite() || self.close_gap < 0.0 {
            return Err(ConfigError::InvalidThreshold {
                name: "close_gap",
                value: self.close_gap,
                reason: "must be finite and non-negative",
            });
        }

        for path in [
            &self.bank_path,
            &self.centroids_path,
            &self.labels_path,
            &self.aliases_path,
        ] {
            if path.exists() && !path.is_file() {
                return Err(ConfigError::NotAFile { path: path.clone() });
            }
        }

        Ok(())
    }

    pub fn store_paths(&self) -> StorePaths {
        StorePaths::new(&self.bank_path, &self.centroids_path)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            min_samples: self.min_samples,
            require_centroids: self.require_centroids,
        }
    }
}

pub(crate) fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
    env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}

pub(crate) fn parse_string_from_env(var_name: &str, default: String) -> String {
    env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

pub(crate) fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
    env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn parse_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match parse_optional_string_from_env(var_name) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name: var_name,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

pub(crate) fn parse_bool_from_env(var_name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = parse_optional_string_from_env(var_name) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: var_name,
            value,
            reason: "expected a boolean".to_string(),
        }),
    }
}

//! Application settings read from the environment.
//!
//! Every field has a default, so an empty environment yields a working
//! configuration. `.env` files are loaded by the binary (via `dotenv`)
//! before [`Settings::from_env`] runs.
//!
//! | Variable                     | Default                    |
//! |------------------------------|----------------------------|
//! | `API_PREFIX`                 | `/api`                     |
//! | `API_VERSION`                | `v1`                       |
//! | `ALLOWED_HOSTS`              | `*`                        |
//! | `LOG_LEVEL`                  | `info`                     |
//! | `HOST`                       | `0.0.0.0`                  |
//! | `PORT`                       | `8000`                     |
//! | `DATA_DIR`                   | `artifacts/data`           |
//! | `ML_DIR`                     | `artifacts/ml`             |
//! | `RAW_DATA_SOURCE`            | language-detection dataset |
//! | `RAW_DATA_SOURCE_FILENAME`   | `Language Detection.csv`   |
//! | `RAW_FILENAME`               | `raw_data.csv`             |
//! | `CLEAN_FILENAME`             | `clean_data.bin`           |
//! | `OPTIM_PARAMS_FILENAME`      | `optim_params.bin`         |
//! | `ML_MODEL_PIPELINE_FILENAME` | `model_pipeline.bin`       |
//! | `FETCH_TIMEOUT_SECS`         | `180`                      |
//! | `COMPRESS_ARTIFACTS`         | `true`                     |

use italiclas_data::{ArtifactStore, Compression, DEFAULT_ENTRY_NAME, DEFAULT_SOURCE_URL, DEFAULT_TIMEOUT_SECS};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// A setting that could not be parsed or is out of range.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    Parse {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_prefix: String,
    pub api_version: String,
    /// Origins allowed by CORS; `*` allows any.
    pub allowed_hosts: Vec<String>,
    pub log_level: String,
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub ml_dir: PathBuf,
    pub raw_data_source: String,
    /// Entry extracted from the downloaded archive.
    pub raw_data_source_filename: String,
    pub raw_filename: String,
    pub clean_filename: String,
    pub optim_params_filename: String,
    pub ml_model_pipeline_filename: String,
    pub fetch_timeout_secs: u64,
    pub compress_artifacts: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_prefix: "/api".to_string(),
            api_version: "v1".to_string(),
            allowed_hosts: vec!["*".to_string()],
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            data_dir: PathBuf::from("artifacts/data"),
            ml_dir: PathBuf::from("artifacts/ml"),
            raw_data_source: DEFAULT_SOURCE_URL.to_string(),
            raw_data_source_filename: DEFAULT_ENTRY_NAME.to_string(),
            raw_filename: "raw_data.csv".to_string(),
            clean_filename: "clean_data.bin".to_string(),
            optim_params_filename: "optim_params.bin".to_string(),
            ml_model_pipeline_filename: "model_pipeline.bin".to_string(),
            fetch_timeout_secs: DEFAULT_TIMEOUT_SECS,
            compress_artifacts: true,
        }
    }
}

impl Settings {
    /// Read settings from the process environment and validate them.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let mut s = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());

        if let Some(v) = get("API_PREFIX") {
            s.api_prefix = v;
        }
        if let Some(v) = get("API_VERSION") {
            s.api_version = v;
        }
        if let Some(v) = get("ALLOWED_HOSTS") {
            s.allowed_hosts = v
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = get("LOG_LEVEL") {
            s.log_level = v;
        }
        if let Some(v) = get("HOST") {
            s.host = v;
        }
        if let Some(v) = get("PORT") {
            s.port = parse("PORT", &v)?;
        }
        if let Some(v) = get("DATA_DIR") {
            s.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("ML_DIR") {
            s.ml_dir = PathBuf::from(v);
        }
        if let Some(v) = get("RAW_DATA_SOURCE") {
            s.raw_data_source = v;
        }
        if let Some(v) = get("RAW_DATA_SOURCE_FILENAME") {
            s.raw_data_source_filename = v;
        }
        if let Some(v) = get("RAW_FILENAME") {
            s.raw_filename = v;
        }
        if let Some(v) = get("CLEAN_FILENAME") {
            s.clean_filename = v;
        }
        if let Some(v) = get("OPTIM_PARAMS_FILENAME") {
            s.optim_params_filename = v;
        }
        if let Some(v) = get("ML_MODEL_PIPELINE_FILENAME") {
            s.ml_model_pipeline_filename = v;
        }
        if let Some(v) = get("FETCH_TIMEOUT_SECS") {
            s.fetch_timeout_secs = parse("FETCH_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("COMPRESS_ARTIFACTS") {
            s.compress_artifacts = parse_bool("COMPRESS_ARTIFACTS", &v)?;
        }

        s.validate()?;
        Ok(s)
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.port == 0 {
            return Err(SettingsError::Invalid("PORT must be greater than 0".to_string()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(SettingsError::Invalid(
                "FETCH_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }
        let filenames = [
            ("RAW_DATA_SOURCE_FILENAME", &self.raw_data_source_filename),
            ("RAW_FILENAME", &self.raw_filename),
            ("CLEAN_FILENAME", &self.clean_filename),
            ("OPTIM_PARAMS_FILENAME", &self.optim_params_filename),
            ("ML_MODEL_PIPELINE_FILENAME", &self.ml_model_pipeline_filename),
        ];
        if let Some((key, _)) = filenames.iter().find(|(_, name)| name.is_empty()) {
            return Err(SettingsError::Invalid(format!("{key} must not be empty")));
        }
        Ok(())
    }

    /// `API_PREFIX` and `API_VERSION` joined by `/`, skipping empty parts.
    ///
    /// Always starts with `/` unless both parts are empty.
    pub fn api_base_endpoint(&self) -> String {
        let joined = [self.api_prefix.as_str(), self.api_version.as_str()]
            .iter()
            .map(|part| part.trim_matches('/'))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        if joined.is_empty() {
            joined
        } else {
            format!("/{joined}")
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_hosts.iter().any(|h| h == "*")
    }

    pub fn raw_path(&self) -> PathBuf {
        self.data_dir.join(&self.raw_filename)
    }

    pub fn clean_path(&self) -> PathBuf {
        self.data_dir.join(&self.clean_filename)
    }

    pub fn params_path(&self) -> PathBuf {
        self.ml_dir.join(&self.optim_params_filename)
    }

    pub fn pipeline_path(&self) -> PathBuf {
        self.ml_dir.join(&self.ml_model_pipeline_filename)
    }

    pub fn store(&self) -> ArtifactStore {
        if self.compress_artifacts {
            ArtifactStore::new(Compression::Gzip)
        } else {
            ArtifactStore::new(Compression::None)
        }
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, SettingsError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| SettingsError::Parse {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, SettingsError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::Parse {
            key,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

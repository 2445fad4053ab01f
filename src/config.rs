// src/config.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::genai::client::DEFAULT_API_BASE;
use crate::utils::AppError;
use crate::validation::NumberFormat;

/// Environment variable holding the generative model API key.
pub const API_KEY_VAR: &str = "GEMINI_KEY";
/// Optional override of the API base URL.
pub const API_BASE_VAR: &str = "GEMINI_API_BASE";
/// Dotenv file read from the working directory, if present.
pub const ENV_FILE: &str = ".env";

/// Everything a run needs, resolved once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub input_dir: PathBuf,
    pub data_dir: PathBuf,
    pub report_dir: PathBuf,
    pub debug: bool,
    pub reuse_tables: bool,
    pub number_format: NumberFormat,
}

/// Settings that come from the command line rather than the environment.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub model: String,
    pub input_dir: PathBuf,
    pub data_dir: PathBuf,
    pub report_dir: PathBuf,
    pub debug: bool,
    pub reuse_tables: bool,
    pub number_format: NumberFormat,
}

impl Config {
    /// Reads the credential from the process environment, then from `.env`.
    /// Variables already set in the process win over the file.
    pub fn from_env(settings: RunSettings) -> Result<Self, AppError> {
        let file_vars = read_env_file(Path::new(ENV_FILE));
        Self::from_lookup(settings, |key| {
            std::env::var(key).ok().or_else(|| file_vars.get(key).cloned())
        })
    }

    /// Builds the config with an arbitrary variable lookup.
    /// A missing or blank API key is fatal.
    pub fn from_lookup<F>(settings: RunSettings, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                AppError::Config(format!(
                    "No API key found. Set the {} environment variable or add it to {}.",
                    API_KEY_VAR, ENV_FILE
                ))
            })?;

        let api_base = lookup(API_BASE_VAR)
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        tracing::info!("API key loaded successfully.");
        tracing::debug!("Using model API base: {}", api_base);

        Ok(Self {
            api_key,
            api_base,
            model: settings.model,
            input_dir: settings.input_dir,
            data_dir: settings.data_dir,
            report_dir: settings.report_dir,
            debug: settings.debug,
            reuse_tables: settings.reuse_tables,
            number_format: settings.number_format,
        })
    }
}

/// Variables from a dotenv-style file. A missing file yields none; bad lines
/// are logged and skipped.
pub fn read_env_file(path: &Path) -> HashMap<String, String> {
    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => entries,
        Err(e) => {
            if !e.not_found() {
                tracing::warn!("Ignoring unreadable {}: {}", path.display(), e);
            }
            return HashMap::new();
        }
    };

    let mut vars = HashMap::new();
    for entry in entries {
        match entry {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(e) => tracing::warn!("Skipping line in {}: {}", path.display(), e),
        }
    }
    tracing::debug!("Loaded {} variables from {}", vars.len(), path.display());
    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RunSettings {
        RunSettings {
            model: "gemini-2.0-flash".to_string(),
            input_dir: PathBuf::from("./pdf_inputs"),
            data_dir: PathBuf::from("./data"),
            report_dir: PathBuf::from("./reports"),
            debug: false,
            reuse_tables: false,
            number_format: NumberFormat::Strict,
        }
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let err = Config::from_lookup(settings(), |_| None).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn blank_key_is_a_config_error() {
        let err = Config::from_lookup(settings(), |_| Some("   ".to_string())).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn key_and_base_override_are_read() {
        let env: HashMap<&str, &str> = [
            (API_KEY_VAR, "abc123"),
            (API_BASE_VAR, "http://localhost:8080"),
        ]
        .into_iter()
        .collect();

        let config =
            Config::from_lookup(settings(), |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.api_key, "abc123");
        assert_eq!(config.api_base, "http://localhost:8080");
        assert_eq!(config.model, "gemini-2.0-flash");
    }

    #[test]
    fn base_defaults_to_public_endpoint() {
        let config =
            Config::from_lookup(settings(), |k| (k == API_KEY_VAR).then(|| "k".to_string())).unwrap();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn key_can_come_from_env_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".env");
        std::fs::write(&path, "# local credentials\nGEMINI_KEY=from_file\n").unwrap();

        let vars = read_env_file(&path);
        let config = Config::from_lookup(settings(), |k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.api_key, "from_file");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn missing_env_file_yields_no_variables() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(read_env_file(&tmp.path().join(".env")).is_empty());
    }
}

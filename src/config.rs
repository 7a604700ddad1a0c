//! Configuration for the airline agents
//!
//! One [`AirlineConfig`] is built at startup and handed to whatever needs it.
//! Precedence is defaults, then an optional TOML file, then environment
//! variables. The credential only ever comes from the environment.

use clap::ValueEnum;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::agent::AgentId;
use crate::error::{AgentsError, Result};

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const BASE_URL_VAR: &str = "AIRLINE_BASE_URL";
pub const MODEL_VAR: &str = "AIRLINE_MODEL";
pub const TEMPERATURE_VAR: &str = "AIRLINE_TEMPERATURE";
pub const MAX_STEPS_VAR: &str = "AIRLINE_MAX_STEPS";
pub const LOG_FORMAT_VAR: &str = "AIRLINE_LOG_FORMAT";

/// Gemini's OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const DEFAULT_MAX_STEPS: usize = 10;

/// Model bound to each agent, plus the guardrail classifier model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub triage: String,
    pub seat_booking: String,
    pub flight_status: String,
    pub cancellation: String,
    pub faq: String,
    pub guardrail: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            triage: "gemini-2.0-flash".to_string(),
            seat_booking: "gemini-1.5-flash".to_string(),
            flight_status: "gemini-1.5-pro".to_string(),
            cancellation: "gemini-2.0-flash".to_string(),
            faq: "gemini-2.0-flash".to_string(),
            guardrail: "gemini-2.0-flash".to_string(),
        }
    }
}

impl ModelConfig {
    pub fn for_agent(&self, id: AgentId) -> &str {
        match id {
            AgentId::Triage => &self.triage,
            AgentId::SeatBooking => &self.seat_booking,
            AgentId::FlightStatus => &self.flight_status,
            AgentId::Cancellation => &self.cancellation,
            AgentId::Faq => &self.faq,
        }
    }

    /// Bind every agent and the guardrails to `model`.
    pub fn set_all(&mut self, model: &str) {
        for slot in [
            &mut self.triage,
            &mut self.seat_booking,
            &mut self.flight_status,
            &mut self.cancellation,
            &mut self.faq,
            &mut self.guardrail,
        ] {
            *slot = model.to_string();
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = AgentsError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(AgentsError::config(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

/// Non-secret settings as they appear in a TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    #[serde(default)]
    pub models: Option<ModelConfig>,
    pub temperature: Option<f32>,
    pub max_steps: Option<usize>,
    pub log_format: Option<LogFormat>,
}

impl FileConfig {
    pub fn parse(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| AgentsError::config(format!("invalid config file: {e}")))
    }
}

#[derive(Clone, Debug)]
pub struct AirlineConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub models: ModelConfig,
    pub temperature: Option<f32>,
    /// Model calls allowed within one turn.
    pub max_steps: usize,
    pub log_format: LogFormat,
}

impl AirlineConfig {
    /// Defaults around an explicit credential.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            models: ModelConfig::default(),
            temperature: None,
            max_steps: DEFAULT_MAX_STEPS,
            log_format: LogFormat::default(),
        }
    }

    /// Defaults plus environment overrides. Fails without `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(None, |key| std::env::var(key).ok())
    }

    /// Defaults, then the TOML file at `path`, then environment overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AgentsError::config(format!("could not read config file `{}`: {e}", path.display()))
        })?;
        let file = FileConfig::parse(&raw)?;
        Self::from_lookup(Some(file), |key| std::env::var(key).ok())
    }

    /// Build from an optional file layer and an environment lookup.
    pub fn from_lookup<F>(file: Option<FileConfig>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                AgentsError::config(format!("{API_KEY_VAR} environment variable is not set"))
            })?;

        let mut config = Self::with_api_key(api_key);
        if let Some(file) = file {
            config.apply_file(file);
        }
        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(base_url) = file.base_url {
            self.base_url = base_url;
        }
        if let Some(models) = file.models {
            self.models = models;
        }
        if file.temperature.is_some() {
            self.temperature = file.temperature;
        }
        if let Some(max_steps) = file.max_steps {
            self.max_steps = max_steps;
        }
        if let Some(format) = file.log_format {
            self.log_format = format;
        }
    }

    fn apply_env<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base_url) = var(BASE_URL_VAR) {
            self.base_url = base_url;
        }
        if let Some(model) = var(MODEL_VAR) {
            self.models.set_all(model.trim());
        }
        if let Some(raw) = var(TEMPERATURE_VAR) {
            let t = raw.trim().parse::<f32>().map_err(|_| {
                AgentsError::config(format!("invalid {TEMPERATURE_VAR} `{raw}`"))
            })?;
            self.temperature = Some(t);
        }
        if let Some(raw) = var(MAX_STEPS_VAR) {
            self.max_steps = raw.trim().parse::<usize>().map_err(|_| {
                AgentsError::config(format!("invalid {MAX_STEPS_VAR} `{raw}`"))
            })?;
        }
        if let Some(raw) = var(LOG_FORMAT_VAR) {
            self.log_format = raw.parse()?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(AgentsError::config("max_steps must be at least 1"));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(AgentsError::config(format!(
                    "temperature {t} is outside 0.0..=2.0"
                )));
            }
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(AgentsError::config(format!(
                "base_url `{}` must be an http(s) URL",
                self.base_url
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = AirlineConfig::from_lookup(None, env(&[])).unwrap_err();
        assert!(matches!(err, AgentsError::ConfigError { .. }));
        assert!(err.to_string().contains(API_KEY_VAR));

        let err = AirlineConfig::from_lookup(None, env(&[(API_KEY_VAR, "   ")])).unwrap_err();
        assert!(matches!(err, AgentsError::ConfigError { .. }));
    }

    #[test]
    fn test_defaults() {
        let config = AirlineConfig::from_lookup(None, env(&[(API_KEY_VAR, "secret")])).unwrap();
        assert_eq!(config.api_key.expose_secret(), "secret");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(config.models.for_agent(AgentId::SeatBooking), "gemini-1.5-flash");
        assert_eq!(config.models.for_agent(AgentId::FlightStatus), "gemini-1.5-pro");
        assert_eq!(config.models.for_agent(AgentId::Triage), "gemini-2.0-flash");
        assert_eq!(config.log_format, LogFormat::Compact);
        // Debug never prints the credential
        assert!(!format!("{config:?}").contains("secret\""));
    }

    #[test]
    fn test_env_overrides() {
        let config = AirlineConfig::from_lookup(
            None,
            env(&[
                (API_KEY_VAR, "k"),
                (MODEL_VAR, "local-model"),
                (TEMPERATURE_VAR, "0.3"),
                (MAX_STEPS_VAR, "4"),
                (LOG_FORMAT_VAR, "JSON"),
                (BASE_URL_VAR, "http://localhost:8080/v1"),
            ]),
        )
        .unwrap();
        for id in AgentId::all() {
            assert_eq!(config.models.for_agent(id), "local-model");
        }
        assert_eq!(config.models.guardrail, "local-model");
        assert_eq!(config.temperature, Some(0.3));
        assert_eq!(config.max_steps, 4);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_invalid_env_values() {
        for (key, value) in [
            (TEMPERATURE_VAR, "warm"),
            (TEMPERATURE_VAR, "5.0"),
            (MAX_STEPS_VAR, "0"),
            (LOG_FORMAT_VAR, "xml"),
            (BASE_URL_VAR, "ftp://example.com"),
        ] {
            let result = AirlineConfig::from_lookup(None, env(&[(API_KEY_VAR, "k"), (key, value)]));
            assert!(
                matches!(result, Err(AgentsError::ConfigError { .. })),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn test_file_layer_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airline.toml");
        std::fs::write(
            &path,
            r#"
base_url = "http://127.0.0.1:9000/v1"
max_steps = 6
log_format = "pretty"

[models]
faq = "faq-model"
"#,
        )
        .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let file = FileConfig::parse(&raw).unwrap();
        let config =
            AirlineConfig::from_lookup(Some(file), env(&[(API_KEY_VAR, "k"), (MAX_STEPS_VAR, "3")]))
                .unwrap();

        assert_eq!(config.base_url, "http://127.0.0.1:9000/v1");
        assert_eq!(config.models.faq, "faq-model");
        // unspecified models keep their defaults
        assert_eq!(config.models.seat_booking, "gemini-1.5-flash");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.max_steps, 3);
    }

    #[test]
    fn test_file_rejects_unknown_keys() {
        let err = FileConfig::parse("api_key = \"nope\"").unwrap_err();
        assert!(matches!(err, AgentsError::ConfigError { .. }));
    }

    #[test]
    fn test_from_file_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = AirlineConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("could not read config file"));
    }
}

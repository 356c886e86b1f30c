//! Council configuration - TOML file loading with environment overrides.
//!
//! The built-in default mirrors a distributed Ollama topology: a chairman
//! container on the local host plus remote councilor instances. Deployments
//! override it with a TOML file or the `COUNCIL_CHAIRMAN_HOST` /
//! `COUNCIL_OLLAMA_PORT` environment variables.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::registry::{CouncilRegistry, Endpoint, ModelSpec, ParticipantSeed, RegistryError, Role};

/// Default Ollama service port.
pub const DEFAULT_OLLAMA_PORT: u16 = 11434;

/// Default per-request timeout. Local model inference is slow, so this is
/// on the order of minutes.
const DEFAULT_TIMEOUT_SECS: u64 = 180;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// One participant as declared in configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub model: String,
    pub role: Role,
    /// Present: the model is customized with this system instruction.
    /// Absent: the model is served unmodified.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl ParticipantConfig {
    fn seed(&self) -> ParticipantSeed {
        ParticipantSeed {
            endpoint: Endpoint::new(self.host.clone(), self.port),
            model: self.model.clone(),
            role: self.role,
            spec: match &self.system_prompt {
                Some(system_prompt) => ModelSpec::Customized {
                    system_prompt: system_prompt.clone(),
                },
                None => ModelSpec::Standard,
            },
        }
    }
}

/// Top-level council configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CouncilConfig {
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    pub participants: Vec<ParticipantConfig>,
}

impl CouncilConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Build the validated registry for this configuration.
    pub fn registry(&self) -> Result<CouncilRegistry, RegistryError> {
        CouncilRegistry::new(self.participants.iter().map(ParticipantConfig::seed).collect())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CouncilConfig {
    fn default() -> Self {
        let chairman_host =
            std::env::var("COUNCIL_CHAIRMAN_HOST").unwrap_or_else(|_| "ollama".to_string());
        let port = std::env::var("COUNCIL_OLLAMA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_OLLAMA_PORT);

        let councilor = |model: &str| ParticipantConfig {
            host: "ollama".to_string(),
            port,
            model: model.to_string(),
            role: Role::Councilor,
            system_prompt: None,
        };

        Self {
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            participants: vec![
                ParticipantConfig {
                    host: chairman_host,
                    port,
                    model: "llama3.2:1b".to_string(),
                    role: Role::Chairman,
                    system_prompt: None,
                },
                councilor("qwen3:0.6b"),
                councilor("gemma3:1b"),
                councilor("qwen3:1.7b"),
            ],
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_OLLAMA_PORT
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

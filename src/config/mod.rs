//! Configuration management for yuwen
//!
//! A `Config` is built once by the bootstrapper for a chosen [`Environment`]
//! and handed to the components that need it. Nothing reads configuration
//! from global state.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::annotation::{ColorTag, Tool};

/// Deployment environment the application was started for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Environment {
    /// Local backend on the developer machine
    #[default]
    Development,
    /// Hosted backend
    Production,
    /// No backend at all; network features are unavailable
    FrontendOnly,
}

impl Environment {
    /// Name used on the command line and in config files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::FrontendOnly => "frontend-only",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "frontend-only" | "frontend" | "offline" => Ok(Self::FrontendOnly),
            _ => Err(format!(
                "Unknown environment: {}. Options: development, production, frontend-only",
                s
            )),
        }
    }
}

/// Backend API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST backend, `None` when running without one
    pub base_url: Option<String>,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

/// What happens to a note when the annotation it is attached to goes away
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteRetention {
    /// Keep the note, detached from the removed annotation
    #[default]
    Detach,
    /// Delete the note together with its annotation
    Cascade,
}

/// Annotation engine behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSettings {
    /// Note lifecycle on annotation removal
    #[serde(default)]
    pub note_retention: NoteRetention,

    /// Accept selections that intersect an existing annotation
    #[serde(default = "default_allow_overlap")]
    pub allow_overlap: bool,

    /// Tool used when annotation mode is entered without an explicit choice
    #[serde(default)]
    pub default_tool: Tool,

    /// Colour used when annotation mode is entered without an explicit choice
    #[serde(default)]
    pub default_color: ColorTag,
}

fn default_allow_overlap() -> bool {
    true
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self {
            note_retention: NoteRetention::default(),
            allow_overlap: default_allow_overlap(),
            default_tool: Tool::default(),
            default_color: ColorTag::default(),
        }
    }
}

/// AI tutor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorSettings {
    /// Model name sent to the chat proxy
    pub default_model: String,
}

impl Default for TutorSettings {
    fn default() -> Self {
        Self { default_model: "deepseek1.8".to_string() }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Environment this configuration was selected for
    pub environment: Environment,

    /// Backend API
    pub api: ApiConfig,

    /// Annotation engine behaviour
    #[serde(default)]
    pub annotation: AnnotationSettings,

    /// AI tutor
    #[serde(default)]
    pub tutor: TutorSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

impl Config {
    const DEVELOPMENT_API_URL: &'static str = "http://localhost:5000";
    const PRODUCTION_API_URL: &'static str = "https://api.ai-yuwen.com";
    const DEFAULT_TIMEOUT_MS: u64 = 10_000;

    /// Build the configuration for an environment
    pub fn for_environment(environment: Environment) -> Self {
        let base_url = match environment {
            Environment::Development => Some(Self::DEVELOPMENT_API_URL.to_string()),
            Environment::Production => Some(Self::PRODUCTION_API_URL.to_string()),
            Environment::FrontendOnly => None,
        };

        Self {
            environment,
            api: ApiConfig { base_url, timeout_ms: Self::DEFAULT_TIMEOUT_MS },
            annotation: AnnotationSettings::default(),
            tutor: TutorSettings::default(),
        }
    }

    /// Load the configuration for an environment
    ///
    /// Uses the file at `path` when it exists, the environment defaults otherwise.
    /// The environment argument always wins over the one stored in the file,
    /// and a file saved for another environment gets that environment's backend.
    pub fn load(environment: Environment, path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::for_environment(environment));
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let mut config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config {:?}", path))?;

        if config.environment != environment {
            tracing::debug!(
                stored = config.environment.as_str(),
                requested = environment.as_str(),
                "Config file environment overridden"
            );
            config.environment = environment;
            config.api.base_url = Self::for_environment(environment).api.base_url;
        }

        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs =
            ProjectDirs::from("", "", "yuwen").context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.json"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Result<PathBuf> {
        let proj_dirs =
            ProjectDirs::from("", "", "yuwen").context("Failed to determine data directory")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Whether a backend is reachable in this environment
    pub fn has_backend(&self) -> bool {
        self.api.base_url.is_some()
    }
}

//! Configuration for the hiring board client.
//!
//! Settings are read from `.hiring-board/board.toml` in the project
//! directory, falling back to the user config directory, and are layered
//! file → environment → CLI.
//!
//! ```toml
//! [server]
//! base_url = "http://localhost:4000/api"
//! timeout_secs = 10
//! page_size = 3
//!
//! [live]
//! max_retries = 3
//! base_delay_ms = 1000
//! max_delay_ms = 10000
//!
//! [session]
//! name = "alice"
//! color = "#ffb3ba"
//! ```

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::board::gateway::DEFAULT_PAGE_SIZE;
use crate::board::live::ReconnectPolicy;
use crate::board::models::{AVATAR_COLORS, DEFAULT_AVATAR_COLOR, SessionUser};
use crate::errors::BoardError;

pub const CONFIG_DIR: &str = ".hiring-board";
pub const CONFIG_FILE: &str = "board.toml";

pub const ENV_BASE_URL: &str = "HIRING_BOARD_URL";
pub const ENV_USER: &str = "HIRING_BOARD_USER";
pub const ENV_COLOR: &str = "HIRING_BOARD_COLOR";

static COLOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap());

/// Server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Candidates requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_base_url() -> String {
    "http://localhost:4000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
        }
    }
}

/// Live update reconnect settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for LiveSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl LiveSection {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Default identity for commands that act on the board.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Root of `board.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub live: LiveSection,
    #[serde(default)]
    pub session: SessionSection,
}

impl BoardToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse board.toml")
    }

    /// Missing file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize board.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Human-readable problems; empty when the configuration is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.base_url.trim().is_empty() {
            warnings.push("server.base_url must not be empty".to_string());
        }
        if self.server.page_size == 0 {
            warnings.push("server.page_size must be at least 1".to_string());
        }
        if self.live.max_delay_ms == 0 {
            warnings.push("live.max_delay_ms must be greater than 0".to_string());
        } else if self.live.max_delay_ms < self.live.base_delay_ms {
            warnings.push(format!(
                "live.max_delay_ms ({}) is below live.base_delay_ms ({})",
                self.live.max_delay_ms, self.live.base_delay_ms
            ));
        }
        if let Some(color) = &self.session.color {
            if !COLOR_REGEX.is_match(color) {
                warnings.push(format!(
                    "Invalid session.color '{}': expected a hex color like '#ffb3ba'",
                    color
                ));
            } else if !AVATAR_COLORS.iter().any(|c| c.eq_ignore_ascii_case(color)) {
                warnings.push(format!(
                    "session.color '{}' is not an avatar color; choose one of {}",
                    color,
                    AVATAR_COLORS.join(", ")
                ));
            }
        }

        warnings
    }
}

/// Pick the config file: the project one if present, else the user one if
/// present, else the (not yet existing) project path.
pub fn resolve_config_path(project_dir: &Path) -> PathBuf {
    let project = project_dir.join(CONFIG_DIR).join(CONFIG_FILE);
    if project.exists() {
        return project;
    }
    if let Some(user) = dirs::config_dir().map(|d| d.join("hiring-board").join(CONFIG_FILE))
        && user.exists()
    {
        return user;
    }
    project
}

/// Effective configuration after layering.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub config_path: PathBuf,
    pub toml: BoardToml,
}

impl BoardConfig {
    /// Load from `explicit` if given, else from the resolved default location.
    pub fn load(project_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => resolve_config_path(project_dir),
        };
        let toml = match explicit {
            Some(path) => BoardToml::load(path)?,
            None => BoardToml::load_or_default(&config_path)?,
        };
        Ok(Self { config_path, toml })
    }

    /// Apply `HIRING_BOARD_*` overrides from the process environment.
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v: &String| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_BASE_URL) {
            self.toml.server.base_url = url;
        }
        if let Some(name) = non_empty(ENV_USER) {
            self.toml.session.name = Some(name);
        }
        if let Some(color) = non_empty(ENV_COLOR) {
            self.toml.session.color = Some(color);
        }
        self
    }

    pub fn with_cli_overrides(
        mut self,
        base_url: Option<String>,
        name: Option<String>,
        color: Option<String>,
    ) -> Self {
        if let Some(url) = base_url {
            self.toml.server.base_url = url;
        }
        if let Some(name) = name {
            self.toml.session.name = Some(name);
        }
        if let Some(color) = color {
            self.toml.session.color = Some(color);
        }
        self
    }

    pub fn base_url(&self) -> &str {
        &self.toml.server.base_url
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.toml.server.timeout_secs)
    }

    pub fn page_size(&self) -> u32 {
        self.toml.server.page_size
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.toml.live.reconnect_policy()
    }

    /// Session identity, if a name is configured.
    pub fn session(&self) -> Result<Option<SessionUser>, BoardError> {
        let Some(name) = &self.toml.session.name else {
            return Ok(None);
        };
        let color = self
            .toml
            .session
            .color
            .as_deref()
            .unwrap_or(DEFAULT_AVATAR_COLOR);
        SessionUser::new(name, color).map(Some)
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

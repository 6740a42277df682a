//! Configuration for notedeck paths and registry behaviour.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (NOTEDECK_HOME, NOTEDECK_LIBRARY)
//! 2. Config file (.notedeck/config.yaml)
//! 3. Defaults (~/.notedeck, ~/.notedeck/library)
//!
//! Config file discovery:
//! - Searches current directory and parents for .notedeck/config.yaml
//! - Paths in config file are relative to the project root (parent of .notedeck/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::blocks::{PatternLocator, GENERIC_KIND};
use crate::core::RegistryPolicy;
use crate::domain::ContentKind;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub registry: Option<RegistryConfig>,
    #[serde(default)]
    pub blocks: Option<BlocksConfig>,
    #[serde(default)]
    pub export: Option<ExportConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Base directory; the library defaults to `<home>/library`
    pub home: Option<String>,
    /// Library directory (Library.json, SubjectsTopics.json, Library.tex, ...)
    pub library: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub auto_repair: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlocksConfig {
    pub generic_kind: Option<String>,
    #[serde(default)]
    pub extra_kinds: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Header template containing the `{{CONTENT}}` marker
    pub template: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub home: PathBuf,
    pub library: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub auto_repair: bool,
    pub generic_kind: String,
    pub extra_kinds: Vec<String>,
    pub export_template: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Defaults rooted at `home`
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            library: home.join("library"),
            home,
            config_file: None,
            auto_repair: true,
            generic_kind: GENERIC_KIND.to_string(),
            extra_kinds: Vec::new(),
            export_template: None,
        }
    }

    pub fn units_path(&self) -> PathBuf {
        self.library.join("Library.json")
    }

    pub fn topics_path(&self) -> PathBuf {
        self.library.join("SubjectsTopics.json")
    }

    pub fn library_document(&self) -> PathBuf {
        self.library.join("Library.tex")
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.library.join("Module")
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.library.join("Scripts")
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.library.join("Projects")
    }

    pub fn policy(&self) -> RegistryPolicy {
        RegistryPolicy {
            auto_repair: self.auto_repair,
        }
    }

    /// Block locator recognising the content kinds, any extra kinds and the
    /// generic wrap kind
    pub fn locator(&self) -> PatternLocator {
        PatternLocator::new(
            ContentKind::ALL.iter().map(|k| k.env_name()),
            [self.generic_kind.as_str()],
        )
        .with_titled_kinds(self.extra_kinds.iter().cloned())
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".notedeck").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Combine config file, environment overrides and defaults
fn resolve_config(
    default_home: PathBuf,
    config_file: Option<PathBuf>,
    env_home: Option<String>,
    env_library: Option<String>,
) -> Result<ResolvedConfig> {
    let Some(config_path) = config_file else {
        let home = env_home.map(PathBuf::from).unwrap_or(default_home);
        let mut resolved = ResolvedConfig::with_home(home);
        if let Some(library) = env_library {
            resolved.library = PathBuf::from(library);
        }
        return Ok(resolved);
    };

    let config = load_config_file(&config_path)?;

    // Project root is the parent of .notedeck/
    let base_dir = config_path
        .parent()
        .and_then(|p| p.parent())
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let home = match (env_home, &config.paths.home) {
        (Some(env_home), _) => PathBuf::from(env_home),
        (None, Some(home)) => resolve_path(&base_dir, home),
        (None, None) => default_home,
    };

    let library = match (env_library, &config.paths.library) {
        (Some(env_lib), _) => PathBuf::from(env_lib),
        (None, Some(lib)) => resolve_path(&base_dir, lib),
        (None, None) => home.join("library"),
    };

    let blocks = config.blocks.as_ref();

    Ok(ResolvedConfig {
        home,
        library,
        config_file: Some(config_path.clone()),
        auto_repair: config
            .registry
            .as_ref()
            .and_then(|r| r.auto_repair)
            .unwrap_or(true),
        generic_kind: blocks
            .and_then(|b| b.generic_kind.clone())
            .unwrap_or_else(|| GENERIC_KIND.to_string()),
        extra_kinds: blocks.map(|b| b.extra_kinds.clone()).unwrap_or_default(),
        export_template: config
            .export
            .as_ref()
            .and_then(|e| e.template.as_deref())
            .map(|t| resolve_path(&base_dir, t)),
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".notedeck");

    resolve_config(
        default_home,
        find_config_file(),
        std::env::var("NOTEDECK_HOME").ok(),
        std::env::var("NOTEDECK_LIBRARY").ok(),
    )
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

use crate::schema::StoryrankConfig;
use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Jsonc,
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;

        match ext {
            "jsonc" => Some(Self::Jsonc),
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: StoryrankConfig,
    /// `None` when no file was found and the built-in defaults apply
    pub path: Option<PathBuf>,
    pub format: Option<ConfigFormat>,
}

pub fn load_config(config_path: Option<&Path>) -> Result<StoryrankConfig> {
    resolve_config(config_path).map(|r| r.config)
}

/// Load the explicit path if given, else the first discovered file, else the
/// built-in defaults.
pub fn resolve_config(config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let path = match config_path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config_file(),
    };

    match path {
        Some(path) => load_config_from_file(&path),
        None => {
            debug!("No configuration file found, using defaults");
            Ok(ResolvedConfig {
                config: expand_env_vars(StoryrankConfig::default()),
                path: None,
                format: None,
            })
        }
    }
}

pub fn load_config_from_file(path: &Path) -> Result<ResolvedConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| anyhow!("Unknown config format for: {}", path.display()))?;

    let config = parse_config_content(&content, format)?;
    let config = expand_env_vars(config);
    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    debug!(path = %path.display(), "Loaded configuration");

    Ok(ResolvedConfig {
        config,
        path: Some(path.to_path_buf()),
        format: Some(format),
    })
}

fn parse_config_content(content: &str, format: ConfigFormat) -> Result<StoryrankConfig> {
    match format {
        ConfigFormat::Jsonc => json5::from_str(content).context("Failed to parse JSONC"),
        ConfigFormat::Json => serde_json::from_str(content).context("Failed to parse JSON"),
        ConfigFormat::Yaml => serde_yaml_ng::from_str(content).context("Failed to parse YAML"),
    }
}

const CONFIG_CANDIDATES: &[&str] = &[
    "storyrank.jsonc",
    "storyrank.json",
    "storyrank.yml",
    "storyrank.yaml",
    ".storyrank.jsonc",
    ".storyrank.json",
    ".storyrank.yml",
    ".storyrank.yaml",
];

pub fn find_config_file() -> Option<PathBuf> {
    if let Some(path) = find_in_dir(Path::new(".")) {
        return Some(path);
    }

    let home = env::var("HOME").ok()?;
    find_in_dir(&PathBuf::from(home).join(".config").join("storyrank"))
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_CANDIDATES
        .iter()
        .map(|candidate| dir.join(candidate))
        .find(|path| path.exists())
}

fn expand_env_vars(mut config: StoryrankConfig) -> StoryrankConfig {
    for backend in config.providers.backends.iter_mut() {
        backend.endpoint = expand_env_string(&backend.endpoint);
        backend.api_keys = backend
            .api_keys
            .iter()
            .map(|key| expand_env_string(key))
            .collect();
    }
    config
}

/// Expand `${VAR}` and `$VAR` from the environment.
///
/// Unset variables are left in place so callers can detect them.
pub fn expand_env_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        if chars.peek() == Some(&'{') {
            chars.next();
            let var_name: String = chars.by_ref().take_while(|&c| c != '}').collect();
            match env::var(&var_name) {
                Ok(value) => result.push_str(&value),
                Err(_) => {
                    result.push_str("${");
                    result.push_str(&var_name);
                    result.push('}');
                }
            }
        } else {
            let mut var_name = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_alphanumeric() || c == '_' {
                    var_name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            if var_name.is_empty() {
                result.push('$');
            } else if let Ok(value) = env::var(&var_name) {
                result.push_str(&value);
            } else {
                result.push('$');
                result.push_str(&var_name);
            }
        }
    }

    result
}

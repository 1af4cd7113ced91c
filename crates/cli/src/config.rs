use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::{debug, info};

use crate::exit::UserError;

pub const CONFIG_ENV: &str = "MP3REPAIR_CONFIG";
pub const CONFIG_FILE: &str = "defaults.yaml";

type Sections = BTreeMap<String, BTreeMap<String, Value>>;

/// Per-command flag overrides read from the configuration file.
#[derive(Clone, Debug, Default)]
pub struct Config {
    path: PathBuf,
    sections: Sections,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

impl ConfigError {
    pub fn to_user_error(&self, path: &Path) -> UserError {
        UserError::new(
            format!("The configuration file \"{}\" cannot be used.", path.display()),
            format!("The file could not be read: {}.", self),
            format!(
                "Correct the file, delete it, or point ${} at a different file.",
                CONFIG_ENV
            ),
        )
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var(CONFIG_ENV) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(expand(value.trim())),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join(CONFIG_FILE))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE)),
        Err(_) => PathBuf::from(CONFIG_FILE),
    }
}

impl Config {
    /// A missing file yields an empty configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no configuration file");
            return Ok(Self {
                path: path.to_path_buf(),
                sections: Sections::new(),
            });
        }
        let contents = fs::read_to_string(path)?;
        let config = Self::parse(path, &contents)?;
        info!(path = %path.display(), sections = config.sections.len(), "loaded configuration");
        Ok(config)
    }

    pub fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let sections: Option<Sections> = serde_yaml::from_str(contents)?;
        Ok(Self {
            path: path.to_path_buf(),
            sections: sections.unwrap_or_default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the configuration file; application state lives beside it.
    pub fn data_dir(&self) -> PathBuf {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn lookup(&self, section: &str, flag: &str) -> Option<&Value> {
        self.sections.get(section)?.get(flag)
    }
}

/// Expands `$NAME`, `${NAME}`, and a leading `~` using the process environment.
pub fn expand(value: &str) -> String {
    expand_with(value, |name| env::var(name).ok())
}

pub fn expand_with(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    if rest == "~" || rest.starts_with("~/") {
        out.push_str(&lookup("HOME").unwrap_or_default());
        rest = &rest[1..];
    }
    let mut chars = rest.char_indices().peekable();
    while let Some((index, ch)) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        let tail = &rest[index + 1..];
        let (name, consumed) = if let Some(braced) = tail.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = tail
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(tail.len());
            (&tail[..end], end)
        };
        if name.is_empty() {
            out.push('$');
            continue;
        }
        out.push_str(&lookup(name).unwrap_or_default());
        for _ in 0..tail[..consumed].chars().count() {
            chars.next();
        }
    }
    out
}

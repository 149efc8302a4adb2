use std::fs;
use std::path::{Path, PathBuf};

use crate::io::local_store::atomic_write;
use crate::model::config::AppConfig;

/// Environment variable pointing at an alternate config file
pub const CONFIG_ENV: &str = "TWIG_CONFIG";

/// Keys accepted by `tw config set` / `tw config unset`
pub const CONFIG_KEYS: &[&str] = &[
    "remote.auth_url",
    "remote.tasks_url",
    "remote.timeout_secs",
    "storage.data_dir",
    "session.clear_cache_on_logout",
    "log.level",
];

/// Error type for config I/O
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("could not parse config: {0}")]
    EditError(#[from] toml_edit::TomlError),
    #[error("unknown config key '{0}' (known keys: {keys})", keys = CONFIG_KEYS.join(", "))]
    UnknownKey(String),
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// Config file location: explicit path, then `$TWIG_CONFIG`, then
/// `$XDG_CONFIG_HOME/twig/config.toml`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(CONFIG_ENV)
        && !path.is_empty()
    {
        return PathBuf::from(path);
    }
    xdg_dir("XDG_CONFIG_HOME", ".config")
        .join("twig")
        .join("config.toml")
}

/// Data directory: explicit override, then `storage.data_dir`, then
/// `$XDG_DATA_HOME/twig`.
pub fn data_dir(config: &AppConfig, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| config.storage.data_dir.clone())
        .unwrap_or_else(|| xdg_dir("XDG_DATA_HOME", ".local/share").join("twig"))
}

fn xdg_dir(var: &str, home_fallback: &str) -> PathBuf {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(home_fallback))
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

// ---------------------------------------------------------------------------
// Read / edit
// ---------------------------------------------------------------------------

/// Read the config file. A missing file yields the defaults.
pub fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let text = read_text(path)?;
    Ok(toml::from_str(&text)?)
}

fn read_text(path: &Path) -> Result<String, ConfigError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Set one `section.field` key in the config file, preserving the rest of the
/// file's formatting. Creates the file if needed.
pub fn set_value(path: &Path, key: &str, raw: &str) -> Result<(), ConfigError> {
    let (section, field) = split_key(key)?;
    let value = parse_value(key, raw)?;
    let mut doc: toml_edit::DocumentMut = read_text(path)?.parse()?;
    if !doc.contains_key(section) {
        doc[section] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc[section][field] = toml_edit::Item::Value(value);
    write_doc(path, &doc)
}

/// Remove one key from the config file, falling back to its default.
pub fn unset_value(path: &Path, key: &str) -> Result<(), ConfigError> {
    let (section, field) = split_key(key)?;
    let mut doc: toml_edit::DocumentMut = read_text(path)?.parse()?;
    if let Some(table) = doc.get_mut(section).and_then(|item| item.as_table_mut()) {
        table.remove(field);
    }
    write_doc(path, &doc)
}

fn split_key(key: &str) -> Result<(&str, &str), ConfigError> {
    if !CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey(key.to_string()));
    }
    key.split_once('.')
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
}

fn parse_value(key: &str, raw: &str) -> Result<toml_edit::Value, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    match key {
        "remote.timeout_secs" => raw
            .parse::<u32>()
            .map(|n| toml_edit::Value::from(i64::from(n)))
            .map_err(|_| invalid("expected a whole number of seconds")),
        "session.clear_cache_on_logout" => raw
            .parse::<bool>()
            .map(toml_edit::Value::from)
            .map_err(|_| invalid("expected true or false")),
        "remote.auth_url" | "remote.tasks_url" => {
            if raw.starts_with("http://") || raw.starts_with("https://") {
                Ok(toml_edit::Value::from(raw))
            } else {
                Err(invalid("expected an http:// or https:// URL"))
            }
        }
        _ => Ok(toml_edit::Value::from(raw)),
    }
}

fn write_doc(path: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ConfigError> {
    let text = doc.to_string();
    // Refuse to write something we could not read back
    toml::from_str::<AppConfig>(&text)?;
    let write_err = |e: std::io::Error| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).map_err(write_err)?;
    }
    atomic_write(path, text.as_bytes()).map_err(write_err)
}

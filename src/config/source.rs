//! Key/value layers the resolver merges: environment, config file, in-memory map

use crate::core::error::{LoggerError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One configuration layer as seen by the binder.
///
/// Keys are lowercase field names; values are the raw text of the layer.
pub trait ConfigSource {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory layer, mostly for programmatic overrides and tests
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    name: String,
    values: HashMap<String, String>,
}

impl MapSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashMap::new(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into().to_ascii_lowercase(), value.into());
        self
    }
}

impl ConfigSource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Environment layer: field `flush_interval_ms` under prefix `EVLOG_PRODUCER`
/// is read from `EVLOG_PRODUCER_FLUSH_INTERVAL_MS`
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// Snapshot the process environment
    pub fn from_env(prefix: impl Into<String>) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn variable_name(&self, key: &str) -> String {
        format!("{}_{}", self.prefix, key.to_ascii_uppercase())
    }
}

impl ConfigSource for EnvSource {
    fn name(&self) -> &str {
        &self.prefix
    }

    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(&self.variable_name(key)).cloned()
    }
}

/// Parsed TOML configuration file.
///
/// Top-level scalar keys configure the logger; the `[producer]`,
/// `[enrichment]` and `[rotation]` tables configure the sub-configs.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    document: toml::Table,
}

impl ConfigFile {
    /// Candidate locations for `name`, in lookup order
    pub fn search_paths(name: &str) -> Vec<PathBuf> {
        let mut roots = vec![PathBuf::from(".")];
        if let Some(home) = dirs::home_dir() {
            roots.push(home.join(".evlog.d"));
            roots.insert(1, home);
        }

        let with_ext = format!("{}.toml", name);
        roots
            .iter()
            .flat_map(|dir| [dir.join(name), dir.join(&with_ext)])
            .collect()
    }

    /// Find and load the first existing candidate for `name`
    pub fn discover(name: &str) -> Result<Self> {
        let candidates = Self::search_paths(name);
        match candidates.iter().find(|path| path.is_file()) {
            Some(path) => Self::load(path),
            None => Err(LoggerError::ConfigFileNotFound {
                name: name.to_string(),
                searched: candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation(
                "reading config file",
                format!("cannot read '{}'", path.display()),
                e,
            )
        })?;
        Self::parse(path, &text)
    }

    /// Parse file content; `path` only labels errors
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self> {
        let path = path.into();
        let document: toml::Table = toml::from_str(text)
            .map_err(|e| LoggerError::config_file(path.display().to_string(), e.to_string()))?;
        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Top-level keys, used for the logger itself
    pub fn root(&self) -> FileSection {
        FileSection::from_table(self.path.display().to_string(), &self.document)
    }

    /// A named table; an absent table is an empty section
    pub fn section(&self, name: &str) -> Result<FileSection> {
        let label = format!("{}[{}]", self.path.display(), name);
        match self.document.get(name) {
            None => Ok(FileSection::empty(label)),
            Some(toml::Value::Table(table)) => Ok(FileSection::from_table(label, table)),
            Some(other) => Err(LoggerError::config_file(
                self.path.display().to_string(),
                format!("'{}' must be a table, found {}", name, other.type_str()),
            )),
        }
    }
}

/// Flattened view of one TOML table
#[derive(Debug, Clone)]
pub struct FileSection {
    name: String,
    values: HashMap<String, String>,
}

impl FileSection {
    fn empty(name: String) -> Self {
        Self {
            name,
            values: HashMap::new(),
        }
    }

    fn from_table(name: String, table: &toml::Table) -> Self {
        let values = table
            .iter()
            .filter_map(|(key, value)| {
                scalar_text(value).map(|text| (key.to_ascii_lowercase(), text))
            })
            .collect();
        Self { name, values }
    }
}

impl ConfigSource for FileSection {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Text form of a TOML value; arrays join with commas, nested tables have none
fn scalar_text(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(dt) => Some(dt.to_string()),
        toml::Value::Array(items) => Some(
            items
                .iter()
                .filter_map(scalar_text)
                .collect::<Vec<_>>()
                .join(","),
        ),
        toml::Value::Table(_) => None,
    }
}

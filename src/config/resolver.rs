//! Layered resolution: defaults, then config file, then environment

use super::enrichment::EnrichmentConfig;
use super::logger::LoggerConfig;
use super::producer::ProducerConfig;
use super::rotation::RotationConfig;
use super::source::{ConfigFile, ConfigSource, EnvSource};
use super::validate::{Binder, Diagnostics};
use crate::core::error::LoggerError;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Enables automatic default-logger setup when `true`
pub const AUTOINIT_ENV: &str = "EVLOG_AUTOINIT";
/// Resolution mode used by automatic setup (`env`, `file`, `both`)
pub const AUTOCFG_ENV: &str = "EVLOG_AUTOCFG";
/// Config file name used by automatic setup
pub const CFGFILE_ENV: &str = "EVLOG_CFGFILE";
pub const DEFAULT_CONFIG_FILE: &str = "evlog_config";

/// Environment prefix of each sub-config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvPrefixes {
    pub logger: String,
    pub producer: String,
    pub enrichment: String,
    pub rotation: String,
}

impl Default for EnvPrefixes {
    fn default() -> Self {
        Self {
            logger: "EVLOG".to_string(),
            producer: "EVLOG_PRODUCER".to_string(),
            enrichment: "EVLOG_ENRICH".to_string(),
            rotation: "EVLOG_ROTATION".to_string(),
        }
    }
}

/// Which layers apply on top of the defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    #[default]
    Env,
    File,
    Both,
}

impl ResolveMode {
    pub fn uses_file(&self) -> bool {
        matches!(self, ResolveMode::File | ResolveMode::Both)
    }

    pub fn uses_env(&self) -> bool {
        matches!(self, ResolveMode::Env | ResolveMode::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveMode::Env => "env",
            ResolveMode::File => "file",
            ResolveMode::Both => "both",
        }
    }
}

impl fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "env" => Ok(ResolveMode::Env),
            "file" => Ok(ResolveMode::File),
            "both" => Ok(ResolveMode::Both),
            _ => Err("expected one of env|file|both".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStage {
    Mode,
    File,
    Logger,
    Producer,
    Enrichment,
    Rotation,
}

impl ConfigStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigStage::Mode => "mode",
            ConfigStage::File => "file",
            ConfigStage::Logger => LoggerConfig::COMPONENT,
            ConfigStage::Producer => ProducerConfig::COMPONENT,
            ConfigStage::Enrichment => EnrichmentConfig::COMPONENT,
            ConfigStage::Rotation => RotationConfig::COMPONENT,
        }
    }
}

impl fmt::Display for ConfigStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// No logger can be built
    Fatal,
    /// The owning feature is disabled; its sub-config keeps the defaults
    Recoverable,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Fatal => "fatal",
            Severity::Recoverable => "recoverable",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{severity} configuration error in {stage} stage: {source}")]
pub struct ResolveError {
    pub stage: ConfigStage,
    pub severity: Severity,
    #[source]
    pub source: LoggerError,
}

impl ResolveError {
    pub fn fatal(stage: ConfigStage, source: LoggerError) -> Self {
        Self {
            stage,
            severity: Severity::Fatal,
            source,
        }
    }

    pub fn recoverable(stage: ConfigStage, source: LoggerError) -> Self {
        Self {
            stage,
            severity: Severity::Recoverable,
            source,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    /// Number of rejected fields behind this failure
    pub fn error_count(&self) -> usize {
        self.source.diagnostics().len().max(1)
    }
}

/// A usable configuration plus every recoverable failure met on the way
#[derive(Debug)]
pub struct Resolution {
    pub config: LoggerConfig,
    pub recovered: Vec<ResolveError>,
}

/// Resolves a [`LoggerConfig`] from defaults, an optional TOML file and
/// the environment.
///
/// # Example
///
/// ```no_run
/// use rust_event_logger::config::{ConfigResolver, ResolveMode};
///
/// let resolution = ConfigResolver::new(ResolveMode::Both)
///     .with_file_name("service_logging")
///     .resolve()?;
/// for failure in &resolution.recovered {
///     eprintln!("ignored: {}", failure);
/// }
/// # Ok::<(), rust_event_logger::config::ResolveError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    mode: ResolveMode,
    prefixes: EnvPrefixes,
    file_name: String,
    config_file: Option<ConfigFile>,
    env_vars: Option<HashMap<String, String>>,
}

impl ConfigResolver {
    pub fn new(mode: ResolveMode) -> Self {
        Self {
            mode,
            prefixes: EnvPrefixes::default(),
            file_name: DEFAULT_CONFIG_FILE.to_string(),
            config_file: None,
            env_vars: None,
        }
    }

    /// Parse the mode first; an unknown mode is always fatal
    pub fn from_mode_str(mode: &str) -> Result<Self, ResolveError> {
        mode.parse::<ResolveMode>().map(Self::new).map_err(|message| {
            ResolveError::fatal(
                ConfigStage::Mode,
                LoggerError::validation(
                    "mode",
                    vec![super::validate::Diagnostic::new("resolver", "mode", mode, message)],
                ),
            )
        })
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_prefixes(mut self, prefixes: EnvPrefixes) -> Self {
        self.prefixes = prefixes;
        self
    }

    /// File name searched for by [`ConfigFile::discover`]
    #[must_use = "builder methods return a new value"]
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    /// Use an already loaded file instead of searching for one
    #[must_use = "builder methods return a new value"]
    pub fn with_config_file(mut self, file: ConfigFile) -> Self {
        self.config_file = Some(file);
        self
    }

    /// Resolve against these variables instead of the process environment
    #[must_use = "builder methods return a new value"]
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    pub fn resolve(&self) -> Result<Resolution, ResolveError> {
        let file = if self.mode.uses_file() {
            Some(self.load_file()?)
        } else {
            None
        };
        let env = if self.mode.uses_env() {
            Some(
                self.env_vars
                    .clone()
                    .unwrap_or_else(|| std::env::vars().collect()),
            )
        } else {
            None
        };
        let layers = Layers {
            file: file.as_ref(),
            env: env.as_ref(),
        };

        let mut recovered = Vec::new();

        let logger_sources = layers.sources(None, &self.prefixes.logger)?;
        let mut config = resolve_stage(
            LoggerConfig::COMPONENT,
            &logger_sources,
            LoggerConfig::apply_layer,
            LoggerConfig::check,
        )
        .map_err(|e| ResolveError::fatal(ConfigStage::Logger, e))?;

        let enrichment_sources = layers.sources(Some("enrichment"), &self.prefixes.enrichment)?;
        config.enrichment = settle(
            resolve_stage(
                EnrichmentConfig::COMPONENT,
                &enrichment_sources,
                EnrichmentConfig::apply_layer,
                EnrichmentConfig::check,
            ),
            ConfigStage::Enrichment,
            config.enable_enrichment,
            &mut recovered,
        )?;

        let producer_sources = layers.sources(Some("producer"), &self.prefixes.producer)?;
        let enrichment = &config.enrichment;
        config.producer = settle(
            resolve_stage(
                ProducerConfig::COMPONENT,
                &producer_sources,
                ProducerConfig::apply_layer,
                |producer: &ProducerConfig, diagnostics: &mut Diagnostics| {
                    producer.check(diagnostics);
                    producer.check_id_strategy(enrichment, diagnostics);
                },
            ),
            ConfigStage::Producer,
            config.enable_broker,
            &mut recovered,
        )?;

        let rotation_sources = layers.sources(Some("rotation"), &self.prefixes.rotation)?;
        config.rotation = settle(
            resolve_stage(
                RotationConfig::COMPONENT,
                &rotation_sources,
                RotationConfig::apply_layer,
                RotationConfig::check,
            ),
            ConfigStage::Rotation,
            config.enable_rotation,
            &mut recovered,
        )?;

        Ok(Resolution { config, recovered })
    }

    fn load_file(&self) -> Result<ConfigFile, ResolveError> {
        match &self.config_file {
            Some(file) => Ok(file.clone()),
            None => ConfigFile::discover(&self.file_name)
                .map_err(|e| ResolveError::fatal(ConfigStage::File, e)),
        }
    }
}

/// The layers picked by the mode, in merge order
struct Layers<'a> {
    file: Option<&'a ConfigFile>,
    env: Option<&'a HashMap<String, String>>,
}

impl Layers<'_> {
    fn sources(
        &self,
        section: Option<&str>,
        prefix: &str,
    ) -> Result<Vec<Box<dyn ConfigSource>>, ResolveError> {
        let mut sources: Vec<Box<dyn ConfigSource>> = Vec::with_capacity(2);
        if let Some(file) = self.file {
            let layer = match section {
                None => file.root(),
                Some(name) => file
                    .section(name)
                    .map_err(|e| ResolveError::fatal(ConfigStage::File, e))?,
            };
            sources.push(Box::new(layer));
        }
        if let Some(env) = self.env {
            sources.push(Box::new(EnvSource::from_vars(
                prefix,
                env.iter().map(|(k, v)| (k.clone(), v.clone())),
            )));
        }
        Ok(sources)
    }
}

/// Defaults, then every layer in order, then the cross-field check
fn resolve_stage<T, A, C>(
    component: &'static str,
    sources: &[Box<dyn ConfigSource>],
    apply: A,
    check: C,
) -> Result<T, LoggerError>
where
    T: Default,
    A: Fn(&mut T, &mut Binder<'_>),
    C: Fn(&T, &mut Diagnostics),
{
    let mut value = T::default();
    let mut diagnostics = Diagnostics::new();
    for source in sources {
        let mut binder = Binder::new(component, source.as_ref(), &mut diagnostics);
        apply(&mut value, &mut binder);
    }
    check(&value, &mut diagnostics);

    for diagnostic in diagnostics.iter() {
        eprintln!("[LOGGER CONFIG] {}", diagnostic);
    }
    diagnostics.into_result(component).map(|()| value)
}

/// Fatal when the owning feature is on; otherwise record the failure and
/// fall back to the defaults
fn settle<T: Default>(
    result: Result<T, LoggerError>,
    stage: ConfigStage,
    feature_enabled: bool,
    recovered: &mut Vec<ResolveError>,
) -> Result<T, ResolveError> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if feature_enabled => Err(ResolveError::fatal(stage, e)),
        Err(e) => {
            recovered.push(ResolveError::recoverable(stage, e));
            Ok(T::default())
        }
    }
}

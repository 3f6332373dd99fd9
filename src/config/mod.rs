//! Typed configuration and its layered resolution

pub mod enrichment;
pub mod logger;
pub mod producer;
pub mod resolver;
pub mod rotation;
pub mod source;
pub mod validate;
pub mod values;

pub use enrichment::EnrichmentConfig;
pub use logger::LoggerConfig;
pub use producer::{ProducerConfig, TlsMaterial};
pub use resolver::{
    ConfigResolver, ConfigStage, EnvPrefixes, Resolution, ResolveError, ResolveMode, Severity,
    AUTOCFG_ENV, AUTOINIT_ENV, CFGFILE_ENV, DEFAULT_CONFIG_FILE,
};
pub use rotation::RotationConfig;
pub use source::{ConfigFile, ConfigSource, EnvSource, FileSection, MapSource};
pub use validate::{Binder, Diagnostic, Diagnostics};
pub use values::{
    AckPolicy, Compression, ConsoleTarget, IdStrategy, KeyStrategy, LogBackend, OutputFormat,
    PartitionStrategy,
};

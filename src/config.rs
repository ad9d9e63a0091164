//! CLI and instance-file configuration. Wire-level details of individual
//! backends are out of scope here; this module covers the CLI surface
//! and the instance list every backend needs regardless of kind.

#![allow(non_camel_case_types)]

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap::ValueEnum;
use log::LevelFilter;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::PatternSyntax;
use crate::instance::OperationalMode;
use crate::reconciler::ReconcilerConfig;
use crate::registry::InstanceConfig;
use crate::types::{RecordType, SrvTuple};

macro_rules! env_prefix {
    () => {
        "DNSWEAVER_"
    };
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML file describing provider instances
    #[arg(long, short = 'f', env = concat!(env_prefix!(), "INSTANCES_FILE"))]
    pub instances_file: PathBuf,

    /// Set the loglevel of the application
    #[arg(
        value_enum,
        short = 'l',
        long,
        default_value_t = Loglevel::Info,
        value_name = "LEVEL",
        env = concat!(env_prefix!(), "LOGLEVEL")
    )]
    pub loglevel: Loglevel,

    /// Only run one reconciliation cycle, then exit
    #[arg(long, default_value_t = false, action)]
    pub run_once: bool,

    /// Seconds to wait between reconciliation cycles
    #[arg(short = 'i', long, default_value_t = 60, env = concat!(env_prefix!(), "INTERVAL"))]
    pub interval: u64,

    /// Do not make any changes to DNS providers, only show what would happen
    #[arg(long, short = 'd', action, default_value_t = false)]
    pub dry_run: bool,

    /// Delete orphaned records no longer present in the desired set
    #[arg(long, default_value_t = true, action, env = concat!(env_prefix!(), "CLEANUP_ORPHANS"))]
    pub cleanup_orphans: bool,

    /// Create and check the `_dnsweaver` ownership TXT marker
    #[arg(long, default_value_t = true, action, env = concat!(env_prefix!(), "OWNERSHIP_TRACKING"))]
    pub ownership_tracking: bool,

    /// At startup, rebuild known hostnames by scanning providers for ownership markers
    #[arg(long, default_value_t = true, action, env = concat!(env_prefix!(), "ADOPT_EXISTING"))]
    pub adopt_existing: bool,

    /// Output format for the per-cycle result summary
    #[arg(
        value_enum,
        long,
        default_value_t = OutputFormat::Text,
        env = concat!(env_prefix!(), "FORMAT")
    )]
    pub format: OutputFormat,
}

/// How `log_cycle_summary` renders a completed [`crate::reconciler::CycleResult`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&Cli> for ReconcilerConfig {
    fn from(cli: &Cli) -> Self {
        ReconcilerConfig {
            dry_run: cli.dry_run,
            cleanup_orphans: cli.cleanup_orphans,
            ownership_tracking: cli.ownership_tracking,
            adopt_existing: cli.adopt_existing,
            reconcile_interval: Duration::from_secs(cli.interval),
        }
    }
}

/// Used to set the application's loglevel. Re-creates [`log::Level`], which
/// doesn't derive `ValueEnum` itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, ValueEnum)]
pub enum Loglevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
impl From<Loglevel> for LevelFilter {
    fn from(ll: Loglevel) -> Self {
        match ll {
            Loglevel::Error => LevelFilter::Error,
            Loglevel::Warn => LevelFilter::Warn,
            Loglevel::Info => LevelFilter::Info,
            Loglevel::Debug => LevelFilter::Debug,
            Loglevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading instances file `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("parsing instances file `{path}`: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InstancesFile {
    pub instances: Vec<InstanceFileEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InstanceFileEntry {
    pub name: String,
    pub backend_type: String,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub pattern_syntax: FilePatternSyntax,
    pub record_type: RecordType,
    pub target: String,
    #[serde(default)]
    pub srv: Option<SrvTuple>,
    pub ttl: u32,
    pub mode: FileOperationalMode,
    /// Only meaningful for file-backed backends, e.g. `hosts-file`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl From<InstanceFileEntry> for InstanceConfig {
    fn from(entry: InstanceFileEntry) -> Self {
        InstanceConfig {
            name: entry.name,
            backend_type: entry.backend_type,
            includes: entry.includes,
            excludes: entry.excludes,
            pattern_syntax: entry.pattern_syntax.into(),
            default_record_type: entry.record_type,
            default_target: entry.target,
            default_srv: entry.srv,
            ttl: entry.ttl,
            mode: entry.mode.into(),
            backend_path: entry.path,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePatternSyntax {
    #[default]
    Glob,
    Regex,
}
impl From<FilePatternSyntax> for PatternSyntax {
    fn from(s: FilePatternSyntax) -> Self {
        match s {
            FilePatternSyntax::Glob => PatternSyntax::Glob,
            FilePatternSyntax::Regex => PatternSyntax::Regex,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperationalMode {
    Managed,
    Authoritative,
    Additive,
}
impl From<FileOperationalMode> for OperationalMode {
    fn from(m: FileOperationalMode) -> Self {
        match m {
            FileOperationalMode::Managed => OperationalMode::Managed,
            FileOperationalMode::Authoritative => OperationalMode::Authoritative,
            FileOperationalMode::Additive => OperationalMode::Additive,
        }
    }
}

/// Loads and parses the instance-list YAML file at `path`.
pub fn load_instances_file(path: &std::path::Path) -> Result<InstancesFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read { path: path.to_path_buf(), source: e })?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path: path.to_path_buf(), source: e })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_instances_file() {
        let yaml = r#"
instances:
  - name: primary
    backend_type: memory
    includes: ["*.example.com"]
    record_type: A
    target: "10.0.0.1"
    ttl: 300
    mode: managed
"#;
        let file: InstancesFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.instances.len(), 1);
        let config: InstanceConfig = file.instances.into_iter().next().unwrap().into();
        assert_eq!(config.name, "primary");
        assert_eq!(config.ttl, 300);
    }
}

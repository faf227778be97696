//! Config file loading and merging with CLI flags.
//!
//! Precedence: values given on the command line, then the config file, then
//! built-in defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgMatches, CommandFactory, FromArgMatches, parser::ValueSource};
use url::Url;
use zipgrab_core::{HttpTimeouts, RetryPolicy, RunConfiguration, TargetSuffix};

use crate::cli::Args;

const CONFIG_DIR_NAME: &str = "zipgrab";
const CONFIG_FILE_NAME: &str = "config.toml";

/// `key = value` file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub dest: Option<PathBuf>,
    pub skip_existing: Option<bool>,
    pub force_reextract: Option<bool>,
    pub suffix: Option<String>,
    /// Same range as the CLI (0..=10).
    pub max_retries: Option<u8>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(max_retries) = self.max_retries
            && max_retries > 10
        {
            bail!("Invalid config value for `max_retries`: {max_retries}. Expected range: 0..=10");
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

/// Which flags were typed on the command line rather than defaulted.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) skip_existing: bool,
    pub(crate) force_reextract: bool,
    pub(crate) suffix: bool,
    pub(crate) max_retries: bool,
    pub(crate) verbose: bool,
    pub(crate) quiet: bool,
}

impl CliValueSources {
    /// A log level flag on the command line overrides `RUST_LOG`.
    pub(crate) fn forces_log_level(&self) -> bool {
        self.verbose || self.quiet
    }
}

pub(crate) fn parse_cli_with_sources() -> (Args, CliValueSources) {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sources = sources_from_matches(&matches);
    (args, sources)
}

fn sources_from_matches(matches: &ArgMatches) -> CliValueSources {
    CliValueSources {
        skip_existing: is_commandline_value(matches, "skip_existing"),
        force_reextract: is_commandline_value(matches, "force_reextract"),
        suffix: is_commandline_value(matches, "suffix"),
        max_retries: is_commandline_value(matches, "max_retries"),
        verbose: is_commandline_value(matches, "verbose"),
        quiet: is_commandline_value(matches, "quiet"),
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Everything the binary needs after merging CLI, file, and defaults.
#[derive(Debug)]
pub(crate) struct ResolvedSettings {
    pub(crate) run: RunConfiguration,
    pub(crate) verbose: u8,
    pub(crate) quiet: bool,
}

impl ResolvedSettings {
    pub(crate) fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}

/// Merges parsed flags with the optional file config into a run configuration.
pub(crate) fn resolve_settings(
    args: &Args,
    sources: &CliValueSources,
    file: Option<&FileConfig>,
) -> Result<ResolvedSettings> {
    let base_url_raw = args
        .base_url
        .clone()
        .or_else(|| file.and_then(|f| f.base_url.clone()))
        .context("Missing listing URL: pass --base-url or set `base_url` in the config file")?;
    let base_url = parse_base_url(&base_url_raw)?;

    let dest_root = args
        .dest
        .clone()
        .or_else(|| file.and_then(|f| f.dest.clone()))
        .context("Missing destination: pass --dest or set `dest` in the config file")?;

    let skip_existing = if sources.skip_existing {
        args.skip_existing
    } else {
        file.and_then(|f| f.skip_existing).unwrap_or(args.skip_existing)
    };
    let force_reextract = if sources.force_reextract {
        args.force_reextract
    } else {
        file.and_then(|f| f.force_reextract).unwrap_or(args.force_reextract)
    };

    let suffix_raw = match file.and_then(|f| f.suffix.as_deref()) {
        Some(suffix) if !sources.suffix => suffix,
        _ => args.suffix.as_str(),
    };
    let suffix = TargetSuffix::new(suffix_raw)
        .with_context(|| format!("Invalid suffix '{suffix_raw}'"))?;

    let max_retries = match file.and_then(|f| f.max_retries) {
        Some(value) if !sources.max_retries => value,
        _ => args.max_retries,
    };

    let mut http = HttpTimeouts::default();
    if let Some(secs) = args
        .connect_timeout
        .or_else(|| file.and_then(|f| f.connect_timeout_secs))
    {
        http.connect_secs = secs;
    }
    if let Some(secs) = args
        .read_timeout
        .or_else(|| file.and_then(|f| f.read_timeout_secs))
    {
        http.read_secs = secs;
    }

    let (mut verbose, mut quiet) = (args.verbose, args.quiet);
    if !sources.forces_log_level()
        && let Some(verbosity) = file.and_then(|f| f.verbosity)
    {
        (verbose, quiet) = match verbosity {
            VerbositySetting::Default => (0, false),
            VerbositySetting::Verbose => (1, false),
            VerbositySetting::Quiet => (0, true),
            VerbositySetting::Debug => (2, false),
        };
    }

    let run = RunConfiguration::new(base_url, dest_root)
        .with_skip_existing(skip_existing)
        .with_force_reextract(force_reextract)
        .with_suffix(suffix)
        .with_retry_policy(RetryPolicy::with_max_attempts(u32::from(max_retries)))
        .with_http_timeouts(http);

    Ok(ResolvedSettings { run, verbose, quiet })
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("Invalid listing URL '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        bail!("Invalid listing URL '{raw}': expected an absolute http(s) URL");
    }
    Ok(url)
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/zipgrab/config.toml`
/// 2. `$HOME/.config/zipgrab/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist; the default path is optional.
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return read_file_config(path).map(Some);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "base_url" => cfg.base_url = Some(parse_string_literal(value).with_context(invalid)?),
            "dest" => {
                cfg.dest = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "skip_existing" => cfg.skip_existing = Some(parse_boolean(value).with_context(invalid)?),
            "force_reextract" => {
                cfg.force_reextract = Some(parse_boolean(value).with_context(invalid)?);
            }
            "suffix" => cfg.suffix = Some(parse_string_literal(value).with_context(invalid)?),
            "max_retries" => cfg.max_retries = Some(parse_integer_u8(value).with_context(invalid)?),
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<u16>()?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use log::debug;

use crate::error::{AppError, Context, Result};

use crate::fetch::DEFAULT_FX_BASE;

use super::{validator, Config, Endpoints, Limits, QuoteProvider};

pub const API_KEY_ENV: &str = "MARKETDATA_API_KEY";
pub const FX_APP_ID_ENV: &str = "MARKETDATA_FX_APP_ID";
pub const CRYPTO_API_KEY_ENV: &str = "MARKETDATA_CRYPTO_API_KEY";

type IniSection = HashMap<String, String>;

/// Values taken from the process environment after the env file is merged in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub api_key: Option<String>,
    pub fx_app_id: Option<String>,
    pub crypto_api_key: Option<String>,
}

impl EnvOverrides {
    /// Merge `env_file` (or `.env` when absent) into the environment, then read the overrides.
    /// Variables already set in the environment win over the file.
    pub fn from_env(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path)
                    .with_context(|| format!("failed to load env file {}", path.display()))?;
            }
            None => {
                if let Ok(path) = dotenvy::dotenv() {
                    debug!("merged environment from {}", path.display());
                }
            }
        }

        Ok(Self {
            api_key: non_empty_var(API_KEY_ENV),
            fx_app_id: non_empty_var(FX_APP_ID_ENV),
            crypto_api_key: non_empty_var(CRYPTO_API_KEY_ENV),
        })
    }
}

/// Load the INI file at `path`, apply environment overrides and validate the result.
pub fn load_config(path: &Path, env_file: Option<&Path>) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let overrides = EnvOverrides::from_env(env_file)?;

    let config = parse_config(&contents, &overrides)?;
    validator::validate_config(&config)?;
    Ok(config)
}

/// Build a `Config` from INI text. Performs no validation.
pub fn parse_config(contents: &str, overrides: &EnvOverrides) -> Result<Config> {
    let sections = parse_ini(contents)?;
    let empty = IniSection::new();

    let market = sections
        .get("market")
        .ok_or_else(|| AppError::configuration("config file has no [Market] section"))?;
    let fx = sections.get("fx").unwrap_or(&empty);
    let crypto = sections.get("crypto").unwrap_or(&empty);
    let limits_section = sections.get("limits").unwrap_or(&empty);
    let endpoints_section = sections.get("endpoints").unwrap_or(&empty);

    let provider = match market.get("provider") {
        Some(value) => value.parse()?,
        None => QuoteProvider::Fmp,
    };

    let api_key = overrides
        .api_key
        .clone()
        .or_else(|| market.get("api_key").cloned())
        .unwrap_or_default();
    let fx_app_id = overrides
        .fx_app_id
        .clone()
        .or_else(|| fx.get("app_id").cloned())
        .filter(|value| !value.is_empty());
    let crypto_api_key = overrides
        .crypto_api_key
        .clone()
        .or_else(|| crypto.get("api_key").cloned())
        .filter(|value| !value.is_empty());
    let fx_base = fx
        .get("base")
        .map(|code| code.trim().to_ascii_uppercase())
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| DEFAULT_FX_BASE.to_string());

    let mut endpoints = Endpoints::for_provider(provider);
    if let Some(url) = endpoints_section.get("quote_url") {
        endpoints.quote_url = url.clone();
    }
    if let Some(url) = endpoints_section.get("crypto_url") {
        endpoints.crypto_url = url.clone();
    }
    if let Some(url) = endpoints_section.get("fx_url") {
        endpoints.fx_url = url.clone();
    }

    let mut limits = Limits::for_provider(provider);
    if let Some(value) = limits_section.get("batch_size") {
        limits.batch_size = parse_number(value, "batch_size")?;
    }
    if let Some(value) = limits_section.get("cooldown_secs") {
        limits.cooldown = Duration::from_secs(parse_number(value, "cooldown_secs")?);
    }
    if let Some(value) = limits_section.get("timeout_secs") {
        limits.timeout = Duration::from_secs(parse_number(value, "timeout_secs")?);
    }
    if let Some(value) = limits_section.get("rate_limited") {
        limits.rate_limited = parse_bool(value, "rate_limited")?;
    }

    Ok(Config {
        api_key,
        fx_app_id,
        crypto_api_key,
        fx_base,
        provider,
        symbols: parse_list(market.get("symbols"), "symbols")?,
        indexes: parse_list(market.get("indexes"), "indexes")?,
        crypto: parse_list(market.get("crypto"), "crypto")?,
        currencies: parse_list(market.get("currencies"), "currencies")?,
        endpoints,
        limits,
    })
}

/// Minimal INI reader: `[section]` headers, `key = value` pairs, `#`/`;` comments.
/// Section and key names are case-insensitive. An indented line continues the
/// previous value, so a JSON list may span several lines.
fn parse_ini(contents: &str) -> Result<HashMap<String, IniSection>> {
    let mut sections: HashMap<String, IniSection> = HashMap::new();
    let mut current: Option<String> = None;
    let mut last_key: Option<String> = None;

    for (line_no, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if raw_line.starts_with(char::is_whitespace) {
            if let (Some(section), Some(key)) = (&current, &last_key) {
                let previous = sections
                    .get_mut(section)
                    .and_then(|entries| entries.get_mut(key));
                if let Some(value) = previous {
                    value.push('\n');
                    value.push_str(line);
                    continue;
                }
            }
        }

        if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            let name = name.trim().to_lowercase();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            last_key = None;
            continue;
        }

        let Some((key, value)) = line.split_once('=').or_else(|| line.split_once(':')) else {
            return Err(AppError::configuration(format!(
                "line {}: expected `key = value`, found `{line}`",
                line_no + 1
            )));
        };

        let Some(section) = current.as_ref() else {
            return Err(AppError::configuration(format!(
                "line {}: key `{}` appears before any [section]",
                line_no + 1,
                key.trim()
            )));
        };

        let key = key.trim().to_lowercase();
        sections
            .entry(section.clone())
            .or_default()
            .insert(key.clone(), unquote(value.trim()).to_string());
        last_key = Some(key);
    }

    Ok(sections)
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(value)
}

/// Lists are JSON arrays (`["AAPL", "MSFT"]`); a bare comma-separated list is accepted too.
fn parse_list(value: Option<&String>, key: &str) -> Result<Vec<String>> {
    let Some(value) = value.map(|v| v.trim()) else {
        return Ok(Vec::new());
    };

    if value.starts_with('[') {
        let items: Vec<String> = serde_json::from_str(value).map_err(|err| {
            AppError::configuration(format!("`{key}` must be a JSON array of strings: {err}"))
        })?;
        return Ok(items.into_iter().map(|item| item.trim().to_string()).collect());
    }

    Ok(value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect())
}

fn parse_number<T: std::str::FromStr>(value: &str, key: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        AppError::configuration(format!("`{key}` must be a non-negative integer, got `{value}`"))
    })
}

fn parse_bool(value: &str, key: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(AppError::configuration(format!(
            "`{key}` must be a boolean, got `{other}`"
        ))),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

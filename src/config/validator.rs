use crate::error::{AppError, Result};
use crate::fetch::request::{currency_pair, placeholders, KNOWN_PLACEHOLDERS};
use crate::fetch::Category;

use super::{Config, QuoteProvider};

const CATEGORIES: [Category; 4] = [
    Category::Equities,
    Category::Indexes,
    Category::Crypto,
    Category::Fx,
];

/// Validate a resolved configuration and surface every problem at once.
pub fn validate_config(config: &Config) -> Result<()> {
    let mut issues = Vec::new();

    validate_keys(config, &mut issues);
    validate_symbols(config, &mut issues);
    validate_limits(config, &mut issues);
    validate_currencies(config, &mut issues);

    let per_pair_fx = config.provider == QuoteProvider::AlphaVantage;
    let endpoints = &config.endpoints;
    validate_endpoint("quote_url", &endpoints.quote_url, &["symbols"], &[], &mut issues);
    validate_endpoint("crypto_url", &endpoints.crypto_url, &[], &[], &mut issues);
    if per_pair_fx {
        validate_endpoint("fx_url", &endpoints.fx_url, &["symbols"], &["base"], &mut issues);
    } else {
        validate_endpoint("fx_url", &endpoints.fx_url, &[], &[], &mut issues);
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::configuration(format!(
            "config invalid:\n  - {}",
            issues.join("\n  - ")
        )))
    }
}

fn validate_keys(config: &Config, issues: &mut Vec<String>) {
    if config.api_key.trim().is_empty() {
        issues.push(
            "[Market] api_key must be set (or exported as MARKETDATA_API_KEY)".to_string(),
        );
    }

    // Crypto quotes come from financialmodelingprep whatever the provider.
    if config.provider == QuoteProvider::AlphaVantage
        && !config.crypto.is_empty()
        && config.crypto_api_key.is_none()
    {
        issues.push(
            "[Crypto] api_key must be set (or exported as MARKETDATA_CRYPTO_API_KEY) \
             when provider = alphavantage"
                .to_string(),
        );
    }
}

fn validate_currencies(config: &Config, issues: &mut Vec<String>) {
    for entry in &config.currencies {
        if !entry.trim().is_empty() && currency_pair(entry).is_none() {
            issues.push(format!(
                "currency entry `{entry}` must be a code (`EUR`) or a pair (`USD EUR`)"
            ));
        }
    }
}

fn validate_symbols(config: &Config, issues: &mut Vec<String>) {
    for category in CATEGORIES {
        let symbols = config.symbols_for(category);
        if symbols.iter().any(|symbol| symbol.trim().is_empty()) {
            issues.push(format!("{category} list contains an empty entry"));
        }
    }
}

fn validate_limits(config: &Config, issues: &mut Vec<String>) {
    if config.limits.batch_size == 0 {
        issues.push("[Limits] batch_size must be at least 1".to_string());
    }
    if config.limits.timeout.is_zero() {
        issues.push("[Limits] timeout_secs must be at least 1".to_string());
    }
}

/// `required` placeholders must appear besides `{apikey}`; `extra` ones are also allowed.
fn validate_endpoint(
    name: &str,
    template: &str,
    required: &[&str],
    extra: &[&str],
    issues: &mut Vec<String>,
) {
    if template.trim().is_empty() {
        issues.push(format!("[Endpoints] {name} must not be empty"));
        return;
    }

    let names = match placeholders(template) {
        Ok(names) => names,
        Err(err) => {
            issues.push(format!("[Endpoints] {name}: {err}"));
            return;
        }
    };

    for placeholder in &names {
        if !KNOWN_PLACEHOLDERS.contains(&placeholder.as_str()) {
            issues.push(format!(
                "[Endpoints] {name} references unknown placeholder `{{{placeholder}}}`"
            ));
        } else if placeholder == "base" && !extra.contains(&"base") {
            issues.push(format!("[Endpoints] {name} cannot use `{{base}}`"));
        }
    }

    for wanted in std::iter::once(&"apikey").chain(required) {
        if !names.iter().any(|placeholder| placeholder == wanted) {
            issues.push(format!("[Endpoints] {name} should reference `{{{wanted}}}`"));
        }
    }
}

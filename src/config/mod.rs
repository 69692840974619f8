use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::fetch::request::{
    ALPHAVANTAGE_FX_URL, ALPHAVANTAGE_QUOTE_URL, FMP_CRYPTO_URL, FMP_QUOTE_URL,
    OPENEXCHANGERATES_URL,
};
use crate::fetch::{Category, DEFAULT_BATCH_SIZE, DEFAULT_COOLDOWN, DEFAULT_TIMEOUT};

pub mod loader;
pub mod validator;

pub use loader::{load_config, EnvOverrides};
pub use validator::validate_config;

/// Vendor for equity and index quotes and for FX rates.
///
/// `Fmp` pairs financialmodelingprep quotes with an openexchangerates rate table;
/// `AlphaVantage` serves both through one key. Crypto always comes from
/// financialmodelingprep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteProvider {
    Fmp,
    AlphaVantage,
}

impl QuoteProvider {
    /// Whether the provider's free tier documents a per-minute call limit.
    pub fn is_rate_limited(self) -> bool {
        matches!(self, QuoteProvider::AlphaVantage)
    }
}

impl FromStr for QuoteProvider {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fmp" | "financialmodelingprep" => Ok(QuoteProvider::Fmp),
            "alphavantage" | "alpha_vantage" => Ok(QuoteProvider::AlphaVantage),
            other => Err(AppError::configuration(format!(
                "unknown quote provider `{other}`, expected `fmp` or `alphavantage`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub quote_url: String,
    pub crypto_url: String,
    pub fx_url: String,
}

impl Endpoints {
    pub fn for_provider(provider: QuoteProvider) -> Self {
        let (quote_url, fx_url) = match provider {
            QuoteProvider::Fmp => (FMP_QUOTE_URL, OPENEXCHANGERATES_URL),
            QuoteProvider::AlphaVantage => (ALPHAVANTAGE_QUOTE_URL, ALPHAVANTAGE_FX_URL),
        };
        Self {
            quote_url: quote_url.to_string(),
            crypto_url: FMP_CRYPTO_URL.to_string(),
            fx_url: fx_url.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub batch_size: usize,
    pub cooldown: Duration,
    pub timeout: Duration,
    pub rate_limited: bool,
}

impl Limits {
    pub fn for_provider(provider: QuoteProvider) -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            cooldown: DEFAULT_COOLDOWN,
            timeout: DEFAULT_TIMEOUT,
            rate_limited: provider.is_rate_limited(),
        }
    }
}

/// Fully resolved settings for one run: INI values merged with environment overrides.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub fx_app_id: Option<String>,
    pub crypto_api_key: Option<String>,
    /// Base for currency entries that name only the quote currency.
    pub fx_base: String,
    pub provider: QuoteProvider,
    pub symbols: Vec<String>,
    pub indexes: Vec<String>,
    pub crypto: Vec<String>,
    pub currencies: Vec<String>,
    pub endpoints: Endpoints,
    pub limits: Limits,
}

impl Config {
    pub fn symbols_for(&self, category: Category) -> &[String] {
        match category {
            Category::Equities => &self.symbols,
            Category::Indexes => &self.indexes,
            Category::Crypto => &self.crypto,
            Category::Fx => &self.currencies,
        }
    }

    /// FX and crypto use their own keys when configured, the market key otherwise.
    pub fn api_key_for(&self, category: Category) -> &str {
        match (category, &self.fx_app_id, &self.crypto_api_key) {
            (Category::Fx, Some(app_id), _) => app_id,
            (Category::Crypto, _, Some(key)) => key,
            _ => &self.api_key,
        }
    }
}

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use log::{debug, info, warn};
use tokio::time::sleep;

use crate::error::FetchError;
use crate::records::{FxRate, Quote};

use super::client::JsonSource;
use super::normalize::{
    decimal_value, normalize_fx_pair, normalize_fx_rate, normalize_quote, parse_fx_response,
    quote_records, FxPairSchema, QuoteSchema, ALPHAVANTAGE_EXCHANGE_RATE, FMP_QUOTE,
};
use super::request::{
    build_pair_url, build_url, currency_pair, FMP_CRYPTO_URL, FMP_QUOTE_URL, OPENEXCHANGERATES_URL,
};
use super::{
    Category, FetchOutcome, FetchRequest, FetchResult, Rows, DEFAULT_BATCH_SIZE, DEFAULT_FX_BASE,
};

/// How a provider expects symbols to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// One call per batch: symbols comma-joined into the URL, or one rate table for FX.
    Batched,
    /// One call per symbol or currency pair.
    PerSymbol,
}

/// Fetches and normalizes one category of market data.
///
/// Symbols are always sent in batches of at most `batch_size`. A fetcher with a
/// cooldown sleeps between consecutive batches, never after the last one.
///
/// Any transport, decoding or schema failure is captured in the returned
/// [`FetchOutcome`]; `fetch` itself never fails.
pub struct SourceFetcher {
    category: Category,
    url_template: String,
    schema: &'static QuoteSchema,
    fx_schema: &'static FxPairSchema,
    base_currency: String,
    mode: RequestMode,
    batch_size: usize,
    cooldown: Option<Duration>,
    client: Arc<dyn JsonSource>,
}

impl SourceFetcher {
    pub fn new(category: Category, client: Arc<dyn JsonSource>) -> Self {
        let url_template = match category {
            Category::Equities | Category::Indexes => FMP_QUOTE_URL,
            Category::Crypto => FMP_CRYPTO_URL,
            Category::Fx => OPENEXCHANGERATES_URL,
        };

        Self {
            category,
            url_template: url_template.to_string(),
            schema: &FMP_QUOTE,
            fx_schema: &ALPHAVANTAGE_EXCHANGE_RATE,
            base_currency: DEFAULT_FX_BASE.to_string(),
            mode: RequestMode::Batched,
            batch_size: DEFAULT_BATCH_SIZE,
            cooldown: None,
            client,
        }
    }

    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = template.into();
        self
    }

    pub fn with_schema(mut self, schema: &'static QuoteSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Mapping used for per-pair FX responses.
    pub fn with_fx_schema(mut self, schema: &'static FxPairSchema) -> Self {
        self.fx_schema = schema;
        self
    }

    /// Base for currency entries that name only the quote currency.
    pub fn with_base_currency(mut self, code: impl Into<String>) -> Self {
        self.base_currency = code.into();
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Pause between consecutive batches, for providers with a per-minute call limit.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        let result = if request.category != self.category {
            Err(FetchError::Configuration(format!(
                "{} fetcher cannot serve a {} request",
                self.category, request.category
            )))
        } else {
            match self.category {
                Category::Equities | Category::Indexes => {
                    self.fetch_quotes(request).await.map(Rows::Quotes)
                }
                Category::Crypto => self.fetch_crypto(request).await.map(Rows::Quotes),
                Category::Fx => {
                    let rates = match self.mode {
                        RequestMode::Batched => self.fetch_rate_table(request).await,
                        RequestMode::PerSymbol => self.fetch_rate_pairs(request).await,
                    };
                    rates.map(Rows::Rates)
                }
            }
        };

        // Failed outcomes are printed by the report.
        match &result {
            Ok(rows) => info!("Loaded {} {} rows", rows.len(), request.category),
            Err(err) => debug!("{} fetch failed: {}", request.category, err),
        }

        FetchOutcome {
            category: request.category,
            result,
        }
    }

    fn batches<'a>(&self, symbols: &'a [String]) -> Vec<&'a [String]> {
        symbols.chunks(self.batch_size).collect()
    }

    async fn fetch_quotes(&self, request: &FetchRequest) -> FetchResult<Vec<Quote>> {
        let mut quotes = Vec::with_capacity(request.symbols.len());

        for (idx, batch) in self.batches(&request.symbols).into_iter().enumerate() {
            if idx > 0 {
                self.cool_down().await;
            }

            let loaded = match self.mode {
                RequestMode::Batched => self.fetch_quote_batch(&request.api_key, batch).await?,
                RequestMode::PerSymbol => {
                    let calls = batch.iter().map(|symbol| {
                        self.fetch_quote_batch(&request.api_key, std::slice::from_ref(symbol))
                    });
                    try_join_all(calls).await?.into_iter().flatten().collect()
                }
            };

            info!("Loaded data for {}", batch.join(", "));
            quotes.extend(loaded);
        }

        Ok(quotes)
    }

    async fn fetch_quote_batch(
        &self,
        api_key: &str,
        symbols: &[String],
    ) -> FetchResult<Vec<Quote>> {
        let url = build_url(&self.url_template, api_key, symbols)?;
        let payload = self.client.fetch_json(&url).await?;

        quote_records(&payload, self.schema)?
            .into_iter()
            .map(|record| normalize_quote(record, self.schema))
            .collect()
    }

    async fn fetch_crypto(&self, request: &FetchRequest) -> FetchResult<Vec<Quote>> {
        let url = build_url(&self.url_template, &request.api_key, &[])?;
        let payload = self.client.fetch_json(&url).await?;

        // The provider returns every listed pair; keep only the requested ones.
        let wanted: HashSet<&str> = request.symbols.iter().map(String::as_str).collect();
        let quotes = quote_records(&payload, self.schema)?
            .into_iter()
            .filter(|record| {
                record
                    .get(self.schema.symbol)
                    .and_then(|symbol| symbol.as_str())
                    .is_some_and(|symbol| wanted.contains(symbol))
            })
            .map(|record| normalize_quote(record, self.schema))
            .collect::<FetchResult<Vec<_>>>()?;

        for symbol in &request.symbols {
            if !quotes.iter().any(|quote| &quote.symbol == symbol) {
                warn!("crypto symbol {} not present in provider response", symbol);
            }
        }

        Ok(quotes)
    }

    /// One call returning every rate against the provider's base currency.
    async fn fetch_rate_table(&self, request: &FetchRequest) -> FetchResult<Vec<FxRate>> {
        let url = build_url(&self.url_template, &request.api_key, &[])?;
        let payload = self.client.fetch_json(&url).await?;
        let snapshot = parse_fx_response(&payload)?;

        let mut rates = Vec::with_capacity(request.symbols.len());
        for entry in &request.symbols {
            let (base, code) = parse_entry(entry)?;
            if base.is_some_and(|base| base != snapshot.base) {
                warn!("currency pair {} not offered against base {}", entry, snapshot.base);
                continue;
            }
            let Some(raw_rate) = snapshot.rates.get(code) else {
                warn!("currency {} not present in provider response", code);
                continue;
            };
            let rate = decimal_value(raw_rate).ok_or_else(|| {
                FetchError::schema(format!("rate for `{code}` is not a decimal: {raw_rate}"))
            })?;
            rates.push(normalize_fx_rate(snapshot.base, code, rate, snapshot.as_of)?);
        }

        Ok(rates)
    }

    /// One call per currency pair, paced like quote batches.
    async fn fetch_rate_pairs(&self, request: &FetchRequest) -> FetchResult<Vec<FxRate>> {
        let mut rates = Vec::with_capacity(request.symbols.len());

        for (idx, batch) in self.batches(&request.symbols).into_iter().enumerate() {
            if idx > 0 {
                self.cool_down().await;
            }

            let calls = batch
                .iter()
                .map(|entry| self.fetch_rate_pair(&request.api_key, entry));
            rates.extend(try_join_all(calls).await?);
            info!("Loaded data for {}", batch.join(", "));
        }

        Ok(rates)
    }

    async fn fetch_rate_pair(&self, api_key: &str, entry: &str) -> FetchResult<FxRate> {
        let (base, code) = parse_entry(entry)?;
        let base = base.unwrap_or(self.base_currency.as_str());

        let url = build_pair_url(&self.url_template, api_key, base, code)?;
        let payload = self.client.fetch_json(&url).await?;
        normalize_fx_pair(&payload, self.fx_schema)
    }

    async fn cool_down(&self) {
        if let Some(cooldown) = self.cooldown {
            info!(
                "Reached limit of {} symbols per batch for {}. Pausing for {} seconds",
                self.batch_size,
                self.category,
                cooldown.as_secs()
            );
            sleep(cooldown).await;
        }
    }
}

fn parse_entry(entry: &str) -> FetchResult<(Option<&str>, &str)> {
    currency_pair(entry).ok_or_else(|| {
        FetchError::Configuration(format!("`{entry}` is not a currency code or pair"))
    })
}

use std::fmt;
use std::ops::BitOr;
use std::time::Duration;

use crate::error::FetchError;
use crate::records::{FxRate, Quote};

pub mod aggregate;
pub mod client;
pub mod normalize;
pub mod request;
pub mod sources;

pub use aggregate::{plan_requests, Aggregator};
pub use client::{HttpJsonClient, JsonSource};
pub use sources::{RequestMode, SourceFetcher};

/// Symbols per batch, in line with a five-calls-per-minute free tier.
pub const DEFAULT_BATCH_SIZE: usize = 5;
/// Pause between rate-limited batches.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);
/// Base currency for currency entries naming only the quote side.
pub const DEFAULT_FX_BASE: &str = "USD";
/// Upper bound for a single HTTP request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub type FetchResult<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Equities,
    Indexes,
    Crypto,
    Fx,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Equities => "equities",
            Category::Indexes => "indexes",
            Category::Crypto => "crypto",
            Category::Fx => "fx",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which information groups a run reports on. Bitmask semantics: `MARKET | FX == ALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoSelector(u8);

impl InfoSelector {
    pub const MARKET: InfoSelector = InfoSelector(0b01);
    pub const FX: InfoSelector = InfoSelector(0b10);
    pub const ALL: InfoSelector = InfoSelector(0b11);

    pub fn contains(self, other: InfoSelector) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for InfoSelector {
    type Output = InfoSelector;

    fn bitor(self, rhs: Self) -> Self::Output {
        InfoSelector(self.0 | rhs.0)
    }
}

/// One category's symbols plus the key used to authenticate against its provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub category: Category,
    pub symbols: Vec<String>,
    pub api_key: String,
}

impl FetchRequest {
    /// Build a request, dropping repeated symbols while keeping first-seen order.
    pub fn new<I, S>(category: Category, symbols: I, api_key: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for symbol in symbols {
            let symbol = symbol.into();
            if !unique.contains(&symbol) {
                unique.push(symbol);
            }
        }

        Self {
            category,
            symbols: unique,
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rows {
    Quotes(Vec<Quote>),
    Rates(Vec<FxRate>),
}

impl Rows {
    pub fn len(&self) -> usize {
        match self {
            Rows::Quotes(quotes) => quotes.len(),
            Rows::Rates(rates) => rates.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of one category's fetch: rows on success, the error otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub category: Category,
    pub result: FetchResult<Rows>,
}

impl FetchOutcome {
    pub fn succeeded(category: Category, rows: Rows) -> Self {
        Self {
            category,
            result: Ok(rows),
        }
    }

    pub fn failed(category: Category, error: FetchError) -> Self {
        Self {
            category,
            result: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn rows(&self) -> Option<&Rows> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.result.as_ref().err()
    }

    pub fn state(&self) -> FetchState {
        if self.is_success() {
            FetchState::Succeeded
        } else {
            FetchState::Failed
        }
    }
}

/// Lifecycle of a dispatched fetch. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

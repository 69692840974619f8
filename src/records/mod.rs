use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Normalized snapshot of a tradable instrument's price and daily change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub as_of: DateTime<Utc>,
}

/// Normalized conversion rate for the `base`/`quote` currency pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FxRate {
    pub base: String,
    pub quote: String,
    pub rate: Decimal,
    pub as_of: DateTime<Utc>,
}

impl FxRate {
    pub fn pair(&self) -> (&str, &str) {
        (&self.base, &self.quote)
    }
}

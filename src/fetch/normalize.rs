//! Provider JSON to `Quote`/`FxRate`.
//!
//! Every quote provider is described by one [`QuoteSchema`] row naming where each
//! canonical field lives in its payload, and per-pair FX providers by one
//! [`FxPairSchema`] row. Supporting another provider means adding a row here, not
//! another branch in the fetchers.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::records::{FxRate, Quote};

use super::FetchResult;

/// How a provider encodes the quote timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampField {
    /// Unix epoch seconds as a number or numeric string.
    UnixSeconds(&'static str),
    /// Calendar day formatted `YYYY-MM-DD`, taken as midnight UTC.
    Date(&'static str),
    /// `YYYY-MM-DD HH:MM:SS` in UTC.
    DateTime(&'static str),
}

/// Field-mapping row for one provider's quote records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteSchema {
    pub name: &'static str,
    /// Key wrapping a single record; `None` when the payload is an array of records.
    pub envelope: Option<&'static str>,
    pub symbol: &'static str,
    pub price: &'static str,
    pub change: &'static str,
    pub change_percent: &'static str,
    pub timestamp: TimestampField,
}

pub const FMP_QUOTE: QuoteSchema = QuoteSchema {
    name: "financialmodelingprep",
    envelope: None,
    symbol: "symbol",
    price: "price",
    change: "change",
    change_percent: "changesPercentage",
    timestamp: TimestampField::UnixSeconds("timestamp"),
};

pub const ALPHAVANTAGE_GLOBAL_QUOTE: QuoteSchema = QuoteSchema {
    name: "alphavantage",
    envelope: Some("Global Quote"),
    symbol: "01. symbol",
    price: "05. price",
    change: "09. change",
    change_percent: "10. change percent",
    timestamp: TimestampField::Date("07. latest trading day"),
};

/// Field-mapping row for providers answering one currency pair per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FxPairSchema {
    pub name: &'static str,
    pub envelope: &'static str,
    pub base: &'static str,
    pub quote: &'static str,
    pub rate: &'static str,
    pub timestamp: TimestampField,
}

pub const ALPHAVANTAGE_EXCHANGE_RATE: FxPairSchema = FxPairSchema {
    name: "alphavantage",
    envelope: "Realtime Currency Exchange Rate",
    base: "1. From_Currency Code",
    quote: "3. To_Currency Code",
    rate: "5. Exchange Rate",
    timestamp: TimestampField::DateTime("6. Last Refreshed"),
};

/// Keys providers use to report throttling or bad requests with a 200 status.
const PROVIDER_MESSAGE_KEYS: &[&str] = &["Error Message", "Note", "Information", "Error"];

/// Decoded FX payload: every rate quoted against `base` at `as_of`.
#[derive(Debug, Clone)]
pub struct FxSnapshot<'a> {
    pub base: &'a str,
    pub as_of: DateTime<Utc>,
    pub rates: &'a Map<String, Value>,
}

pub fn normalize_quote(raw: &Value, schema: &QuoteSchema) -> FetchResult<Quote> {
    let record = raw.as_object().ok_or_else(|| {
        FetchError::schema(format!("{} quote record is not an object", schema.name))
    })?;

    let symbol = string_field(record, schema.symbol)?;
    if symbol.trim().is_empty() {
        return Err(FetchError::schema(format!("field `{}` is empty", schema.symbol)));
    }

    Ok(Quote {
        symbol: symbol.to_string(),
        price: decimal_field(record, schema.price)?,
        change: decimal_field(record, schema.change)?,
        change_percent: decimal_field(record, schema.change_percent)?,
        as_of: timestamp_field(record, schema.timestamp)?,
    })
}

pub fn normalize_fx_rate(
    base: &str,
    quote_code: &str,
    rate: Decimal,
    timestamp: DateTime<Utc>,
) -> FetchResult<FxRate> {
    if base.trim().is_empty() || quote_code.trim().is_empty() {
        return Err(FetchError::schema("currency code must not be empty"));
    }

    Ok(FxRate {
        base: base.to_string(),
        quote: quote_code.to_string(),
        rate,
        as_of: timestamp,
    })
}

/// Decode a single-pair FX payload according to `schema`.
pub fn normalize_fx_pair(raw: &Value, schema: &FxPairSchema) -> FetchResult<FxRate> {
    if let Some(message) = provider_message(raw) {
        return Err(FetchError::schema(format!("{} responded: {message}", schema.name)));
    }

    let record = raw
        .get(schema.envelope)
        .and_then(Value::as_object)
        .ok_or_else(|| {
            FetchError::schema(format!("missing `{}` in {} response", schema.envelope, schema.name))
        })?;

    normalize_fx_rate(
        string_field(record, schema.base)?,
        string_field(record, schema.quote)?,
        decimal_field(record, schema.rate)?,
        timestamp_field(record, schema.timestamp)?,
    )
}

/// Pull the quote records out of a provider payload according to `schema`.
pub fn quote_records<'a>(raw: &'a Value, schema: &QuoteSchema) -> FetchResult<Vec<&'a Value>> {
    if let Some(message) = provider_message(raw) {
        return Err(FetchError::schema(format!("{} responded: {message}", schema.name)));
    }

    match schema.envelope {
        Some(envelope) => {
            let record = raw.get(envelope).ok_or_else(|| {
                FetchError::schema(format!("missing `{envelope}` in {} response", schema.name))
            })?;
            Ok(vec![record])
        }
        None => raw
            .as_array()
            .map(|records| records.iter().collect())
            .ok_or_else(|| {
                FetchError::schema(format!("expected an array of {} quotes", schema.name))
            }),
    }
}

pub fn parse_fx_response(raw: &Value) -> FetchResult<FxSnapshot<'_>> {
    if let Some(message) = provider_message(raw) {
        return Err(FetchError::schema(format!("fx provider responded: {message}")));
    }

    let object = raw
        .as_object()
        .ok_or_else(|| FetchError::schema("fx response is not an object"))?;

    let base = string_field(object, "base")?;
    let as_of = unix_timestamp(object, "timestamp")?;
    let rates = object
        .get("rates")
        .ok_or_else(|| FetchError::schema("missing field `rates`"))?
        .as_object()
        .ok_or_else(|| FetchError::schema("field `rates` is not an object"))?;

    Ok(FxSnapshot { base, as_of, rates })
}

/// Decimal from a JSON number or a numeric string; a trailing `%` is ignored.
pub fn decimal_value(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().trim_end_matches('%').trim().to_string(),
        _ => return None,
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn provider_message(raw: &Value) -> Option<String> {
    let object = raw.as_object()?;
    PROVIDER_MESSAGE_KEYS
        .iter()
        .find_map(|key| object.get(*key))
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
}

fn field<'a>(record: &'a Map<String, Value>, key: &str) -> FetchResult<&'a Value> {
    match record.get(key) {
        Some(Value::Null) | None => Err(FetchError::schema(format!("missing field `{key}`"))),
        Some(value) => Ok(value),
    }
}

fn string_field<'a>(record: &'a Map<String, Value>, key: &str) -> FetchResult<&'a str> {
    field(record, key)?
        .as_str()
        .ok_or_else(|| FetchError::schema(format!("field `{key}` is not a string")))
}

fn decimal_field(record: &Map<String, Value>, key: &str) -> FetchResult<Decimal> {
    let value = field(record, key)?;
    decimal_value(value)
        .ok_or_else(|| FetchError::schema(format!("field `{key}` is not a decimal: {value}")))
}

fn timestamp_field(
    record: &Map<String, Value>,
    field_spec: TimestampField,
) -> FetchResult<DateTime<Utc>> {
    match field_spec {
        TimestampField::UnixSeconds(key) => unix_timestamp(record, key),
        TimestampField::Date(key) => {
            let text = string_field(record, key)?;
            NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
                .ok_or_else(|| FetchError::schema(format!("field `{key}` is not a date: {text}")))
        }
        TimestampField::DateTime(key) => {
            let text = string_field(record, key)?;
            NaiveDateTime::parse_from_str(text.trim(), "%Y-%m-%d %H:%M:%S")
                .map(|naive| Utc.from_utc_datetime(&naive))
                .map_err(|_| {
                    FetchError::schema(format!("field `{key}` is not a date-time: {text}"))
                })
        }
    }
}

fn unix_timestamp(record: &Map<String, Value>, key: &str) -> FetchResult<DateTime<Utc>> {
    let value = field(record, key)?;
    let seconds = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };

    seconds
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .ok_or_else(|| {
            FetchError::schema(format!("field `{key}` is not a unix timestamp: {value}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    fn fmp_record() -> Value {
        json!({
            "symbol": "AAPL",
            "name": "Apple Inc.",
            "price": 189.984,
            "changesPercentage": 1.2345,
            "change": 2.317,
            "timestamp": 1700000000
        })
    }

    #[test]
    fn maps_fmp_fields_without_rounding() {
        let quote = normalize_quote(&fmp_record(), &FMP_QUOTE).unwrap();

        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.price, dec("189.984"));
        assert_eq!(quote.change, dec("2.317"));
        assert_eq!(quote.change_percent, dec("1.2345"));
        assert_eq!(quote.as_of, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
    }

    #[test]
    fn normalizing_twice_yields_identical_quotes() {
        let raw = fmp_record();
        let first = normalize_quote(&raw, &FMP_QUOTE).unwrap();
        let second = normalize_quote(&raw, &FMP_QUOTE).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn maps_alphavantage_global_quote() {
        let payload = json!({
            "Global Quote": {
                "01. symbol": "IBM",
                "02. open": "181.0000",
                "05. price": "182.5200",
                "07. latest trading day": "2024-03-08",
                "08. previous close": "180.0000",
                "09. change": "2.5200",
                "10. change percent": "1.4000%"
            }
        });

        let records = quote_records(&payload, &ALPHAVANTAGE_GLOBAL_QUOTE).unwrap();
        assert_eq!(records.len(), 1);

        let quote = normalize_quote(records[0], &ALPHAVANTAGE_GLOBAL_QUOTE).unwrap();
        assert_eq!(quote.symbol, "IBM");
        assert_eq!(quote.price, dec("182.52"));
        assert_eq!(quote.change_percent, dec("1.4"));
        assert_eq!(quote.as_of, Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap());
    }

    #[test]
    fn missing_price_is_schema_error() {
        let mut raw = fmp_record();
        raw.as_object_mut().unwrap().remove("price");

        let err = normalize_quote(&raw, &FMP_QUOTE).unwrap_err();
        assert!(matches!(err, FetchError::Schema(ref msg) if msg.contains("price")), "{err:?}");
    }

    #[test]
    fn wrong_typed_fields_are_schema_errors() {
        let mut raw = fmp_record();
        raw["change"] = json!(["1.0"]);
        assert!(matches!(normalize_quote(&raw, &FMP_QUOTE), Err(FetchError::Schema(_))));

        let mut raw = fmp_record();
        raw["symbol"] = json!(42);
        assert!(matches!(normalize_quote(&raw, &FMP_QUOTE), Err(FetchError::Schema(_))));

        let mut raw = fmp_record();
        raw["symbol"] = json!("  ");
        assert!(matches!(normalize_quote(&raw, &FMP_QUOTE), Err(FetchError::Schema(_))));
    }

    #[test]
    fn throttling_note_is_reported() {
        let payload = json!({
            "Note": "Thank you for using Alpha Vantage! \
                     Our standard API call frequency is 5 calls per minute"
        });
        let err = quote_records(&payload, &ALPHAVANTAGE_GLOBAL_QUOTE).unwrap_err();
        assert!(matches!(err, FetchError::Schema(ref msg) if msg.contains("5 calls per minute")));
    }

    #[test]
    fn parses_fx_snapshot() {
        let payload = json!({
            "base": "USD",
            "timestamp": 1700000000,
            "rates": {"EUR": 0.92, "JPY": 149.5}
        });

        let snapshot = parse_fx_response(&payload).unwrap();
        assert_eq!(snapshot.base, "USD");
        assert_eq!(decimal_value(&snapshot.rates["JPY"]), Some(dec("149.5")));

        let rate = normalize_fx_rate(snapshot.base, "EUR", dec("0.92"), snapshot.as_of).unwrap();
        assert_eq!(rate.pair(), ("USD", "EUR"));
    }

    #[test]
    fn maps_alphavantage_exchange_rate() {
        let payload = json!({
            "Realtime Currency Exchange Rate": {
                "1. From_Currency Code": "USD",
                "2. From_Currency Name": "United States Dollar",
                "3. To_Currency Code": "JPY",
                "4. To_Currency Name": "Japanese Yen",
                "5. Exchange Rate": "149.12000000",
                "6. Last Refreshed": "2024-03-08 21:55:01",
                "7. Time Zone": "UTC"
            }
        });

        let rate = normalize_fx_pair(&payload, &ALPHAVANTAGE_EXCHANGE_RATE).unwrap();
        assert_eq!(rate.pair(), ("USD", "JPY"));
        assert_eq!(rate.rate, dec("149.12"));
        assert_eq!(rate.as_of, Utc.with_ymd_and_hms(2024, 3, 8, 21, 55, 1).unwrap());
    }

    #[test]
    fn exchange_rate_without_envelope_is_schema_error() {
        let payload = json!({"Error Message": "Invalid API call."});
        let err = normalize_fx_pair(&payload, &ALPHAVANTAGE_EXCHANGE_RATE).unwrap_err();
        assert!(matches!(err, FetchError::Schema(ref msg) if msg.contains("Invalid API call")));

        let err = normalize_fx_pair(&json!({}), &ALPHAVANTAGE_EXCHANGE_RATE).unwrap_err();
        assert!(matches!(err, FetchError::Schema(_)));
    }

    #[test]
    fn fx_response_without_rates_is_schema_error() {
        let payload = json!({"base": "USD", "timestamp": 1700000000});
        assert!(matches!(parse_fx_response(&payload), Err(FetchError::Schema(_))));
    }
}

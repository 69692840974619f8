use std::io::{self, Write};

use rust_decimal::Decimal;
use unicode_width::UnicodeWidthStr;

use crate::fetch::{FetchOutcome, Rows};
use crate::records::{FxRate, Quote};

const QUOTE_HEADERS: [&str; 5] = ["symbol", "price", "change", "change %", "as of"];
const FX_HEADERS: [&str; 4] = ["from", "to", "rate", "last refreshed (UTC)"];
/// Columns before this index are left-aligned labels, the rest are numbers.
const QUOTE_LABEL_COLUMNS: usize = 1;
const FX_LABEL_COLUMNS: usize = 2;

/// Render all outcomes in order: tables to `out`, one diagnostic line per failure to `err`.
pub fn print_outcomes<W: Write, E: Write>(
    outcomes: &[FetchOutcome],
    out: &mut W,
    err: &mut E,
) -> io::Result<()> {
    let mut first = true;
    for outcome in outcomes {
        match &outcome.result {
            Ok(rows) => {
                if !first {
                    writeln!(out)?;
                }
                first = false;
                writeln!(out, "{}", outcome.category.label().to_uppercase())?;
                out.write_all(render_rows(rows).as_bytes())?;
            }
            Err(error) => {
                writeln!(
                    err,
                    "{}: failed ({}): {}",
                    outcome.category,
                    error.kind(),
                    error
                )?;
            }
        }
    }
    out.flush()?;
    err.flush()
}

pub fn render_rows(rows: &Rows) -> String {
    match rows {
        Rows::Quotes(quotes) => render_quotes(quotes),
        Rows::Rates(rates) => render_rates(rates),
    }
}

pub fn render_quotes(quotes: &[Quote]) -> String {
    let rows: Vec<Vec<String>> = quotes
        .iter()
        .map(|quote| {
            vec![
                quote.symbol.clone(),
                display_decimal(quote.price),
                display_decimal(quote.change),
                display_decimal(quote.change_percent),
                quote.as_of.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    render_table(&QUOTE_HEADERS, &rows, QUOTE_LABEL_COLUMNS)
}

pub fn render_rates(rates: &[FxRate]) -> String {
    let rows: Vec<Vec<String>> = rates
        .iter()
        .map(|rate| {
            vec![
                rate.base.clone(),
                rate.quote.clone(),
                rate.rate.normalize().to_string(),
                rate.as_of.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();
    render_table(&FX_HEADERS, &rows, FX_LABEL_COLUMNS)
}

/// Two fractional digits for display only; the canonical value is untouched.
fn display_decimal(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn render_table(headers: &[&str], rows: &[Vec<String>], label_columns: usize) -> String {
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(*header))
        .collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(cell.as_str()));
        }
    }

    let mut output = String::new();
    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    push_line(&mut output, &header_cells, &widths, label_columns);
    for row in rows {
        push_line(&mut output, row, &widths, label_columns);
    }
    output
}

fn push_line(output: &mut String, cells: &[String], widths: &[usize], label_columns: usize) {
    let line = cells
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let pad = widths[idx].saturating_sub(UnicodeWidthStr::width(cell.as_str()));
            if idx < label_columns {
                format!("{cell}{}", " ".repeat(pad))
            } else {
                format!("{}{cell}", " ".repeat(pad))
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    output.push_str(line.trim_end());
    output.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use chrono::{TimeZone, Utc};

    use crate::error::FetchError;
    use crate::fetch::Category;

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    fn quote(symbol: &str, price: &str) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            price: dec(price),
            change: dec("-1.005"),
            change_percent: dec("0.5"),
            as_of: Utc.with_ymd_and_hms(2024, 3, 8, 21, 0, 0).unwrap(),
        }
    }

    #[test]
    fn rounds_only_for_display() {
        let quote = quote("AAPL", "189.987");
        let table = render_quotes(std::slice::from_ref(&quote));

        assert!(table.contains("189.99"), "{table}");
        assert!(table.contains("0.50"), "{table}");
        assert_eq!(quote.price, dec("189.987"));
    }

    #[test]
    fn aligns_columns_across_rows() {
        let table = render_quotes(&[quote("AAPL", "189.5"), quote("BRK-A", "612000")]);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("symbol"));
        let price_end = |line: &str, price: &str| line.find(price).map(|at| at + price.len());
        assert_eq!(price_end(lines[1], "189.50"), price_end(lines[2], "612000.00"));
    }

    #[test]
    fn fx_rates_are_not_rounded() {
        let rate = FxRate {
            base: "USD".to_string(),
            quote: "JPY".to_string(),
            rate: dec("149.123456"),
            as_of: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };
        let table = render_rates(&[rate]);
        assert!(table.contains("149.123456"), "{table}");
        assert!(table.contains("2023-11-14 22:13:20"), "{table}");
    }

    #[test]
    fn failures_go_to_diagnostics_and_successes_still_print() {
        let outcomes = vec![
            FetchOutcome::failed(Category::Equities, FetchError::schema("missing field `price`")),
            FetchOutcome::succeeded(Category::Crypto, Rows::Quotes(vec![quote("BTCUSD", "64000")])),
        ];
        let mut out = Vec::new();
        let mut err = Vec::new();

        print_outcomes(&outcomes, &mut out, &mut err).unwrap();

        let out = String::from_utf8(out).unwrap();
        let err = String::from_utf8(err).unwrap();
        assert!(out.starts_with("CRYPTO\n"), "{out}");
        assert!(out.contains("BTCUSD"));
        assert_eq!(
            err.trim_end(),
            "equities: failed (SchemaError): unexpected payload: missing field `price`"
        );
    }
}

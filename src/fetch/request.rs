use std::collections::HashMap;

use crate::error::FetchError;

use super::FetchResult;

/// Placeholders a provider URL template may reference.
pub const KNOWN_PLACEHOLDERS: &[&str] = &["apikey", "symbols", "base"];

/// Query parameters whose values are masked before a URL is logged.
const SECRET_PARAMS: &[&str] = &["apikey", "app_id", "token"];

pub const FMP_QUOTE_URL: &str =
    "https://financialmodelingprep.com/api/v3/quote/{symbols}?apikey={apikey}";
pub const FMP_CRYPTO_URL: &str =
    "https://financialmodelingprep.com/api/v3/quotes/crypto?apikey={apikey}";
pub const ALPHAVANTAGE_QUOTE_URL: &str =
    "https://www.alphavantage.co/query?function=GLOBAL_QUOTE&symbol={symbols}&apikey={apikey}";
pub const ALPHAVANTAGE_FX_URL: &str = "https://www.alphavantage.co/query?\
    function=CURRENCY_EXCHANGE_RATE&from_currency={base}&to_currency={symbols}&apikey={apikey}";
pub const OPENEXCHANGERATES_URL: &str =
    "https://openexchangerates.org/api/latest.json?app_id={apikey}";

/// Substitute the API key and the URL-encoded, comma-joined symbol batch into `template`.
pub fn build_url(template: &str, api_key: &str, symbols: &[String]) -> FetchResult<String> {
    let joined = symbols
        .iter()
        .map(|symbol| urlencoding::encode(symbol).into_owned())
        .collect::<Vec<_>>()
        .join(",");

    let mut replacements: HashMap<&str, String> = HashMap::new();
    replacements.insert("apikey", urlencoding::encode(api_key).into_owned());
    replacements.insert("symbols", joined);

    render_template(template, &replacements)
}

/// Substitute one currency pair into a per-pair FX template: `{base}` and `{symbols}`.
pub fn build_pair_url(
    template: &str,
    api_key: &str,
    base: &str,
    quote: &str,
) -> FetchResult<String> {
    let mut replacements: HashMap<&str, String> = HashMap::new();
    replacements.insert("apikey", urlencoding::encode(api_key).into_owned());
    replacements.insert("base", urlencoding::encode(base).into_owned());
    replacements.insert("symbols", urlencoding::encode(quote).into_owned());

    render_template(template, &replacements)
}

/// Split a configured currency entry into `(base, quote)`.
///
/// `"EUR"` has no explicit base; `"USD EUR"` and `"USD/EUR"` do. Anything else is `None`.
pub fn currency_pair(entry: &str) -> Option<(Option<&str>, &str)> {
    let mut codes = entry
        .split(|ch: char| ch.is_whitespace() || ch == '/')
        .filter(|code| !code.is_empty());

    match (codes.next(), codes.next(), codes.next()) {
        (Some(quote), None, None) => Some((None, quote)),
        (Some(base), Some(quote), None) => Some((Some(base), quote)),
        _ => None,
    }
}

/// Return the placeholder names referenced by `template`, in order of appearance.
pub fn placeholders(template: &str) -> FetchResult<Vec<String>> {
    let mut names = Vec::new();
    scan_template(template, |segment| {
        if let Segment::Placeholder(key) = segment {
            names.push(key.to_string());
        }
        Ok(())
    })?;
    Ok(names)
}

/// Mask secret query parameter values so the URL can be logged.
pub fn redact_url(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };

    let params = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if SECRET_PARAMS.contains(&key.to_ascii_lowercase().as_str()) => {
                format!("{key}=***")
            }
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&");

    format!("{base}?{params}")
}

enum Segment<'a> {
    Literal(char),
    Placeholder(&'a str),
}

fn render_template(template: &str, replacements: &HashMap<&str, String>) -> FetchResult<String> {
    let mut result = String::with_capacity(template.len());
    scan_template(template, |segment| {
        match segment {
            Segment::Literal(ch) => result.push(ch),
            Segment::Placeholder(key) => {
                let value = replacements.get(key).ok_or_else(|| {
                    FetchError::Configuration(format!(
                        "No replacement provided for placeholder `{key}` in URL template"
                    ))
                })?;
                result.push_str(value);
            }
        }
        Ok(())
    })?;
    Ok(result)
}

fn scan_template<'a, F>(template: &'a str, mut visit: F) -> FetchResult<()>
where
    F: FnMut(Segment<'a>) -> FetchResult<()>,
{
    let mut chars = template.char_indices();

    while let Some((start, ch)) = chars.next() {
        if ch != '{' {
            visit(Segment::Literal(ch))?;
            continue;
        }

        let mut end = None;
        for (idx, next) in chars.by_ref() {
            if next == '}' {
                end = Some(idx);
                break;
            }
        }

        let Some(end) = end else {
            return Err(FetchError::Configuration(format!(
                "Unterminated placeholder in URL template: {}",
                &template[start..]
            )));
        };

        let key = &template[start + 1..end];
        if key.is_empty() {
            return Err(FetchError::Configuration(
                "Encountered empty placeholder `{}` in URL template".to_string(),
            ));
        }
        visit(Segment::Placeholder(key))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_and_joins_symbols() {
        let symbols = vec!["^GSPC".to_string(), "AAPL".to_string()];
        let url = build_url(FMP_QUOTE_URL, "secret", &symbols).unwrap();
        assert_eq!(
            url,
            "https://financialmodelingprep.com/api/v3/quote/%5EGSPC,AAPL?apikey=secret"
        );
    }

    #[test]
    fn key_only_template_ignores_symbols() {
        let url = build_url(OPENEXCHANGERATES_URL, "abc", &["EUR".to_string()]).unwrap();
        assert_eq!(url, "https://openexchangerates.org/api/latest.json?app_id=abc");
    }

    #[test]
    fn unknown_placeholder_is_a_configuration_error() {
        let err = build_url("https://host/{region}", "k", &[]).unwrap_err();
        assert!(matches!(err, FetchError::Configuration(_)), "{err:?}");
    }

    #[test]
    fn unterminated_placeholder_is_rejected() {
        assert!(placeholders("https://host/{symbols").is_err());
        assert_eq!(
            placeholders(FMP_QUOTE_URL).unwrap(),
            vec!["symbols".to_string(), "apikey".to_string()]
        );
    }

    #[test]
    fn pair_template_takes_base_and_quote() {
        let url = build_pair_url(ALPHAVANTAGE_FX_URL, "k", "USD", "JPY").unwrap();
        assert_eq!(
            url,
            "https://www.alphavantage.co/query?function=CURRENCY_EXCHANGE_RATE\
             &from_currency=USD&to_currency=JPY&apikey=k"
        );

        // Quote templates have no base to offer.
        assert!(build_url(ALPHAVANTAGE_FX_URL, "k", &["JPY".to_string()]).is_err());
    }

    #[test]
    fn splits_currency_entries() {
        assert_eq!(currency_pair("EUR"), Some((None, "EUR")));
        assert_eq!(currency_pair("USD EUR"), Some((Some("USD"), "EUR")));
        assert_eq!(currency_pair(" GBP/JPY "), Some((Some("GBP"), "JPY")));
        assert_eq!(currency_pair("USD EUR GBP"), None);
        assert_eq!(currency_pair("  "), None);
    }

    #[test]
    fn redacts_secret_parameters() {
        let redacted = redact_url("https://h/q?function=GLOBAL_QUOTE&symbol=IBM&apikey=xyz");
        assert_eq!(redacted, "https://h/q?function=GLOBAL_QUOTE&symbol=IBM&apikey=***");
        assert_eq!(
            redact_url("https://h/latest.json?app_id=1"),
            "https://h/latest.json?app_id=***"
        );
    }
}

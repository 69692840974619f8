use std::io;
use std::sync::Arc;

use log::debug;

use crate::cli::Cli;
use crate::config::{load_config, Config};
use crate::error::Result;
use crate::fetch::{plan_requests, Aggregator, FetchOutcome, HttpJsonClient, InfoSelector};
use crate::report::print_outcomes;

/// Overall result of a run, mapped to the process exit status by `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// At least one category printed a table.
    Reported,
    /// Every category failed.
    AllFailed,
}

impl RunStatus {
    pub fn from_outcomes(outcomes: &[FetchOutcome]) -> Self {
        if outcomes.iter().any(FetchOutcome::is_success) {
            RunStatus::Reported
        } else {
            RunStatus::AllFailed
        }
    }
}

/// Load configuration, fetch every selected category concurrently and print the report.
pub async fn run(cli: &Cli) -> Result<RunStatus> {
    debug!(
        "config file: {}, info: {:?}",
        cli.config_file.display(),
        cli.info_type
    );

    let config = load_config(&cli.config_file, cli.env_file.as_deref())?;
    let outcomes = collect_outcomes(&config, InfoSelector::from(cli.info_type)).await?;

    print_outcomes(&outcomes, &mut io::stdout().lock(), &mut io::stderr().lock())?;
    Ok(RunStatus::from_outcomes(&outcomes))
}

/// Fetch every category `selector` asks for over HTTP, one outcome per category.
pub async fn collect_outcomes(
    config: &Config,
    selector: InfoSelector,
) -> Result<Vec<FetchOutcome>> {
    let requests = plan_requests(selector, config)?;

    let client = Arc::new(HttpJsonClient::new(config.limits.timeout)?);
    let aggregator = Aggregator::from_config(config, client);
    aggregator.run_all(requests).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::loader::parse_config;
    use crate::config::{validate_config, EnvOverrides};
    use crate::error::FetchError;
    use crate::fetch::{Category, Rows};

    fn config_for(server_url: &str) -> Config {
        let text = format!(
            "[Market]\n\
             api_key = test-key\n\
             symbols = [\"AAPL\", \"MSFT\"]\n\
             crypto = [\"BTCUSD\"]\n\
             currencies = [\"EUR\", \"GBP\"]\n\
             [Endpoints]\n\
             quote_url = {server_url}/api/v3/quote/{{symbols}}?apikey={{apikey}}\n\
             crypto_url = {server_url}/api/v3/quotes/crypto?apikey={{apikey}}\n\
             fx_url = {server_url}/api/latest.json?app_id={{apikey}}\n"
        );
        let config = parse_config(&text, &EnvOverrides::default()).unwrap();
        validate_config(&config).unwrap();
        config
    }

    #[tokio::test]
    async fn reports_successful_sources_when_one_provider_fails() {
        let mut server = mockito::Server::new_async().await;
        let quotes = server
            .mock("GET", "/api/v3/quote/AAPL,MSFT")
            .match_query(mockito::Matcher::UrlEncoded("apikey".into(), "test-key".into()))
            .with_status(200)
            .with_body(
                r#"[
                    {"symbol":"AAPL","price":190.1,"change":1.2,"changesPercentage":0.63,"timestamp":1700000000},
                    {"symbol":"MSFT","price":410.5,"change":-2.0,"changesPercentage":-0.48,"timestamp":1700000000}
                ]"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/api/v3/quotes/crypto")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[
                    {"symbol":"ETHUSD","price":3100,"change":10,"changesPercentage":0.3,"timestamp":1700000000},
                    {"symbol":"BTCUSD","price":64000,"change":-100,"changesPercentage":-0.15,"timestamp":1700000000}
                ]"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/api/latest.json")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let config = config_for(&server.url());
        let outcomes = collect_outcomes(&config, InfoSelector::ALL).await.unwrap();

        let categories: Vec<Category> = outcomes.iter().map(|o| o.category).collect();
        assert_eq!(categories, vec![Category::Equities, Category::Crypto, Category::Fx]);
        assert!(matches!(outcomes[0].rows(), Some(Rows::Quotes(q)) if q.len() == 2));
        assert!(matches!(
            outcomes[1].rows(),
            Some(Rows::Quotes(q)) if q.len() == 1 && q[0].symbol == "BTCUSD"
        ));
        assert!(matches!(outcomes[2].error(), Some(FetchError::HttpStatus { status: 503, .. })));
        assert_eq!(RunStatus::from_outcomes(&outcomes), RunStatus::Reported);
        quotes.assert_async().await;
    }

    #[test]
    fn all_failed_outcomes_map_to_failure_status() {
        let outcomes = vec![FetchOutcome::failed(
            Category::Fx,
            FetchError::Network("timed out".into()),
        )];
        assert_eq!(RunStatus::from_outcomes(&outcomes), RunStatus::AllFailed);
    }
}

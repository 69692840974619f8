use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use log::debug;
use tokio::task::JoinHandle;

use crate::config::{Config, QuoteProvider};
use crate::error::{AppError, FetchError, Result};

use super::client::JsonSource;
use super::normalize::{ALPHAVANTAGE_EXCHANGE_RATE, ALPHAVANTAGE_GLOBAL_QUOTE, FMP_QUOTE};
use super::sources::{RequestMode, SourceFetcher};
use super::{Category, FetchOutcome, FetchRequest, FetchState, InfoSelector};

const MARKET_CATEGORIES: [Category; 3] =
    [Category::Equities, Category::Indexes, Category::Crypto];

/// Turn the selector into one request per configured category, market group first.
pub fn plan_requests(selector: InfoSelector, config: &Config) -> Result<Vec<FetchRequest>> {
    let mut categories = Vec::with_capacity(4);
    if selector.contains(InfoSelector::MARKET) {
        categories.extend(MARKET_CATEGORIES);
    }
    if selector.contains(InfoSelector::FX) {
        categories.push(Category::Fx);
    }

    let requests: Vec<FetchRequest> = categories
        .into_iter()
        .filter_map(|category| {
            let symbols = config.symbols_for(category);
            if symbols.is_empty() {
                debug!("no symbols configured for {category}, skipping");
                return None;
            }
            Some(FetchRequest::new(
                category,
                symbols.iter().cloned(),
                config.api_key_for(category),
            ))
        })
        .collect();

    if requests.is_empty() {
        return Err(AppError::configuration(
            "selected information type resolves to no configured symbols",
        ));
    }

    debug!(
        "planned categories: {}",
        requests
            .iter()
            .map(|request| request.category.label())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(requests)
}

enum Dispatch {
    Spawned(Category, JoinHandle<FetchOutcome>),
    Rejected(FetchOutcome),
}

/// Runs independent category fetches concurrently and joins them in request order.
pub struct Aggregator {
    fetchers: HashMap<Category, Arc<SourceFetcher>>,
}

impl Aggregator {
    pub fn new(fetchers: impl IntoIterator<Item = SourceFetcher>) -> Self {
        let fetchers = fetchers
            .into_iter()
            .map(|fetcher| (fetcher.category(), Arc::new(fetcher)))
            .collect();
        Self { fetchers }
    }

    /// Register one fetcher per category as described by `config`.
    pub fn from_config(config: &Config, client: Arc<dyn JsonSource>) -> Self {
        let (schema, mode) = match config.provider {
            QuoteProvider::Fmp => (&FMP_QUOTE, RequestMode::Batched),
            QuoteProvider::AlphaVantage => (&ALPHAVANTAGE_GLOBAL_QUOTE, RequestMode::PerSymbol),
        };
        let limits = &config.limits;
        let paced = |category, template: &str| {
            let fetcher = SourceFetcher::new(category, Arc::clone(&client))
                .with_url_template(template)
                .with_mode(mode)
                .with_batch_size(limits.batch_size);
            if limits.rate_limited {
                fetcher.with_cooldown(limits.cooldown)
            } else {
                fetcher
            }
        };

        Self::new([
            paced(Category::Equities, &config.endpoints.quote_url).with_schema(schema),
            paced(Category::Indexes, &config.endpoints.quote_url).with_schema(schema),
            SourceFetcher::new(Category::Crypto, Arc::clone(&client))
                .with_url_template(config.endpoints.crypto_url.clone()),
            paced(Category::Fx, &config.endpoints.fx_url)
                .with_fx_schema(&ALPHAVANTAGE_EXCHANGE_RATE)
                .with_base_currency(config.fx_base.clone()),
        ])
    }

    /// Dispatch every request concurrently and return exactly one outcome per request,
    /// in input order. A failing source never affects its siblings.
    ///
    /// Errors only when nothing could be dispatched at all.
    pub async fn run_all(&self, requests: Vec<FetchRequest>) -> Result<Vec<FetchOutcome>> {
        if requests.is_empty() {
            return Err(AppError::configuration("no fetch requests to dispatch"));
        }

        let dispatched: Vec<Dispatch> = requests
            .into_iter()
            .enumerate()
            .map(|(idx, request)| self.dispatch(idx, request))
            .collect();

        if dispatched
            .iter()
            .all(|dispatch| matches!(dispatch, Dispatch::Rejected(_)))
        {
            return Err(AppError::configuration(
                "none of the requested categories has a registered fetcher",
            ));
        }

        let outcomes = join_all(dispatched.into_iter().map(|dispatch| async move {
            match dispatch {
                Dispatch::Spawned(category, handle) => handle.await.unwrap_or_else(|err| {
                    FetchOutcome::failed(
                        category,
                        FetchError::Network(format!("fetch task aborted: {err}")),
                    )
                }),
                Dispatch::Rejected(outcome) => outcome,
            }
        }))
        .await;

        for (idx, outcome) in outcomes.iter().enumerate() {
            debug!(
                "#{idx} {}: {:?} -> {:?}",
                outcome.category,
                FetchState::Running,
                outcome.state()
            );
        }

        Ok(outcomes)
    }

    fn dispatch(&self, idx: usize, request: FetchRequest) -> Dispatch {
        let category = request.category;
        let Some(fetcher) = self.fetchers.get(&category) else {
            return Dispatch::Rejected(FetchOutcome::failed(
                category,
                FetchError::Configuration(format!("no fetcher registered for {category}")),
            ));
        };

        debug!(
            "#{idx} {category}: {:?} -> {:?}",
            FetchState::Pending,
            FetchState::Running
        );
        let fetcher = Arc::clone(fetcher);
        Dispatch::Spawned(
            category,
            tokio::spawn(async move { fetcher.fetch(&request).await }),
        )
    }
}

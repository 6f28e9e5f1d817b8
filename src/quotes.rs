//! # quotes — Quote Source
//!
//! Where sweeps get current prices from.
//!
//! ## Sources
//! 1. [`HttpQuoteSource`]: `GET {QUOTE_SOURCE_URL}/quotes?symbols=A,B`
//!    returning a JSON array of [`Quote`]s; recent answers are reused for
//!    `QUOTE_CACHE_SECS` unless the caller forces a refresh
//! 2. [`StaticQuoteSource`]: a fixed book of quotes (dev and tests)

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::QuoteError;
use crate::models::{normalize_symbol, Quote};

#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Quotes for `symbols`.  Symbols the source does not know are simply
    /// absent from the result.
    async fn get_quotes(&self, force_refresh: bool, symbols: &[String]) -> Result<Vec<Quote>, QuoteError>;
}

// ─── HTTP ─────────────────────────────────────────────────────────────────────

pub struct HttpQuoteSource {
    client: reqwest::Client,
    base_url: Option<String>,
    ttl: Duration,
    recent: Mutex<HashMap<String, (Instant, Quote)>>,
}

impl HttpQuoteSource {
    pub fn new(client: reqwest::Client, base_url: Option<String>, ttl: Duration) -> Self {
        Self {
            client,
            base_url,
            ttl,
            recent: Mutex::new(HashMap::new()),
        }
    }

    fn recent(&self) -> MutexGuard<'_, HashMap<String, (Instant, Quote)>> {
        self.recent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cache `fetched`, dropping every entry that has outlived the TTL.
    fn remember(&self, fetched: &[Quote]) {
        let now = Instant::now();
        let mut recent = self.recent();
        recent.retain(|_, (at, _)| at.elapsed() < self.ttl);
        for quote in fetched {
            recent.insert(quote.symbol.clone(), (now, quote.clone()));
        }
    }

    async fn fetch(&self, base_url: &str, symbols: &[String]) -> Result<Vec<Quote>, QuoteError> {
        let url = format!("{base_url}/quotes");
        let joined = symbols.join(",");

        debug!(url = %url, symbols = %joined, "fetching quotes");

        let response = self
            .client
            .get(&url)
            .query(&[("symbols", joined.as_str())])
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| QuoteError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(QuoteError::Http { status, body });
        }

        let quotes: Vec<Quote> = response
            .json()
            .await
            .map_err(|e| QuoteError::Parse(e.to_string()))?;

        Ok(quotes
            .into_iter()
            .map(|mut q| {
                q.symbol = normalize_symbol(&q.symbol);
                q
            })
            .collect())
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn get_quotes(&self, force_refresh: bool, symbols: &[String]) -> Result<Vec<Quote>, QuoteError> {
        let wanted: Vec<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();

        let (mut quotes, missing) = {
            let recent = self.recent();
            let mut hits = Vec::new();
            let mut missing = Vec::new();
            for symbol in wanted {
                match recent.get(&symbol) {
                    Some((at, quote)) if !force_refresh && at.elapsed() < self.ttl => {
                        hits.push(quote.clone())
                    }
                    _ => missing.push(symbol),
                }
            }
            (hits, missing)
        };

        if missing.is_empty() {
            return Ok(quotes);
        }

        let Some(base_url) = self.base_url.as_deref() else {
            warn!(count = missing.len(), "QUOTE_SOURCE_URL not set, no quotes available");
            return Ok(quotes);
        };

        let fetched = self.fetch(base_url, &missing).await?;
        info!(requested = missing.len(), received = fetched.len(), "quotes fetched");

        self.remember(&fetched);

        quotes.extend(fetched);
        Ok(quotes)
    }
}

// ─── Static ───────────────────────────────────────────────────────────────────

/// Serves whatever quotes it was given; `set` replaces one.
#[derive(Default)]
pub struct StaticQuoteSource {
    book: Mutex<HashMap<String, Quote>>,
}

impl StaticQuoteSource {
    pub fn new(quotes: impl IntoIterator<Item = Quote>) -> Self {
        Self {
            book: Mutex::new(quotes.into_iter().map(|q| (q.symbol.clone(), q)).collect()),
        }
    }

    pub fn set(&self, quote: Quote) {
        self.book
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(quote.symbol.clone(), quote);
    }
}

#[async_trait]
impl QuoteSource for StaticQuoteSource {
    async fn get_quotes(&self, _force_refresh: bool, symbols: &[String]) -> Result<Vec<Quote>, QuoteError> {
        let book = self.book.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(symbols
            .iter()
            .filter_map(|s| book.get(&normalize_symbol(s)).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EquityType, SessionState};

    #[tokio::test]
    async fn test_static_source_filters_and_normalizes() {
        let source = StaticQuoteSource::new([
            Quote::new("AAPL", EquityType::Stock, SessionState::Regular, 190.0, 1.2),
            Quote::new("MSFT", EquityType::Stock, SessionState::Regular, 410.0, -0.4),
        ]);

        let quotes = source.get_quotes(false, &["aapl".into(), "NOPE".into()]).await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_http_source_without_url_returns_nothing() {
        let source = HttpQuoteSource::new(reqwest::Client::new(), None, Duration::from_secs(60));
        let quotes = source.get_quotes(true, &["AAPL".into()]).await.unwrap();
        assert!(quotes.is_empty());
    }

    #[test]
    fn test_refill_evicts_stale_entries() {
        let aapl = Quote::new("AAPL", EquityType::Stock, SessionState::Regular, 190.0, 1.2);
        let msft = Quote::new("MSFT", EquityType::Stock, SessionState::Regular, 410.0, -0.4);

        let fresh = HttpQuoteSource::new(reqwest::Client::new(), None, Duration::from_secs(60));
        fresh.remember(&[aapl.clone()]);
        fresh.remember(&[msft.clone()]);
        assert_eq!(fresh.recent().len(), 2);

        let expiring = HttpQuoteSource::new(reqwest::Client::new(), None, Duration::ZERO);
        expiring.remember(&[aapl]);
        expiring.remember(&[msft]);
        let recent = expiring.recent();
        assert_eq!(recent.len(), 1);
        assert!(recent.contains_key("MSFT"));
    }
}

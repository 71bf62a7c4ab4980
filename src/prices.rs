// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Exchange-rate lookups.
//!
//! A separate price job fills the shared `prices` hash, keyed
//! `coingecko:{nano|banano}-{symbol}`. [`PriceMirror`] copies that hash into an
//! [`InMemoryPriceCache`] on a timer so subscribe and price-tick lookups never
//! wait on the network. The gateway never talks to exchange-rate APIs itself.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use redis::AsyncCommands;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::ledger::CurrencyMode;

/// Display currencies a wallet may request.
pub const CURRENCY_LIST: [&str; 38] = [
    "ARS", "AUD", "BRL", "BTC", "CAD", "CHF", "CLP", "CNY", "CZK", "DKK", "EUR", "GBP", "HKD",
    "HUF", "IDR", "ILS", "INR", "JPY", "KRW", "MXN", "MYR", "NOK", "NZD", "PHP", "PKR", "PLN",
    "RUB", "SEK", "SGD", "THB", "TRY", "TWD", "USD", "ZAR", "SAR", "AED", "KWD", "UAH",
];

pub const DEFAULT_CURRENCY: &str = "USD";

/// Resolve a requested currency against [`CURRENCY_LIST`], falling back to
/// [`DEFAULT_CURRENCY`].
pub fn resolve_currency(requested: Option<&str>) -> String {
    requested
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| CURRENCY_LIST.contains(&c.as_str()))
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
}

pub fn price_key(mode: CurrencyMode, symbol: &str) -> String {
    format!(
        "coingecko:{}-{}",
        mode.price_prefix(),
        symbol.to_ascii_lowercase()
    )
}

/// Read side of the price store.
pub trait PriceCache: Send + Sync {
    fn get(&self, key: &str) -> Option<f64>;
}

/// Rates for one currency at one instant. Missing values are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PriceSnapshot {
    pub currency: String,
    pub price: Option<f64>,
    pub btc: Option<f64>,
    /// BANANO -> NANO cross rate, banano deployments only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nano: Option<f64>,
}

impl PriceSnapshot {
    pub fn lookup(cache: &dyn PriceCache, mode: CurrencyMode, currency: &str) -> Self {
        Self {
            currency: currency.to_string(),
            price: cache.get(&price_key(mode, currency)),
            btc: cache.get(&price_key(mode, "btc")),
            nano: if mode.is_banano() {
                cache.get(&price_key(mode, "nano"))
            } else {
                None
            },
        }
    }
}

struct CacheEntry {
    price: f64,
    inserted_at: Instant,
}

/// In-process LRU price store with a per-entry TTL.
pub struct InMemoryPriceCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl InMemoryPriceCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    pub fn put(&self, key: &str, price: f64) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                key.to_string(),
                CacheEntry {
                    price,
                    inserted_at: Instant::now(),
                },
            );
        }
    }
}

impl PriceCache for InMemoryPriceCache {
    fn get(&self, key: &str) -> Option<f64> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.price);
            }
            cache.pop(key);
        }
        None
    }
}

// =============================================================================
// Shared Store
// =============================================================================

/// Hash holding every published price.
pub const PRICES_HASH: &str = "prices";

#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("Price store error: {0}")]
    Store(String),
}

/// Where published prices come from, as raw `key -> decimal string` pairs.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_all(&self) -> Result<HashMap<String, String>, PriceError>;
}

/// Reads the `prices` hash from Redis.
pub struct RedisPriceSource {
    client: redis::Client,
}

impl RedisPriceSource {
    pub fn new(url: &str) -> Result<Self, PriceError> {
        let client = redis::Client::open(url).map_err(|e| PriceError::Store(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PriceSource for RedisPriceSource {
    async fn fetch_all(&self) -> Result<HashMap<String, String>, PriceError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PriceError::Store(e.to_string()))?;
        let prices: HashMap<String, String> = conn
            .hgetall(PRICES_HASH)
            .await
            .map_err(|e| PriceError::Store(e.to_string()))?;
        Ok(prices)
    }
}

/// Keeps an [`InMemoryPriceCache`] in step with a [`PriceSource`].
pub struct PriceMirror {
    source: Arc<dyn PriceSource>,
    cache: Arc<InMemoryPriceCache>,
    interval: Duration,
}

impl PriceMirror {
    pub fn new(
        source: Arc<dyn PriceSource>,
        cache: Arc<InMemoryPriceCache>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            interval,
        }
    }

    /// Sync immediately, then every `interval`, until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Price mirror starting"
        );

        loop {
            if let Err(e) = self.sync_step().await {
                warn!(error = %e, "Price sync failed, keeping cached prices");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Price mirror shutting down");
                    return;
                }
            }
        }
    }

    /// Copy one snapshot of the source into the cache. Returns how many prices
    /// were stored; unparsable values are skipped.
    pub async fn sync_step(&self) -> Result<usize, PriceError> {
        let prices = self.source.fetch_all().await?;
        let mut stored = 0;
        for (key, raw) in &prices {
            match raw.trim().parse::<f64>() {
                Ok(price) if price.is_finite() => {
                    self.cache.put(key, price);
                    stored += 1;
                }
                _ => debug!(key = %key, value = %raw, "Skipping unparsable price"),
            }
        }
        debug!(stored, total = prices.len(), "Prices synced");
        Ok(stored)
    }
}

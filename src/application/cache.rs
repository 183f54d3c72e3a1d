//! Thread-safe price cache with change notifications.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::broadcast;

use crate::domain::{ExchangeId, Quote, QuoteKey, Symbol};
use crate::port::{QuoteSink, UpdateOutcome};

/// Latest quote per (exchange, symbol).
///
/// Each key is updated atomically; there is no lock spanning keys. Accepted
/// updates are announced on a bounded broadcast channel. A slow subscriber
/// loses the oldest notifications and sees a lag count instead.
pub struct PriceCache {
    quotes: DashMap<QuoteKey, Quote>,
    tx: Option<broadcast::Sender<QuoteKey>>,
}

impl PriceCache {
    /// Create a cache without notifications.
    #[must_use]
    pub fn new() -> Self {
        Self {
            quotes: DashMap::new(),
            tx: None,
        }
    }

    /// Create a cache that announces every accepted update.
    ///
    /// Returns the cache and a first receiver; more can be made with
    /// [`subscribe`](Self::subscribe).
    #[must_use]
    pub fn with_notifications(capacity: usize) -> (Self, broadcast::Receiver<QuoteKey>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        let cache = Self {
            quotes: DashMap::new(),
            tx: Some(tx),
        };
        (cache, rx)
    }

    /// Returns `None` if the cache was created without notifications.
    #[must_use]
    pub fn subscribe(&self) -> Option<broadcast::Receiver<QuoteKey>> {
        self.tx.as_ref().map(broadcast::Sender::subscribe)
    }

    /// Apply a quote.
    ///
    /// The quote is rejected if its sequence is not newer than the stored
    /// one. Missing sides are carried over from the stored quote; the merged
    /// result must have positive prices and must not be crossed.
    pub fn update(&self, quote: Quote) -> UpdateOutcome {
        let key = quote.key();

        let outcome = match self.quotes.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let stored = entry.get();
                if quote.sequence <= stored.sequence {
                    return UpdateOutcome::OutOfOrder {
                        stored: stored.sequence,
                        received: quote.sequence,
                    };
                }
                let merged = Quote {
                    bid: quote.bid.or(stored.bid),
                    ask: quote.ask.or(stored.ask),
                    ..quote
                };
                if !is_valid(&merged) {
                    return UpdateOutcome::Invalid;
                }
                entry.insert(merged);
                UpdateOutcome::Accepted
            }
            Entry::Vacant(entry) => {
                if !is_valid(&quote) {
                    return UpdateOutcome::Invalid;
                }
                entry.insert(quote);
                UpdateOutcome::Accepted
            }
        };

        // No receivers is fine.
        if let Some(ref tx) = self.tx {
            let _ = tx.send(key);
        }
        outcome
    }

    /// Latest quote for `key`, however old.
    #[must_use]
    pub fn get(&self, key: &QuoteKey) -> Option<Quote> {
        self.quotes.get(key).map(|entry| entry.value().clone())
    }

    /// Quotes for `symbol` on every exchange.
    #[must_use]
    pub fn quotes_for_symbol(&self, symbol: &Symbol) -> Vec<Quote> {
        self.quotes
            .iter()
            .filter(|entry| &entry.key().symbol == symbol)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Quotes for each of `symbols` on `exchange`, in order.
    #[must_use]
    pub fn quotes_on(&self, exchange: &ExchangeId, symbols: &[Symbol]) -> Vec<Option<Quote>> {
        symbols
            .iter()
            .map(|symbol| self.get(&QuoteKey::new(exchange.clone(), symbol.clone())))
            .collect()
    }

    /// Copy of every stored quote.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Quote> {
        self.quotes.iter().map(|entry| entry.value().clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

fn is_valid(quote: &Quote) -> bool {
    let positive = |side: Option<Decimal>| side.map_or(true, |price| price > Decimal::ZERO);
    quote.bid.or(quote.ask).is_some()
        && positive(quote.bid)
        && positive(quote.ask)
        && !quote.is_crossed()
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteSink for PriceCache {
    fn update(&self, quote: Quote) -> UpdateOutcome {
        PriceCache::update(self, quote)
    }
}

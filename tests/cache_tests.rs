//! Price cache behavior under concurrent writers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use arbwatch::application::PriceCache;
use arbwatch::port::UpdateOutcome;
use arbwatch::testkit::domain::{key, quote};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const WRITERS: u64 = 4;
const PER_WRITER: u64 = 500;

#[test]
fn concurrent_writers_never_move_sequence_backwards() {
    let cache = PriceCache::new();
    let done = AtomicBool::new(false);
    let btc = key("binance", "BTC/USDT");

    thread::scope(|s| {
        let reader = s.spawn(|| {
            let mut last = 0;
            while !done.load(Ordering::Acquire) {
                if let Some(q) = cache.get(&btc) {
                    assert!(q.sequence >= last, "sequence went from {last} to {}", q.sequence);
                    last = q.sequence;
                }
            }
        });

        let writers: Vec<_> = (0..WRITERS)
            .map(|w| {
                let cache = &cache;
                s.spawn(move || {
                    for i in 0..PER_WRITER {
                        let seq = i * WRITERS + w + 1;
                        let bid = Decimal::from(seq);
                        cache.update(quote("binance", "BTC/USDT", bid, bid + Decimal::ONE, seq));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::Release);
        reader.join().unwrap();
    });

    let stored = cache.get(&btc).unwrap();
    assert_eq!(stored.sequence, WRITERS * PER_WRITER);
    assert_eq!(stored.bid, Some(Decimal::from(WRITERS * PER_WRITER)));
    assert_eq!(cache.len(), 1);
}

#[test]
fn concurrent_keys_are_independent() {
    let cache = PriceCache::new();
    let exchanges = ["binance", "okx", "bybit", "gate"];

    thread::scope(|s| {
        for exchange in exchanges {
            let cache = &cache;
            s.spawn(move || {
                for seq in 1..=200 {
                    let outcome = cache.update(quote(exchange, "ETH/USDT", dec!(3000), dec!(3001), seq));
                    assert_eq!(outcome, UpdateOutcome::Accepted);
                }
            });
        }
    });

    assert_eq!(cache.len(), exchanges.len());
    for exchange in exchanges {
        assert_eq!(cache.get(&key(exchange, "ETH/USDT")).unwrap().sequence, 200);
    }
}

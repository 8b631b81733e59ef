//! Shared helpers: money rendering and per-key locking

use parking_lot::Mutex;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Render an amount with exactly two decimals (`3.8` -> `3.80`)
pub fn fmt_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

/// Terser rendering: `3.00` -> `3`, `3.80` -> `3.8`
pub fn fmt_money_terse(amount: Decimal) -> String {
    let s = fmt_money(amount);
    match s.strip_suffix(".00") {
        Some(whole) => whole.to_string(),
        None => s.strip_suffix('0').map(str::to_string).unwrap_or(s),
    }
}

/// Async mutex per key, so check-then-act sequences on the same message
/// run one at a time while different messages proceed in parallel.
pub struct KeyedMutex<K> {
    locks: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedMutex<K> {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let slot = {
            let mut locks = self.locks.lock();
            locks.entry(key).or_default().clone()
        };
        slot.lock_owned().await
    }

    /// Drop slots nobody holds or waits on
    pub fn prune(&self) -> usize {
        let mut locks = self.locks.lock();
        let before = locks.len();
        locks.retain(|_, slot| Arc::strong_count(slot) > 1);
        before - locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedMutex<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    #[test]
    fn test_fmt_money_pads_and_rounds() {
        assert_eq!(fmt_money(dec!(2)), "2.00");
        assert_eq!(fmt_money(dec!(3.8)), "3.80");
        assert_eq!(fmt_money(dec!(1.005)), "1.01");
        assert_eq!(fmt_money(dec!(-0.125)), "-0.13");
    }

    #[test]
    fn test_fmt_money_terse() {
        assert_eq!(fmt_money_terse(dec!(3.00)), "3");
        assert_eq!(fmt_money_terse(dec!(3.80)), "3.8");
        assert_eq!(fmt_money_terse(dec!(3.85)), "3.85");
    }

    #[tokio::test]
    async fn test_keyed_mutex_serializes_same_key() {
        let locks = Arc::new(KeyedMutex::<u64>::new());
        let counter = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..4 {
            let locks = locks.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(7).await;
                counter.lock().push(("enter", i));
                tokio::time::sleep(Duration::from_millis(5)).await;
                counter.lock().push(("exit", i));
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let events = counter.lock().clone();
        for pair in events.chunks(2) {
            assert_eq!(pair[0].0, "enter");
            assert_eq!(pair[1].0, "exit");
            assert_eq!(pair[0].1, pair[1].1);
        }
    }

    #[tokio::test]
    async fn test_keyed_mutex_prune() {
        let locks = KeyedMutex::<u64>::new();
        {
            let _a = locks.lock(1).await;
            let _b = locks.lock(2).await;
            assert_eq!(locks.len(), 2);
            assert_eq!(locks.prune(), 0);
        }
        assert_eq!(locks.prune(), 2);
        assert!(locks.is_empty());
    }
}

//! In-process cache of consolidated indicators
//!
//! Purely an optimization: entries are dropped for an owner on any change
//! event, so a hit is always equal to a fresh computation. A value computed
//! across an invalidation is never stored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::types::ConsolidatedIndicators;
use crate::period::Period;

#[derive(Default)]
struct Inner {
    entries: HashMap<(String, Period), ConsolidatedIndicators>,
    /// Bumped on every invalidation of an owner
    generations: HashMap<String, u64>,
}

#[derive(Clone, Default)]
pub struct IndicatorCache {
    inner: Arc<Mutex<Inner>>,
}

impl IndicatorCache {
    pub fn get(&self, owner: &str, period: Period) -> Option<ConsolidatedIndicators> {
        let inner = self.inner.lock().ok()?;
        inner.entries.get(&(owner.to_string(), period)).cloned()
    }

    /// Current generation for `owner`; read it before computing a value to
    /// hand to `put`
    pub fn generation(&self, owner: &str) -> u64 {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.generations.get(owner).copied())
            .unwrap_or(0)
    }

    /// Store `indicators` unless `owner` was invalidated since `generation`
    /// was read. Returns whether the value was kept.
    pub fn put(&self, owner: &str, generation: u64, indicators: ConsolidatedIndicators) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        if inner.generations.get(owner).copied().unwrap_or(0) != generation {
            return false;
        }
        inner
            .entries
            .insert((owner.to_string(), indicators.period), indicators);
        true
    }

    /// Drop every cached month for `owner`
    pub fn invalidate_owner(&self, owner: &str) {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            // A poisoned cache cannot be trusted at all
            Err(poisoned) => {
                let mut inner = poisoned.into_inner();
                inner.entries.clear();
                inner
            }
        };
        inner.entries.retain(|(o, _), _| o != owner);
        *inner.generations.entry(owner.to_string()).or_insert(0) += 1;
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }
}

//! Projection engine
//!
//! Turns recurring rules, the ledger and card invoices into month views,
//! balances and indicators, and runs the workflows that mutate them.
//!
//! ## Components
//!
//! - **Materializer** (`materialize`) - pure projection of rules into a month
//! - **Merge layer** (`reconcile`) - one chronological view per month
//! - **Confirmation** (`confirm`) - virtual occurrence to confirmed entry
//! - **Adjustments** (`adjust`) - this-month-only, from-now-on, skip
//! - **Balances** (`balance`) - current, projected, consolidated indicators
//! - **Invoices** (`invoices`) - auto-close, preview, payment
//!
//! ## Usage
//!
//! ```rust,ignore
//! use runway_core::{Database, Engine, EventBus, Period};
//!
//! let db = Database::new("runway.db")?;
//! let engine = Engine::new(Arc::new(db), EventBus::new(), Default::default());
//! let view = engine.for_month("alice", Period::new(2024, 5)?).await;
//! ```

mod adjust;
mod balance;
mod cache;
mod confirm;
mod invoices;
mod manage;
pub mod materialize;
mod reconcile;
pub mod types;

use std::sync::Arc;

use crate::config::EngineSettings;
use crate::events::{ChangeEvent, EventBus, Subscription};
use crate::store::Store;

pub use cache::IndicatorCache;
pub use materialize::materialize;
pub use types::{
    savings_rate, AccountBalance, Adjustment, AdjustmentMode, AdjustmentOutcome,
    AutoCloseFailure, AutoCloseReport, BalanceReport, ConsolidatedIndicators, FlowBreakdown,
    InstallmentPurchase, InvoicePreview, MonthView, OccurrenceKey, PartialFailure,
    ProjectedBalance, Transaction, TransactionId, VirtualOccurrence,
};

/// Entry point for every engine operation
pub struct Engine {
    store: Arc<dyn Store>,
    bus: EventBus,
    cache: IndicatorCache,
    settings: EngineSettings,
    /// Keeps the cache listening to changes published by anyone on the bus
    _invalidation: Subscription,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, bus: EventBus, settings: EngineSettings) -> Self {
        let cache = IndicatorCache::default();
        let listener = cache.clone();
        let invalidation = bus.subscribe(move |event| listener.invalidate_owner(&event.owner));

        Self {
            store,
            bus,
            cache,
            settings,
            _invalidation: invalidation,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn cache(&self) -> &IndicatorCache {
        &self.cache
    }

    /// Drop derived state for the owner and tell subscribers
    fn notify(&self, event: ChangeEvent) {
        self.cache.invalidate_owner(&event.owner);
        self.bus.publish(event);
    }
}

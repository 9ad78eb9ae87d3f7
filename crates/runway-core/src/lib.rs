//! Runway Core Library
//!
//! Recurring projection and balance engine for the Runway finance tracker:
//! - Recurring rules materialized into per-month virtual occurrences
//! - Month views merging the ledger, virtual occurrences and card invoices
//! - Confirmation and one-off adjustment workflows
//! - Current/projected balances and consolidated indicators
//! - Card invoice auto-close
//! - Change-notification bus
//! - SQLite (SQLCipher) store adapter

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod events;
pub mod export;
pub mod models;
pub mod period;
pub mod store;

/// Test utilities: fixtures and a fault-injecting store
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{EngineSettings, IndicatorSource, RunwayConfig};
pub use db::{Database, LedgerFilter};
pub use engine::{
    savings_rate, AccountBalance, Adjustment, AdjustmentMode, AdjustmentOutcome, AutoCloseFailure,
    AutoCloseReport, BalanceReport, ConsolidatedIndicators, Engine, FlowBreakdown,
    InstallmentPurchase, InvoicePreview, MonthView, OccurrenceKey, PartialFailure,
    ProjectedBalance, Transaction, TransactionId, VirtualOccurrence,
};
pub use error::{Error, Result};
pub use events::{ChangeEvent, ChangeOp, ChangeSubject, EntityKind, EventBus, Subscription};
pub use models::*;
pub use period::Period;
pub use store::{InvoiceFilter, PeriodTotals, Store};

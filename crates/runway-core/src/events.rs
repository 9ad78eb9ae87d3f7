//! Change-notification bus
//!
//! Every mutating workflow publishes a typed [`ChangeEvent`] so views built
//! from the store (month views, balances, cached indicators) know to
//! recompute. Two ways to listen:
//! - [`EventBus::subscribe`] registers a synchronous callback, invoked inline
//!   on publish; the returned [`Subscription`] removes it when dropped
//! - [`EventBus::listen`] hands out a broadcast receiver for async consumers
//!
//! The bus is an explicit handle: clone it into whatever needs to publish or
//! listen. There is no process-wide instance.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::models::EntryKind;

/// Buffered events per async listener before it starts lagging
const CHANNEL_CAPACITY: usize = 256;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Create,
    Update,
    Delete,
    Confirm,
    /// Coarse "refetch everything" signal
    All,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Confirm => "confirm",
            Self::All => "all",
        }
    }
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which slice of the data changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSubject {
    Income,
    Expense,
    CardExpense,
    Recurring,
}

impl From<EntryKind> for ChangeSubject {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Income => Self::Income,
            EntryKind::Expense => Self::Expense,
            EntryKind::CardExpense => Self::CardExpense,
        }
    }
}

/// Type of record the ids refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Rule,
    LedgerEntry,
    Invoice,
    Account,
    Card,
    Category,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub owner: String,
    pub op: ChangeOp,
    pub subject: Option<ChangeSubject>,
    pub entity: EntityKind,
    pub ids: Vec<i64>,
}

impl ChangeEvent {
    pub fn new(owner: impl Into<String>, op: ChangeOp, entity: EntityKind) -> Self {
        Self {
            owner: owner.into(),
            op,
            subject: None,
            entity,
            ids: Vec::new(),
        }
    }

    pub fn subject(mut self, subject: ChangeSubject) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn id(mut self, id: i64) -> Self {
        self.ids.push(id);
        self
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.ids.extend(ids);
        self
    }
}

type Callback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

struct BusInner {
    next_id: AtomicU64,
    callbacks: Mutex<BTreeMap<u64, Callback>>,
    sender: broadcast::Sender<ChangeEvent>,
}

/// Publish/subscribe hub for change events
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                next_id: AtomicU64::new(1),
                callbacks: Mutex::new(BTreeMap::new()),
                sender,
            }),
        }
    }

    /// Register a callback. It stays registered until the returned
    /// subscription is dropped or unsubscribed.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        match self.inner.callbacks.lock() {
            Ok(mut callbacks) => {
                callbacks.insert(id, Arc::new(callback));
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(id, Arc::new(callback));
            }
        }
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Receiver for async consumers (server scheduler, websocket fan-out)
    pub fn listen(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.sender.subscribe()
    }

    /// Deliver an event to every callback, then to async listeners
    pub fn publish(&self, event: ChangeEvent) {
        // Snapshot so callbacks may subscribe/unsubscribe without deadlocking
        let callbacks: Vec<Callback> = match self.inner.callbacks.lock() {
            Ok(callbacks) => callbacks.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        };

        debug!(
            owner = %event.owner,
            op = %event.op,
            entity = ?event.entity,
            ids = ?event.ids,
            subscribers = callbacks.len(),
            "Publishing change event"
        );

        for callback in callbacks {
            let result =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(&event)));
            if result.is_err() {
                warn!(op = %event.op, "Change event subscriber panicked");
            }
        }

        // No async listeners is not an error
        let _ = self.inner.sender.send(event);
    }

    /// Number of registered callbacks
    pub fn subscriber_count(&self) -> usize {
        match self.inner.callbacks.lock() {
            Ok(callbacks) => callbacks.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            match bus.callbacks.lock() {
                Ok(mut callbacks) => {
                    callbacks.remove(&self.id);
                }
                Err(poisoned) => {
                    poisoned.into_inner().remove(&self.id);
                }
            }
        }
    }
}

//! Ordered observer list for recorded faults.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use faultline_common::utils::{contain_panics, panic_message};
use faultline_domain::FaultRecord;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::error;

pub(crate) type Subscriber = Arc<dyn Fn(&FaultRecord) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub(crate) struct Subscribers {
    entries: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_id: AtomicU64,
}

impl Subscribers {
    pub(crate) fn add(&self, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, subscriber));
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Deliver in registration order. The list is copied out first so a
    /// subscriber may (un)subscribe while being notified.
    pub(crate) fn notify(&self, record: &FaultRecord) {
        let snapshot: Vec<(SubscriptionId, Subscriber)> = self.entries.lock().clone();
        for (id, subscriber) in snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| contain_panics(|| subscriber(record)))) {
                error!(
                    subscription = id.0,
                    fault_id = %record.id,
                    panic = %panic_message(payload.as_ref()),
                    "Fault subscriber panicked"
                );
            }
        }
    }
}

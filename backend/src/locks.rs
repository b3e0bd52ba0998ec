//! Named advisory lock domains.
//!
//! Lock ordering contract (lowest acquired first):
//!   1. `Auction(lot_id)`  — bids and settlement on a single lot
//!   2. `Draft(draft_id)`  — nominations, rotation, pause/resume, completion
//!   3. `Roster(roster_id)` — per-roster invariants when needed
//!
//! No operation in this crate ever holds two domains at once; settlement
//! takes `Auction` in one transaction, commits, then takes `Draft` in a
//! second. Any future operation that genuinely needs both MUST acquire in
//! the order above.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

/// Advisory lock domain. The discriminant is the acquisition priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockDomain {
    Auction = 0,
    Draft = 1,
    Roster = 2,
}

impl LockDomain {
    pub fn name(&self) -> &'static str {
        match self {
            LockDomain::Auction => "AUCTION",
            LockDomain::Draft => "DRAFT",
            LockDomain::Roster => "ROSTER",
        }
    }
}

/// Held advisory lock. Dropping it releases the keyed resource.
pub struct LockGuard {
    _guard: OwnedMutexGuard<()>,
    domain: LockDomain,
    key: Uuid,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        tracing::trace!(domain = self.domain.name(), key = %self.key, "lock released");
    }
}

/// In-process registry of keyed advisory locks.
///
/// Waiters queue on a per-key `tokio::sync::Mutex`, so transactions block on
/// contention but never spin. Lock entries are created on first use and kept
/// for the life of the process; the key space is bounded by live drafts and
/// lots.
#[derive(Default)]
pub struct LockManager {
    entries: Mutex<HashMap<(LockDomain, Uuid), Arc<tokio::sync::Mutex<()>>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, domain: LockDomain, key: Uuid) -> LockGuard {
        let entry = {
            let mut map = self.entries.lock();
            Arc::clone(map.entry((domain, key)).or_default())
        };

        let guard = entry.lock_owned().await;
        tracing::trace!(domain = domain.name(), key = %key, "lock acquired");

        LockGuard {
            _guard: guard,
            domain,
            key,
        }
    }
}

//! Locked transaction runner.
//!
//! Every mutating auction operation runs as: acquire the advisory lock for
//! its keyed resource, open a transaction, run the body, commit on success.
//! A body that errors drops its transaction, which rolls back on drop.
//! Events are never published from inside a body; callers publish after the
//! commit has landed.

use std::sync::Arc;
use std::time::Duration;

use sqlx::{Any, AnyPool, Transaction};

use crate::error::{EngineError, EngineResult};
use crate::locks::{LockDomain, LockManager};
use crate::logger::warn_if_slow;

pub type AnyTx = Transaction<'static, Any>;

#[derive(Clone)]
pub struct TxnRunner {
    pool: AnyPool,
    locks: Arc<LockManager>,
}

impl TxnRunner {
    pub fn new(pool: AnyPool, locks: Arc<LockManager>) -> Self {
        Self { pool, locks }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Run `body` inside `domain(key)` with an open transaction.
    ///
    /// The body receives the transaction by value and hands it back with its
    /// result; an `Err` drops the transaction and rolls back. The lock is
    /// held until after commit/rollback, so committed writes under the same
    /// key are totally ordered. Bodies must not perform long external calls;
    /// database IO is the only suspension point expected under the lock.
    pub async fn run_locked<T, F, Fut>(
        &self,
        domain: LockDomain,
        key: uuid::Uuid,
        body: F,
    ) -> EngineResult<T>
    where
        F: FnOnce(AnyTx) -> Fut,
        Fut: Future<Output = EngineResult<(AnyTx, T)>>,
    {
        let _guard = self.locks.acquire(domain, key).await;

        let tx = self.pool.begin().await?;

        let (tx, value) =
            warn_if_slow("locked_txn_body", Duration::from_millis(250), body(tx)).await?;

        tx.commit().await?;
        Ok(value)
    }
}

/// Map a unique-constraint violation onto a domain error, letting callers
/// turn racing inserts into idempotent or retryable outcomes.
pub fn on_unique_violation(err: sqlx::Error, conflict: EngineError) -> EngineError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => conflict,
        _ => EngineError::Db(err),
    }
}

//! Connection and transaction management.
//!
//! A [`Transaction`] binds one pooled connection to the current thread for
//! the duration of a logical unit of work; every repository operation issued
//! on that thread runs over the bound connection until commit or rollback.
//! `Transaction` holds an `Rc` and therefore cannot move to another thread,
//! which makes "a transaction is owned by one unit of work" a compile-time
//! property rather than a convention.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::driver::{BackendError, BackendResult, Driver, DriverConnection};
use super::pool::{ConnectionPool, PooledConnection};

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACTIVE_TX: RefCell<Option<Rc<TxShared>>> = const { RefCell::new(None) };
}

/// Transaction lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

struct TxShared {
    manager_id: u64,
    state: Cell<TransactionState>,
    conn: RefCell<Option<PooledConnection>>,
}

/// Pooled connections plus thread-scoped transactions for one engine.
pub struct ConnectionManager {
    id: u64,
    pool: ConnectionPool,
}

impl ConnectionManager {
    /// Create a manager over the given driver with the given pool capacity.
    pub fn new(driver: Arc<dyn Driver>, pool_capacity: usize) -> Self {
        Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            pool: ConnectionPool::new(driver, pool_capacity),
        }
    }

    /// Check out a connection for scoped use outside any transaction.
    pub fn acquire(&self) -> BackendResult<PooledConnection> {
        self.pool.acquire()
    }

    /// Run `f` over the thread's transaction connection if one is bound,
    /// otherwise over a freshly checked-out pooled connection.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut dyn DriverConnection) -> BackendResult<T>,
    ) -> BackendResult<T> {
        if let Some(tx) = self.current_tx() {
            let mut guard = tx.conn.borrow_mut();
            let conn = guard
                .as_mut()
                .ok_or(BackendError::TransactionInactive)?;
            return f(conn.as_mut());
        }

        let mut conn = self.pool.acquire()?;
        f(conn.as_mut())
    }

    /// Begin a transaction bound to the current thread.
    ///
    /// If this thread already has an active transaction on this manager, the
    /// returned handle joins it instead of nesting.
    pub fn begin_transaction(&self) -> BackendResult<Transaction> {
        if let Some(existing) = self.current_tx() {
            return Ok(Transaction { shared: existing });
        }

        let mut conn = self.pool.acquire()?;
        conn.as_mut().begin()?;

        let shared = Rc::new(TxShared {
            manager_id: self.id,
            state: Cell::new(TransactionState::Active),
            conn: RefCell::new(Some(conn)),
        });
        ACTIVE_TX.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&shared)));
        Ok(Transaction { shared })
    }

    /// Whether the current thread has an active transaction on this manager.
    pub fn has_transaction_begun(&self) -> bool {
        self.current_tx().is_some()
    }

    /// Drain the pool and release the driver.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    fn current_tx(&self) -> Option<Rc<TxShared>> {
        ACTIVE_TX.with(|slot| {
            let borrow = slot.borrow();
            match borrow.as_ref() {
                Some(tx)
                    if tx.manager_id == self.id
                        && tx.state.get() == TransactionState::Active =>
                {
                    Some(Rc::clone(tx))
                }
                _ => None,
            }
        })
    }
}

/// A scoped transaction over one pooled connection.
pub struct Transaction {
    shared: Rc<TxShared>,
}

impl Transaction {
    /// Whether the transaction is still active.
    pub fn is_active(&self) -> bool {
        self.shared.state.get() == TransactionState::Active
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TransactionState {
        self.shared.state.get()
    }

    /// Commit the transaction. Valid only while active.
    pub fn commit(&self) -> BackendResult<()> {
        if !self.is_active() {
            return Err(BackendError::TransactionInactive);
        }

        {
            let mut guard = self.shared.conn.borrow_mut();
            let conn = guard
                .as_mut()
                .ok_or(BackendError::TransactionInactive)?;
            conn.as_mut().commit()?;
            // Returning the guard to the pool ends the checkout.
            *guard = None;
        }
        self.shared.state.set(TransactionState::Committed);
        self.unbind();
        Ok(())
    }

    /// Roll back the transaction; a no-op when no longer active.
    pub fn rollback(&self) -> BackendResult<()> {
        if !self.is_active() {
            return Ok(());
        }

        {
            let mut guard = self.shared.conn.borrow_mut();
            let conn = guard
                .as_mut()
                .ok_or(BackendError::TransactionInactive)?;
            conn.as_mut().rollback()?;
            *guard = None;
        }
        self.shared.state.set(TransactionState::RolledBack);
        self.unbind();
        Ok(())
    }

    fn unbind(&self) {
        ACTIVE_TX.with(|slot| {
            let mut borrow = slot.borrow_mut();
            if borrow
                .as_ref()
                .is_some_and(|tx| Rc::ptr_eq(tx, &self.shared))
            {
                *borrow = None;
            }
        });
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        // A transaction abandoned while active rolls back rather than
        // leaking the bound connection in autocommit-off state. The
        // thread-local slot holds one clone while bound.
        if !self.is_active() {
            return;
        }
        let bound = ACTIVE_TX.with(|slot| {
            slot.borrow()
                .as_ref()
                .is_some_and(|tx| Rc::ptr_eq(tx, &self.shared))
        });
        let external_handles = Rc::strong_count(&self.shared) - usize::from(bound);
        if external_handles == 1 {
            if let Err(e) = self.rollback() {
                log::warn!("rollback of abandoned transaction failed: {}", e);
            }
        }
    }
}

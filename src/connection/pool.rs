//! Bounded connection pool with scoped checkout.
//!
//! `acquire` blocks the calling thread until a slot is free, so callers must
//! not hold other locks across it. The returned [`PooledConnection`] hands
//! the connection back on drop, on every exit path.

use std::sync::{Arc, Condvar, Mutex};

use super::driver::{BackendError, BackendResult, Driver, DriverConnection};

struct PoolState {
    idle: Vec<Box<dyn DriverConnection>>,
    open: usize,
    closed: bool,
}

struct PoolInner {
    driver: Arc<dyn Driver>,
    capacity: usize,
    state: Mutex<PoolState>,
    available: Condvar,
}

/// Bounded pool of driver connections.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create a pool over the given driver with at most `capacity` open
    /// connections.
    pub fn new(driver: Arc<dyn Driver>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                driver,
                capacity: capacity.max(1),
                state: Mutex::new(PoolState {
                    idle: Vec::new(),
                    open: 0,
                    closed: false,
                }),
                available: Condvar::new(),
            }),
        }
    }

    /// Check out a connection, blocking until one is available.
    pub fn acquire(&self) -> BackendResult<PooledConnection> {
        let mut state = self.inner.state.lock().expect("pool lock poisoned");
        loop {
            if state.closed {
                return Err(BackendError::PoolClosed);
            }
            if let Some(conn) = state.idle.pop() {
                return Ok(PooledConnection {
                    conn: Some(conn),
                    inner: Arc::clone(&self.inner),
                });
            }
            if state.open < self.inner.capacity {
                state.open += 1;
                drop(state);
                return match self.inner.driver.connect() {
                    Ok(conn) => Ok(PooledConnection {
                        conn: Some(conn),
                        inner: Arc::clone(&self.inner),
                    }),
                    Err(e) => {
                        let mut state = self.inner.state.lock().expect("pool lock poisoned");
                        state.open -= 1;
                        self.inner.available.notify_one();
                        Err(e)
                    }
                };
            }
            state = self
                .inner
                .available
                .wait(state)
                .expect("pool lock poisoned");
        }
    }

    /// Close the pool: drop idle connections, wake waiters, release the
    /// driver.
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock().expect("pool lock poisoned");
            state.closed = true;
            let drained = state.idle.drain(..).count();
            state.open -= drained;
        }
        self.inner.available.notify_all();
        self.inner.driver.shutdown();
    }

    /// Number of currently open connections (checked out + idle).
    pub fn open_connections(&self) -> usize {
        self.inner.state.lock().expect("pool lock poisoned").open
    }
}

/// Scoped connection checkout; returns to the pool on drop.
pub struct PooledConnection {
    conn: Option<Box<dyn DriverConnection>>,
    inner: Arc<PoolInner>,
}

impl PooledConnection {
    /// Access the underlying connection.
    pub fn as_mut(&mut self) -> &mut dyn DriverConnection {
        self.conn
            .as_mut()
            .expect("connection already returned")
            .as_mut()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let mut state = self.inner.state.lock().expect("pool lock poisoned");
            if state.closed {
                state.open -= 1;
            } else {
                state.idle.push(conn);
            }
            drop(state);
            self.inner.available.notify_one();
        }
    }
}

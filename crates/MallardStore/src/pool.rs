//! Fixed-size connection pool over the embedded database.
//!
//! All connections are clones of one base connection, so they share a
//! single database instance. Acquisition fails immediately when the pool
//! is empty; it never blocks. The [`PooledConnection`] guard returns its
//! connection on every exit path, including unwinds.

use duckdb::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;

#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<Mutex<Vec<Connection>>>,
    capacity: usize,
}

impl ConnectionPool {
    /// Open a database file and populate the pool with `capacity`
    /// connections to it.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, StoreError> {
        Self::build(Connection::open(path)?, capacity)
    }

    /// An in-memory database, shared by every pooled connection.
    pub fn open_in_memory(capacity: usize) -> Result<Self, StoreError> {
        Self::build(Connection::open_in_memory()?, capacity)
    }

    fn build(base: Connection, capacity: usize) -> Result<Self, StoreError> {
        let capacity = capacity.max(1);
        let mut connections = Vec::with_capacity(capacity);
        for _ in 1..capacity {
            connections.push(base.try_clone()?);
        }
        connections.push(base);
        Ok(Self {
            inner: Arc::new(Mutex::new(connections)),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free connections at this instant.
    pub fn available(&self) -> usize {
        self.lock().len()
    }

    /// Pop a connection, failing immediately when none is free.
    pub fn acquire(&self) -> Result<PooledConnection, StoreError> {
        let connection = self
            .lock()
            .pop()
            .ok_or(StoreError::NoConnectionAvailable(self.capacity))?;
        Ok(PooledConnection {
            connection: Some(connection),
            pool: Arc::clone(&self.inner),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Connection>> {
        // A poisoned lock only means another thread panicked mid push/pop;
        // the Vec itself is still consistent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}

/// RAII guard owning one pooled connection.
pub struct PooledConnection {
    connection: Option<Connection>,
    pool: Arc<Mutex<Vec<Connection>>>,
}

impl std::ops::Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.connection.as_ref().expect("connection present until drop")
    }
}

impl std::ops::DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.connection.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            let mut pool = self.pool.lock().unwrap_or_else(|e| e.into_inner());
            pool.push(connection);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let pool = ConnectionPool::open_in_memory(2).unwrap();
        assert_eq!(pool.available(), 2);
        {
            let _a = pool.acquire().unwrap();
            let _b = pool.acquire().unwrap();
            assert_eq!(pool.available(), 0);
        }
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_exhausted_pool_fails_immediately() {
        let pool = ConnectionPool::open_in_memory(1).unwrap();
        let _held = pool.acquire().unwrap();
        match pool.acquire() {
            Err(StoreError::NoConnectionAvailable(capacity)) => assert_eq!(capacity, 1),
            other => panic!("expected pool exhaustion, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_connections_share_one_database() {
        let pool = ConnectionPool::open_in_memory(2).unwrap();
        {
            let a = pool.acquire().unwrap();
            a.execute_batch("CREATE TABLE shared (n INTEGER); INSERT INTO shared VALUES (1);")
                .unwrap();
        }
        let b = pool.acquire().unwrap();
        let n: i64 = b
            .query_row("SELECT count(*) FROM shared", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn test_zero_capacity_clamped_to_one() {
        let pool = ConnectionPool::open_in_memory(0).unwrap();
        assert_eq!(pool.capacity(), 1);
    }
}

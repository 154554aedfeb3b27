use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::error::DatabaseError;

/// Connection source managed by [`DatabaseManager`].
///
/// `connect` builds a pool handle, `checkout` borrows one connection from it
/// and `probe` performs a trivial round trip on that connection.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    type Pool: Clone + Send + Sync + 'static;
    type Connection: Send + 'static;

    async fn connect(&self) -> Result<Self::Pool, DatabaseError>;

    async fn checkout(&self, pool: &Self::Pool) -> Result<Self::Connection, DatabaseError>;

    async fn probe(&self, conn: &mut Self::Connection) -> Result<(), DatabaseError>;
}

/// Observable pool state, reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    Absent,
    Initializing,
    Live,
    Broken,
}

impl PoolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolStatus::Absent => "absent",
            PoolStatus::Initializing => "initializing",
            PoolStatus::Live => "live",
            PoolStatus::Broken => "broken",
        }
    }
}

type InitFuture<P> = Shared<BoxFuture<'static, Result<P, DatabaseError>>>;

enum PoolState<P> {
    Absent,
    Initializing { generation: u64, init: InitFuture<P> },
    Live { generation: u64, pool: P },
    Broken,
}

struct Inner<P> {
    state: PoolState<P>,
    generation: u64,
}

/// Owner of the single process-wide pool handle.
///
/// The handle is created lazily by the first `acquire` (or eagerly at
/// startup), shared by every caller, probed on each checkout and rebuilt
/// after a failed probe. Concurrent callers during creation all await the
/// same in-flight future, so one creation means one connect attempt.
pub struct DatabaseManager<B: Backend> {
    backend: Arc<B>,
    inner: Mutex<Inner<B::Pool>>,
}

impl<B: Backend> DatabaseManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            inner: Mutex::new(Inner {
                state: PoolState::Absent,
                generation: 0,
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Borrow a live, probed connection.
    ///
    /// A failed probe discards the current handle and builds a new one before
    /// returning. A failed checkout (pool exhausted or timed out) leaves the
    /// handle in place. Either failure on the final attempt is reported as
    /// [`DatabaseError::Unavailable`].
    pub async fn acquire(&self) -> Result<B::Connection, DatabaseError> {
        let (generation, pool) = self.live_pool().await?;
        let mut conn = self.backend.checkout(&pool).await.map_err(unavailable)?;

        match self.backend.probe(&mut conn).await {
            Ok(()) => Ok(conn),
            Err(err) => {
                warn!(generation, error = %err, "Connection probe failed, recreating pool");
                drop(conn);
                self.mark_broken(generation).await;

                let (generation, pool) = self.live_pool().await?;
                let mut conn = self.backend.checkout(&pool).await.map_err(unavailable)?;
                if let Err(err) = self.backend.probe(&mut conn).await {
                    self.mark_broken(generation).await;
                    return Err(unavailable(err));
                }
                Ok(conn)
            }
        }
    }

    /// Current state without connecting or probing.
    pub async fn status(&self) -> PoolStatus {
        match self.inner.lock().await.state {
            PoolState::Absent => PoolStatus::Absent,
            PoolState::Initializing { .. } => PoolStatus::Initializing,
            PoolState::Live { .. } => PoolStatus::Live,
            PoolState::Broken => PoolStatus::Broken,
        }
    }

    /// Release the pool handle. Outstanding connections close when their
    /// borrowers drop them.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if let PoolState::Live { generation, .. } = inner.state {
            info!(generation, "Closing database connection pool");
        }
        inner.state = PoolState::Absent;
    }

    async fn live_pool(&self) -> Result<(u64, B::Pool), DatabaseError> {
        let (generation, init) = {
            let mut inner = self.inner.lock().await;
            match &inner.state {
                PoolState::Live { generation, pool } => return Ok((*generation, pool.clone())),
                PoolState::Initializing { generation, init } => (*generation, init.clone()),
                PoolState::Absent | PoolState::Broken => {
                    inner.generation += 1;
                    let generation = inner.generation;
                    let backend = Arc::clone(&self.backend);
                    let init = async move { backend.connect().await }.boxed().shared();

                    info!(generation, "Creating database connection pool");
                    inner.state = PoolState::Initializing {
                        generation,
                        init: init.clone(),
                    };
                    (generation, init)
                }
            }
        };

        let result = init.await;

        let mut inner = self.inner.lock().await;
        let current = matches!(
            &inner.state,
            PoolState::Initializing { generation: g, .. } if *g == generation
        );

        match result {
            Ok(pool) => {
                if current {
                    info!(generation, "Database connection pool is live");
                    inner.state = PoolState::Live {
                        generation,
                        pool: pool.clone(),
                    };
                }
                Ok((generation, pool))
            }
            Err(err) => {
                if current {
                    error!(generation, error = %err, "Failed to create database connection pool");
                    inner.state = PoolState::Broken;
                }
                Err(unavailable(err))
            }
        }
    }

    async fn mark_broken(&self, generation: u64) {
        let mut inner = self.inner.lock().await;
        if matches!(&inner.state, PoolState::Live { generation: g, .. } if *g == generation) {
            debug!(generation, "Discarding broken connection pool");
            inner.state = PoolState::Broken;
        }
    }
}

fn unavailable(err: DatabaseError) -> DatabaseError {
    match err {
        DatabaseError::Unavailable(_) => err,
        other => DatabaseError::Unavailable(other.to_string()),
    }
}

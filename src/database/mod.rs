pub mod error;
pub mod manager;
pub mod statement;
pub mod tds;
pub mod users;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use error::{classify_server_error, DatabaseError};
pub use manager::{Backend, DatabaseManager, PoolStatus};
pub use statement::{Param, SqlValue, Statement, Target};
pub use tds::TdsBackend;

/// One result row, column name to value.
pub type JsonRow = Map<String, Value>;

/// Statement execution as seen by handlers. Production uses
/// `DatabaseManager<TdsBackend>`; tests substitute in-memory fakes.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run a single query or procedure call and return its first result set.
    async fn execute(&self, statement: &Statement) -> Result<Vec<JsonRow>, DatabaseError>;

    /// Pool state without side effects.
    async fn status(&self) -> PoolStatus;
}

use thiserror::Error;

/// Errors from the connection manager and statement execution.
///
/// Server errors are classified by SQL Server error number first and by
/// message text second, see [`classify_server_error`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Query timed out: {0}")]
    Timeout(String),

    #[error("Stored procedure not found: {0}")]
    ProcedureNotFound(String),

    #[error("Database object not found: {0}")]
    ObjectNotFound(String),

    #[error("Parameter mismatch: {0}")]
    ParameterMismatch(String),

    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    #[error("Query error: {0}")]
    Query(String),
}

impl DatabaseError {
    /// Short label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DatabaseError::Unavailable(_) => "unavailable",
            DatabaseError::Timeout(_) => "timeout",
            DatabaseError::ProcedureNotFound(_) => "procedure_not_found",
            DatabaseError::ObjectNotFound(_) => "object_not_found",
            DatabaseError::ParameterMismatch(_) => "parameter_mismatch",
            DatabaseError::UniqueViolation(_) => "unique_violation",
            DatabaseError::InvalidStatement(_) => "invalid_statement",
            DatabaseError::Query(_) => "query",
        }
    }
}

/// Map a SQL Server error number and message onto [`DatabaseError`].
pub fn classify_server_error(code: Option<u32>, message: &str) -> DatabaseError {
    let msg = message.to_string();

    match code {
        Some(2812) => return DatabaseError::ProcedureNotFound(msg),
        Some(208) => return DatabaseError::ObjectNotFound(msg),
        // 201: missing parameter, 8144: too many arguments,
        // 8145: not a parameter, 8146: procedure takes no parameters,
        // 8178: parameterized query expects parameter.
        Some(201) | Some(8144) | Some(8145) | Some(8146) | Some(8178) => {
            return DatabaseError::ParameterMismatch(msg)
        }
        Some(2627) | Some(2601) => return DatabaseError::UniqueViolation(msg),
        _ => {}
    }

    let lower = message.to_lowercase();
    if lower.contains("could not find") {
        DatabaseError::ProcedureNotFound(msg)
    } else if lower.contains("invalid object name") {
        DatabaseError::ObjectNotFound(msg)
    } else if lower.contains("expects parameter")
        || lower.contains("too many arguments")
        || lower.contains("is not a parameter")
    {
        DatabaseError::ParameterMismatch(msg)
    } else if lower.contains("violation of unique")
        || lower.contains("violation of primary key")
        || lower.contains("duplicate key")
    {
        DatabaseError::UniqueViolation(msg)
    } else if lower.contains("timeout") || lower.contains("timed out") {
        DatabaseError::Timeout(msg)
    } else {
        DatabaseError::Query(msg)
    }
}

impl From<tiberius::error::Error> for DatabaseError {
    fn from(err: tiberius::error::Error) -> Self {
        match &err {
            tiberius::error::Error::Server(token) => {
                classify_server_error(Some(token.code()), token.message())
            }
            tiberius::error::Error::Io { .. } => DatabaseError::Unavailable(err.to_string()),
            other => classify_server_error(None, &other.to_string()),
        }
    }
}

impl From<bb8_tiberius::Error> for DatabaseError {
    fn from(err: bb8_tiberius::Error) -> Self {
        match err {
            bb8_tiberius::Error::Tiberius(e) => DatabaseError::from(e),
            other => DatabaseError::Unavailable(other.to_string()),
        }
    }
}

impl From<bb8::RunError<bb8_tiberius::Error>> for DatabaseError {
    fn from(err: bb8::RunError<bb8_tiberius::Error>) -> Self {
        match err {
            bb8::RunError::User(e) => DatabaseError::from(e),
            bb8::RunError::TimedOut => {
                DatabaseError::Unavailable("timed out waiting for a pooled connection".to_string())
            }
        }
    }
}

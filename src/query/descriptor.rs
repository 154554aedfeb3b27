use crate::database::{Param, Statement};
use crate::middleware::AuthPolicy;

use super::validate::{Check, FieldRule};

/// Where the endpoint reads its input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Query string.
    Get,
    /// JSON object body.
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTarget {
    /// Literal SQL using `@P1..@Pn` in field-rule order.
    Sql(&'static str),
    /// Stored procedure; each field binds to its rule's `param` name.
    Procedure(&'static str),
}

/// How the rows are turned into the response `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// Rows as returned.
    Rows,
    /// One column of every row as a flat array.
    Scalars(&'static str),
    /// Rows with the named columns removed (case-insensitive).
    Redact(&'static [&'static str]),
    /// The first row; no rows is a 404.
    SingleRow,
}

/// Declarative description of one query-backed endpoint.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    pub name: &'static str,
    pub path: &'static str,
    pub method: Method,
    pub auth: AuthPolicy,
    pub fields: Vec<FieldRule>,
    pub checks: Vec<Check>,
    pub target: QueryTarget,
    pub shape: Shape,
}

impl EndpointDescriptor {
    pub fn statement(&self, params: Vec<Param>) -> Statement {
        let statement = match self.target {
            QueryTarget::Sql(sql) => Statement::sql(sql),
            QueryTarget::Procedure(name) => Statement::procedure(name),
        };
        statement.with_params(params)
    }
}

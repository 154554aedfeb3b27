use std::borrow::Cow;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::error::DatabaseError;

/// Typed parameter value bound to a statement. Values are always sent as
/// RPC parameters, never spliced into the SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Decimal(Decimal),
    Date(NaiveDate),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Literal SQL referencing parameters positionally as `@P1..@Pn`.
    Sql(Cow<'static, str>),
    /// Stored procedure, optionally schema-qualified (`dbo.usp_Name`).
    Procedure(Cow<'static, str>),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Sql(_) => write!(f, "sql"),
            Target::Procedure(name) => write!(f, "procedure {}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Cow<'static, str>,
    pub value: SqlValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub target: Target,
    pub params: Vec<Param>,
}

impl Statement {
    pub fn sql(text: impl Into<Cow<'static, str>>) -> Self {
        Self {
            target: Target::Sql(text.into()),
            params: Vec::new(),
        }
    }

    pub fn procedure(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            target: Target::Procedure(name.into()),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, name: impl Into<Cow<'static, str>>, value: SqlValue) -> Self {
        self.params.push(Param {
            name: name.into(),
            value,
        });
        self
    }

    pub fn with_params(mut self, params: Vec<Param>) -> Self {
        self.params.extend(params);
        self
    }

    /// SQL text sent to the server.
    ///
    /// Procedure calls render as `EXEC [schema].[name] @Param = @P1, ...` with
    /// every identifier validated first.
    pub fn render(&self) -> Result<String, DatabaseError> {
        match &self.target {
            Target::Sql(text) => Ok(text.to_string()),
            Target::Procedure(name) => {
                let parts: Vec<&str> = name.split('.').collect();
                if parts.len() > 2 || !parts.iter().all(|p| is_valid_identifier(p)) {
                    return Err(DatabaseError::InvalidStatement(format!(
                        "invalid procedure name '{}'",
                        name
                    )));
                }
                let quoted: Vec<String> = parts.iter().map(|p| format!("[{}]", p)).collect();

                let mut assignments = Vec::with_capacity(self.params.len());
                for (i, param) in self.params.iter().enumerate() {
                    let bare = param.name.trim_start_matches('@');
                    if !is_valid_identifier(bare) {
                        return Err(DatabaseError::InvalidStatement(format!(
                            "invalid parameter name '{}'",
                            param.name
                        )));
                    }
                    assignments.push(format!("@{} = @P{}", bare, i + 1));
                }

                let mut sql = format!("EXEC {}", quoted.join("."));
                if !assignments.is_empty() {
                    sql.push(' ');
                    sql.push_str(&assignments.join(", "));
                }
                Ok(sql)
            }
        }
    }
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 128 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

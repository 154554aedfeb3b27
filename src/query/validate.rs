use std::cmp::Ordering;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::database::{Param, SqlValue};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    Text {
        max_len: usize,
        allowed: Option<&'static [&'static str]>,
    },
    Int {
        min: i32,
        max: i32,
    },
    Decimal {
        min: Option<Decimal>,
    },
    /// `YYYY-MM-DD`; a trailing time part is ignored.
    Date,
    Bool,
}

/// One input field, the procedure/query parameter it binds to, and its rules.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: &'static str,
    pub param: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldRule {
    pub fn text(field: &'static str, param: &'static str, max_len: usize) -> Self {
        Self {
            field,
            param,
            kind: FieldKind::Text {
                max_len,
                allowed: None,
            },
            required: true,
        }
    }

    pub fn one_of(
        field: &'static str,
        param: &'static str,
        allowed: &'static [&'static str],
    ) -> Self {
        let max_len = allowed.iter().map(|a| a.len()).max().unwrap_or(0);
        Self {
            field,
            param,
            kind: FieldKind::Text {
                max_len,
                allowed: Some(allowed),
            },
            required: true,
        }
    }

    pub fn int(field: &'static str, param: &'static str, min: i32, max: i32) -> Self {
        Self {
            field,
            param,
            kind: FieldKind::Int { min, max },
            required: true,
        }
    }

    pub fn decimal(field: &'static str, param: &'static str, min: Option<Decimal>) -> Self {
        Self {
            field,
            param,
            kind: FieldKind::Decimal { min },
            required: true,
        }
    }

    pub fn date(field: &'static str, param: &'static str) -> Self {
        Self {
            field,
            param,
            kind: FieldKind::Date,
            required: true,
        }
    }

    pub fn flag(field: &'static str, param: &'static str) -> Self {
        Self {
            field,
            param,
            kind: FieldKind::Bool,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Rules spanning more than one field.
#[derive(Debug, Clone)]
pub enum Check {
    /// `lower <= upper` whenever both are present.
    Ordered {
        lower: &'static str,
        upper: &'static str,
    },
}

/// Validate and coerce `input` against `rules`, returning parameters in rule
/// order. Nothing here touches the database.
pub fn validate(
    input: &Map<String, Value>,
    rules: &[FieldRule],
    checks: &[Check],
) -> Result<Vec<Param>, ValidationError> {
    let mut params = Vec::with_capacity(rules.len());
    let mut by_field: Vec<(&'static str, SqlValue)> = Vec::with_capacity(rules.len());

    for rule in rules {
        let value = match input.get(rule.field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(v) => Some(v),
        };

        let sql_value = match value {
            None if rule.required => {
                return Err(ValidationError::new(
                    rule.field,
                    format!("{} is required", rule.field),
                ))
            }
            None => SqlValue::Null,
            Some(v) => coerce(rule, v)?,
        };

        by_field.push((rule.field, sql_value.clone()));
        params.push(Param {
            name: rule.param.into(),
            value: sql_value,
        });
    }

    for check in checks {
        match check {
            Check::Ordered { lower, upper } => {
                let find = |name: &str| {
                    by_field
                        .iter()
                        .find(|(field, _)| *field == name)
                        .map(|(_, v)| v)
                };
                if let (Some(lo), Some(hi)) = (find(*lower), find(*upper)) {
                    if compare(lo, hi) == Some(Ordering::Greater) {
                        return Err(ValidationError::new(
                            lower,
                            format!("{} must be less than or equal to {}", lower, upper),
                        ));
                    }
                }
            }
        }
    }

    Ok(params)
}

fn coerce(rule: &FieldRule, value: &Value) -> Result<SqlValue, ValidationError> {
    let field = rule.field;
    match &rule.kind {
        FieldKind::Text { max_len, allowed } => {
            let text = match value {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => return Err(ValidationError::new(field, format!("{} must be a string", field))),
            };
            if text.chars().count() > *max_len {
                return Err(ValidationError::new(
                    field,
                    format!("{} must be at most {} characters", field, max_len),
                ));
            }
            if let Some(allowed) = allowed {
                if !allowed.contains(&text.as_str()) {
                    return Err(ValidationError::new(
                        field,
                        format!("{} must be one of: {}", field, allowed.join(", ")),
                    ));
                }
            }
            Ok(SqlValue::Text(text))
        }
        FieldKind::Int { min, max } => {
            let parsed = match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            }
            .ok_or_else(|| ValidationError::new(field, format!("{} must be an integer", field)))?;

            if parsed < i64::from(*min) || parsed > i64::from(*max) {
                return Err(ValidationError::new(
                    field,
                    format!("{} must be between {} and {}", field, min, max),
                ));
            }
            // In range of two i32 bounds, so the cast is lossless.
            Ok(SqlValue::Int(parsed as i32))
        }
        FieldKind::Decimal { min } => {
            let raw = match value {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.trim().to_string(),
                _ => String::new(),
            };
            let parsed = Decimal::from_str(&raw)
                .or_else(|_| Decimal::from_scientific(&raw))
                .map_err(|_| ValidationError::new(field, format!("{} must be a number", field)))?;

            if let Some(min) = min {
                if parsed < *min {
                    return Err(ValidationError::new(
                        field,
                        format!("{} must be at least {}", field, min),
                    ));
                }
            }
            Ok(SqlValue::Decimal(parsed))
        }
        FieldKind::Date => {
            let raw = value.as_str().map(str::trim).unwrap_or_default();
            let day = raw.get(..10).filter(|_| raw.len() == 10 || raw[10..].starts_with('T'));
            day.and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                .map(SqlValue::Date)
                .ok_or_else(|| {
                    ValidationError::new(field, format!("{} must be a date (YYYY-MM-DD)", field))
                })
        }
        FieldKind::Bool => match value {
            Value::Bool(b) => Ok(SqlValue::Bool(*b)),
            Value::Number(n) if n.as_i64() == Some(0) => Ok(SqlValue::Bool(false)),
            Value::Number(n) if n.as_i64() == Some(1) => Ok(SqlValue::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(SqlValue::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(SqlValue::Bool(false)),
            _ => Err(ValidationError::new(field, format!("{} must be a boolean", field))),
        },
    }
}

fn compare(a: &SqlValue, b: &SqlValue) -> Option<Ordering> {
    match (a, b) {
        (SqlValue::Decimal(x), SqlValue::Decimal(y)) => Some(x.cmp(y)),
        (SqlValue::Int(x), SqlValue::Int(y)) => Some(x.cmp(y)),
        (SqlValue::BigInt(x), SqlValue::BigInt(y)) => Some(x.cmp(y)),
        (SqlValue::Date(x), SqlValue::Date(y)) => Some(x.cmp(y)),
        (SqlValue::Text(x), SqlValue::Text(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules() -> Vec<FieldRule> {
        vec![
            FieldRule::text("branch", "@BranchCode", 5),
            FieldRule::decimal("minAmount", "@MinAmount", Some(Decimal::ZERO)),
            FieldRule::decimal("maxAmount", "@MaxAmount", Some(Decimal::ZERO)),
            FieldRule::date("fromDate", "@FromDate").optional(),
            FieldRule::one_of("status", "@Status", &["active", "closed"]).optional(),
        ]
    }

    fn checks() -> Vec<Check> {
        vec![Check::Ordered {
            lower: "minAmount",
            upper: "maxAmount",
        }]
    }

    fn run(input: Value) -> Result<Vec<Param>, ValidationError> {
        validate(input.as_object().unwrap(), &rules(), &checks())
    }

    #[test]
    fn coerces_and_orders_parameters() {
        let params = run(json!({
            "branch": "001",
            "minAmount": "100000",
            "maxAmount": 500000,
            "fromDate": "2024-04-01T00:00:00.000Z"
        }))
        .unwrap();

        assert_eq!(params.len(), 5);
        assert_eq!(params[0].value, SqlValue::Text("001".into()));
        assert_eq!(params[1].value, SqlValue::Decimal(Decimal::new(100000, 0)));
        assert_eq!(
            params[3].value,
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap())
        );
        assert_eq!(params[4].value, SqlValue::Null);
    }

    #[test]
    fn inverted_amounts_are_rejected() {
        let err = run(json!({ "branch": "001", "minAmount": 500000, "maxAmount": 100000 })).unwrap_err();
        assert_eq!(err.field, "minAmount");
        assert_eq!(err.message, "minAmount must be less than or equal to maxAmount");
    }

    #[test]
    fn required_and_length_rules() {
        let err = run(json!({ "minAmount": 1, "maxAmount": 2 })).unwrap_err();
        assert_eq!(err.message, "branch is required");

        let err = run(json!({ "branch": "   ", "minAmount": 1, "maxAmount": 2 })).unwrap_err();
        assert_eq!(err.message, "branch is required");

        let err = run(json!({ "branch": "000001", "minAmount": 1, "maxAmount": 2 })).unwrap_err();
        assert_eq!(err.message, "branch must be at most 5 characters");
    }

    #[test]
    fn type_and_range_rules() {
        let err = run(json!({ "branch": "1", "minAmount": "lots", "maxAmount": 2 })).unwrap_err();
        assert_eq!(err.message, "minAmount must be a number");

        let err = run(json!({ "branch": "1", "minAmount": -5, "maxAmount": 2 })).unwrap_err();
        assert_eq!(err.message, "minAmount must be at least 0");

        let err = run(json!({ "branch": "1", "minAmount": 1, "maxAmount": 2, "fromDate": "01/04/2024" }))
            .unwrap_err();
        assert_eq!(err.field, "fromDate");

        let err = run(json!({ "branch": "1", "minAmount": 1, "maxAmount": 2, "status": "frozen" }))
            .unwrap_err();
        assert_eq!(err.message, "status must be one of: active, closed");
    }

    #[test]
    fn integer_and_boolean_fields() {
        let rules = vec![
            FieldRule::int("limit", "@Limit", 1, 500),
            FieldRule::flag("includeClosed", "@IncludeClosed"),
        ];
        let ok = validate(
            json!({ "limit": "25", "includeClosed": "true" }).as_object().unwrap(),
            &rules,
            &[],
        )
        .unwrap();
        assert_eq!(ok[0].value, SqlValue::Int(25));
        assert_eq!(ok[1].value, SqlValue::Bool(true));

        let err = validate(
            json!({ "limit": 501, "includeClosed": false }).as_object().unwrap(),
            &rules,
            &[],
        )
        .unwrap_err();
        assert_eq!(err.message, "limit must be between 1 and 500");
    }
}

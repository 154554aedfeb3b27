//! SQL Server backend: tiberius connections pooled by bb8.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use bb8_tiberius::ConnectionManager;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use tiberius::numeric::Numeric;
use tiberius::{AuthMethod, ColumnData, Config, EncryptionLevel, FromSql, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::Compat;
use tracing::{debug, warn};

use super::error::DatabaseError;
use super::manager::{Backend, DatabaseManager, PoolStatus};
use super::statement::{SqlValue, Statement};
use super::{Database, JsonRow};
use crate::config::DatabaseConfig;

pub type TdsClient = tiberius::Client<Compat<TcpStream>>;
pub type TdsPool = Pool<ConnectionManager>;
pub type TdsConnection = PooledConnection<'static, ConnectionManager>;

pub struct TdsBackend {
    config: Config,
    pool_min: u32,
    pool_max: u32,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl TdsBackend {
    pub fn new(settings: &DatabaseConfig) -> Self {
        let mut config = Config::new();
        config.host(&settings.host);
        config.port(settings.port);
        config.database(&settings.database);
        config.authentication(AuthMethod::sql_server(&settings.user, &settings.password));
        config.encryption(EncryptionLevel::Required);
        if settings.trust_cert {
            config.trust_cert();
        }

        Self {
            config,
            pool_min: settings.pool_min,
            pool_max: settings.pool_max,
            connect_timeout: settings.connect_timeout,
            request_timeout: settings.request_timeout,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

#[async_trait]
impl Backend for TdsBackend {
    type Pool = TdsPool;
    type Connection = TdsConnection;

    async fn connect(&self) -> Result<TdsPool, DatabaseError> {
        let manager = ConnectionManager::new(self.config.clone());

        let pool = Pool::builder()
            .min_idle(Some(self.pool_min))
            .max_size(self.pool_max)
            .connection_timeout(self.connect_timeout)
            // DatabaseManager probes every checkout itself.
            .test_on_check_out(false)
            .build(manager)
            .await
            .map_err(|e| DatabaseError::Unavailable(format!("failed to create pool: {}", e)))?;

        // bb8 defers connecting when min_idle is zero; force one round trip so
        // an unreachable server fails here rather than on the first request.
        {
            let mut conn = pool.get().await?;
            conn.simple_query("SELECT 1").await?.into_row().await?;
        }

        Ok(pool)
    }

    async fn checkout(&self, pool: &TdsPool) -> Result<TdsConnection, DatabaseError> {
        Ok(pool.get_owned().await?)
    }

    async fn probe(&self, conn: &mut TdsConnection) -> Result<(), DatabaseError> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }
}

#[async_trait]
impl Database for DatabaseManager<TdsBackend> {
    async fn execute(&self, statement: &Statement) -> Result<Vec<JsonRow>, DatabaseError> {
        let sql = statement.render()?;
        let mut conn = self.acquire().await?;
        let deadline = self.backend().request_timeout();
        let started = Instant::now();

        // Dropping the future on timeout does not cancel the statement on the
        // server.
        let rows = tokio::time::timeout(deadline, run(&mut conn, &sql, statement))
            .await
            .map_err(|_| {
                DatabaseError::Timeout(format!(
                    "{} exceeded {} ms",
                    statement.target,
                    deadline.as_millis()
                ))
            })??;

        debug!(
            target_kind = %statement.target,
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Statement executed"
        );
        Ok(rows)
    }

    async fn status(&self) -> PoolStatus {
        DatabaseManager::status(self).await
    }
}

async fn run(
    client: &mut TdsClient,
    sql: &str,
    statement: &Statement,
) -> Result<Vec<JsonRow>, DatabaseError> {
    let mut query = Query::new(sql);
    for param in &statement.params {
        match &param.value {
            SqlValue::Null => query.bind(Option::<&str>::None),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::BigInt(v) => query.bind(*v),
            SqlValue::Decimal(v) => query.bind(numeric(v)),
            SqlValue::Date(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
        }
    }

    let rows = query.query(client).await?.into_first_result().await?;
    rows.into_iter().map(row_to_json).collect()
}

fn row_to_json(row: Row) -> Result<JsonRow, DatabaseError> {
    let names: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();

    let mut object = JsonRow::new();
    for (name, data) in names.into_iter().zip(row) {
        let value = column_to_json(&data)?;
        object.insert(name, value);
    }
    Ok(object)
}

fn column_to_json(data: &ColumnData<'static>) -> Result<Value, DatabaseError> {
    let value = match data {
        ColumnData::U8(v) => v.map(Value::from),
        ColumnData::I16(v) => v.map(Value::from),
        ColumnData::I32(v) => v.map(Value::from),
        ColumnData::I64(v) => v.map(Value::from),
        ColumnData::F32(v) => v.map(|f| Value::from(f as f64)),
        ColumnData::F64(v) => v.map(Value::from),
        ColumnData::Bit(v) => v.map(Value::Bool),
        ColumnData::String(v) => v.as_ref().map(|s| Value::String(s.to_string())),
        ColumnData::Guid(v) => v.map(|g| Value::String(g.to_string())),
        ColumnData::Binary(v) => v.as_ref().map(|b| Value::String(hex::encode(b))),
        ColumnData::Numeric(_) => Decimal::from_sql(data)?.map(decimal_to_json),
        ColumnData::Date(_) => NaiveDate::from_sql(data)?.map(|d| Value::String(d.to_string())),
        ColumnData::Time(_) => NaiveTime::from_sql(data)?.map(|t| Value::String(t.to_string())),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)?
                .map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()))
        }
        ColumnData::DateTimeOffset(_) => {
            DateTime::<FixedOffset>::from_sql(data)?.map(|d| Value::String(d.to_rfc3339()))
        }
        _ => {
            warn!("Unsupported column type in result set, returning null");
            None
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

fn numeric(d: &Decimal) -> Numeric {
    // rust_decimal caps the scale at 28, well inside SQL Server's 38.
    Numeric::new_with_scale(d.mantissa(), d.scale() as u8)
}

fn decimal_to_json(d: Decimal) -> Value {
    d.to_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(d.to_string()))
}

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::descriptor::EndpointDescriptor;
use super::shape::shape_rows;
use super::validate::validate;
use crate::database::Database;
use crate::error::ApiError;

/// Validate, bind, execute and shape one endpoint call.
///
/// Validation failures return before the database is touched.
pub async fn run_endpoint(
    db: &dyn Database,
    descriptor: &EndpointDescriptor,
    input: &Map<String, Value>,
    expose_details: bool,
) -> Result<Value, ApiError> {
    let params = validate(input, &descriptor.fields, &descriptor.checks)?;
    let statement = descriptor.statement(params);

    debug!(endpoint = descriptor.name, target = %statement.target, "Executing endpoint");
    let rows = db
        .execute(&statement)
        .await
        .map_err(|e| ApiError::from_database(e, expose_details))?;

    let count = rows.len();
    let data = shape_rows(rows, &descriptor.shape)
        .ok_or_else(|| ApiError::not_found("Record not found"))?;

    info!(endpoint = descriptor.name, rows = count, "Endpoint completed");
    Ok(data)
}

use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ApiError;
use crate::middleware::{
    bypass_auth, optional_auth, require_auth, ApiResponse, ApiResult, AuthPolicy,
    AuthUser,
};
use crate::query::{run_endpoint, EndpointDescriptor, Method};
use crate::AppState;

/// Router serving one descriptor, wrapped in the descriptor's auth policy.
pub fn endpoint_routes(descriptor: &'static EndpointDescriptor, state: &AppState) -> Router<AppState> {
    let method_router = match descriptor.method {
        Method::Get => get(
            move |State(state): State<AppState>,
                  caller: Option<Extension<AuthUser>>,
                  Query(query): Query<HashMap<String, String>>| async move {
                let input: Map<String, Value> = query
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect();
                execute(&state, descriptor, caller, input).await
            },
        ),
        Method::Post => post(
            move |State(state): State<AppState>,
                  caller: Option<Extension<AuthUser>>,
                  payload: Result<Json<Value>, JsonRejection>| async move {
                match body_input(payload) {
                    Ok(input) => execute(&state, descriptor, caller, input).await,
                    Err(e) => Err(e),
                }
            },
        ),
    };

    let router = Router::new().route(descriptor.path, method_router);
    match descriptor.auth {
        AuthPolicy::Required => router.route_layer(from_fn_with_state(state.clone(), require_auth)),
        AuthPolicy::Optional => router.route_layer(from_fn_with_state(state.clone(), optional_auth)),
        AuthPolicy::Bypass => router.route_layer(from_fn(bypass_auth)),
    }
}

fn body_input(payload: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, ApiError> {
    match payload {
        Ok(Json(Value::Object(map))) => Ok(map),
        Ok(Json(_)) => Err(ApiError::bad_request("Request body must be a JSON object")),
        Err(rejection) => Err(ApiError::invalid_json(rejection.body_text())),
    }
}

async fn execute(
    state: &AppState,
    descriptor: &EndpointDescriptor,
    caller: Option<Extension<AuthUser>>,
    input: Map<String, Value>,
) -> ApiResult<Value> {
    match caller {
        Some(Extension(user)) => debug!(endpoint = descriptor.name, user = %user.id, "Query request"),
        None => debug!(endpoint = descriptor.name, "Anonymous query request"),
    }
    let data = run_endpoint(state.db.as_ref(), descriptor, &input, state.expose_error_details).await?;
    Ok(ApiResponse::success(data))
}

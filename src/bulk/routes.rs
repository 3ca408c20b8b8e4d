//! Bulk HTTP Routes
//!
//! Wire envelope over [`BulkService`]. Every response carries a
//! `statusCode`/`message` pair in the body mirroring the HTTP status, plus
//! endpoint-specific payload fields. Request-shape checks run before the
//! credential check so malformed calls fail fast with 400.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use super::{BulkError, BulkService};

// ==================
// Request Types
// ==================

#[derive(Debug, Deserialize)]
pub struct AuthParams {
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WritableParams {
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub writable: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DataParams {
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    pub password: Option<String>,
    #[serde(rename = "repositoryName")]
    pub repository_name: Option<String>,
    #[serde(rename = "pageNum")]
    pub page_num: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

// ==================
// Response Envelope
// ==================

fn ok_body(message: &str) -> Value {
    json!({ "statusCode": 200, "message": message })
}

fn error_response(err: &BulkError) -> (StatusCode, Json<Value>) {
    let code = err.status_code();
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({ "statusCode": code, "message": err.to_string() })),
    )
}

fn require<'a>(
    param: &'a Option<String>,
    name: &'static str,
) -> Result<&'a str, BulkError> {
    match param.as_deref() {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(BulkError::MissingParam(name)),
    }
}

fn positive_int(param: &Option<String>, name: &'static str) -> Result<u64, BulkError> {
    let text = require(param, name)?;
    match text.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(BulkError::InvalidParam(name)),
    }
}

fn authorize(service: &BulkService, user_name: &Option<String>, password: &Option<String>)
    -> Result<(), BulkError> {
    let user_name = require(user_name, "userName")?;
    let password = require(password, "password")?;
    service.authorize(user_name, password)
}

// ==================
// Handlers
// ==================

/// GET /repo/writable - read the global writable flag
async fn get_writable(
    State(service): State<Arc<BulkService>>,
    Query(params): Query<AuthParams>,
) -> (StatusCode, Json<Value>) {
    if let Err(e) = authorize(&service, &params.user_name, &params.password) {
        return error_response(&e);
    }

    let mut body = ok_body("Got writable");
    body["writable"] = json!(service.writable_flag());
    (StatusCode::OK, Json(body))
}

/// PUT /repo/writable - set the global writable flag on every repository
async fn put_writable(
    State(service): State<Arc<BulkService>>,
    Query(params): Query<WritableParams>,
) -> (StatusCode, Json<Value>) {
    // The flag is validated before credentials.
    let writable = match params.writable.as_deref() {
        Some("true") => true,
        Some("false") => false,
        Some(_) => return error_response(&BulkError::InvalidParam("writable")),
        None => return error_response(&BulkError::MissingParam("writable")),
    };
    if let Err(e) = authorize(&service, &params.user_name, &params.password) {
        return error_response(&e);
    }

    service.set_writable_flag(writable);
    let mut body = ok_body("Set writable");
    body["writable"] = json!(writable);
    (StatusCode::OK, Json(body))
}

/// GET /repo/names - list registered repository names
async fn get_names(
    State(service): State<Arc<BulkService>>,
    Query(params): Query<AuthParams>,
) -> (StatusCode, Json<Value>) {
    if let Err(e) = authorize(&service, &params.user_name, &params.password) {
        return error_response(&e);
    }

    let mut body = ok_body("Got repository names");
    body["repositoryNames"] = json!(service.repository_names());
    (StatusCode::OK, Json(body))
}

/// GET /repo/data - export one page of a repository
async fn get_data(
    State(service): State<Arc<BulkService>>,
    Query(params): Query<DataParams>,
) -> (StatusCode, Json<Value>) {
    // Shape checks precede the credential check.
    let repository_name = match require(&params.repository_name, "repositoryName") {
        Ok(v) => v.to_string(),
        Err(e) => return error_response(&e),
    };
    let page_num = match positive_int(&params.page_num, "pageNum") {
        Ok(v) => v,
        Err(e) => return error_response(&e),
    };
    let page_size = match positive_int(&params.page_size, "pageSize") {
        Ok(v) => v,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = authorize(&service, &params.user_name, &params.password) {
        return error_response(&e);
    }

    let result = match service.fetch_page(&repository_name, page_num, page_size) {
        Ok(result) => result,
        Err(e) => return error_response(&e),
    };

    let mut body = ok_body("Got data");
    body["pagination"] = json!({ "pageCount": result.page_count });
    body["results"] = Value::Array(result.records.iter().map(|r| r.to_json()).collect());
    (StatusCode::OK, Json(body))
}

/// POST /repo/data - import a JSON array of records, all or nothing
async fn post_data(
    State(service): State<Arc<BulkService>>,
    Query(params): Query<DataParams>,
    payload: String,
) -> (StatusCode, Json<Value>) {
    let repository_name = match require(&params.repository_name, "repositoryName") {
        Ok(v) => v.to_string(),
        Err(e) => return error_response(&e),
    };
    if payload.is_empty() {
        return error_response(&BulkError::MissingParam("data"));
    }
    if let Err(e) = authorize(&service, &params.user_name, &params.password) {
        return error_response(&e);
    }

    // The import binds a thread-scoped transaction, so the whole batch runs
    // on one blocking thread.
    let result = tokio::task::spawn_blocking(move || {
        service.import_batch(&repository_name, &payload)
    })
    .await;

    match result {
        Ok(Ok(count)) => {
            let mut body = ok_body("Imported data");
            body["count"] = json!(count);
            (StatusCode::OK, Json(body))
        }
        Ok(Err(e)) => error_response(&e),
        Err(e) => error_response(&BulkError::Backend(e.to_string())),
    }
}

/// PUT /repo/tables - create the backing table for every registered schema
async fn put_tables(
    State(service): State<Arc<BulkService>>,
    Query(params): Query<AuthParams>,
) -> (StatusCode, Json<Value>) {
    if let Err(e) = authorize(&service, &params.user_name, &params.password) {
        return error_response(&e);
    }
    if let Err(e) = service.create_all_tables() {
        return error_response(&e);
    }
    (StatusCode::OK, Json(ok_body("Created tables")))
}

// ==================
// Router
// ==================

/// Build the bulk interface router.
pub fn bulk_routes(service: Arc<BulkService>) -> Router {
    Router::new()
        .route("/repo/writable", get(get_writable).put(put_writable))
        .route("/repo/names", get(get_names))
        .route("/repo/data", get(get_data).post(post_data))
        .route("/repo/tables", axum::routing::put(put_tables))
        .with_state(service)
}

/// Serve the bulk interface on the configured remote address.
pub async fn serve(service: Arc<BulkService>) -> std::io::Result<()> {
    let addr = service
        .engine()
        .config()
        .remote
        .as_ref()
        .map(|remote| remote.socket_addr())
        .unwrap_or_else(|| "0.0.0.0:7099".to_string());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let router = bulk_routes(service).layer(cors);

    log::info!("bulk interface listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await
}

//! HTTP API: request/response bodies, handlers and the router.

use crate::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use onecode_license::{LicenseResult, Registry, Verification, DEFAULT_PAGE_LIMIT};
use onecode_storage::LicenseRecord;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Service name reported by `GET /`.
pub const SERVICE_NAME: &str = "onecode license server";

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub count: Option<u32>,
    pub admin_key: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub code: Option<String>,
    pub machine_id: Option<String>,
}

/// Body shared by unbind, check and delete.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CodeRequest {
    pub code: Option<String>,
    pub admin_key: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    pub admin_key: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GenerateResponse {
    pub seed: String,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BatchResponse {
    pub success: bool,
    pub count: usize,
    pub codes: Vec<String>,
    pub failed: u32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VerifyResponse {
    pub valid: bool,
    pub bound: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&Verification> for VerifyResponse {
    fn from(outcome: &Verification) -> Self {
        Self {
            valid: outcome.is_valid(),
            bound: outcome.is_bound(),
            reason: outcome.reason().map(str::to_string),
            message: outcome.message().map(str::to_string),
        }
    }
}

/// Plain `{success, message}` body used by unbind and delete.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ListResponse {
    pub success: bool,
    pub data: Vec<LicenseRecord>,
    pub pagination: Pagination,
}

/// Single record as reported by `/admin/check`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LicenseView {
    pub code: String,
    pub machine_id: Option<String>,
    pub is_activated: bool,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
}

impl From<&LicenseRecord> for LicenseView {
    fn from(record: &LicenseRecord) -> Self {
        Self {
            code: record.code().to_string(),
            machine_id: record.machine_id().map(ToString::to_string),
            is_activated: record.is_activated(),
            created_at: record.created_at(),
            activated_at: record.activated_at(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CheckResponse {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<LicenseView>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatsView {
    pub total: u64,
    pub activated: u64,
    pub unused: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: StatsView,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Unwraps a JSON body, reporting rejections as validation failures.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::Validation(format!("malformed request body: {}", rejection.body_text())))
}

/// Decodes an admin request body.
///
/// The `adminKey` field is read from the raw JSON and checked before the
/// typed request is decoded, so a wrong credential is reported as such
/// even when other fields are malformed.
fn admin_body<T: DeserializeOwned>(
    registry: &Registry,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<T, ApiError> {
    let value = body(payload)?;
    registry.authorize(value.get("adminKey").and_then(Value::as_str))?;
    serde_json::from_value(value)
        .map_err(|e| ApiError::Validation(format!("invalid request body: {e}")))
}

/// Runs a registry call on the blocking pool.
async fn blocking<T, F>(registry: &Arc<Registry>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Registry) -> LicenseResult<T> + Send + 'static,
{
    let registry = Arc::clone(registry);
    tokio::task::spawn_blocking(move || f(&registry))
        .await
        .map_err(|e| ApiError::Internal(format!("registry task failed: {e}")))?
        .map_err(ApiError::from)
}

async fn status_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

async fn generate_handler(
    State(registry): State<Arc<Registry>>,
    Path(seed): Path<String>,
) -> ApiResult<GenerateResponse> {
    let issued = blocking(&registry, move |r| r.generate(&seed)).await?;
    let message = if issued.warning.is_some() {
        "license code generated but not stored"
    } else if issued.created {
        "license code generated"
    } else {
        "license code already issued"
    };
    Ok(Json(GenerateResponse {
        seed: issued.seed,
        code: issued.code.to_string(),
        message: message.to_string(),
        warning: issued.warning,
    }))
}

async fn batch_handler(
    State(registry): State<Arc<Registry>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<BatchResponse> {
    let req: BatchRequest = admin_body(&registry, payload)?;
    let count = req.count.unwrap_or(0);
    let issued = blocking(&registry, move |r| {
        r.generate_batch(req.admin_key.as_deref(), count)
    })
    .await?;

    let codes: Vec<String> = issued.codes.iter().map(ToString::to_string).collect();
    let warning = (issued.failed > 0)
        .then(|| format!("{} of {count} codes could not be stored", issued.failed));
    Ok(Json(BatchResponse {
        success: issued.failed == 0,
        count: codes.len(),
        message: format!("generated {} license codes", codes.len()),
        codes,
        failed: issued.failed,
        warning,
    }))
}

async fn verify_handler(
    State(registry): State<Arc<Registry>>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<VerifyResponse> {
    let req = body(payload)?;
    let code = req.code.unwrap_or_default();
    let machine_id = req.machine_id.unwrap_or_default();
    let outcome = blocking(&registry, move |r| r.verify(&code, &machine_id)).await?;
    Ok(Json(VerifyResponse::from(&outcome)))
}

async fn unbind_handler(
    State(registry): State<Arc<Registry>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let req: CodeRequest = admin_body(&registry, payload)?;
    let code = req.code.unwrap_or_default();
    let record = blocking(&registry, move |r| r.unbind(req.admin_key.as_deref(), &code)).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: format!("license code {} unbound", record.code()),
    }))
}

async fn list_handler(
    State(registry): State<Arc<Registry>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<ListResponse> {
    let req: ListRequest = admin_body(&registry, payload)?;
    let page = req.page.unwrap_or(1);
    let limit = req.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let listing = blocking(&registry, move |r| {
        r.list(req.admin_key.as_deref(), page, limit)
    })
    .await?;
    Ok(Json(ListResponse {
        success: true,
        data: listing.records,
        pagination: Pagination {
            page: listing.page,
            limit: listing.limit,
            total: listing.total,
            pages: listing.pages,
        },
    }))
}

async fn check_handler(
    State(registry): State<Arc<Registry>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<CheckResponse> {
    let req: CodeRequest = admin_body(&registry, payload)?;
    let code = req.code.unwrap_or_default();
    let record = blocking(&registry, move |r| r.check(req.admin_key.as_deref(), &code)).await?;
    Ok(Json(match record {
        Some(record) => CheckResponse {
            found: true,
            message: None,
            data: Some(LicenseView::from(&record)),
        },
        None => CheckResponse {
            found: false,
            message: Some("code not found".to_string()),
            data: None,
        },
    }))
}

async fn delete_handler(
    State(registry): State<Arc<Registry>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let req: CodeRequest = admin_body(&registry, payload)?;
    let code = req.code.unwrap_or_default();
    let deleted = blocking(&registry, move |r| r.delete(req.admin_key.as_deref(), &code)).await?;
    let message = if deleted { "license code deleted" } else { "code not found" };
    Ok(Json(MessageResponse {
        success: deleted,
        message: message.to_string(),
    }))
}

async fn stats_handler(State(registry): State<Arc<Registry>>) -> ApiResult<StatsResponse> {
    let counts = blocking(&registry, |r| r.stats()).await?;
    Ok(Json(StatsResponse {
        success: true,
        stats: StatsView {
            total: counts.total,
            activated: counts.activated,
            unused: counts.unused(),
        },
    }))
}

/// Build the HTTP API router around a registry.
pub fn build_router(registry: Arc<Registry>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(status_handler))
        .route("/gen/batch", post(batch_handler))
        .route("/gen/{seed}", get(generate_handler))
        .route("/verify", post(verify_handler))
        .route("/unbind", post(unbind_handler))
        .route("/admin/list", post(list_handler))
        .route("/admin/check", post(check_handler))
        .route("/admin/delete", post(delete_handler))
        .route("/stats", get(stats_handler))
        .layer(cors)
        .with_state(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use onecode_storage::timestamp_now;
    use onecode_types::LicenseCode;

    #[test]
    fn verify_response_omits_absent_fields() {
        let json = serde_json::to_value(VerifyResponse::from(&Verification::NotFound)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"valid": false, "bound": false, "reason": "code not found"})
        );
    }

    #[test]
    fn license_view_is_camel_case() {
        let record = LicenseRecord::new(LicenseCode::parse("abc123").unwrap(), timestamp_now());
        let json = serde_json::to_value(LicenseView::from(&record)).unwrap();
        assert_eq!(json["code"], "ABC123");
        assert_eq!(json["machineId"], serde_json::Value::Null);
        assert_eq!(json["isActivated"], false);
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn requests_accept_camel_case() {
        let req: ListRequest =
            serde_json::from_str(r#"{"adminKey":"k","page":2}"#).unwrap();
        assert_eq!(req.admin_key.as_deref(), Some("k"));
        assert_eq!(req.page, Some(2));
        assert_eq!(req.limit, None);
    }
}

//! Denoise routes.
//!
//! | Method | Path          | Body                          |
//! |--------|---------------|-------------------------------|
//! | POST   | `/denoise`    | raw audio bytes               |
//! | POST   | `/denoise/s3` | JSON object storage request   |

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Query, State,
        rejection::{BytesRejection, JsonRejection, QueryRejection},
    },
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
    routing::post,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{DenoiseQuery, DenoiseS3Request, DenoiseS3Response};
use crate::api::server::AppState;
use crate::coordinator::{Job, JobOutcome};
use crate::pipeline::OutputFormat;

const OCTET_STREAM: &str = "application/octet-stream";

/// Create the denoise router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(denoise_inline))
        .route("/s3", post(denoise_s3))
}

/// Denoise an uploaded body and return the result in the response.
async fn denoise_inline(
    State(state): State<AppState>,
    query: Result<Query<DenoiseQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Response> {
    if !is_octet_stream(&headers) {
        return Err(ApiError::unsupported_media_type(format!(
            "Use {OCTET_STREAM}"
        )));
    }
    let Query(query) = query?;
    let body = body?;

    let output_format = OutputFormat::parse(query.output_format.as_deref().unwrap_or_default());
    let job = Job::inline(
        body,
        query.input_format.as_deref(),
        query.model.as_deref(),
        output_format,
    )?;

    match state.coordinator.run(job).await? {
        JobOutcome::Bytes { data, format } => {
            Ok(([(header::CONTENT_TYPE, format.content_type())], data).into_response())
        }
        JobOutcome::Published { .. } => Err(ApiError::internal(
            "Inline job produced no response body",
        )),
    }
}

/// Denoise an object and upload the result to another object.
async fn denoise_s3(
    State(state): State<AppState>,
    request: Result<Json<DenoiseS3Request>, JsonRejection>,
) -> ApiResult<Json<DenoiseS3Response>> {
    let Json(request) = request?;
    let output_format = OutputFormat::parse(request.output_format.as_deref().unwrap_or_default());
    let job = Job::remote(
        &request.input_s3_uri,
        &request.output_s3_uri,
        request.model_s3_uri.as_deref(),
        output_format,
    )?;

    match state.coordinator.run(job).await? {
        JobOutcome::Published { output, .. } => Ok(Json(DenoiseS3Response {
            status: "success".to_string(),
            input: request.input_s3_uri,
            output: output.to_string(),
            output_format: echoed_format(request.output_format),
        })),
        JobOutcome::Bytes { .. } => Err(ApiError::internal("Remote job was not published")),
    }
}

/// The format token as the client sent it, `raw` when absent or blank.
fn echoed_format(requested: Option<String>) -> String {
    requested
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| OutputFormat::Raw.to_string())
}

/// Whether the `Content-Type` mentions `application/octet-stream`, ignoring case.
fn is_octet_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains(OCTET_STREAM))
}

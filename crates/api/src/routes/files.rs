//! File upload route.
//!
//! `POST /central?action=setFile&key=<namespace>[&filename=<hint>]` with the
//! file as the raw request body or as a multipart field named `file`.

use axum::{
    Json, Router,
    body::Body,
    extract::{
        DefaultBodyLimit, FromRequest, Multipart, Query, Request, State,
        rejection::QueryRejection,
    },
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::AppState;
use central_core::upload::{IncomingFile, UploadError, UploadService};
use central_shared::AppError;

/// The only action this endpoint serves.
pub const SET_FILE_ACTION: &str = "setFile";

/// Multipart field carrying the file.
pub const FILE_FIELD: &str = "file";

/// Creates the file routes.
///
/// axum's default body limit is off here; the upload ceiling is enforced
/// while the body streams to disk.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/central", post(set_file))
        .layer(DefaultBodyLimit::disable())
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for the upload endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SetFileQuery {
    /// Action selector; must be `setFile`.
    pub action: Option<String>,
    /// Target namespace.
    pub key: Option<String>,
    /// Original filename hint.
    pub filename: Option<String>,
}

/// Successful upload response.
#[derive(Debug, Serialize)]
pub struct SetFileResponse {
    /// Always `true`.
    pub success: bool,
    /// Public URL of the stored object.
    pub url: String,
    /// Object key.
    pub key: String,
}

// ============================================================================
// Helper Functions
// ============================================================================

/// JSON failure body with the status mapped from the error.
fn failure(err: &AppError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({
            "success": false,
            "error": err.message()
        })),
    )
        .into_response()
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

/// Stream the raw body into a temp file.
async fn receive_body(
    uploads: &UploadService,
    body: Body,
    filename: Option<String>,
) -> Result<IncomingFile, UploadError> {
    let mut sink = uploads.begin()?;
    let mut stream = body.into_data_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| UploadError::body(e.to_string()))?;
        sink.write_chunk(&chunk).await?;
    }

    sink.finish(filename).await
}

/// Stream the `file` field of a multipart body into a temp file.
///
/// A filename from the query wins over the one in the part headers.
async fn receive_multipart(
    uploads: &UploadService,
    mut multipart: Multipart,
    filename: Option<String>,
) -> Result<IncomingFile, UploadError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::body(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = filename.or_else(|| field.file_name().map(str::to_string));
        let mut sink = uploads.begin()?;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| UploadError::body(e.body_text()))?
        {
            sink.write_chunk(&chunk).await?;
        }
        return sink.finish(filename).await;
    }

    Err(UploadError::MissingFile)
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/central?action=setFile&key={namespace}`
/// Store one file and return its public URL.
///
/// `key` only has to be present; an empty value is accepted.
#[tracing::instrument(skip(state, request))]
async fn set_file(
    State(state): State<AppState>,
    query: Result<Query<SetFileQuery>, QueryRejection>,
    request: Request,
) -> Response {
    let invalid = || failure(&AppError::Validation("invalid action or missing key".to_string()));

    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Malformed query string");
            return invalid();
        }
    };
    let namespace = match (query.action.as_deref(), query.key.as_deref()) {
        (Some(SET_FILE_ACTION), Some(key)) => key.to_string(),
        _ => return invalid(),
    };

    let uploads = state.uploads.as_ref();
    let received = if is_multipart(&request) {
        match Multipart::from_request(request, &()).await {
            Ok(multipart) => receive_multipart(uploads, multipart, query.filename).await,
            Err(rejection) => Err(UploadError::body(rejection.body_text())),
        }
    } else {
        receive_body(uploads, request.into_body(), query.filename).await
    };

    let incoming = match received {
        Ok(incoming) => incoming,
        Err(e) => {
            warn!(namespace = %namespace, error = %e, "Upload rejected");
            return failure(&AppError::from(e));
        }
    };

    match uploads.process(incoming).await {
        Ok(stored) => {
            info!(
                namespace = %namespace,
                key = %stored.key,
                size = stored.size,
                "File stored"
            );

            let response = SetFileResponse {
                success: true,
                url: stored.url,
                key: stored.key,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!(namespace = %namespace, error = %e, "Failed to store file");
            failure(&AppError::from(e))
        }
    }
}

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::batch::{run_batch, BatchOutcome, BatchRequest};
use crate::error::BatchError;
use crate::state::AppState;
use crate::storage::ARCHIVE_NAME;

/// `POST /api/generate`: multipart `csv` (required), `template` (optional
/// image) and `sendEmail` flag. Responds with the zip of all certificates.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut csv: Option<Vec<u8>> = None;
    let mut template: Option<Vec<u8>> = None;
    let mut send_email = false;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return multipart_error(e),
        };
        let name = field.name().unwrap_or("").to_string();
        if name == "csv" {
            match field.bytes().await {
                Ok(data) => csv = Some(data.to_vec()),
                Err(e) => return multipart_error(e),
            }
        } else if name == "template" {
            match field.bytes().await {
                Ok(data) => template = Some(data.to_vec()).filter(|d| !d.is_empty()),
                Err(e) => return multipart_error(e),
            }
        } else if name == "sendEmail" {
            match field.text().await {
                Ok(text) => send_email = parse_flag(&text),
                Err(e) => return multipart_error(e),
            }
        }
    }

    let csv = match csv {
        Some(c) => c,
        None => return error_response(StatusCode::BAD_REQUEST, "Missing csv upload".to_string()),
    };

    let task_state = state.clone();
    let result = tokio::task::spawn_blocking(move || {
        run_batch(
            task_state.renderer.as_ref(),
            &task_state.notifier,
            &task_state.default_template,
            BatchRequest {
                csv: &csv,
                template: template.as_deref(),
                send_email,
            },
        )
    })
    .await;

    match result {
        Ok(Ok(outcome)) => archive_response(outcome),
        Ok(Err(BatchError::Parse(e))) => {
            tracing::warn!("Rejected roster: {}", e);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Ok(Err(e)) => {
            tracing::error!("Batch failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            tracing::error!("Batch worker panicked: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Certificate generation failed".to_string(),
            )
        }
    }
}

/// Form checkboxes send `on`; API clients send `true`.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "on" | "yes" | "1"
    )
}

fn archive_response(outcome: BatchOutcome) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", ARCHIVE_NAME),
            ),
            (header::CONTENT_LENGTH, outcome.archive.len().to_string()),
        ],
        [
            ("x-certificates-generated", outcome.generated.to_string()),
            ("x-certificates-failed", outcome.failures.len().to_string()),
            ("x-certificates-mailed", outcome.mailed.to_string()),
        ],
        outcome.archive,
    )
        .into_response()
}

/// Oversized bodies surface here as 413, broken encodings as 400.
fn multipart_error(e: MultipartError) -> Response {
    let status = e.status();
    tracing::warn!("Rejected upload ({}): {}", status, e.body_text());
    error_response(status, e.body_text())
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(serde_json::json!({
            "status": "error",
            "message": message
        })),
    )
        .into_response()
}

//! HTTP request handlers for the Payroll Engine API.
//!
//! This module contains the router and the handler functions for all API
//! endpoints. Stored uploads are served read-only under `/media`.

use std::str::FromStr;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
        DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State,
    },
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::ingest::{read_path, StoredUpload};
use crate::models::{ComponentKind, PayrollResult};
use crate::payroll::{self, LoadedSheet, ManualComponent, ResultFilter};

use super::request::{ArchiveRequest, RejectRequest, ResultsQuery};
use super::response::{ApiError, ApiErrorResponse, HealthResponse, MessageResponse};
use super::state::AppState;

type HandlerResult<T> = Result<T, ApiErrorResponse>;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes();
    Router::new()
        .route("/health", get(health_handler))
        .route("/upload/employee/", post(upload_employee_handler))
        .route("/upload/component/", post(upload_component_handler))
        .route("/components/", get(list_components_handler))
        .route("/components/manual-add/", post(manual_add_handler))
        .route("/employees/", get(list_employees_handler))
        .route("/payroll/generate/", post(generate_handler))
        .route("/payroll/results/", get(list_results_handler))
        .route("/payroll/approve/:id/", post(approve_handler))
        .route("/payroll/reject/:id/", post(reject_handler))
        .route("/payroll/archive/", post(archive_handler))
        .route("/payroll/history/", get(list_runs_handler))
        .route("/payroll/history/:run_id/", get(list_archived_results_handler))
        .route("/payroll/history/:run_id/delete/", delete(delete_run_handler))
        .nest_service("/media", ServeDir::new(state.uploads().directory()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for GET /health.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handler for POST /upload/employee/.
///
/// Stores the master sheet, then creates or overwrites one employee per row.
async fn upload_employee_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> HandlerResult<impl IntoResponse> {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "Processing employee master upload");

    let form = UploadForm::collect(correlation_id, multipart).await?;
    let file = form
        .master_file()
        .ok_or_else(|| EngineError::MissingFile {
            what: "employee master".to_string(),
        })
        .inspect_err(|_| warn!(correlation_id = %correlation_id, "No master file in upload"))?;

    let stored = state
        .uploads()
        .save(&file.file_name, &file.data)
        .inspect_err(|err| warn!(correlation_id = %correlation_id, error = %err, "Failed to store upload"))?;
    let sheet = read_path(&stored.path)
        .inspect_err(|err| warn!(correlation_id = %correlation_id, error = %err, "Failed to read master sheet"))?;
    let summary = payroll::upsert_from_sheet(state.store(), &sheet)
        .await
        .inspect_err(|err| warn!(correlation_id = %correlation_id, error = %err, "Master sheet rejected"))?;

    info!(
        correlation_id = %correlation_id,
        file = %stored.stored_name,
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped,
        "Employee master processed"
    );
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            "Employee master sheet processed successfully.",
            summary,
        )),
    ))
}

/// Handler for POST /upload/component/.
///
/// Every uploaded file is stored and read independently; a file that cannot
/// be stored or read is reported as skipped rather than failing the request.
async fn upload_component_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> HandlerResult<impl IntoResponse> {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "Processing component upload");

    let form = UploadForm::collect(correlation_id, multipart).await?;
    let kind: ComponentKind = form
        .text("type")
        .unwrap_or_default()
        .parse()
        .inspect_err(|err| warn!(correlation_id = %correlation_id, error = %err, "Invalid component type"))?;

    let files = form.component_files();
    if files.is_empty() {
        warn!(correlation_id = %correlation_id, "No component files in upload");
        return Err(EngineError::MissingFile {
            what: kind.to_string(),
        }
        .into());
    }

    let sheets: Vec<LoadedSheet> = files
        .into_iter()
        .map(|file| match state.uploads().save(&file.file_name, &file.data) {
            Ok(stored) => LoadedSheet::from(&stored),
            Err(err) => LoadedSheet {
                source_file: file.file_name.clone(),
                sheet: Err(err),
            },
        })
        .collect();

    let start_time = Instant::now();
    let report = payroll::ingest_components(state.store(), sheets, kind).await?;
    info!(
        correlation_id = %correlation_id,
        kind = %kind,
        accepted = report.accepted,
        skipped = report.skipped_rows(),
        duration_us = start_time.elapsed().as_micros(),
        "Component upload processed"
    );

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            format!("{} {} records processed.", report.accepted, kind),
            report,
        )),
    ))
}

/// Handler for GET /components/.
async fn list_components_handler(State(state): State<AppState>) -> HandlerResult<impl IntoResponse> {
    Ok(Json(payroll::list_components(state.store()).await?))
}

/// Handler for POST /components/manual-add/.
///
/// Accepts a multipart form with an optional `attachment` file, or a JSON
/// body. An attachment is stored before validation and discarded again if
/// the incentive is refused.
async fn manual_add_handler(
    State(state): State<AppState>,
    request: Request,
) -> HandlerResult<impl IntoResponse> {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "Processing manual incentive");

    let (entry, stored) = if is_multipart(&request) {
        let multipart = Multipart::from_request(request, &state).await;
        let form = UploadForm::collect(correlation_id, multipart).await?;
        manual_entry_from_form(&state, &form)
            .inspect_err(|err| warn!(correlation_id = %correlation_id, error = ?err.error, "Manual incentive form rejected"))?
    } else {
        let Json(entry) = Json::<ManualComponent>::from_request(request, &state)
            .await
            .map_err(|rejection| json_rejection(correlation_id, rejection))?;
        (entry, None)
    };

    match payroll::manual_add(state.store(), entry).await {
        Ok(component) => {
            info!(
                correlation_id = %correlation_id,
                component_id = component.id,
                attachment = component.attachment.as_deref().unwrap_or_default(),
                "Manual incentive recorded"
            );
            Ok((StatusCode::CREATED, Json(component)))
        }
        Err(err) => {
            warn!(correlation_id = %correlation_id, error = %err, "Manual incentive rejected");
            if let Some(upload) = stored {
                if let Err(discard_err) = state.uploads().discard(&upload) {
                    warn!(correlation_id = %correlation_id, error = %discard_err, "Failed to discard attachment");
                }
            }
            Err(err.into())
        }
    }
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}

/// Reads `employee`, `amount` and `reason` from the form and stores the
/// `attachment` file part, if any.
fn manual_entry_from_form(
    state: &AppState,
    form: &UploadForm,
) -> HandlerResult<(ManualComponent, Option<StoredUpload>)> {
    let employee_id = required_field(form, "employee")?;
    let amount = Decimal::from_str(required_field(form, "amount")?.trim())
        .map_err(|_| EngineError::validation("amount", "A valid number is required."))?;

    let stored = match form.file("attachment") {
        Some(file) if !file.file_name.is_empty() => {
            Some(state.uploads().save(&file.file_name, &file.data)?)
        }
        _ => None,
    };

    let entry = ManualComponent {
        employee_id: employee_id.to_string(),
        amount,
        reason: form.text("reason").map(str::to_string),
        attachment: stored.as_ref().map(|upload| upload.stored_name.clone()),
    };
    Ok((entry, stored))
}

fn required_field<'a>(form: &'a UploadForm, name: &'static str) -> HandlerResult<&'a str> {
    form.text(name)
        .ok_or_else(|| EngineError::validation(name, "This field is required.").into())
}

/// Handler for GET /employees/.
async fn list_employees_handler(State(state): State<AppState>) -> HandlerResult<impl IntoResponse> {
    Ok(Json(payroll::list_employees(state.store()).await?))
}

/// Handler for POST /payroll/generate/.
async fn generate_handler(State(state): State<AppState>) -> HandlerResult<impl IntoResponse> {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "Generating payroll");

    let start_time = Instant::now();
    let summary = payroll::generate_or_update(state.store())
        .await
        .inspect_err(|err| warn!(correlation_id = %correlation_id, error = %err, "Payroll generation failed"))?;

    info!(
        correlation_id = %correlation_id,
        batch_id = %summary.batch_id,
        created = summary.results_created,
        updated = summary.results_updated,
        reopened = summary.results_reopened,
        consumed = summary.components_consumed,
        duration_us = start_time.elapsed().as_micros(),
        "Payroll generated"
    );
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Payroll generated successfully.", summary)),
    ))
}

/// Handler for GET /payroll/results/.
async fn list_results_handler(
    State(state): State<AppState>,
    query: Result<Query<ResultsQuery>, QueryRejection>,
) -> HandlerResult<impl IntoResponse> {
    let Query(query) = query.map_err(|rejection| {
        ApiErrorResponse::bad_request(ApiError::validation_error(rejection.body_text()))
    })?;
    let filter = ResultFilter::try_from(query)?;
    Ok(Json(payroll::list_results(state.store(), &filter).await?))
}

/// A decided result, returned by approve and reject.
#[derive(Serialize)]
struct Decision {
    result: PayrollResult,
}

/// Handler for POST /payroll/approve/{id}/.
async fn approve_handler(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> HandlerResult<impl IntoResponse> {
    let correlation_id = Uuid::new_v4();
    let result_id = path_id(id, "Payroll result")?;
    info!(correlation_id = %correlation_id, result_id, "Approving payroll result");

    let result = payroll::approve(state.store(), result_id)
        .await
        .inspect_err(|err| warn!(correlation_id = %correlation_id, error = %err, "Approval refused"))?;

    Ok(Json(MessageResponse::new("Payroll approved.", Decision { result })))
}

/// Handler for POST /payroll/reject/{id}/.
///
/// An unreadable body is treated as a missing reason, so an unknown result
/// still answers 404.
async fn reject_handler(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<RejectRequest>, JsonRejection>,
) -> HandlerResult<impl IntoResponse> {
    let correlation_id = Uuid::new_v4();
    let result_id = path_id(id, "Payroll result")?;
    info!(correlation_id = %correlation_id, result_id, "Rejecting payroll result");

    let request = payload.map(|Json(req)| req).unwrap_or_else(|rejection| {
        warn!(correlation_id = %correlation_id, error = %rejection.body_text(), "Unreadable reject body");
        RejectRequest::default()
    });
    let reason = request.reason.unwrap_or_default();

    let result = payroll::reject(state.store(), result_id, &reason)
        .await
        .inspect_err(|err| warn!(correlation_id = %correlation_id, error = %err, "Rejection refused"))?;

    Ok(Json(MessageResponse::new("Payroll rejected.", Decision { result })))
}

/// Handler for POST /payroll/archive/.
///
/// The JSON body is optional; an empty body archives an unnamed run.
async fn archive_handler(State(state): State<AppState>, body: Bytes) -> HandlerResult<impl IntoResponse> {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "Archiving current payroll");

    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ArchiveRequest::default()
    } else {
        serde_json::from_slice::<ArchiveRequest>(&body).map_err(|err| {
            warn!(correlation_id = %correlation_id, error = %err, "Invalid archive body");
            ApiErrorResponse::bad_request(ApiError::malformed_json(format!(
                "Invalid JSON: {}",
                err
            )))
        })?
    };

    let outcome = payroll::archive_current_run(state.store(), request.run_name.as_deref())
        .await
        .inspect_err(|err| warn!(correlation_id = %correlation_id, error = %err, "Archive refused"))?;

    info!(
        correlation_id = %correlation_id,
        run_id = outcome.run.id,
        archived = outcome.archived_results,
        "Payroll archived"
    );
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            format!(
                "Archived {} payroll results as run {}.",
                outcome.archived_results, outcome.run.id
            ),
            outcome,
        )),
    ))
}

/// Handler for GET /payroll/history/.
async fn list_runs_handler(State(state): State<AppState>) -> HandlerResult<impl IntoResponse> {
    Ok(Json(payroll::list_runs(state.store()).await?))
}

/// Handler for GET /payroll/history/{run_id}/.
async fn list_archived_results_handler(
    State(state): State<AppState>,
    run_id: Result<Path<i64>, PathRejection>,
) -> HandlerResult<impl IntoResponse> {
    let run_id = path_id(run_id, "Payroll run")?;
    Ok(Json(payroll::list_archived_results(state.store(), run_id).await?))
}

/// Handler for DELETE /payroll/history/{run_id}/delete/.
async fn delete_run_handler(
    State(state): State<AppState>,
    run_id: Result<Path<i64>, PathRejection>,
) -> HandlerResult<impl IntoResponse> {
    let correlation_id = Uuid::new_v4();
    let run_id = path_id(run_id, "Payroll run")?;

    let removed = payroll::delete_run(state.store(), run_id)
        .await
        .inspect_err(|err| warn!(correlation_id = %correlation_id, error = %err, "Run deletion refused"))?;

    info!(correlation_id = %correlation_id, run_id, removed, "Payroll run deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Ids are numeric; anything else cannot name an existing row.
fn path_id(id: Result<Path<i64>, PathRejection>, entity: &str) -> HandlerResult<i64> {
    id.map(|Path(id)| id)
        .map_err(|_| ApiErrorResponse::not_found(format!("{} not found", entity)))
}

fn json_rejection(correlation_id: Uuid, rejection: JsonRejection) -> ApiErrorResponse {
    let error = match rejection {
        JsonRejection::JsonDataError(err) => {
            let body_text = err.body_text();
            warn!(
                correlation_id = %correlation_id,
                error = %body_text,
                "JSON data error"
            );
            if body_text.contains("missing field") {
                ApiError::validation_error(body_text)
            } else {
                ApiError::malformed_json(body_text)
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            warn!(
                correlation_id = %correlation_id,
                error = %err,
                "JSON syntax error"
            );
            ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => ApiError::malformed_json("Failed to parse request body"),
    };
    ApiErrorResponse::bad_request(error)
}

/// One file part of a multipart upload.
struct UploadedFile {
    field: String,
    file_name: String,
    data: Bytes,
}

/// A fully buffered multipart form.
#[derive(Default)]
struct UploadForm {
    files: Vec<UploadedFile>,
    fields: Vec<(String, String)>,
}

impl UploadForm {
    async fn collect(
        correlation_id: Uuid,
        multipart: Result<Multipart, MultipartRejection>,
    ) -> HandlerResult<Self> {
        let mut multipart = multipart.map_err(|rejection| {
            warn!(correlation_id = %correlation_id, error = %rejection.body_text(), "Not a multipart request");
            ApiErrorResponse::bad_request(ApiError::malformed_multipart(rejection.body_text()))
        })?;

        let mut form = UploadForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| multipart_error(correlation_id, err))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let data = field
                        .bytes()
                        .await
                        .map_err(|err| multipart_error(correlation_id, err))?;
                    form.files.push(UploadedFile {
                        field: name,
                        file_name,
                        data,
                    });
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|err| multipart_error(correlation_id, err))?;
                    form.fields.push((name, text));
                }
            }
        }
        Ok(form)
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field == name)
    }

    /// The `file` part, else the first `files` part.
    fn master_file(&self) -> Option<&UploadedFile> {
        self.file("file")
            .or_else(|| self.files.iter().find(|f| is_files_field(&f.field)))
    }

    fn component_files(self) -> Vec<UploadedFile> {
        self.files
            .into_iter()
            .filter(|f| is_files_field(&f.field))
            .collect()
    }
}

fn is_files_field(name: &str) -> bool {
    matches!(name, "files" | "files[]")
}

fn multipart_error(correlation_id: Uuid, err: MultipartError) -> ApiErrorResponse {
    warn!(correlation_id = %correlation_id, error = %err.body_text(), "Malformed multipart body");
    ApiErrorResponse {
        status: err.status(),
        error: ApiError::malformed_multipart(err.body_text()),
    }
}

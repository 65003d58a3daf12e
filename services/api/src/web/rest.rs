//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::protocol::{
    CreateSeriesRequest, DeckResponse, ErrorResponse, ImportResponse, JobResponse,
    ReindexResponse, RenameDeckQuery, SearchResultResponse, SeriesResponse, SlideResponse,
};
use crate::web::state::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use slide_search_core::snapshot::{export_snapshot, import_snapshot, Snapshot};
use slide_search_core::{LectureSeries, SlideDeck, SlideSearchError};
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_series_handler,
        list_series_handler,
        get_series_handler,
        delete_series_handler,
        list_series_decks_handler,
        upload_handler,
        get_job_handler,
        get_deck_handler,
        rename_deck_handler,
        delete_deck_handler,
        deck_pdf_handler,
        list_deck_slides_handler,
        search_handler,
        export_handler,
        import_handler,
        reindex_handler,
    ),
    components(
        schemas(
            CreateSeriesRequest,
            SeriesResponse,
            DeckResponse,
            SlideResponse,
            SearchResultResponse,
            JobResponse,
            ReindexResponse,
            ImportResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Slide Search API", description = "Lecture slide ingestion and full-text search.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Lookup Helpers
//=========================================================================================

async fn require_series(state: &AppState, id: Uuid) -> Result<LectureSeries, ApiError> {
    state
        .store
        .get_series(id)
        .await?
        .ok_or_else(|| SlideSearchError::NotFound(format!("lecture series {id}")).into())
}

async fn require_deck(state: &AppState, id: Uuid) -> Result<SlideDeck, ApiError> {
    state
        .store
        .get_deck(id)
        .await?
        .ok_or_else(|| SlideSearchError::NotFound(format!("slide deck {id}")).into())
}

//=========================================================================================
// Lecture Series Handlers
//=========================================================================================

/// Create a lecture series.
#[utoipa::path(
    post,
    path = "/api/lecture-series/",
    request_body = CreateSeriesRequest,
    responses(
        (status = 201, description = "Lecture series created", body = SeriesResponse),
        (status = 422, description = "Blank name", body = ErrorResponse)
    )
)]
pub async fn create_series_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSeriesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let series = state.writer.create_series(&request.name).await?;
    info!(series_id = %series.id, "lecture series created");
    Ok((StatusCode::CREATED, Json(SeriesResponse::from(series))))
}

/// List all lecture series.
#[utoipa::path(
    get,
    path = "/api/lecture-series/",
    responses((status = 200, description = "All lecture series", body = [SeriesResponse]))
)]
pub async fn list_series_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SeriesResponse>>, ApiError> {
    let series = state.store.list_series().await?;
    Ok(Json(series.into_iter().map(SeriesResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/lecture-series/{id}",
    params(("id" = Uuid, Path, description = "Lecture series id")),
    responses(
        (status = 200, description = "The lecture series", body = SeriesResponse),
        (status = 404, description = "Unknown lecture series", body = ErrorResponse)
    )
)]
pub async fn get_series_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SeriesResponse>, ApiError> {
    Ok(Json(require_series(&state, id).await?.into()))
}

/// Delete a lecture series. Its decks are kept.
#[utoipa::path(
    delete,
    path = "/api/lecture-series/{id}",
    params(("id" = Uuid, Path, description = "Lecture series id")),
    responses((status = 204, description = "Deleted (or already absent)"))
)]
pub async fn delete_series_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.writer.delete_series(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List the decks owned by a lecture series.
#[utoipa::path(
    get,
    path = "/api/lecture-series/{id}/decks",
    params(("id" = Uuid, Path, description = "Lecture series id")),
    responses(
        (status = 200, description = "Decks of the series", body = [DeckResponse]),
        (status = 404, description = "Unknown lecture series", body = ErrorResponse)
    )
)]
pub async fn list_series_decks_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DeckResponse>>, ApiError> {
    require_series(&state, id).await?;
    let decks = state.store.list_decks_by_series(id).await?;
    Ok(Json(decks.into_iter().map(DeckResponse::from).collect()))
}

/// Upload one or more PDFs into a lecture series.
///
/// Every file becomes an ingestion job that runs in the background; poll
/// `/api/jobs/{id}` for the outcome.
#[utoipa::path(
    post,
    path = "/api/lecture-series/{id}/upload",
    params(("id" = Uuid, Path, description = "Lecture series id")),
    request_body(content_type = "multipart/form-data", description = "One or more PDF files."),
    responses(
        (status = 202, description = "Ingestion jobs queued", body = [JobResponse]),
        (status = 400, description = "No file in the request", body = ErrorResponse),
        (status = 404, description = "Unknown lecture series", body = ErrorResponse)
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    require_series(&state, id).await?;

    let mut jobs = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart data: {}", e)))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file bytes: {}", e)))?;
        let job = state.jobs.submit(id, file_name, data).await?;
        jobs.push(JobResponse::from(job));
    }

    if jobs.is_empty() {
        return Err(ApiError::BadRequest(
            "Multipart form must include at least one file".to_string(),
        ));
    }
    Ok((StatusCode::ACCEPTED, Json(jobs)))
}

//=========================================================================================
// Ingestion Job Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    params(("id" = Uuid, Path, description = "Ingestion job id")),
    responses(
        (status = 200, description = "Current state of the job", body = JobResponse),
        (status = 404, description = "Unknown job", body = ErrorResponse)
    )
)]
pub async fn get_job_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    Ok(Json(state.jobs.get(id).await?.into()))
}

//=========================================================================================
// Slide Deck Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/slide-decks/{id}",
    params(("id" = Uuid, Path, description = "Slide deck id")),
    responses(
        (status = 200, description = "The slide deck", body = DeckResponse),
        (status = 404, description = "Unknown deck", body = ErrorResponse)
    )
)]
pub async fn get_deck_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeckResponse>, ApiError> {
    Ok(Json(require_deck(&state, id).await?.into()))
}

#[utoipa::path(
    put,
    path = "/api/slide-decks/{id}",
    params(("id" = Uuid, Path, description = "Slide deck id"), RenameDeckQuery),
    responses(
        (status = 200, description = "The renamed deck", body = DeckResponse),
        (status = 404, description = "Unknown deck", body = ErrorResponse)
    )
)]
pub async fn rename_deck_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<RenameDeckQuery>,
) -> Result<Json<DeckResponse>, ApiError> {
    let deck = state.writer.rename_deck(id, &query.name).await?;
    Ok(Json(deck.into()))
}

/// Delete a deck with its slides, index documents and PDF.
#[utoipa::path(
    delete,
    path = "/api/slide-decks/{id}",
    params(("id" = Uuid, Path, description = "Slide deck id")),
    responses((status = 204, description = "Deleted (or already absent)"))
)]
pub async fn delete_deck_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.writer.delete_deck(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Download the original PDF of a deck.
#[utoipa::path(
    get,
    path = "/api/slide-decks/{id}/pdf",
    params(("id" = Uuid, Path, description = "Slide deck id")),
    responses(
        (status = 200, description = "The PDF", content_type = "application/pdf"),
        (status = 404, description = "Unknown deck or missing PDF", body = ErrorResponse)
    )
)]
pub async fn deck_pdf_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let deck = require_deck(&state, id).await?;
    let data = state.blobs.get(id).await?;

    let file_name = deck.name.replace(['"', '\\', '\r', '\n'], "_");
    let disposition = HeaderValue::from_str(&format!("inline; filename=\"{file_name}.pdf\""))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(data),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/api/slide-decks/{id}/slides",
    params(("id" = Uuid, Path, description = "Slide deck id")),
    responses(
        (status = 200, description = "Slides ordered by number", body = [SlideResponse]),
        (status = 404, description = "Unknown deck", body = ErrorResponse)
    )
)]
pub async fn list_deck_slides_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SlideResponse>>, ApiError> {
    require_deck(&state, id).await?;
    let slides = state.store.list_slides_by_deck(id).await?;
    Ok(Json(slides.into_iter().map(SlideResponse::from).collect()))
}

//=========================================================================================
// Search Handler
//=========================================================================================

/// Full-text search over all slides.
///
/// `series` may be repeated to scope the search to several lecture series.
#[utoipa::path(
    get,
    path = "/api/search",
    params(
        ("query" = Option<String>, Query, description = "Free-text query; empty matches everything"),
        ("series" = Option<Vec<Uuid>>, Query, description = "Lecture series to search in")
    ),
    responses(
        (status = 200, description = "Ranked matching slides", body = [SearchResultResponse]),
        (status = 422, description = "Malformed series id", body = ErrorResponse)
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<SearchResultResponse>>, ApiError> {
    let mut query = String::new();
    let mut series = Vec::new();
    for (key, value) in params {
        match key.as_str() {
            "query" => query = value,
            "series" => series.push(Uuid::parse_str(&value).map_err(|e| {
                SlideSearchError::InvalidInput(format!("series '{value}' is not a valid id: {e}"))
            })?),
            _ => {}
        }
    }

    let scope = (!series.is_empty()).then_some(series.as_slice());
    let results = state.search.search(&query, scope).await?;
    Ok(Json(results.into_iter().map(SearchResultResponse::from).collect()))
}

//=========================================================================================
// Maintenance Handlers
//=========================================================================================

/// Export every series, deck and slide as a versioned JSON snapshot.
#[utoipa::path(
    get,
    path = "/api/export",
    responses((status = 200, description = "Snapshot document", content_type = "application/json"))
)]
pub async fn export_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let snapshot = export_snapshot(state.store.as_ref()).await?;
    Ok((
        [(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"slides-export.json\""),
        )],
        Json(snapshot),
    )
        .into_response())
}

/// Import a snapshot, either as a multipart file or as the JSON request body.
#[utoipa::path(
    post,
    path = "/api/import",
    request_body(content_type = "application/json", description = "A snapshot produced by /api/export."),
    responses(
        (status = 200, description = "Snapshot imported and index rebuilt", body = ImportResponse),
        (status = 422, description = "Invalid snapshot", body = ErrorResponse)
    )
)]
pub async fn import_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ImportResponse>, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    let body = if is_multipart {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart data: {}", e)))?
            .ok_or_else(|| ApiError::BadRequest("Multipart form must include a file".to_string()))?;
        field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file bytes: {}", e)))?
    } else {
        Bytes::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
    };

    let snapshot = Snapshot::from_json(&body)?;
    let summary = import_snapshot(state.store.as_ref(), &state.writer, snapshot).await?;
    Ok(Json(ImportResponse {
        lecture_series: summary.lecture_series,
        slide_decks: summary.slide_decks,
        slides: summary.slides,
        indexed: summary.indexed,
    }))
}

/// Rebuild the search index from the stored slides.
#[utoipa::path(
    post,
    path = "/api/reindex",
    responses((status = 200, description = "Index rebuilt", body = ReindexResponse))
)]
pub async fn reindex_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReindexResponse>, ApiError> {
    let indexed = state.writer.reindex_all().await?;
    Ok(Json(ReindexResponse { indexed }))
}

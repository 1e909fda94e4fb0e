pub mod service;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use log::error;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::llm::GenerationError;
use crate::shared::models::{
    Business, BusinessUpdate, Document, DocumentStatus, DocumentType, DocumentUpdate,
    DocumentVersion, NewBusiness,
};
use crate::shared::state::AppState;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Generation error: {0}")]
    Generation(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(msg) => Self::NotFound(msg),
            StorageError::Database(msg) => Self::Database(msg),
            StorageError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<GenerationError> for ServiceError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::Configuration(msg) => Self::Configuration(msg),
            GenerationError::Upstream(msg) => Self::Generation(msg),
            // A malformed model reply aborts the flow the same way a
            // transport failure does; the caller cannot fix it by changing
            // the request.
            GenerationError::InvalidResponse(msg) => Self::Generation(msg),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Configuration(msg)
            | Self::Generation(msg)
            | Self::Database(msg)
            | Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentRequest {
    pub content: Option<String>,
    pub changelog: Option<String>,
    pub title: Option<String>,
    pub status: Option<DocumentStatus>,
}

#[derive(Debug)]
pub struct Download {
    pub content_type: &'static str,
    pub filename: String,
    pub body: String,
}

/// Renders a document for download. Pure so the export formats are
/// testable without the HTTP layer.
pub fn render_download(document: &Document, format: &str) -> Result<Download, ServiceError> {
    match format {
        "txt" => Ok(Download {
            content_type: "text/plain",
            filename: format!("{}.txt", document.title),
            body: document.content.clone(),
        }),
        "html" => Ok(Download {
            content_type: "text/html",
            filename: format!("{}.html", document.title),
            body: format!(
                "<!DOCTYPE html><html><head><title>{}</title></head><body>{}</body></html>",
                document.title, document.content
            ),
        }),
        "json" => Ok(Download {
            content_type: "application/json",
            filename: format!("{}.json", document.title),
            body: serde_json::to_string(document)
                .map_err(|e| ServiceError::Internal(e.to_string()))?,
        }),
        _ => Err(ServiceError::Validation(
            "Unsupported format. Use txt, html, or json.".to_string(),
        )),
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, ServiceError> {
    serde_json::from_value(body).map_err(|e| ServiceError::Validation(e.to_string()))
}

fn validate_new_business(business: &NewBusiness) -> Result<(), ServiceError> {
    if business.name.trim().is_empty() {
        return Err(ServiceError::Validation(
            "business name must not be empty".to_string(),
        ));
    }
    // The wizard enforces this upstream; re-checked here so a raw API call
    // cannot create a business no clause selection applies to.
    if business.jurisdictions.is_empty() {
        return Err(ServiceError::Validation(
            "at least one jurisdiction is required".to_string(),
        ));
    }
    Ok(())
}

pub async fn handle_create_business(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Business>, ServiceError> {
    let new_business: NewBusiness = parse_body(body)?;
    validate_new_business(&new_business)?;

    let business = state.storage.create_business(new_business).await?;
    Ok(Json(business))
}

pub async fn handle_get_business(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Business>, ServiceError> {
    let business = state
        .storage
        .get_business(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Business not found".to_string()))?;
    Ok(Json(business))
}

// Updates are partial, so each constraint only applies to fields the
// caller actually sent.
fn validate_business_update(updates: &BusinessUpdate) -> Result<(), ServiceError> {
    if let Some(name) = &updates.name {
        if name.trim().is_empty() {
            return Err(ServiceError::Validation(
                "business name must not be empty".to_string(),
            ));
        }
    }
    if let Some(jurisdictions) = &updates.jurisdictions {
        if jurisdictions.is_empty() {
            return Err(ServiceError::Validation(
                "at least one jurisdiction is required".to_string(),
            ));
        }
    }
    Ok(())
}

pub async fn handle_update_business(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Json<Business>, ServiceError> {
    let updates: BusinessUpdate = parse_body(body)?;
    validate_business_update(&updates)?;

    let business = state.storage.update_business(id, updates).await?;
    Ok(Json(business))
}

pub async fn handle_generate_document(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ServiceError> {
    let business_id = body
        .get("businessId")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok());
    let doc_type = body
        .get("documentType")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<DocumentType>().ok());

    let (business_id, doc_type) = match (business_id, doc_type) {
        (Some(b), Some(d)) => (b, d),
        _ => {
            return Err(ServiceError::Validation(
                "businessId and documentType are required".to_string(),
            ))
        }
    };

    let (document, generated) = match state
        .documents
        .generate_document(business_id, doc_type)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            error!("Document generation failed: {e}");
            return Err(e);
        }
    };

    Ok(Json(serde_json::json!({
        "document": document,
        "generatedContent": generated,
    })))
}

pub async fn handle_get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, ServiceError> {
    let document = state
        .storage
        .get_document(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Document not found".to_string()))?;
    Ok(Json(document))
}

pub async fn handle_list_business_documents(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
) -> Result<Json<Vec<Document>>, ServiceError> {
    let documents = state.storage.get_documents_by_business(business_id).await?;
    Ok(Json(documents))
}

pub async fn handle_update_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Json<Document>, ServiceError> {
    let req: UpdateDocumentRequest = parse_body(body)?;

    let mut document = match req.content {
        Some(content) => {
            let changelog = req
                .changelog
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| {
                    ServiceError::Validation(
                        "changelog is required when content changes".to_string(),
                    )
                })?;
            state
                .documents
                .update_document_content(id, content, changelog)
                .await?
        }
        None => state
            .storage
            .get_document(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Document not found".to_string()))?,
    };

    if req.title.is_some() || req.status.is_some() {
        document = state
            .storage
            .update_document(
                id,
                DocumentUpdate {
                    title: req.title,
                    status: req.status,
                    ..Default::default()
                },
            )
            .await?;
    }

    Ok(Json(document))
}

pub async fn handle_delete_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ServiceError> {
    state.storage.delete_document(id).await?;
    Ok(Json(
        serde_json::json!({ "message": "Document deleted successfully" }),
    ))
}

pub async fn handle_list_versions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DocumentVersion>>, ServiceError> {
    let versions = state.storage.get_document_versions(id).await?;
    Ok(Json(versions))
}

pub async fn handle_download_document(
    State(state): State<Arc<AppState>>,
    Path((id, format)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, ServiceError> {
    let document = state
        .storage
        .get_document(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Document not found".to_string()))?;

    let download = render_download(&document, &format)?;
    let headers = [
        (header::CONTENT_TYPE, download.content_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", download.filename),
        ),
    ];
    Ok((headers, download.body))
}

pub fn configure_legal_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/businesses", post(handle_create_business))
        .route("/api/businesses/:id", get(handle_get_business))
        .route("/api/businesses/:id", put(handle_update_business))
        .route(
            "/api/businesses/:business_id/documents",
            get(handle_list_business_documents),
        )
        .route("/api/documents/generate", post(handle_generate_document))
        .route("/api/documents/:id", get(handle_get_document))
        .route("/api/documents/:id", put(handle_update_document))
        .route("/api/documents/:id", delete(handle_delete_document))
        .route("/api/documents/:id/versions", get(handle_list_versions))
        .route(
            "/api/documents/:id/download/:format",
            get(handle_download_document),
        )
}

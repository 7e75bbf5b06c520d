//! services/api/src/web/materials.rs
//!
//! Study material endpoints. Everyone signed in may browse and open;
//! mentors and admins publish and delete.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use levelup_core::materials::{MaterialDraft, MaterialUpload};
use levelup_core::{MaterialType, StudyMaterial};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{reject, Rejection};
use crate::web::revisions::RevisionEntryResponse;
use crate::web::state::{AppState, CurrentUser};

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialResponse {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub title: String,
    pub material_type: String,
    pub url: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<StudyMaterial> for MaterialResponse {
    fn from(m: StudyMaterial) -> Self {
        Self {
            id: m.id,
            topic_id: m.topic_id,
            title: m.title,
            material_type: m.material_type.to_string(),
            url: m.url,
            created_by: m.created_by,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenMaterialResponse {
    pub material: MaterialResponse,
    /// Revisions created by this open. Empty after the first open.
    pub scheduled: Vec<RevisionEntryResponse>,
}

#[derive(Deserialize, IntoParams)]
pub struct MaterialsQuery {
    pub topic_id: Option<Uuid>,
    /// `video`, `notes`, `flashcards` or `test`.
    pub material_type: Option<String>,
}

/// Multipart form accepted by `POST /materials`. Send either `file` or `url`.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadMaterialForm {
    pub topic_id: Uuid,
    pub title: String,
    pub material_type: String,
    pub url: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub file: Option<Vec<u8>>,
}

fn bad_request(msg: impl Into<String>) -> Rejection {
    (StatusCode::BAD_REQUEST, msg.into())
}

fn multipart_rejection(e: MultipartError) -> Rejection {
    warn!("Malformed multipart upload: {}", e.body_text());
    (e.status(), e.body_text())
}

fn parse_material_type(raw: &str) -> Result<MaterialType, Rejection> {
    raw.parse::<MaterialType>().map_err(bad_request)
}

/// Collects the upload form fields into a draft.
async fn read_draft(mut multipart: Multipart) -> Result<MaterialDraft, Rejection> {
    let mut topic_id = None;
    let mut title = None;
    let mut material_type = None;
    let mut url = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_rejection)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.bin").to_string();
                let data: Bytes = field.bytes().await.map_err(multipart_rejection)?;
                upload = Some(MaterialUpload {
                    file_name,
                    data: data.to_vec(),
                });
            }
            "topic_id" => {
                let text = field.text().await.map_err(multipart_rejection)?;
                topic_id = Some(
                    text.trim()
                        .parse::<Uuid>()
                        .map_err(|_| bad_request("topic_id must be a UUID"))?,
                );
            }
            "title" => title = Some(field.text().await.map_err(multipart_rejection)?),
            "material_type" => {
                let text = field.text().await.map_err(multipart_rejection)?;
                material_type = Some(parse_material_type(&text)?);
            }
            "url" => url = Some(field.text().await.map_err(multipart_rejection)?),
            other => warn!("Ignoring unexpected upload field '{}'", other),
        }
    }

    Ok(MaterialDraft {
        topic_id: topic_id.ok_or_else(|| bad_request("topic_id is required"))?,
        title: title.ok_or_else(|| bad_request("title is required"))?,
        material_type: material_type.ok_or_else(|| bad_request("material_type is required"))?,
        url,
        upload,
    })
}

/// GET /materials - Browse materials, optionally by topic and type
#[utoipa::path(
    get,
    path = "/materials",
    params(MaterialsQuery),
    responses(
        (status = 200, description = "Matching materials", body = [MaterialResponse]),
        (status = 400, description = "Unknown material type")
    )
)]
pub async fn list_materials_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MaterialsQuery>,
) -> Result<Json<Vec<MaterialResponse>>, Rejection> {
    let material_type = query
        .material_type
        .as_deref()
        .map(parse_material_type)
        .transpose()?;
    let materials = state
        .materials
        .list(query.topic_id, material_type)
        .await
        .map_err(|e| reject("Failed to list materials", e))?;
    Ok(Json(materials.into_iter().map(Into::into).collect()))
}

/// POST /materials/{id}/open - Open a material; a student's first open schedules revisions
#[utoipa::path(
    post,
    path = "/materials/{id}/open",
    params(("id" = Uuid, Path, description = "Material id")),
    responses(
        (status = 200, description = "Material opened", body = OpenMaterialResponse),
        (status = 404, description = "No such material")
    )
)]
pub async fn open_material_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(material_id): Path<Uuid>,
) -> Result<Json<OpenMaterialResponse>, Rejection> {
    let opened = state
        .materials
        .open(user.id, user.role, material_id, Utc::now().date_naive())
        .await
        .map_err(|e| reject("Failed to open material", e))?;
    Ok(Json(OpenMaterialResponse {
        material: opened.material.into(),
        scheduled: opened.scheduled.into_iter().map(Into::into).collect(),
    }))
}

/// POST /materials - Publish a material from an uploaded file or an external link
#[utoipa::path(
    post,
    path = "/materials",
    request_body(content = UploadMaterialForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Material published", body = MaterialResponse),
        (status = 400, description = "Missing fields or empty file"),
        (status = 403, description = "Students cannot publish")
    )
)]
pub async fn create_material_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MaterialResponse>), Rejection> {
    let draft = read_draft(multipart).await?;
    let material = state
        .materials
        .publish(user.id, user.role, draft)
        .await
        .map_err(|e| reject("Failed to publish material", e))?;
    Ok((StatusCode::CREATED, Json(material.into())))
}

/// DELETE /materials/{id} - Remove a material and its stored file
#[utoipa::path(
    delete,
    path = "/materials/{id}",
    params(("id" = Uuid, Path, description = "Material id")),
    responses(
        (status = 204, description = "Material deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "No such material")
    )
)]
pub async fn delete_material_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(material_id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    state
        .materials
        .remove(user.id, user.role, material_id)
        .await
        .map_err(|e| reject("Failed to delete material", e))?;
    Ok(StatusCode::NO_CONTENT)
}

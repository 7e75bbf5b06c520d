//! crates/levelup_core/src/materials.rs
//!
//! Study material delivery. Mentors and admins author materials, students read
//! them, and a student's first open of a material kind starts its revision schedule.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{MaterialType, NewStudyMaterial, RevisionScheduleEntry, Role, StudyMaterial};
use crate::gate::authorize;
use crate::ports::{DatabaseService, PortError, PortResult, StorageService};
use crate::revision::RevisionScheduler;

/// An uploaded file that should back a material.
#[derive(Debug, Clone)]
pub struct MaterialUpload {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Everything a mentor or admin submits to publish a material.
#[derive(Debug, Clone)]
pub struct MaterialDraft {
    pub topic_id: Uuid,
    pub title: String,
    pub material_type: MaterialType,
    /// External link. Ignored when a file is uploaded.
    pub url: Option<String>,
    pub upload: Option<MaterialUpload>,
}

#[derive(Debug, Clone)]
pub struct OpenedMaterial {
    pub material: StudyMaterial,
    /// Non-empty only on the first open of this topic and material kind.
    pub scheduled: Vec<RevisionScheduleEntry>,
}

pub struct Materials {
    db: Arc<dyn DatabaseService>,
    storage: Arc<dyn StorageService>,
    scheduler: Arc<RevisionScheduler>,
}

/// Keeps the last path segment and replaces anything outside `[A-Za-z0-9._-]`.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned
    }
}

impl Materials {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        storage: Arc<dyn StorageService>,
        scheduler: Arc<RevisionScheduler>,
    ) -> Self {
        Self {
            db,
            storage,
            scheduler,
        }
    }

    pub async fn list(
        &self,
        topic_id: Option<Uuid>,
        material_type: Option<MaterialType>,
    ) -> PortResult<Vec<StudyMaterial>> {
        self.db.list_materials(topic_id, material_type).await
    }

    /// Returns the material and, for students, makes sure its revisions are scheduled.
    pub async fn open(
        &self,
        viewer_id: Uuid,
        viewer_role: Role,
        material_id: Uuid,
        today: NaiveDate,
    ) -> PortResult<OpenedMaterial> {
        let material = self.db.get_material(material_id).await?;
        let scheduled = if viewer_role == Role::Student {
            self.scheduler
                .schedule_on_first_open(viewer_id, material.topic_id, material.material_type, today)
                .await?
        } else {
            Vec::new()
        };
        Ok(OpenedMaterial {
            material,
            scheduled,
        })
    }

    pub async fn publish(
        &self,
        author_id: Uuid,
        author_role: Role,
        draft: MaterialDraft,
    ) -> PortResult<StudyMaterial> {
        authorize(author_role, &[Role::Mentor, Role::Admin])?;
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(PortError::Invalid("material title must not be empty".to_string()));
        }

        let (url, storage_key) = match (draft.upload, draft.url) {
            (Some(upload), _) => {
                if upload.data.is_empty() {
                    return Err(PortError::Invalid("uploaded file is empty".to_string()));
                }
                let key = format!(
                    "materials/{}/{}-{}",
                    draft.topic_id,
                    Uuid::new_v4(),
                    sanitize_file_name(&upload.file_name)
                );
                let url = self.storage.put_object(&key, &upload.data).await?;
                (url, Some(key))
            }
            (None, Some(url)) if !url.trim().is_empty() => (url.trim().to_string(), None),
            _ => {
                return Err(PortError::Invalid(
                    "a material needs either a file or a url".to_string(),
                ))
            }
        };

        let created = self
            .db
            .create_material(&NewStudyMaterial {
                topic_id: draft.topic_id,
                title: title.to_string(),
                material_type: draft.material_type,
                url,
                storage_key: storage_key.clone(),
                created_by: author_id,
            })
            .await;
        let material = match created {
            Ok(material) => material,
            Err(e) => {
                if let Some(key) = storage_key {
                    self.discard_object(&key).await;
                }
                return Err(e);
            }
        };
        info!(
            "Material {} ({}) published by {}",
            material.id, material.material_type, author_id
        );
        Ok(material)
    }

    /// Mentors may delete their own materials, admins any.
    pub async fn remove(&self, actor_id: Uuid, actor_role: Role, material_id: Uuid) -> PortResult<()> {
        authorize(actor_role, &[Role::Mentor, Role::Admin])?;
        let material = self.db.get_material(material_id).await?;
        if actor_role == Role::Mentor && material.created_by != actor_id {
            return Err(PortError::Forbidden(
                "mentors may only delete their own materials".to_string(),
            ));
        }

        self.db.delete_material(material_id).await?;
        // Links never own a stored file, even when they point into the bucket.
        if let Some(key) = &material.storage_key {
            self.discard_object(key).await;
        }
        Ok(())
    }

    async fn discard_object(&self, key: &str) {
        if let Err(e) = self.storage.delete_object(key).await {
            warn!("Failed to delete stored file {}: {:?}", key, e);
        }
    }
}

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use super::attachment_service::AttachmentService;
use super::instance_writer::delete_instances;
use super::knowledge_service::{KnowledgeOwner, KnowledgeService, NewKnowledgeFile};
use super::sync_service::{SyncReport, SyncService};
use crate::database::entities::{instances, knowledge_files, template_categories, templates};
use crate::errors::{CoreError, CoreResult, DbResultExt};

#[derive(Clone, Debug)]
pub struct NewTemplate {
    pub name: String,
    pub description: Option<String>,
    pub system_instruction: String,
    pub summary_instruction: Option<String>,
    pub model: String,
    pub role: Option<String>,
    pub is_visible: bool,
    pub admin_only: bool,
    pub quick_messages: Vec<String>,
}

/// Partial update; `None` leaves a field untouched. Empty strings clear the
/// optional text fields.
#[derive(Clone, Debug, Default)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub system_instruction: Option<String>,
    pub summary_instruction: Option<String>,
    pub model: Option<String>,
    pub role: Option<String>,
    pub is_visible: Option<bool>,
    pub admin_only: Option<bool>,
    pub quick_messages: Option<Vec<String>>,
}

/// Admin-side template management. Every mutation ends with a sync of the
/// affected categories; sync errors propagate to the admin caller.
#[derive(Clone)]
pub struct TemplateService {
    db: DatabaseConnection,
    attachments: Arc<AttachmentService>,
    sync: Arc<SyncService>,
    knowledge: KnowledgeService,
}

impl TemplateService {
    pub fn new(
        db: DatabaseConnection,
        attachments: Arc<AttachmentService>,
        sync: Arc<SyncService>,
        knowledge: KnowledgeService,
    ) -> Self {
        Self {
            db,
            attachments,
            sync,
            knowledge,
        }
    }

    fn normalize_optional(value: Option<String>) -> Option<String> {
        value.and_then(|value| {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        })
    }

    fn validate_required(field: &str, value: &str) -> CoreResult<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CoreError::validation(format!("Template {} cannot be empty", field)));
        }
        Ok(trimmed.to_string())
    }

    fn serialize_quick_messages(messages: &[String]) -> CoreResult<String> {
        serde_json::to_string(messages)
            .map_err(|e| CoreError::validation(format!("Invalid quick messages: {}", e)))
    }

    pub async fn create_template(
        &self,
        template: NewTemplate,
        category_ids: &[String],
    ) -> CoreResult<templates::Model> {
        let name = Self::validate_required("name", &template.name)?;
        let model = Self::validate_required("model", &template.model)?;
        let quick_messages = Self::serialize_quick_messages(&template.quick_messages)?;
        let now = Utc::now();

        let created = templates::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            name: Set(name),
            description: Set(Self::normalize_optional(template.description)),
            system_instruction: Set(template.system_instruction),
            summary_instruction: Set(Self::normalize_optional(template.summary_instruction)),
            model: Set(model),
            role: Set(Self::normalize_optional(template.role)),
            is_visible: Set(template.is_visible),
            admin_only: Set(template.admin_only),
            quick_messages: Set(quick_messages),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .db_context("create template")?;

        info!(template_id = %created.id, name = %created.name, "Template created");

        if !category_ids.is_empty() {
            self.attachments
                .attach_template(&created.id, category_ids)
                .await?;
        }

        Ok(created)
    }

    /// Applies the given changes and resyncs the template's categories. A
    /// missing template is a not-found error.
    pub async fn update_template(
        &self,
        id: &str,
        update: TemplateUpdate,
    ) -> CoreResult<templates::Model> {
        let existing = self
            .get_template(id)
            .await?
            .ok_or_else(|| CoreError::not_found("template", id))?;

        let mut active: templates::ActiveModel = existing.into();
        if let Some(name) = update.name {
            active.name = Set(Self::validate_required("name", &name)?);
        }
        if let Some(description) = update.description {
            active.description = Set(Self::normalize_optional(Some(description)));
        }
        if let Some(system_instruction) = update.system_instruction {
            active.system_instruction = Set(system_instruction);
        }
        if let Some(summary_instruction) = update.summary_instruction {
            active.summary_instruction = Set(Self::normalize_optional(Some(summary_instruction)));
        }
        if let Some(model) = update.model {
            active.model = Set(Self::validate_required("model", &model)?);
        }
        if let Some(role) = update.role {
            active.role = Set(Self::normalize_optional(Some(role)));
        }
        if let Some(is_visible) = update.is_visible {
            active.is_visible = Set(is_visible);
        }
        if let Some(admin_only) = update.admin_only {
            active.admin_only = Set(admin_only);
        }
        if let Some(quick_messages) = update.quick_messages {
            active.quick_messages = Set(Self::serialize_quick_messages(&quick_messages)?);
        }
        active.updated_at = Set(Utc::now());

        let updated = active
            .update(&self.db)
            .await
            .db_context("update template")?;

        self.sync.sync_template(&updated.id).await?;
        Ok(updated)
    }

    /// Detaches the template everywhere, removes its instances and deletes
    /// it. Returns `None` when the template does not exist.
    pub async fn delete_template(&self, id: &str) -> CoreResult<Option<SyncReport>> {
        if self.get_template(id).await?.is_none() {
            return Ok(None);
        }

        let category_ids = self.attachments.categories_for_template(id).await?;
        template_categories::Entity::delete_many()
            .filter(template_categories::Column::TemplateId.eq(id))
            .exec(&self.db)
            .await
            .db_context("delete template attachments")?;

        let mut report = self.sync.sync_categories(&category_ids).await?;

        let txn = self.db.begin().await.db_context("begin template delete")?;
        let residual: Vec<String> = instances::Entity::find()
            .filter(instances::Column::TemplateId.eq(id))
            .all(&txn)
            .await
            .db_context("load residual instances")?
            .into_iter()
            .map(|instance| instance.id)
            .collect();
        report.removed += delete_instances(&txn, &self.knowledge, &residual).await? as usize;

        knowledge_files::Entity::delete_many()
            .filter(knowledge_files::Column::TemplateId.eq(id))
            .exec(&txn)
            .await
            .db_context("delete template knowledge files")?;
        templates::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .db_context("delete template")?;
        txn.commit().await.db_context("commit template delete")?;

        info!(template_id = id, removed = report.removed, "Template deleted");
        Ok(Some(report))
    }

    /// Stores a knowledge file on the template and reclones it into every
    /// instance. Returns `None` when the template does not exist.
    pub async fn add_knowledge_file(
        &self,
        template_id: &str,
        file: NewKnowledgeFile,
    ) -> CoreResult<Option<knowledge_files::Model>> {
        if self.get_template(template_id).await?.is_none() {
            return Ok(None);
        }

        let stored = self
            .knowledge
            .add_file(
                &self.db,
                &KnowledgeOwner::Template(template_id.to_string()),
                file,
            )
            .await?;

        self.sync.sync_template(template_id).await?;
        Ok(Some(stored))
    }

    pub async fn get_template(&self, id: &str) -> CoreResult<Option<templates::Model>> {
        templates::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .db_context("load template")
    }
}

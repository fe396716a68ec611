use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::EngineConfig;
use crate::database::entities::{instances, knowledge_files, projects, templates};
use crate::errors::CoreResult;
use crate::services::{
    AttachmentService, CategoryService, InstanceService, KnowledgeService, LazyMaterializer,
    NewKnowledgeFile, NewTemplate, ProjectService, SyncReport, SyncService, TemplateService,
    TemplateUpdate,
};

/// Shared application context exposing the engine to the request layer and
/// the CLI.
#[derive(Clone)]
pub struct AppContext {
    db: DatabaseConnection,
    sync_service: Arc<SyncService>,
    attachment_service: Arc<AttachmentService>,
    materializer: Arc<LazyMaterializer>,
    category_service: Arc<CategoryService>,
    template_service: Arc<TemplateService>,
    project_service: Arc<ProjectService>,
    instance_service: Arc<InstanceService>,
}

impl AppContext {
    pub fn new(db: DatabaseConnection, config: &EngineConfig) -> Self {
        let knowledge = KnowledgeService::new(config.knowledge_exclude_prefix.clone());
        let sync_service = Arc::new(SyncService::new(db.clone(), knowledge.clone()));
        let attachment_service = Arc::new(AttachmentService::new(db.clone(), sync_service.clone()));
        let materializer = Arc::new(LazyMaterializer::new(db.clone(), knowledge.clone()));
        let category_service = Arc::new(CategoryService::new(db.clone()));
        let template_service = Arc::new(TemplateService::new(
            db.clone(),
            attachment_service.clone(),
            sync_service.clone(),
            knowledge.clone(),
        ));
        let project_service = Arc::new(ProjectService::new(db.clone(), sync_service.clone()));
        let instance_service = Arc::new(InstanceService::new(
            db.clone(),
            sync_service.clone(),
            knowledge,
        ));

        Self {
            db,
            sync_service,
            attachment_service,
            materializer,
            category_service,
            template_service,
            project_service,
            instance_service,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn categories(&self) -> &CategoryService {
        &self.category_service
    }

    pub fn templates(&self) -> &TemplateService {
        &self.template_service
    }

    pub fn projects(&self) -> &ProjectService {
        &self.project_service
    }

    pub fn instances(&self) -> &InstanceService {
        &self.instance_service
    }

    // ----- Synchronization -------------------------------------------------
    pub async fn sync_category(&self, category_id: &str) -> CoreResult<SyncReport> {
        self.sync_service.sync_category(category_id).await
    }

    pub async fn sync_project(&self, project_id: &str) -> CoreResult<SyncReport> {
        self.sync_service.sync_project(project_id).await
    }

    pub async fn sync_template(&self, template_id: &str) -> CoreResult<SyncReport> {
        self.sync_service.sync_template(template_id).await
    }

    // ----- Attachments -----------------------------------------------------
    pub async fn attach_template(
        &self,
        template_id: &str,
        category_ids: &[String],
    ) -> CoreResult<SyncReport> {
        self.attachment_service
            .attach_template(template_id, category_ids)
            .await
    }

    pub async fn detach_template(
        &self,
        template_id: &str,
        category_id: &str,
    ) -> CoreResult<SyncReport> {
        self.attachment_service
            .detach_template(template_id, category_id)
            .await
    }

    // ----- Lazy materialization -------------------------------------------
    pub async fn get_or_create_instance(
        &self,
        id: &str,
        user_id: &str,
        project_id: Option<&str>,
    ) -> Option<instances::Model> {
        self.materializer
            .get_or_create_instance(id, user_id, project_id)
            .await
    }

    // ----- Admin and user flows -------------------------------------------
    pub async fn create_template(
        &self,
        template: NewTemplate,
        category_ids: &[String],
    ) -> CoreResult<templates::Model> {
        self.template_service
            .create_template(template, category_ids)
            .await
    }

    pub async fn update_template(
        &self,
        id: &str,
        update: TemplateUpdate,
    ) -> CoreResult<templates::Model> {
        self.template_service.update_template(id, update).await
    }

    pub async fn delete_template(&self, id: &str) -> CoreResult<Option<SyncReport>> {
        self.template_service.delete_template(id).await
    }

    pub async fn add_template_knowledge_file(
        &self,
        template_id: &str,
        file: NewKnowledgeFile,
    ) -> CoreResult<Option<knowledge_files::Model>> {
        self.template_service
            .add_knowledge_file(template_id, file)
            .await
    }

    pub async fn create_project(
        &self,
        user_id: &str,
        category_id: &str,
        name: &str,
    ) -> CoreResult<projects::Model> {
        self.project_service
            .create_project(user_id, category_id, name)
            .await
    }

    pub async fn list_project_instances(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> CoreResult<Vec<instances::Model>> {
        self.instance_service
            .list_project_instances(user_id, project_id)
            .await
    }
}

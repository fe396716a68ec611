use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::info;
use uuid::Uuid;

use super::sync_service::SyncService;
use crate::database::entities::{categories, projects};
use crate::errors::{CoreError, CoreResult, DbResultExt};

#[derive(Clone)]
pub struct ProjectService {
    db: DatabaseConnection,
    sync: Arc<SyncService>,
}

impl ProjectService {
    pub fn new(db: DatabaseConnection, sync: Arc<SyncService>) -> Self {
        Self { db, sync }
    }

    /// Creates the project and materializes every template attached to its
    /// category before returning.
    pub async fn create_project(
        &self,
        user_id: &str,
        category_id: &str,
        name: &str,
    ) -> CoreResult<projects::Model> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("Project name cannot be empty"));
        }

        let category = categories::Entity::find_by_id(category_id)
            .one(&self.db)
            .await
            .db_context("load category")?
            .ok_or_else(|| CoreError::not_found("category", category_id))?;

        let now = Utc::now();
        let project = projects::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(user_id.to_string()),
            category_id: Set(category.id),
            name: Set(name.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .db_context("create project")?;

        let report = self.sync.sync_project(&project.id).await?;
        info!(
            project_id = %project.id,
            category_id,
            instances = report.created,
            "Project created"
        );

        Ok(project)
    }

    /// The project if it exists and belongs to the user.
    pub async fn get_project(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> CoreResult<Option<projects::Model>> {
        projects::Entity::find_by_id(project_id)
            .filter(projects::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .db_context("load project")
    }

    pub async fn list_user_projects(&self, user_id: &str) -> CoreResult<Vec<projects::Model>> {
        projects::Entity::find()
            .filter(projects::Column::UserId.eq(user_id))
            .order_by_desc(projects::Column::UpdatedAt)
            .all(&self.db)
            .await
            .db_context("list user projects")
    }
}

use std::sync::Arc;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use tracing::warn;

use super::knowledge_service::{KnowledgeOwner, KnowledgeService};
use super::sync_service::SyncService;
use crate::database::entities::{instances, knowledge_files, projects};
use crate::errors::{CoreResult, DbResultExt};

/// User-facing reads of materialized instances.
#[derive(Clone)]
pub struct InstanceService {
    db: DatabaseConnection,
    sync: Arc<SyncService>,
    knowledge: KnowledgeService,
}

impl InstanceService {
    pub fn new(db: DatabaseConnection, sync: Arc<SyncService>, knowledge: KnowledgeService) -> Self {
        Self {
            db,
            sync,
            knowledge,
        }
    }

    /// Lists the user's instances in a project, reconciling the project first.
    /// A failed reconcile is logged and the stored instances are returned
    /// as they are.
    pub async fn list_project_instances(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> CoreResult<Vec<instances::Model>> {
        let owned = projects::Entity::find_by_id(project_id)
            .filter(projects::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .db_context("load project")?;
        if owned.is_none() {
            return Ok(Vec::new());
        }

        if let Err(e) = self.sync.sync_project(project_id).await {
            warn!(project_id, user_id, error = %e, "Self-heal sync failed; serving stored instances");
        }

        instances::Entity::find()
            .filter(instances::Column::ProjectId.eq(project_id))
            .filter(instances::Column::UserId.eq(user_id))
            .order_by_asc(instances::Column::Order)
            .order_by_asc(instances::Column::CreatedAt)
            .all(&self.db)
            .await
            .db_context("list project instances")
    }

    pub async fn list_instance_knowledge(
        &self,
        user_id: &str,
        instance_id: &str,
    ) -> CoreResult<Vec<knowledge_files::Model>> {
        let owned = instances::Entity::find_by_id(instance_id)
            .filter(instances::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .db_context("load instance")?;
        if owned.is_none() {
            return Ok(Vec::new());
        }

        self.knowledge
            .list_files(&self.db, &KnowledgeOwner::Instance(instance_id.to_string()))
            .await
    }
}

use std::time::Duration;

use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait,
};
use tracing::{debug, error, info};

use super::instance_resolver::{find_materialized, MatchKind};
use super::instance_writer::{insert_or_fetch, next_user_order};
use super::knowledge_service::{KnowledgeOwner, KnowledgeService};
use crate::database::entities::{instances, projects, template_categories, templates};
use crate::errors::{CoreError, CoreErrorKind, CoreResult, DbResultExt};

/// Attempts at the create transaction before a busy store is reported.
const CREATE_ATTEMPTS: u32 = 8;
const RETRY_BACKOFF: Duration = Duration::from_millis(15);

/// Resolves ids from user requests that may name a template instead of an
/// already materialized instance, creating the instance on first use.
#[derive(Clone)]
pub struct LazyMaterializer {
    db: DatabaseConnection,
    knowledge: KnowledgeService,
}

impl LazyMaterializer {
    pub fn new(db: DatabaseConnection, knowledge: KnowledgeService) -> Self {
        Self { db, knowledge }
    }

    /// Returns the user's instance for `id`, materializing it from a template
    /// into `project_id` when needed.
    ///
    /// `None` covers unknown ids, template previews without a project,
    /// projects the user does not own, templates not attached to the
    /// project's category, and store failures (which are logged here).
    pub async fn get_or_create_instance(
        &self,
        id: &str,
        user_id: &str,
        project_id: Option<&str>,
    ) -> Option<instances::Model> {
        match self.resolve(id, user_id, project_id).await {
            Ok(instance) => instance,
            Err(e) => {
                error!(
                    id,
                    user_id,
                    project_id = project_id.unwrap_or("-"),
                    error = %e,
                    "Failed to get or create instance"
                );
                None
            }
        }
    }

    async fn resolve(
        &self,
        id: &str,
        user_id: &str,
        project_id: Option<&str>,
    ) -> CoreResult<Option<instances::Model>> {
        let existing = instances::Entity::find_by_id(id)
            .filter(instances::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .db_context("find instance")?;
        if existing.is_some() {
            return Ok(existing);
        }

        let Some(template) = templates::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .db_context("find template")?
        else {
            debug!(id, user_id, "Id is neither an instance nor a template");
            return Ok(None);
        };

        let Some(project_id) = project_id else {
            debug!(template_id = %template.id, "No project given; template cannot be materialized");
            return Ok(None);
        };

        let Some(project) = projects::Entity::find_by_id(project_id)
            .filter(projects::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .db_context("find project")?
        else {
            debug!(project_id, user_id, "Project not found for user");
            return Ok(None);
        };

        let attachment = template_categories::Entity::find()
            .filter(template_categories::Column::TemplateId.eq(template.id.as_str()))
            .filter(template_categories::Column::CategoryId.eq(project.category_id.as_str()))
            .one(&self.db)
            .await
            .db_context("find template attachment")?;
        if attachment.is_none() {
            debug!(
                template_id = %template.id,
                category_id = %project.category_id,
                "Template is not attached to the project's category"
            );
            return Ok(None);
        }

        if let Some(resolved) = find_materialized(&self.db, user_id, &project, &template).await? {
            if resolved.kind == MatchKind::LegacyName {
                info!(
                    instance_id = %resolved.instance.id,
                    template_id = %template.id,
                    "Legacy name match for lazy materialization"
                );
            }
            return Ok(Some(resolved.instance));
        }

        let mut attempt = 1;
        loop {
            match self.create(user_id, &project, &template).await {
                Ok(instance) => return Ok(Some(instance)),
                Err(e) if attempt < CREATE_ATTEMPTS && Self::lost_race(&e) => {
                    // another request may hold the slot by now
                    match find_materialized(&self.db, user_id, &project, &template).await {
                        Ok(Some(resolved)) => {
                            debug!(
                                instance_id = %resolved.instance.id,
                                template_id = %template.id,
                                attempt,
                                "Concurrent request materialized the instance first"
                            );
                            return Ok(Some(resolved.instance));
                        }
                        Ok(None) => {}
                        Err(lookup) if lookup.is_retryable() => {}
                        Err(lookup) => return Err(lookup),
                    }
                    debug!(
                        template_id = %template.id,
                        project_id = %project.id,
                        attempt,
                        error = %e,
                        "Retrying instance materialization"
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn lost_race(error: &CoreError) -> bool {
        error.is_retryable() || error.kind() == CoreErrorKind::Conflict
    }

    /// Inserts the instance and clones its knowledge in one transaction. When
    /// the (project, template) slot is already taken the existing row is
    /// returned untouched.
    async fn create(
        &self,
        user_id: &str,
        project: &projects::Model,
        template: &templates::Model,
    ) -> CoreResult<instances::Model> {
        let txn = self.db.begin().await.db_context("begin materialization")?;
        let (instance, created, order) = match self
            .insert_with_knowledge(&txn, user_id, project, template)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                // release the read lock before the caller retries
                if let Err(rollback) = txn.rollback().await {
                    debug!(error = %rollback, "Rollback of failed materialization failed");
                }
                return Err(e);
            }
        };
        txn.commit().await.db_context("commit materialization")?;

        if created {
            info!(
                instance_id = %instance.id,
                template_id = %template.id,
                project_id = %project.id,
                order,
                "Materialized instance on demand"
            );
        }
        Ok(instance)
    }

    async fn insert_with_knowledge<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        project: &projects::Model,
        template: &templates::Model,
    ) -> CoreResult<(instances::Model, bool, i32)> {
        let order = next_user_order(conn, user_id).await?;
        let (instance, created) = insert_or_fetch(conn, project, template, order).await?;
        if created {
            self.knowledge
                .clone_knowledge(conn, &KnowledgeOwner::Template(template.id.clone()), &instance.id)
                .await?;
        }
        Ok((instance, created, order))
    }
}

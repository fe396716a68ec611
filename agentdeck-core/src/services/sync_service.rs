//! Bulk reconciliation of project instances against category attachments.
//!
//! Each project is reconciled in its own transaction. A failure partway
//! through a category leaves earlier projects committed; the error is logged
//! and returned to the caller.

use std::collections::{HashMap, HashSet};

use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::Serialize;
use tracing::{debug, error, info};

use super::instance_resolver::{InstanceResolver, MatchKind};
use super::instance_writer::{apply_template, delete_instances, insert_or_fetch};
use super::knowledge_service::KnowledgeService;
use crate::database::entities::{
    instances, knowledge_files, projects, template_categories, templates,
};
use crate::errors::{CoreResult, DbResultExt};

/// Counts from one sync call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub projects: usize,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

impl SyncReport {
    pub fn absorb(&mut self, other: SyncReport) {
        self.projects += other.projects;
        self.created += other.created;
        self.updated += other.updated;
        self.removed += other.removed;
    }
}

struct PlanEntry {
    attachment: template_categories::Model,
    template: templates::Model,
}

/// Everything a category's projects are reconciled against, loaded once per
/// sync call.
struct CategoryPlan {
    category_id: String,
    entries: Vec<PlanEntry>,
    attached: HashSet<String>,
    knowledge: HashMap<String, Vec<knowledge_files::Model>>,
}

impl CategoryPlan {
    fn files_for(&self, template_id: &str) -> &[knowledge_files::Model] {
        self.knowledge
            .get(template_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Clone)]
pub struct SyncService {
    db: DatabaseConnection,
    knowledge: KnowledgeService,
}

impl SyncService {
    pub fn new(db: DatabaseConnection, knowledge: KnowledgeService) -> Self {
        Self { db, knowledge }
    }

    /// Reconciles every project in the category.
    pub async fn sync_category(&self, category_id: &str) -> CoreResult<SyncReport> {
        let plan = self.load_plan(category_id).await.map_err(|e| {
            error!(category_id, error = %e, "Failed to load category attachments");
            e
        })?;

        if plan.entries.is_empty() {
            info!(
                category_id,
                "No templates attached to category; only pruning orphaned instances"
            );
        }

        let projects = projects::Entity::find()
            .filter(projects::Column::CategoryId.eq(category_id))
            .order_by_asc(projects::Column::CreatedAt)
            .all(&self.db)
            .await
            .db_context("load category projects")
            .map_err(|e| {
                error!(category_id, error = %e, "Failed to load projects for sync");
                e
            })?;

        let mut report = SyncReport::default();
        for project in &projects {
            match self.sync_project_with_plan(project, &plan).await {
                Ok(project_report) => report.absorb(project_report),
                Err(e) => {
                    error!(
                        category_id,
                        project_id = %project.id,
                        synced = report.projects,
                        remaining = projects.len() - report.projects,
                        error = %e,
                        "Project sync failed; earlier projects stay committed"
                    );
                    return Err(e.with_field("project_id", project.id.clone()));
                }
            }
        }

        info!(
            category_id,
            projects = report.projects,
            created = report.created,
            updated = report.updated,
            removed = report.removed,
            "Category sync complete"
        );
        Ok(report)
    }

    /// Reconciles a single project. Used after project creation and as the
    /// self-heal step of instance-list reads. A missing project is a no-op.
    pub async fn sync_project(&self, project_id: &str) -> CoreResult<SyncReport> {
        let project = projects::Entity::find_by_id(project_id)
            .one(&self.db)
            .await
            .db_context("load project")?;

        let Some(project) = project else {
            debug!(project_id, "Project not found; nothing to sync");
            return Ok(SyncReport::default());
        };

        let plan = self.load_plan(&project.category_id).await?;
        self.sync_project_with_plan(&project, &plan)
            .await
            .map_err(|e| {
                error!(project_id, category_id = %project.category_id, error = %e, "Project sync failed");
                e
            })
    }

    /// Reconciles every category the template is attached to.
    pub async fn sync_template(&self, template_id: &str) -> CoreResult<SyncReport> {
        let category_ids: Vec<String> = template_categories::Entity::find()
            .filter(template_categories::Column::TemplateId.eq(template_id))
            .order_by_asc(template_categories::Column::CreatedAt)
            .all(&self.db)
            .await
            .db_context("load template categories")?
            .into_iter()
            .map(|attachment| attachment.category_id)
            .collect();

        if category_ids.is_empty() {
            debug!(template_id, "Template is not attached to any category");
        }

        self.sync_categories(&category_ids).await
    }

    pub async fn sync_categories(&self, category_ids: &[String]) -> CoreResult<SyncReport> {
        let mut report = SyncReport::default();
        let mut seen = HashSet::new();
        for category_id in category_ids {
            if seen.insert(category_id.as_str()) {
                report.absorb(self.sync_category(category_id).await?);
            }
        }
        Ok(report)
    }

    async fn load_plan(&self, category_id: &str) -> CoreResult<CategoryPlan> {
        let rows = template_categories::Entity::find()
            .filter(template_categories::Column::CategoryId.eq(category_id))
            .order_by_asc(template_categories::Column::Order)
            .order_by_asc(template_categories::Column::CreatedAt)
            .find_also_related(templates::Entity)
            .all(&self.db)
            .await
            .db_context("load category attachments")?;

        let entries: Vec<PlanEntry> = rows
            .into_iter()
            .filter_map(|(attachment, template)| {
                template.map(|template| PlanEntry {
                    attachment,
                    template,
                })
            })
            .collect();

        let template_ids: Vec<String> = entries
            .iter()
            .map(|entry| entry.template.id.clone())
            .collect();
        let knowledge = self
            .knowledge
            .preload_for_templates(&self.db, &template_ids)
            .await?;

        Ok(CategoryPlan {
            category_id: category_id.to_string(),
            attached: template_ids.into_iter().collect(),
            entries,
            knowledge,
        })
    }

    async fn sync_project_with_plan(
        &self,
        project: &projects::Model,
        plan: &CategoryPlan,
    ) -> CoreResult<SyncReport> {
        let txn = self.db.begin().await.db_context("begin project sync")?;
        // dropping txn on error rolls the project back
        let report = self.reconcile_project(&txn, project, plan).await?;
        txn.commit().await.db_context("commit project sync")?;
        Ok(report)
    }

    async fn reconcile_project<C: ConnectionTrait>(
        &self,
        conn: &C,
        project: &projects::Model,
        plan: &CategoryPlan,
    ) -> CoreResult<SyncReport> {
        let existing = instances::Entity::find()
            .filter(instances::Column::ProjectId.eq(project.id.as_str()))
            .order_by_asc(instances::Column::Order)
            .order_by_asc(instances::Column::CreatedAt)
            .all(conn)
            .await
            .db_context("load project instances")?;

        let mut resolver = InstanceResolver::new(&existing, &plan.attached);
        let mut report = SyncReport {
            projects: 1,
            ..SyncReport::default()
        };

        for entry in &plan.entries {
            let template = &entry.template;
            let order = entry.attachment.order;
            let files = plan.files_for(&template.id);

            let matched = match resolver.take(&template.id, &template.name) {
                Some(resolved) => {
                    if resolved.kind == MatchKind::LegacyName {
                        info!(
                            project_id = %project.id,
                            instance_id = %resolved.instance.id,
                            template_id = %template.id,
                            "Legacy name match; attaching template back-reference"
                        );
                    }
                    Some(resolved.instance)
                }
                None => {
                    let (instance, created) =
                        insert_or_fetch(conn, project, template, order).await?;
                    if created {
                        self.knowledge.copy_files(conn, files, &instance.id).await?;
                        report.created += 1;
                        None
                    } else {
                        Some(instance)
                    }
                }
            };

            if let Some(instance) = matched {
                let (instance, changed) = apply_template(conn, instance, template, order).await?;
                self.knowledge
                    .delete_instance_knowledge(conn, std::slice::from_ref(&instance.id))
                    .await?;
                self.knowledge.copy_files(conn, files, &instance.id).await?;
                if changed {
                    report.updated += 1;
                }
            }
        }

        let orphans = resolver.orphans();
        if !orphans.is_empty() {
            debug!(
                project_id = %project.id,
                category_id = %plan.category_id,
                count = orphans.len(),
                "Removing orphaned instances"
            );
            report.removed = delete_instances(conn, &self.knowledge, &orphans).await? as usize;
        }

        Ok(report)
    }
}

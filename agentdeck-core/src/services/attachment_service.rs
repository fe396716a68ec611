use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::sync_service::{SyncReport, SyncService};
use crate::database::entities::{categories, template_categories, templates};
use crate::errors::{CoreResult, DbResultExt};

/// Computes the order for each requested category. Existing attachments keep
/// their previous order; new ones go after the highest order currently in
/// that category, or to 0 in an empty category.
pub fn plan_attachment_orders(
    requested: &[String],
    previous: &HashMap<String, i32>,
    category_max: &HashMap<String, i32>,
) -> Vec<(String, i32)> {
    requested
        .iter()
        .map(|category_id| {
            let order = previous.get(category_id).copied().unwrap_or_else(|| {
                category_max
                    .get(category_id)
                    .map(|max| max + 1)
                    .unwrap_or(0)
            });
            (category_id.clone(), order)
        })
        .collect()
}

fn dedupe(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Maintains template-to-category attachments and their ordering.
#[derive(Clone)]
pub struct AttachmentService {
    db: DatabaseConnection,
    sync: Arc<SyncService>,
}

impl AttachmentService {
    pub fn new(db: DatabaseConnection, sync: Arc<SyncService>) -> Self {
        Self { db, sync }
    }

    /// Replaces the template's whole attachment set with `category_ids`, then
    /// synchronizes every category that gained or lost the template.
    pub async fn attach_template(
        &self,
        template_id: &str,
        category_ids: &[String],
    ) -> CoreResult<SyncReport> {
        let requested = dedupe(category_ids);
        let txn = self.db.begin().await.db_context("begin attach")?;

        let template = templates::Entity::find_by_id(template_id)
            .one(&txn)
            .await
            .db_context("load template")?;
        if template.is_none() {
            warn!(template_id, "Cannot attach unknown template");
            return Ok(SyncReport::default());
        }

        let known: HashSet<String> = categories::Entity::find()
            .filter(categories::Column::Id.is_in(requested.iter().cloned()))
            .all(&txn)
            .await
            .db_context("load categories")?
            .into_iter()
            .map(|category| category.id)
            .collect();
        let requested: Vec<String> = requested
            .into_iter()
            .filter(|category_id| {
                let exists = known.contains(category_id);
                if !exists {
                    warn!(template_id, category_id = %category_id, "Skipping unknown category");
                }
                exists
            })
            .collect();

        let previous_rows = template_categories::Entity::find()
            .filter(template_categories::Column::TemplateId.eq(template_id))
            .all(&txn)
            .await
            .db_context("load previous attachments")?;
        let previous: HashMap<String, i32> = previous_rows
            .iter()
            .map(|row| (row.category_id.clone(), row.order))
            .collect();

        let new_categories: Vec<String> = requested
            .iter()
            .filter(|category_id| !previous.contains_key(*category_id))
            .cloned()
            .collect();
        let mut category_max: HashMap<String, i32> = HashMap::new();
        if !new_categories.is_empty() {
            let siblings = template_categories::Entity::find()
                .filter(template_categories::Column::CategoryId.is_in(new_categories))
                .order_by_asc(template_categories::Column::Order)
                .all(&txn)
                .await
                .db_context("load sibling attachments")?;
            for sibling in siblings {
                category_max
                    .entry(sibling.category_id)
                    .and_modify(|max| *max = (*max).max(sibling.order))
                    .or_insert(sibling.order);
            }
        }

        let planned = plan_attachment_orders(&requested, &previous, &category_max);

        template_categories::Entity::delete_many()
            .filter(template_categories::Column::TemplateId.eq(template_id))
            .exec(&txn)
            .await
            .db_context("delete previous attachments")?;

        if !planned.is_empty() {
            let now = Utc::now();
            let rows = planned
                .iter()
                .map(|(category_id, order)| template_categories::ActiveModel {
                    id: Set(Uuid::new_v4().to_string()),
                    template_id: Set(template_id.to_string()),
                    category_id: Set(category_id.clone()),
                    order: Set(*order),
                    created_at: Set(now),
                });
            template_categories::Entity::insert_many(rows)
                .exec_without_returning(&txn)
                .await
                .db_context("insert attachments")?;
        }

        txn.commit().await.db_context("commit attach")?;

        info!(
            template_id,
            previous = previous_rows.len(),
            current = planned.len(),
            "Template attachments replaced"
        );

        let affected: Vec<String> = previous_rows
            .into_iter()
            .map(|row| row.category_id)
            .chain(planned.into_iter().map(|(category_id, _)| category_id))
            .collect();
        self.sync.sync_categories(&dedupe(&affected)).await
    }

    /// Removes one attachment and resynchronizes the category.
    pub async fn detach_template(
        &self,
        template_id: &str,
        category_id: &str,
    ) -> CoreResult<SyncReport> {
        let result = template_categories::Entity::delete_many()
            .filter(template_categories::Column::TemplateId.eq(template_id))
            .filter(template_categories::Column::CategoryId.eq(category_id))
            .exec(&self.db)
            .await
            .db_context("delete attachment")?;

        if result.rows_affected == 0 {
            debug!(template_id, category_id, "Template was not attached to category");
        }

        self.sync.sync_category(category_id).await
    }

    pub async fn categories_for_template(&self, template_id: &str) -> CoreResult<Vec<String>> {
        let rows = template_categories::Entity::find()
            .filter(template_categories::Column::TemplateId.eq(template_id))
            .order_by_asc(template_categories::Column::CreatedAt)
            .all(&self.db)
            .await
            .db_context("load template categories")?;

        Ok(rows.into_iter().map(|row| row.category_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn existing_attachment_keeps_its_order() {
        let previous = HashMap::from([("c1".to_string(), 1)]);
        let category_max = HashMap::from([("c1".to_string(), 5)]);
        let planned = plan_attachment_orders(&ids(&["c1"]), &previous, &category_max);
        assert_eq!(planned, vec![("c1".to_string(), 1)]);
    }

    #[test]
    fn new_attachment_appends_after_siblings() {
        let category_max = HashMap::from([("c1".to_string(), 3)]);
        let planned = plan_attachment_orders(&ids(&["c1", "c2"]), &HashMap::new(), &category_max);
        assert_eq!(
            planned,
            vec![("c1".to_string(), 4), ("c2".to_string(), 0)]
        );
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        assert_eq!(dedupe(&ids(&["a", "b", "a", "c"])), ids(&["a", "b", "c"]));
    }
}

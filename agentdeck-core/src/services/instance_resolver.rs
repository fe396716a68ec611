//! Matching existing instances to templates.
//!
//! Matching goes by template back-reference first. Instances created before
//! the back-reference column existed are found by a legacy name match against
//! the template's current name.
//
// TODO: drop the legacy name match once every instance row has template_id set.

use std::collections::{HashMap, HashSet};

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::database::entities::{instances, projects, template_categories, templates};
use crate::errors::{CoreResult, DbResultExt};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    /// `instance.template_id` equals the template id.
    BackReference,
    /// Legacy name match: the instance has no usable back-reference but
    /// carries the template's name.
    LegacyName,
}

#[derive(Clone, Debug)]
pub struct ResolvedInstance {
    pub instance: instances::Model,
    pub kind: MatchKind,
}

/// One project's existing instances, partitioned for matching against the
/// category's current attachment set. Every instance is handed out at most
/// once.
#[derive(Debug)]
pub struct InstanceResolver {
    by_template: HashMap<String, instances::Model>,
    legacy_by_name: HashMap<String, instances::Model>,
    consumed: HashSet<String>,
    managed: Vec<(String, String)>,
    attached: HashSet<String>,
}

impl InstanceResolver {
    /// `existing` should be in display order; on duplicate keys the first
    /// instance wins.
    pub fn new(existing: &[instances::Model], attached: &HashSet<String>) -> Self {
        let mut by_template = HashMap::new();
        let mut legacy_by_name = HashMap::new();
        let mut managed = Vec::new();

        for instance in existing {
            match &instance.template_id {
                Some(template_id) if attached.contains(template_id) => {
                    by_template
                        .entry(template_id.clone())
                        .or_insert_with(|| instance.clone());
                }
                // missing or stale back-reference
                _ => {
                    legacy_by_name
                        .entry(instance.name.clone())
                        .or_insert_with(|| instance.clone());
                }
            }

            if let Some(template_id) = &instance.template_id {
                managed.push((instance.id.clone(), template_id.clone()));
            }
        }

        Self {
            by_template,
            legacy_by_name,
            consumed: HashSet::new(),
            managed,
            attached: attached.clone(),
        }
    }

    pub fn take(&mut self, template_id: &str, template_name: &str) -> Option<ResolvedInstance> {
        if let Some(instance) = self.by_template.remove(template_id) {
            return self.consume(instance, MatchKind::BackReference);
        }

        let instance = self.legacy_by_name.remove(template_name)?;
        self.consume(instance, MatchKind::LegacyName)
    }

    fn consume(&mut self, instance: instances::Model, kind: MatchKind) -> Option<ResolvedInstance> {
        if !self.consumed.insert(instance.id.clone()) {
            return None;
        }
        self.by_template.retain(|_, other| other.id != instance.id);
        self.legacy_by_name.retain(|_, other| other.id != instance.id);
        Some(ResolvedInstance { instance, kind })
    }

    /// Instances that point at a template no longer attached to the category
    /// and were not adopted by a legacy name match. Instances without a
    /// back-reference are never orphans.
    pub fn orphans(&self) -> Vec<String> {
        self.managed
            .iter()
            .filter(|(id, template_id)| {
                !self.attached.contains(template_id) && !self.consumed.contains(id)
            })
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// Finds the instance a template was materialized into for one user's project.
///
/// The name fallback follows the same rule as [`InstanceResolver`]: only
/// instances without a back-reference, or whose back-reference points at a
/// template no longer attached to the project's category, can be adopted.
pub async fn find_materialized<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    project: &projects::Model,
    template: &templates::Model,
) -> CoreResult<Option<ResolvedInstance>> {
    let by_reference = instances::Entity::find()
        .filter(instances::Column::ProjectId.eq(project.id.as_str()))
        .filter(instances::Column::TemplateId.eq(template.id.as_str()))
        .one(conn)
        .await
        .db_context("find instance by template")?;
    if let Some(instance) = by_reference {
        return Ok(Some(ResolvedInstance {
            instance,
            kind: MatchKind::BackReference,
        }));
    }

    let candidates = instances::Entity::find()
        .filter(instances::Column::UserId.eq(user_id))
        .filter(instances::Column::ProjectId.eq(project.id.as_str()))
        .filter(instances::Column::Name.eq(template.name.as_str()))
        .order_by_asc(instances::Column::CreatedAt)
        .all(conn)
        .await
        .db_context("find instances by name")?;
    if candidates.is_empty() {
        return Ok(None);
    }

    let attached: HashSet<String> = template_categories::Entity::find()
        .filter(template_categories::Column::CategoryId.eq(project.category_id.as_str()))
        .all(conn)
        .await
        .db_context("load category attachments")?
        .into_iter()
        .map(|attachment| attachment.template_id)
        .collect();

    Ok(candidates
        .into_iter()
        .find(|instance| match &instance.template_id {
            Some(template_id) => !attached.contains(template_id),
            None => true,
        })
        .map(|instance| ResolvedInstance {
            instance,
            kind: MatchKind::LegacyName,
        }))
}

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::debug;
use uuid::Uuid;

use super::knowledge_service::KnowledgeService;
use crate::database::entities::{instances, projects, templates};
use crate::errors::{CoreError, CoreResult, DbResultExt};

/// True when the instance already carries the template's copyable fields,
/// the attachment order and the back-reference.
pub fn in_sync(instance: &instances::Model, template: &templates::Model, order: i32) -> bool {
    instance.template_id.as_deref() == Some(template.id.as_str())
        && instance.name == template.name
        && instance.description == template.description
        && instance.system_instruction == template.system_instruction
        && instance.summary_instruction == template.summary_instruction
        && instance.model == template.model
        && instance.role == template.role
        && instance.order == order
}

/// Overwrites the instance's copyable fields from the template. Returns the
/// stored row and whether anything changed.
pub async fn apply_template<C: ConnectionTrait>(
    conn: &C,
    instance: instances::Model,
    template: &templates::Model,
    order: i32,
) -> CoreResult<(instances::Model, bool)> {
    if in_sync(&instance, template, order) {
        return Ok((instance, false));
    }

    let instance_id = instance.id.clone();
    let mut active: instances::ActiveModel = instance.into();
    active.template_id = Set(Some(template.id.clone()));
    active.name = Set(template.name.clone());
    active.description = Set(template.description.clone());
    active.system_instruction = Set(template.system_instruction.clone());
    active.summary_instruction = Set(template.summary_instruction.clone());
    active.model = Set(template.model.clone());
    active.role = Set(template.role.clone());
    active.order = Set(order);
    active.updated_at = Set(Utc::now());

    let updated = active
        .update(conn)
        .await
        .db_context("update instance from template")
        .map_err(|e| e.with_field("instance_id", instance_id))?;

    Ok((updated, true))
}

/// Inserts an instance of `template` into `project`, or returns the row that
/// already holds the (project, template) slot. The bool is true when this
/// call created the row.
pub async fn insert_or_fetch<C: ConnectionTrait>(
    conn: &C,
    project: &projects::Model,
    template: &templates::Model,
    order: i32,
) -> CoreResult<(instances::Model, bool)> {
    let now = Utc::now();
    let id = Uuid::new_v4().to_string();

    let active = instances::ActiveModel {
        id: Set(id.clone()),
        project_id: Set(project.id.clone()),
        user_id: Set(project.user_id.clone()),
        template_id: Set(Some(template.id.clone())),
        name: Set(template.name.clone()),
        description: Set(template.description.clone()),
        system_instruction: Set(template.system_instruction.clone()),
        summary_instruction: Set(template.summary_instruction.clone()),
        model: Set(template.model.clone()),
        role: Set(template.role.clone()),
        order: Set(order),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let inserted = instances::Entity::insert(active)
        .on_conflict(
            OnConflict::columns([instances::Column::ProjectId, instances::Column::TemplateId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .db_context("insert instance")?;

    let created = inserted > 0;
    let query = if created {
        instances::Entity::find_by_id(id)
    } else {
        debug!(
            project_id = %project.id,
            template_id = %template.id,
            "Instance slot already taken; returning existing row"
        );
        instances::Entity::find()
            .filter(instances::Column::ProjectId.eq(project.id.as_str()))
            .filter(instances::Column::TemplateId.eq(template.id.as_str()))
    };

    let instance = query
        .one(conn)
        .await
        .db_context("reload instance")?
        .ok_or_else(|| {
            CoreError::conflict("Instance slot is taken but the row is not visible")
                .with_field("project_id", project.id.clone())
                .with_field("template_id", template.id.clone())
        })?;

    Ok((instance, created))
}

/// Next free position among all of a user's instances.
pub async fn next_user_order<C: ConnectionTrait>(conn: &C, user_id: &str) -> CoreResult<i32> {
    let last = instances::Entity::find()
        .filter(instances::Column::UserId.eq(user_id))
        .order_by_desc(instances::Column::Order)
        .one(conn)
        .await
        .db_context("load highest instance order")?;

    Ok(last.map(|instance| instance.order + 1).unwrap_or(0))
}

pub async fn delete_instances<C: ConnectionTrait>(
    conn: &C,
    knowledge: &KnowledgeService,
    instance_ids: &[String],
) -> CoreResult<u64> {
    if instance_ids.is_empty() {
        return Ok(0);
    }

    knowledge.delete_all_for_instances(conn, instance_ids).await?;

    let result = instances::Entity::delete_many()
        .filter(instances::Column::Id.is_in(instance_ids.iter().cloned()))
        .exec(conn)
        .await
        .db_context("delete instances")?;

    Ok(result.rows_affected)
}

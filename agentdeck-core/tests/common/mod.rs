#![allow(dead_code)]

use std::path::Path;

use agentdeck_core::config::EngineConfig;
use agentdeck_core::database::connection::{establish_connection, get_database_url};
use agentdeck_core::database::entities::{instances, knowledge_files, template_categories};
use agentdeck_core::database::migrations::Migrator;
use agentdeck_core::services::{NewKnowledgeFile, NewTemplate};
use agentdeck_core::AppContext;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use sea_orm_migration::MigratorTrait;

/// In-memory SQLite database with all migrations applied.
pub async fn setup_context() -> AppContext {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    AppContext::new(db, &EngineConfig::default())
}

/// File-backed SQLite database with a multi-connection pool, for tests that
/// need real write contention.
pub async fn setup_file_context(path: &Path) -> AppContext {
    let url = get_database_url(path.to_str());
    let db = establish_connection(&url).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    AppContext::new(db, &EngineConfig::default())
}

/// Attaches a template without running a sync, so existing projects have no
/// instance of it yet.
pub async fn attach_without_sync(ctx: &AppContext, template_id: &str, category_id: &str) {
    template_categories::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        template_id: Set(template_id.to_string()),
        category_id: Set(category_id.to_string()),
        order: Set(0),
        created_at: Set(Utc::now()),
    }
    .insert(ctx.db())
    .await
    .unwrap();
}

/// Makes every instance insert into the project fail inside the store.
pub async fn fail_instance_inserts(ctx: &AppContext, project_id: &str) {
    let sql = format!(
        "CREATE TRIGGER reject_instances_{suffix} BEFORE INSERT ON instances \
         WHEN NEW.project_id = '{project_id}' \
         BEGIN SELECT RAISE(ABORT, 'instance inserts disabled'); END;",
        suffix = project_id.replace('-', "_"),
    );
    ctx.db().execute_unprepared(&sql).await.unwrap();
}

pub fn template(name: &str) -> NewTemplate {
    NewTemplate {
        name: name.to_string(),
        description: Some(format!("{} agent", name)),
        system_instruction: format!("You are {}.", name),
        summary_instruction: Some("Summarise the conversation.".to_string()),
        model: "gpt-4o".to_string(),
        role: Some("assistant".to_string()),
        is_visible: true,
        admin_only: false,
        quick_messages: vec!["Hello".to_string()],
    }
}

pub fn knowledge(name: &str) -> NewKnowledgeFile {
    NewKnowledgeFile {
        name: name.to_string(),
        mime_type: "text/plain".to_string(),
        content: format!("contents of {}", name).into_bytes(),
        is_knowledge_base: true,
    }
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub async fn project_instances(ctx: &AppContext, project_id: &str) -> Vec<instances::Model> {
    instances::Entity::find()
        .filter(instances::Column::ProjectId.eq(project_id))
        .order_by_asc(instances::Column::Order)
        .order_by_asc(instances::Column::CreatedAt)
        .all(ctx.db())
        .await
        .unwrap()
}

pub async fn instance_files(ctx: &AppContext, instance_id: &str) -> Vec<knowledge_files::Model> {
    knowledge_files::Entity::find()
        .filter(knowledge_files::Column::InstanceId.eq(instance_id))
        .order_by_asc(knowledge_files::Column::CreatedAt)
        .all(ctx.db())
        .await
        .unwrap()
}

pub async fn attachment_order(ctx: &AppContext, template_id: &str, category_id: &str) -> Option<i32> {
    template_categories::Entity::find()
        .filter(template_categories::Column::TemplateId.eq(template_id))
        .filter(template_categories::Column::CategoryId.eq(category_id))
        .one(ctx.db())
        .await
        .unwrap()
        .map(|row| row.order)
}

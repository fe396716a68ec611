use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Admin-authored agent configuration. Projects never use a template
/// directly; they get per-user instances materialized from it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "templates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub system_instruction: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub summary_instruction: Option<String>,
    pub model: String,
    pub role: Option<String>,
    pub is_visible: bool,
    pub admin_only: bool,
    /// JSON array of canned prompts shown in the chat box.
    #[sea_orm(column_type = "Text", default_value = "[]")]
    pub quick_messages: String,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::template_categories::Entity")]
    TemplateCategories,
    #[sea_orm(has_many = "super::instances::Entity")]
    Instances,
    #[sea_orm(has_many = "super::knowledge_files::Entity")]
    KnowledgeFiles,
}

impl Related<super::template_categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TemplateCategories.def()
    }
}

impl Related<super::instances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instances.def()
    }
}

impl Related<super::knowledge_files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::KnowledgeFiles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn quick_messages(&self) -> Vec<String> {
        serde_json::from_str(&self.quick_messages).unwrap_or_default()
    }
}

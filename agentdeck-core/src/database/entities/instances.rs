use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A per-project, per-user copy of a template.
///
/// `template_id` is the back-reference to the originating template. Rows
/// without it come from manual or legacy paths and are left alone by orphan
/// cleanup. `(project_id, template_id)` is unique.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "instances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub template_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub system_instruction: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub summary_instruction: Option<String>,
    pub model: String,
    pub role: Option<String>,
    pub order: i32,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::projects::Entity",
        from = "Column::ProjectId",
        to = "super::projects::Column::Id",
        on_delete = "Cascade"
    )]
    Projects,
    #[sea_orm(
        belongs_to = "super::templates::Entity",
        from = "Column::TemplateId",
        to = "super::templates::Column::Id",
        on_delete = "SetNull"
    )]
    Templates,
    #[sea_orm(has_many = "super::knowledge_files::Entity")]
    KnowledgeFiles,
}

impl Related<super::projects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Projects.def()
    }
}

impl Related<super::templates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Templates.def()
    }
}

impl Related<super::knowledge_files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::KnowledgeFiles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

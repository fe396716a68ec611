use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A file owned by exactly one of a template or an instance.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "knowledge_files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub template_id: Option<String>,
    pub instance_id: Option<String>,
    pub name: String,
    pub mime_type: String,
    #[sea_orm(column_type = "Binary(BlobSize::Blob(None))")]
    pub content: Vec<u8>,
    /// false for project documents uploaded during a conversation
    pub is_knowledge_base: bool,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::templates::Entity",
        from = "Column::TemplateId",
        to = "super::templates::Column::Id",
        on_delete = "Cascade"
    )]
    Templates,
    #[sea_orm(
        belongs_to = "super::instances::Entity",
        from = "Column::InstanceId",
        to = "super::instances::Column::Id",
        on_delete = "Cascade"
    )]
    Instances,
}

impl Related<super::templates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Templates.def()
    }
}

impl Related<super::instances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instances.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

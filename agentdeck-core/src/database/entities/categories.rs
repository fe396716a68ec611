use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A grouping of projects that share one ordered set of templates.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub admin_only: bool,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::projects::Entity")]
    Projects,
    #[sea_orm(has_many = "super::template_categories::Entity")]
    TemplateCategories,
}

impl Related<super::projects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Projects.def()
    }
}

impl Related<super::template_categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TemplateCategories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

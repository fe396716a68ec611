use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

use crate::database::entities::categories;
use crate::errors::{CoreError, CoreResult, DbResultExt};

#[derive(Clone)]
pub struct CategoryService {
    db: DatabaseConnection,
}

impl CategoryService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_category(&self, name: &str, admin_only: bool) -> CoreResult<categories::Model> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("Category name cannot be empty"));
        }

        let now = Utc::now();
        categories::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            name: Set(name.to_string()),
            admin_only: Set(admin_only),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .db_context("create category")
    }
}

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::debug;
use uuid::Uuid;

use crate::database::entities::knowledge_files;
use crate::errors::{CoreError, CoreResult, DbResultExt};

/// Who a knowledge file belongs to. A file has exactly one owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KnowledgeOwner {
    Template(String),
    Instance(String),
}

impl KnowledgeOwner {
    fn filter(&self) -> sea_orm::sea_query::SimpleExpr {
        match self {
            KnowledgeOwner::Template(id) => knowledge_files::Column::TemplateId.eq(id.as_str()),
            KnowledgeOwner::Instance(id) => knowledge_files::Column::InstanceId.eq(id.as_str()),
        }
    }

    fn columns(&self) -> (Option<String>, Option<String>) {
        match self {
            KnowledgeOwner::Template(id) => (Some(id.clone()), None),
            KnowledgeOwner::Instance(id) => (None, Some(id.clone())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewKnowledgeFile {
    pub name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
    pub is_knowledge_base: bool,
}

/// Copies knowledge-base files between owners. Cloning is append-only;
/// callers that want replacement delete the target's files first.
#[derive(Clone, Debug)]
pub struct KnowledgeService {
    exclude_prefix: String,
}

impl KnowledgeService {
    pub fn new(exclude_prefix: impl Into<String>) -> Self {
        Self {
            exclude_prefix: exclude_prefix.into(),
        }
    }

    pub fn is_cloneable(&self, file: &knowledge_files::Model) -> bool {
        file.is_knowledge_base && !file.name.starts_with(&self.exclude_prefix)
    }

    /// Cloneable files of one owner, oldest first.
    pub async fn cloneable_files<C: ConnectionTrait>(
        &self,
        conn: &C,
        owner: &KnowledgeOwner,
    ) -> CoreResult<Vec<knowledge_files::Model>> {
        let files = knowledge_files::Entity::find()
            .filter(owner.filter())
            .filter(knowledge_files::Column::IsKnowledgeBase.eq(true))
            .order_by_asc(knowledge_files::Column::CreatedAt)
            .all(conn)
            .await
            .db_context("load knowledge files")?;

        Ok(files
            .into_iter()
            .filter(|file| self.is_cloneable(file))
            .collect())
    }

    /// Loads cloneable files for many templates in one query, grouped by
    /// template id. Templates without files map to nothing.
    pub async fn preload_for_templates<C: ConnectionTrait>(
        &self,
        conn: &C,
        template_ids: &[String],
    ) -> CoreResult<HashMap<String, Vec<knowledge_files::Model>>> {
        let mut grouped: HashMap<String, Vec<knowledge_files::Model>> = HashMap::new();
        if template_ids.is_empty() {
            return Ok(grouped);
        }

        let files = knowledge_files::Entity::find()
            .filter(knowledge_files::Column::TemplateId.is_in(template_ids.iter().cloned()))
            .filter(knowledge_files::Column::IsKnowledgeBase.eq(true))
            .order_by_asc(knowledge_files::Column::CreatedAt)
            .all(conn)
            .await
            .db_context("preload template knowledge files")?;

        for file in files.into_iter().filter(|file| self.is_cloneable(file)) {
            if let Some(template_id) = file.template_id.clone() {
                grouped.entry(template_id).or_default().push(file);
            }
        }

        Ok(grouped)
    }

    /// Loads the source's cloneable files and copies them to the instance.
    pub async fn clone_knowledge<C: ConnectionTrait>(
        &self,
        conn: &C,
        source: &KnowledgeOwner,
        target_instance_id: &str,
    ) -> CoreResult<usize> {
        let files = self.cloneable_files(conn, source).await?;
        self.copy_files(conn, &files, target_instance_id).await
    }

    /// Inserts copies of already-loaded files for the instance.
    pub async fn copy_files<C: ConnectionTrait>(
        &self,
        conn: &C,
        files: &[knowledge_files::Model],
        target_instance_id: &str,
    ) -> CoreResult<usize> {
        if files.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let copies = files.iter().map(|file| knowledge_files::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            template_id: Set(None),
            instance_id: Set(Some(target_instance_id.to_string())),
            name: Set(file.name.clone()),
            mime_type: Set(file.mime_type.clone()),
            content: Set(file.content.clone()),
            is_knowledge_base: Set(true),
            created_at: Set(now),
        });

        knowledge_files::Entity::insert_many(copies)
            .exec_without_returning(conn)
            .await
            .db_context("clone knowledge files")
            .map_err(|e| e.with_field("instance_id", target_instance_id))?;

        debug!(
            instance_id = target_instance_id,
            count = files.len(),
            "Cloned knowledge files"
        );
        Ok(files.len())
    }

    /// Removes the cloned knowledge of the given instances ahead of a
    /// reclone. Project documents and summaries stay with the instance.
    pub async fn delete_instance_knowledge<C: ConnectionTrait>(
        &self,
        conn: &C,
        instance_ids: &[String],
    ) -> CoreResult<u64> {
        if instance_ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = knowledge_files::Entity::find()
            .filter(knowledge_files::Column::InstanceId.is_in(instance_ids.iter().cloned()))
            .filter(knowledge_files::Column::IsKnowledgeBase.eq(true))
            .all(conn)
            .await
            .db_context("load instance knowledge files")?
            .into_iter()
            .filter(|file| self.is_cloneable(file))
            .map(|file| file.id)
            .collect();

        if ids.is_empty() {
            return Ok(0);
        }

        let result = knowledge_files::Entity::delete_many()
            .filter(knowledge_files::Column::Id.is_in(ids))
            .exec(conn)
            .await
            .db_context("delete instance knowledge files")?;

        Ok(result.rows_affected)
    }

    /// Removes every file owned by the given instances, used before the
    /// instances themselves are deleted.
    pub async fn delete_all_for_instances<C: ConnectionTrait>(
        &self,
        conn: &C,
        instance_ids: &[String],
    ) -> CoreResult<u64> {
        if instance_ids.is_empty() {
            return Ok(0);
        }

        let result = knowledge_files::Entity::delete_many()
            .filter(knowledge_files::Column::InstanceId.is_in(instance_ids.iter().cloned()))
            .exec(conn)
            .await
            .db_context("delete instance files")?;

        Ok(result.rows_affected)
    }

    pub async fn add_file<C: ConnectionTrait>(
        &self,
        conn: &C,
        owner: &KnowledgeOwner,
        file: NewKnowledgeFile,
    ) -> CoreResult<knowledge_files::Model> {
        if file.name.trim().is_empty() {
            return Err(CoreError::validation("Knowledge file name cannot be empty"));
        }

        let (template_id, instance_id) = owner.columns();
        knowledge_files::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            template_id: Set(template_id),
            instance_id: Set(instance_id),
            name: Set(file.name),
            mime_type: Set(file.mime_type),
            content: Set(file.content),
            is_knowledge_base: Set(file.is_knowledge_base),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await
        .db_context("insert knowledge file")
    }

    pub async fn list_files<C: ConnectionTrait>(
        &self,
        conn: &C,
        owner: &KnowledgeOwner,
    ) -> CoreResult<Vec<knowledge_files::Model>> {
        knowledge_files::Entity::find()
            .filter(owner.filter())
            .order_by_asc(knowledge_files::Column::CreatedAt)
            .all(conn)
            .await
            .db_context("list knowledge files")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities::{categories, instances, projects, templates};
    use crate::database::test_utils::setup_test_db;

    fn file(name: &str, is_knowledge_base: bool) -> knowledge_files::Model {
        knowledge_files::Model {
            id: Uuid::new_v4().to_string(),
            template_id: Some("t".into()),
            instance_id: None,
            name: name.into(),
            mime_type: "text/plain".into(),
            content: b"x".to_vec(),
            is_knowledge_base,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn summary_files_and_project_documents_are_not_cloneable() {
        let service = KnowledgeService::new("Summary");
        assert!(service.is_cloneable(&file("brand-guide.pdf", true)));
        assert!(!service.is_cloneable(&file("Summary 2024-05-01.md", true)));
        assert!(!service.is_cloneable(&file("upload.csv", false)));
        // prefix match is case-sensitive
        assert!(service.is_cloneable(&file("summary-of-terms.txt", true)));
    }

    async fn seed_template_and_instance(db: &sea_orm::DatabaseConnection) -> (String, String) {
        let now = Utc::now();
        categories::ActiveModel {
            id: Set("c".into()),
            name: Set("Landing".into()),
            admin_only: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();
        templates::ActiveModel {
            id: Set("t".into()),
            name: Set("Writer".into()),
            description: Set(None),
            system_instruction: Set("Write well".into()),
            summary_instruction: Set(None),
            model: Set("gpt-4o".into()),
            role: Set(None),
            is_visible: Set(true),
            admin_only: Set(false),
            quick_messages: Set("[]".into()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();
        projects::ActiveModel {
            id: Set("p".into()),
            user_id: Set("u".into()),
            category_id: Set("c".into()),
            name: Set("Launch".into()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();
        instances::ActiveModel {
            id: Set("i".into()),
            project_id: Set("p".into()),
            user_id: Set("u".into()),
            template_id: Set(None),
            name: Set("Scratch".into()),
            description: Set(None),
            system_instruction: Set(String::new()),
            summary_instruction: Set(None),
            model: Set("gpt-4o".into()),
            role: Set(None),
            order: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();
        ("t".into(), "i".into())
    }

    fn new_file(name: &str, is_knowledge_base: bool) -> NewKnowledgeFile {
        NewKnowledgeFile {
            name: name.into(),
            mime_type: "text/markdown".into(),
            content: format!("# {}", name).into_bytes(),
            is_knowledge_base,
        }
    }

    #[tokio::test]
    async fn clone_is_append_only_and_skips_non_knowledge() {
        let db = setup_test_db().await;
        let (template_id, instance_id) = seed_template_and_instance(&db).await;
        let service = KnowledgeService::new("Summary");
        let source = KnowledgeOwner::Template(template_id);

        service.add_file(&db, &source, new_file("guide.md", true)).await.unwrap();
        service.add_file(&db, &source, new_file("Summary of chat", true)).await.unwrap();
        service.add_file(&db, &source, new_file("draft.md", false)).await.unwrap();

        assert_eq!(service.clone_knowledge(&db, &source, &instance_id).await.unwrap(), 1);
        assert_eq!(service.clone_knowledge(&db, &source, &instance_id).await.unwrap(), 1);

        let target = KnowledgeOwner::Instance(instance_id.clone());
        let cloned = service.list_files(&db, &target).await.unwrap();
        assert_eq!(cloned.len(), 2);
        assert!(cloned.iter().all(|f| f.name == "guide.md" && f.is_knowledge_base));

        service.delete_instance_knowledge(&db, &[instance_id]).await.unwrap();
        assert!(service.list_files(&db, &target).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reclone_cleanup_keeps_instance_documents_and_summaries() {
        let db = setup_test_db().await;
        let (_, instance_id) = seed_template_and_instance(&db).await;
        let service = KnowledgeService::new("Summary");
        let target = KnowledgeOwner::Instance(instance_id.clone());

        service.add_file(&db, &target, new_file("guide.md", true)).await.unwrap();
        service.add_file(&db, &target, new_file("Summary 1", true)).await.unwrap();
        service.add_file(&db, &target, new_file("upload.csv", false)).await.unwrap();

        let removed = service.delete_instance_knowledge(&db, &[instance_id]).await.unwrap();
        assert_eq!(removed, 1);

        let mut names: Vec<String> = service
            .list_files(&db, &target)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Summary 1".to_string(), "upload.csv".to_string()]);
    }
}

use sea_orm_migration::prelude::*;

/// One materialized instance per (project, template). Instances without a
/// template back-reference are exempt because NULLs never collide.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_instances_project_template")
                    .table(Instances::Table)
                    .col(Instances::ProjectId)
                    .col(Instances::TemplateId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_instances_project_template")
                    .table(Instances::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Instances {
    Table,
    ProjectId,
    TemplateId,
}

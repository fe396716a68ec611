use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Projects::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Projects::UserId).string().not_null())
                    .col(ColumnDef::new(Projects::CategoryId).string().not_null())
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(
                        ColumnDef::new(Projects::CreatedAt)
                            .date_time()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(
                        ColumnDef::new(Projects::UpdatedAt)
                            .date_time()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_category")
                            .from(Projects::Table, Projects::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_projects_category")
                    .table(Projects::Table)
                    .col(Projects::CategoryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Instances::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Instances::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Instances::ProjectId).string().not_null())
                    .col(ColumnDef::new(Instances::UserId).string().not_null())
                    .col(ColumnDef::new(Instances::TemplateId).string().null())
                    .col(ColumnDef::new(Instances::Name).string().not_null())
                    .col(ColumnDef::new(Instances::Description).text().null())
                    .col(
                        ColumnDef::new(Instances::SystemInstruction)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Instances::SummaryInstruction).text().null())
                    .col(ColumnDef::new(Instances::Model).string().not_null())
                    .col(ColumnDef::new(Instances::Role).string().null())
                    .col(
                        ColumnDef::new(Instances::Order)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Instances::CreatedAt)
                            .date_time()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(
                        ColumnDef::new(Instances::UpdatedAt)
                            .date_time()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_instances_project")
                            .from(Instances::Table, Instances::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_instances_template")
                            .from(Instances::Table, Instances::TemplateId)
                            .to(Templates::Table, Templates::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_instances_user_project")
                    .table(Instances::Table)
                    .col(Instances::UserId)
                    .col(Instances::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(KnowledgeFiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(KnowledgeFiles::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(KnowledgeFiles::TemplateId).string().null())
                    .col(ColumnDef::new(KnowledgeFiles::InstanceId).string().null())
                    .col(ColumnDef::new(KnowledgeFiles::Name).string().not_null())
                    .col(ColumnDef::new(KnowledgeFiles::MimeType).string().not_null())
                    .col(ColumnDef::new(KnowledgeFiles::Content).binary().not_null())
                    .col(
                        ColumnDef::new(KnowledgeFiles::IsKnowledgeBase)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(KnowledgeFiles::CreatedAt)
                            .date_time()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_knowledge_files_template")
                            .from(KnowledgeFiles::Table, KnowledgeFiles::TemplateId)
                            .to(Templates::Table, Templates::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_knowledge_files_instance")
                            .from(KnowledgeFiles::Table, KnowledgeFiles::InstanceId)
                            .to(Instances::Table, Instances::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_knowledge_files_template")
                    .table(KnowledgeFiles::Table)
                    .col(KnowledgeFiles::TemplateId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_knowledge_files_instance")
                    .table(KnowledgeFiles::Table)
                    .col(KnowledgeFiles::InstanceId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(KnowledgeFiles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Instances::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
    UserId,
    CategoryId,
    Name,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Instances {
    Table,
    Id,
    ProjectId,
    UserId,
    TemplateId,
    Name,
    Description,
    SystemInstruction,
    SummaryInstruction,
    Model,
    Role,
    Order,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum KnowledgeFiles {
    Table,
    Id,
    TemplateId,
    InstanceId,
    Name,
    MimeType,
    Content,
    IsKnowledgeBase,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Templates {
    Table,
    Id,
}

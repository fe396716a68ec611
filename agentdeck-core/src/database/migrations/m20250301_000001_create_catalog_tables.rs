use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Categories::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(
                        ColumnDef::new(Categories::AdminOnly)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Categories::CreatedAt)
                            .date_time()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(
                        ColumnDef::new(Categories::UpdatedAt)
                            .date_time()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Templates::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Templates::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Templates::Name).string().not_null())
                    .col(ColumnDef::new(Templates::Description).text().null())
                    .col(
                        ColumnDef::new(Templates::SystemInstruction)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Templates::SummaryInstruction).text().null())
                    .col(ColumnDef::new(Templates::Model).string().not_null())
                    .col(ColumnDef::new(Templates::Role).string().null())
                    .col(
                        ColumnDef::new(Templates::IsVisible)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Templates::AdminOnly)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Templates::QuickMessages)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Templates::CreatedAt)
                            .date_time()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(
                        ColumnDef::new(Templates::UpdatedAt)
                            .date_time()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TemplateCategories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TemplateCategories::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TemplateCategories::TemplateId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TemplateCategories::CategoryId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TemplateCategories::Order)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TemplateCategories::CreatedAt)
                            .date_time()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .index(
                        Index::create()
                            .name("idx_template_categories_template_category")
                            .col(TemplateCategories::TemplateId)
                            .col(TemplateCategories::CategoryId)
                            .unique(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_template_categories_template")
                            .from(TemplateCategories::Table, TemplateCategories::TemplateId)
                            .to(Templates::Table, Templates::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_template_categories_category")
                            .from(TemplateCategories::Table, TemplateCategories::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_template_categories_category_order")
                    .table(TemplateCategories::Table)
                    .col(TemplateCategories::CategoryId)
                    .col(TemplateCategories::Order)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TemplateCategories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Templates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
    Name,
    AdminOnly,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Templates {
    Table,
    Id,
    Name,
    Description,
    SystemInstruction,
    SummaryInstruction,
    Model,
    Role,
    IsVisible,
    AdminOnly,
    QuickMessages,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TemplateCategories {
    Table,
    Id,
    TemplateId,
    CategoryId,
    Order,
    CreatedAt,
}

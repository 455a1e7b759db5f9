use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // pgvector must be available before the vector column can exist
        manager
            .get_connection()
            .execute_unprepared("CREATE EXTENSION IF NOT EXISTS vector")
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Verses::Table)
                    .if_not_exists()
                    .col(pk_uuid(Verses::Id))
                    .col(integer(Verses::Chapter))
                    .col(integer(Verses::Verse))
                    .col(text(Verses::Text))
                    .col(
                        ColumnDef::new(Verses::Vector)
                            .custom(Alias::new("vector(1536)"))
                            .null(),
                    )
                    .col(
                        timestamp_with_time_zone(Verses::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Verses::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural key: one row per (chapter, verse)
        manager
            .create_index(
                Index::create()
                    .name("ux_verses_chapter_verse")
                    .table(Verses::Table)
                    .col(Verses::Chapter)
                    .col(Verses::Verse)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_verses_chapter")
                    .table(Verses::Table)
                    .col(Verses::Chapter)
                    .to_owned(),
            )
            .await?;

        // ivfflat index for cosine similarity; sea-query has no USING
        // clause support for custom access methods
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE INDEX IF NOT EXISTS idx_verses_vector_cosine
                    ON verses USING ivfflat (vector vector_cosine_ops)
                    WITH (lists = 100)
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Verses::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Verses {
    Table,
    Id,
    Chapter,
    Verse,
    Text,
    Vector,
    CreatedAt,
    UpdatedAt,
}

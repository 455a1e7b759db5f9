use sea_orm::entity::prelude::*;

/// Sea-ORM entity for the verses table.
///
/// The pgvector column is deliberately absent: SeaORM cannot decode it,
/// so every query touching the embedding goes through raw SQL in the
/// postgres repository. This entity backs the plain scalar queries
/// (chapter listing, deletes).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "verses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub chapter: i32,
    pub verse: i32,
    #[sea_orm(column_type = "Text")]
    pub text: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Article entity
//!
//! One deduplicated source document. The `url` column carries a unique
//! constraint; a second insert for the same URL is rejected by the
//! database regardless of what the pre-insert lookup saw.
//!
//! The article-level `embedding` vector column is written at ingest for
//! administrative inspection but never read by the entity; article
//! relevance is derived from chunk search instead.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "articles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Full cleaned body text
    #[sea_orm(column_type = "Text")]
    pub content: String,

    #[sea_orm(column_type = "Text", unique)]
    pub url: String,

    /// Publication date normalized to YYYY-MM-DD
    #[sea_orm(column_type = "Text")]
    pub published_on: String,

    #[sea_orm(column_type = "Text")]
    pub source: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::chunk::Entity")]
    Chunks,
}

impl Related<super::chunk::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Chunks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

use dbhub_core::DBDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An immutable stored file. Rows are only ever inserted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "database_versions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub db_id: i32,
    pub version: i32,
    pub size: i64,
    pub sha256: String,
    pub public: bool,
    pub minio_id: String,
    pub last_modified: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::databases::Entity",
        from = "Column::DbId",
        to = "super::databases::Column::Id"
    )]
    Database,
}

impl Related<super::databases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Database.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

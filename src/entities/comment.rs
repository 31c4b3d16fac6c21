//! Comment entity - staff discussion thread on a harvest.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Comment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "comments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub harvest_id: i64,
    /// Authoring user
    pub author_id: i64,
    pub content: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::harvest::Entity",
        from = "Column::HarvestId",
        to = "super::harvest::Column::Id"
    )]
    Harvest,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id"
    )]
    Author,
}

impl Related<super::harvest::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Harvest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

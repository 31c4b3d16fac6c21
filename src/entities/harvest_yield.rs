//! Harvest yield entity - weight picked from one tree, given to a recipient.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Harvest yield database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "harvest_yields")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub harvest_id: i64,
    pub tree_type_id: i64,
    /// Weight in pounds, non-negative
    pub total_in_lb: f64,
    /// Actor (person or beneficiary organization) receiving this share
    pub recipient_id: i64,
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
        belongs_to = "super::tree_type::Entity",
        from = "Column::TreeTypeId",
        to = "super::tree_type::Column::Id"
    )]
    TreeType,
    #[sea_orm(
        belongs_to = "super::actor::Entity",
        from = "Column::RecipientId",
        to = "super::actor::Column::ActorId"
    )]
    Recipient,
}

impl Related<super::harvest::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Harvest.def()
    }
}

impl Related<super::tree_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TreeType.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

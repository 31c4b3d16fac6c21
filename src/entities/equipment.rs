//! Equipment entity - items lent for harvests.
//!
//! Owned either by an actor (typically an equipment-point organization) or
//! attached to a property, never both. Equipment owned by an equipment
//! point is always shared.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Equipment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "equipment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub type_id: i64,
    pub description: String,
    /// Number of identical items
    pub count: i32,
    /// Owning actor; exactly one of `owner_id` / `property_id` is set
    pub owner_id: Option<i64>,
    pub property_id: Option<i64>,
    /// Can be used in harvests outside its home property
    pub shared: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::equipment_type::Entity",
        from = "Column::TypeId",
        to = "super::equipment_type::Column::Id"
    )]
    Type,
    #[sea_orm(
        belongs_to = "super::actor::Entity",
        from = "Column::OwnerId",
        to = "super::actor::Column::ActorId"
    )]
    Owner,
    #[sea_orm(
        belongs_to = "super::property::Entity",
        from = "Column::PropertyId",
        to = "super::property::Column::Id"
    )]
    Property,
}

impl Related<super::equipment_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Type.def()
    }
}

impl Related<super::actor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::property::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Property.def()
    }
}

impl Related<super::harvest::Entity> for Entity {
    fn to() -> RelationDef {
        super::harvest_equipment::Relation::Harvest.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::harvest_equipment::Relation::Equipment.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Harvest-equipment join table - equipment reserved by a harvest.
//! Only harvests in {scheduled, ready, succeeded} may hold rows here.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Harvest-equipment join row
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "harvest_equipment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub harvest_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub equipment_id: i64,
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
        belongs_to = "super::equipment::Entity",
        from = "Column::EquipmentId",
        to = "super::equipment::Column::Id"
    )]
    Equipment,
}

impl Related<super::harvest::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Harvest.def()
    }
}

impl Related<super::equipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Equipment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

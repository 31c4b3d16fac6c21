//! Harvest-tree join table - which trees a harvest picks from.
//! Always a subset of the property's trees, enforced in `core::harvest`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Harvest-tree join row
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "harvest_trees")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub harvest_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub tree_type_id: i64,
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
}

impl ActiveModelBehavior for ActiveModel {}

//! Property-tree join table - which tree types grow on a property.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Property-tree join row
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "property_trees")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub property_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub tree_type_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::property::Entity",
        from = "Column::PropertyId",
        to = "super::property::Column::Id"
    )]
    Property,
    #[sea_orm(
        belongs_to = "super::tree_type::Entity",
        from = "Column::TreeTypeId",
        to = "super::tree_type::Column::Id"
    )]
    TreeType,
}

impl ActiveModelBehavior for ActiveModel {}

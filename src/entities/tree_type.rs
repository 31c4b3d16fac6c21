//! Tree type entity - fruit species with bilingual names and a maturity
//! window. Editing the maturity dates cascades to current-season orphan
//! harvests (see `core::tree`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Tree type database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tree_types")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name_en: String,
    pub name_fr: String,
    pub fruit_name: String,
    /// First day fruit is commonly ready to pick
    pub maturity_start: Option<Date>,
    /// Last day fruit is commonly still good
    pub maturity_end: Option<Date>,
    pub icon: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::harvest_yield::Entity")]
    Yields,
}

impl Related<super::harvest_yield::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Yields.def()
    }
}

impl Related<super::property::Entity> for Entity {
    fn to() -> RelationDef {
        super::property_tree::Relation::Property.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::property_tree::Relation::TreeType.def().rev())
    }
}

impl Related<super::harvest::Entity> for Entity {
    fn to() -> RelationDef {
        super::harvest_tree::Relation::Harvest.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::harvest_tree::Relation::TreeType.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

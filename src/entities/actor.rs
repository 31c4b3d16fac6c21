//! Actor entity - surrogate identity shared by people and organizations.
//!
//! Properties, equipment and yields reference an `actor_id`; the `kind`
//! discriminator says which concrete table resolves it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Concrete arm an actor id resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(12))")]
pub enum ActorKind {
    /// Resolves to a `person` row
    #[sea_orm(string_value = "person")]
    Person,
    /// Resolves to an `organization` row
    #[sea_orm(string_value = "organization")]
    Organization,
}

/// Actor database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "actors")]
pub struct Model {
    /// Stable surrogate id referenced by owner/recipient columns
    #[sea_orm(primary_key)]
    pub actor_id: i64,
    /// Which subclass table holds the concrete row
    pub kind: ActorKind,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::property::Entity")]
    Properties,
    #[sea_orm(has_many = "super::equipment::Entity")]
    Equipment,
}

impl Related<super::property::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Properties.def()
    }
}

impl Related<super::equipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Equipment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

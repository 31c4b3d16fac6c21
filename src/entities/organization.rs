//! Organization entity - beneficiaries and equipment sharing points.
//!
//! Shares its primary key with the `actors` table. An organization flagged
//! `is_equipment_point` lends its equipment to harvests anywhere in town.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Organization database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organizations")]
pub struct Model {
    /// Actor surrogate id (shared with the `actors` table)
    #[sea_orm(primary_key, auto_increment = false)]
    pub actor_id: i64,
    pub civil_name: String,
    pub description: String,
    pub phone: Option<String>,
    /// Receives part of the harvested fruit
    pub is_beneficiary: bool,
    /// Lends equipment for harvests outside its own property
    pub is_equipment_point: bool,
    /// Person to reach for authorizations and logistics
    pub contact_person_id: Option<i64>,
    pub street_number: Option<String>,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub borough: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::actor::Entity",
        from = "Column::ActorId",
        to = "super::actor::Column::ActorId"
    )]
    Actor,
    #[sea_orm(
        belongs_to = "super::person::Entity",
        from = "Column::ContactPersonId",
        to = "super::person::Column::ActorId"
    )]
    ContactPerson,
}

impl Related<super::person::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ContactPerson.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Property entity - a location with one or more fruit trees.
//!
//! Created `pending = true` through the public intake form and validated by
//! an administrator. `authorized` is a tri-state: `None` means the owner has
//! not been asked this season, `Some(false)` declined, `Some(true)` consented.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Property database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "properties")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner actor (person or organization); absent while pending intake
    pub owner_id: Option<i64>,
    /// This property exists and may be able to host a pick
    pub is_active: bool,
    /// Per-season owner consent; reset to `None` at season rollover
    pub authorized: Option<bool>,
    /// Awaiting admin validation (public-form submissions start here)
    pub pending: bool,
    pub pending_contact_first_name: Option<String>,
    pub pending_contact_family_name: Option<String>,
    pub pending_contact_phone: Option<String>,
    pub pending_contact_email: Option<String>,
    pub street_number: Option<String>,
    pub street: Option<String>,
    pub complement: Option<String>,
    pub postal_code: Option<String>,
    pub borough: Option<String>,
    /// Approximate location for public communications (not the address)
    pub publishable_location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub avg_nb_required_pickers: i32,
    pub public_access: bool,
    pub ladder_available: bool,
    pub ladder_available_for_outside_picks: bool,
    pub additional_info: Option<String>,
    /// Audit: user who last modified this row
    pub changed_by: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::actor::Entity",
        from = "Column::OwnerId",
        to = "super::actor::Column::ActorId"
    )]
    Owner,
    #[sea_orm(has_many = "super::harvest::Entity")]
    Harvests,
    #[sea_orm(has_many = "super::equipment::Entity")]
    Equipment,
}

impl Related<super::actor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::harvest::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Harvests.def()
    }
}

impl Related<super::equipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Equipment.def()
    }
}

impl Related<super::tree_type::Entity> for Entity {
    fn to() -> RelationDef {
        super::property_tree::Relation::TreeType.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::property_tree::Relation::Property.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Street address on one line, omitting missing pieces.
    #[must_use]
    pub fn short_address(&self) -> String {
        match (&self.street_number, &self.street, &self.complement) {
            (Some(n), Some(s), Some(c)) => format!("{n} {s}, {c}"),
            (Some(n), Some(s), None) => format!("{n} {s}"),
            (None, Some(s), Some(c)) => format!("{s}, {c}"),
            (_, Some(s), None) => s.clone(),
            _ => String::new(),
        }
    }
}

//! Onboarding entity - a named batch of prospective pick leaders awaiting
//! their registration invite.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Onboarding batch database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "onboardings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Reference name ("Spring 2026 cohort")
    pub name: String,
    pub created_at: DateTimeUtc,
    /// Per-member send outcomes, one timestamped line each
    pub log: String,
    /// True only when every current member has a delivered invite
    pub all_sent: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl Related<super::person::Entity> for Entity {
    fn to() -> RelationDef {
        super::onboarding_member::Relation::Person.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::onboarding_member::Relation::Onboarding.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

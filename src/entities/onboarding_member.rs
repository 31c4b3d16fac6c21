//! Onboarding-member join table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Onboarding-member join row
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "onboarding_members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub onboarding_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub person_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::onboarding::Entity",
        from = "Column::OnboardingId",
        to = "super::onboarding::Column::Id"
    )]
    Onboarding,
    #[sea_orm(
        belongs_to = "super::person::Entity",
        from = "Column::PersonId",
        to = "super::person::Column::ActorId"
    )]
    Person,
}

impl ActiveModelBehavior for ActiveModel {}

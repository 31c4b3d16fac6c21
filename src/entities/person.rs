//! Person entity - a physical member of the community.
//!
//! Shares its primary key with the `actors` table (one actor row per
//! person). A person may or may not have a login (`user` row).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Preferred contact language
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(2))")]
pub enum Language {
    /// French
    #[sea_orm(string_value = "fr")]
    Fr,
    /// English
    #[sea_orm(string_value = "en")]
    En,
}

/// Person database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "persons")]
pub struct Model {
    /// Actor surrogate id (shared with the `actors` table)
    #[sea_orm(primary_key, auto_increment = false)]
    pub actor_id: i64,
    pub first_name: String,
    pub family_name: String,
    pub phone: Option<String>,
    /// Preferred language for notifications, defaults to French when unset
    pub language: Option<Language>,
    pub street_number: Option<String>,
    pub street: Option<String>,
    pub complement: Option<String>,
    pub postal_code: Option<String>,
    pub borough: Option<String>,
    pub newsletter_subscription: bool,
    /// Free-text staff notes about this member
    pub comments: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::actor::Entity",
        from = "Column::ActorId",
        to = "super::actor::Column::ActorId"
    )]
    Actor,
    #[sea_orm(has_many = "super::participation::Entity")]
    Participations,
    #[sea_orm(has_one = "super::user::Entity")]
    User,
}

impl Related<super::participation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participations.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::onboarding::Entity> for Entity {
    fn to() -> RelationDef {
        super::onboarding_member::Relation::Onboarding.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::onboarding_member::Relation::Person.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Full display name, "First Family".
    #[must_use]
    pub fn name(&self) -> String {
        format!("{} {}", self.first_name, self.family_name)
    }

    /// Notification language, defaulting to French.
    #[must_use]
    pub fn language_or_default(&self) -> Language {
        self.language.unwrap_or(Language::Fr)
    }
}

//! User entity - login credentials and account flags.
//!
//! Roles live in the `user_roles` join table; `is_staff` is derived from
//! them and kept in sync by `core::member::set_roles`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique login email
    #[sea_orm(unique)]
    pub email: String,
    /// Argon2id hash; empty string means "no password set yet"
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Set when the password was generated for a registration invite
    pub has_temporary_password: bool,
    /// Terms & conditions accepted on first login
    pub agreed_terms: bool,
    /// Derived: roles intersect {core, pickleader}
    pub is_staff: bool,
    /// Linked person, if any
    #[sea_orm(unique)]
    pub person_id: Option<i64>,
    pub date_joined: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::person::Entity",
        from = "Column::PersonId",
        to = "super::person::Column::ActorId"
    )]
    Person,
    #[sea_orm(has_many = "super::user_role::Entity")]
    Roles,
    #[sea_orm(has_many = "super::harvest::Entity")]
    LedHarvests,
}

impl Related<super::person::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Person.def()
    }
}

impl Related<super::user_role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Roles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

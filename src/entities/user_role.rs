//! User role assignment - one row per (user, role) pair.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Application role
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(12))")]
pub enum Role {
    /// Site administrator
    #[sea_orm(string_value = "admin")]
    Admin,
    /// Core organization member
    #[sea_orm(string_value = "core")]
    Core,
    /// May lead and schedule harvests
    #[sea_orm(string_value = "pickleader")]
    Pickleader,
    /// Volunteer picker
    #[sea_orm(string_value = "volunteer")]
    Volunteer,
    /// Property owner
    #[sea_orm(string_value = "owner")]
    Owner,
    /// Organization contact person
    #[sea_orm(string_value = "contact")]
    Contact,
}

impl Role {
    /// Roles that make a user staff.
    #[must_use]
    pub fn is_staff_role(self) -> bool {
        matches!(self, Role::Core | Role::Pickleader)
    }
}

/// User-role join row
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_roles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub role: Role,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

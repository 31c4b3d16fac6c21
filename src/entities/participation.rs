//! Participation entity - a volunteer's request to join a harvest.
//!
//! Known as an RFP (request for participation). Terminal rows stay immutable
//! except for the `showed_up` attendance flag.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Participation request lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(12))")]
pub enum ParticipationStatus {
    /// Awaiting the pick leader's decision
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Selected for the pick
    #[sea_orm(string_value = "accepted")]
    Accepted,
    /// Turned down by the pick leader (terminal)
    #[sea_orm(string_value = "declined")]
    Declined,
    /// Withdrawn by the volunteer (terminal)
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// Harvest ended without a decision (terminal)
    #[sea_orm(string_value = "obsolete")]
    Obsolete,
}

impl ParticipationStatus {
    /// Terminal states accept no further transition.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ParticipationStatus::Declined
                | ParticipationStatus::Cancelled
                | ParticipationStatus::Obsolete
        )
    }
}

/// Participation database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "participations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub harvest_id: i64,
    pub person_id: i64,
    pub status: ParticipationStatus,
    /// Group size the volunteer registers for, 1..=99
    pub number_of_pickers: i32,
    /// Free text from the volunteer
    pub comment: Option<String>,
    /// Private notes from the pick leader
    pub notes_from_pickleader: Option<String>,
    pub created_at: DateTimeUtc,
    /// Updated iff `status` changes
    pub status_changed_at: DateTimeUtc,
    /// Attendance, filled after the pick; `None` until recorded
    pub showed_up: Option<bool>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::harvest::Entity",
        from = "Column::HarvestId",
        to = "super::harvest::Column::Id"
    )]
    Harvest,
    #[sea_orm(
        belongs_to = "super::person::Entity",
        from = "Column::PersonId",
        to = "super::person::Column::ActorId"
    )]
    Person,
}

impl Related<super::harvest::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Harvest.def()
    }
}

impl Related<super::person::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Person.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Harvest entity - a pick event at a property, led by a pick leader.
//!
//! The status column is the heart of the scheduling state machine; all
//! transitions go through `core::harvest` which enforces the preconditions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Harvest lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(12))")]
pub enum HarvestStatus {
    /// No pick leader yet
    #[sea_orm(string_value = "orphan")]
    Orphan,
    /// A pick leader volunteered, no date agreed with the owner yet
    #[sea_orm(string_value = "adopted")]
    Adopted,
    /// Date proposed, waiting on confirmation
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Date confirmed and announced
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    /// Picker selection closed, happening as planned
    #[sea_orm(string_value = "ready")]
    Ready,
    /// Completed (terminal; yields and attendance remain editable)
    #[sea_orm(string_value = "succeeded")]
    Succeeded,
    /// Called off (terminal)
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl HarvestStatus {
    /// Terminal states accept no further transition.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, HarvestStatus::Succeeded | HarvestStatus::Cancelled)
    }

    /// States in which an equipment reservation may be held.
    #[must_use]
    pub fn may_hold_reservation(self) -> bool {
        matches!(
            self,
            HarvestStatus::Scheduled | HarvestStatus::Ready | HarvestStatus::Succeeded
        )
    }

    /// States that require a published announcement and the same-day rule.
    #[must_use]
    pub fn requires_announcement(self) -> bool {
        matches!(
            self,
            HarvestStatus::Scheduled | HarvestStatus::Ready | HarvestStatus::Succeeded
        )
    }
}

/// Harvest database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "harvests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub status: HarvestStatus,
    pub property_id: i64,
    /// User leading the pick; required outside {orphan, cancelled}
    pub pick_leader_id: Option<i64>,
    pub start_date: Option<DateTimeUtc>,
    pub end_date: Option<DateTimeUtc>,
    /// Harvest becomes publicly visible after this instant
    pub publication_date: Option<DateTimeUtc>,
    pub nb_required_pickers: i32,
    /// Public announcement, Quill rich text (opaque HTML)
    pub announcement: String,
    pub owner_present: bool,
    pub owner_help: bool,
    pub owner_fruit: bool,
    pub date_created: DateTimeUtc,
    /// Audit: user who last modified this row
    pub changed_by: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::property::Entity",
        from = "Column::PropertyId",
        to = "super::property::Column::Id"
    )]
    Property,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::PickLeaderId",
        to = "super::user::Column::Id"
    )]
    PickLeader,
    #[sea_orm(has_many = "super::participation::Entity")]
    Participations,
    #[sea_orm(has_many = "super::harvest_yield::Entity")]
    Yields,
    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
}

impl Related<super::property::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Property.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PickLeader.def()
    }
}

impl Related<super::participation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participations.def()
    }
}

impl Related<super::harvest_yield::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Yields.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::tree_type::Entity> for Entity {
    fn to() -> RelationDef {
        super::harvest_tree::Relation::TreeType.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::harvest_tree::Relation::Harvest.def().rev())
    }
}

impl Related<super::equipment::Entity> for Entity {
    fn to() -> RelationDef {
        super::harvest_equipment::Relation::Equipment.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::harvest_equipment::Relation::Harvest.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

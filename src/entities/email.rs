//! Email entity - audit row for every outbound notification.
//!
//! Rows are written whether delivery succeeded or not; `sent` plus `log`
//! record the outcome. Delivery itself goes through the `notify::Mailer`
//! seam and is best-effort.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification kind; maps to a bilingual template and a recipient resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
pub enum EmailKind {
    /// Pick-leader registration invite (onboarding batch)
    #[sea_orm(string_value = "registration")]
    Registration,
    /// Password reset requested by the user
    #[sea_orm(string_value = "password_reset")]
    PasswordReset,
    /// New request for participation, sent to the pick leader
    #[sea_orm(string_value = "new_rfp")]
    NewRfp,
    /// New harvest comment, sent to the pick leader
    #[sea_orm(string_value = "new_comment")]
    NewComment,
    /// Property was registered / validated
    #[sea_orm(string_value = "property_registered")]
    PropertyRegistered,
    /// Seasonal property authorization request
    #[sea_orm(string_value = "season_authorization")]
    SeasonAuthorization,
    /// Volunteer was selected for the pick
    #[sea_orm(string_value = "selected_picker")]
    SelectedPicker,
    /// Volunteer was turned down
    #[sea_orm(string_value = "rejected_picker")]
    RejectedPicker,
    /// Pick is full; still-pending volunteers were not selected
    #[sea_orm(string_value = "unselected_pickers")]
    UnselectedPickers,
    /// Shared closing footer appended to every composed message
    #[sea_orm(string_value = "closing")]
    Closing,
}

/// Outbound email audit model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "emails")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Resolved destination address
    pub recipient_email: String,
    /// Recipient person, when the address resolved to one
    pub recipient_person_id: Option<i64>,
    pub kind: EmailKind,
    pub harvest_id: Option<i64>,
    /// Property concerned, for authorization-tracking queries
    pub property_id: Option<i64>,
    pub sent: bool,
    pub body: String,
    pub log: String,
    pub date_sent: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::person::Entity",
        from = "Column::RecipientPersonId",
        to = "super::person::Column::ActorId"
    )]
    Recipient,
    #[sea_orm(
        belongs_to = "super::harvest::Entity",
        from = "Column::HarvestId",
        to = "super::harvest::Column::Id"
    )]
    Harvest,
    #[sea_orm(
        belongs_to = "super::property::Entity",
        from = "Column::PropertyId",
        to = "super::property::Column::Id"
    )]
    Property,
}

impl ActiveModelBehavior for ActiveModel {}

//! Shared helpers for tests: an in-memory database, a recording mailer and
//! factory functions for the common fixtures.

#![allow(clippy::unwrap_used, missing_docs)]

use crate::{
    config::{AppConfig, database::create_tables},
    core::member::{self, NewPerson},
    entities::{
        HarvestStatus, ParticipationStatus, Role, equipment, equipment_type, harvest,
        organization, participation, person, property, tree_type, user,
    },
    errors::Result,
    notify::{Mailer, OutgoingMessage},
};
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use std::collections::HashSet;
use std::sync::Mutex;

/// Fresh in-memory database with all tables created.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    create_tables(&db).await?;
    Ok(db)
}

/// Default configuration (UTC-5, one hour buffer), independent of the
/// environment.
#[must_use]
pub fn test_config() -> AppConfig {
    AppConfig::default()
}

/// Mailer that records deliveries; optionally fails for chosen addresses.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMessage>>,
    fail_all: bool,
    fail_to: HashSet<String>,
}

impl RecordingMailer {
    /// Mailer that rejects every delivery.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    /// Mailer that rejects deliveries to the given addresses only.
    #[must_use]
    pub fn failing_for(addresses: &[&str]) -> Self {
        Self {
            fail_to: addresses.iter().map(|a| (*a).to_string()).collect(),
            ..Self::default()
        }
    }

    /// Snapshot of successfully delivered messages.
    #[must_use]
    pub fn messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for RecordingMailer {
    fn deliver(&self, message: &OutgoingMessage) -> std::result::Result<(), String> {
        if self.fail_all || self.fail_to.contains(&message.to) {
            return Err("simulated delivery failure".to_string());
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Person with first and family name, no login.
pub async fn create_test_person(
    db: &DatabaseConnection,
    first_name: &str,
    family_name: &str,
) -> Result<person::Model> {
    member::create_person(
        db,
        NewPerson {
            first_name: first_name.to_string(),
            family_name: family_name.to_string(),
            ..Default::default()
        },
    )
    .await
}

/// Staff user (pick leader) with a linked person.
pub async fn create_test_user(db: &DatabaseConnection, email: &str) -> Result<user::Model> {
    let local = email.split('@').next().unwrap_or("Test");
    let person = create_test_person(db, local, "Tester").await?;
    member::create_user(db, email, Some(person.actor_id), &[Role::Pickleader]).await
}

/// Active, validated property with this season's authorization granted.
pub async fn create_test_property(
    db: &DatabaseConnection,
    owner_id: Option<i64>,
) -> Result<property::Model> {
    property::ActiveModel {
        owner_id: Set(owner_id),
        is_active: Set(true),
        authorized: Set(Some(true)),
        pending: Set(false),
        street_number: Set(Some("4807".to_string())),
        street: Set(Some("Avenue de l'Esplanade".to_string())),
        postal_code: Set(Some("H2T 2Y5".to_string())),
        borough: Set(Some("Le Plateau".to_string())),
        publishable_location: Set(Some("Mile End".to_string())),
        avg_nb_required_pickers: Set(3),
        public_access: Set(false),
        ladder_available: Set(true),
        ladder_available_for_outside_picks: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Harvest a week out, adopted when a pick leader is given.
pub async fn create_test_harvest(
    db: &DatabaseConnection,
    property_id: i64,
    pick_leader_id: Option<i64>,
) -> Result<harvest::Model> {
    let status = if pick_leader_id.is_some() {
        HarvestStatus::Adopted
    } else {
        HarvestStatus::Orphan
    };
    let start = Utc::now() + Duration::days(7);
    harvest::ActiveModel {
        status: Set(status),
        property_id: Set(property_id),
        pick_leader_id: Set(pick_leader_id),
        start_date: Set(Some(start)),
        end_date: Set(Some(start + Duration::hours(3))),
        nb_required_pickers: Set(3),
        announcement: Set(String::new()),
        owner_present: Set(true),
        owner_help: Set(false),
        owner_fruit: Set(true),
        date_created: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Participation row in the given status.
pub async fn create_test_participation(
    db: &DatabaseConnection,
    harvest_id: i64,
    person_id: i64,
    number_of_pickers: i32,
    status: ParticipationStatus,
) -> Result<participation::Model> {
    let now = Utc::now();
    participation::ActiveModel {
        harvest_id: Set(harvest_id),
        person_id: Set(person_id),
        status: Set(status),
        number_of_pickers: Set(number_of_pickers),
        created_at: Set(now),
        status_changed_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Tree type without a maturity window.
pub async fn create_test_tree_type(
    db: &DatabaseConnection,
    name: &str,
) -> Result<tree_type::Model> {
    tree_type::ActiveModel {
        name_en: Set(name.to_string()),
        name_fr: Set(name.to_string()),
        fruit_name: Set(name.to_lowercase()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Equipment-point organization owning a single ladder.
pub async fn create_test_equipment_point(
    db: &DatabaseConnection,
    name: &str,
) -> Result<organization::Model> {
    let point = member::create_organization(db, name, false, true, None).await?;
    let ladder_type = equipment_type::ActiveModel {
        name_en: Set("Ladder".to_string()),
        name_fr: Set("Échelle".to_string()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    equipment::ActiveModel {
        type_id: Set(ladder_type.id),
        description: Set(format!("{name} ladder")),
        count: Set(1),
        owner_id: Set(Some(point.actor_id)),
        shared: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(point)
}

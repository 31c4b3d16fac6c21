//! Property intake, validation and the seasonal authorization round.
//!
//! Anyone may register a property through the public form; it lands pending
//! and an administrator validates it. Every season the team asks each owner
//! again for consent before scheduling picks.

use crate::{
    cache::{Family, ViewCache},
    core::{
        auth::{Principal, require_admin, require_core_or_admin},
        member::{self, ActorRef},
    },
    entities::{Email, EmailKind, Property, email, property, property_tree},
    errors::{Error, Result},
    notify::{Mailer, NewEmail, dispatch},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use std::collections::HashMap;
use tracing::info;

/// Public intake form for a new property.
#[derive(Debug, Clone, Default)]
pub struct PropertyIntake {
    pub contact_first_name: String,
    pub contact_family_name: String,
    pub contact_phone: Option<String>,
    pub contact_email: String,
    pub street_number: Option<String>,
    pub street: Option<String>,
    pub complement: Option<String>,
    pub postal_code: Option<String>,
    pub borough: Option<String>,
    pub tree_type_ids: Vec<i64>,
    pub avg_nb_required_pickers: i32,
    pub public_access: bool,
    pub ladder_available: bool,
    pub ladder_available_for_outside_picks: bool,
    pub additional_info: Option<String>,
}

/// Registers a property from the public form. It starts pending, with the
/// submitted contact details kept aside until an admin links a real owner.
pub async fn register_property(
    db: &DatabaseConnection,
    cache: &ViewCache,
    intake: PropertyIntake,
) -> Result<property::Model> {
    if intake.contact_email.trim().is_empty() || !intake.contact_email.contains('@') {
        return Err(Error::validation("a valid contact email is required"));
    }
    if intake.contact_first_name.trim().is_empty() {
        return Err(Error::validation("a contact name is required"));
    }

    let txn = db.begin().await?;
    let property = property::ActiveModel {
        owner_id: Set(None),
        is_active: Set(false),
        authorized: Set(None),
        pending: Set(true),
        pending_contact_first_name: Set(Some(intake.contact_first_name.trim().to_string())),
        pending_contact_family_name: Set(Some(intake.contact_family_name.trim().to_string())),
        pending_contact_phone: Set(intake.contact_phone),
        pending_contact_email: Set(Some(intake.contact_email.trim().to_lowercase())),
        street_number: Set(intake.street_number),
        street: Set(intake.street),
        complement: Set(intake.complement),
        postal_code: Set(intake.postal_code),
        borough: Set(intake.borough),
        publishable_location: Set(None),
        latitude: Set(None),
        longitude: Set(None),
        avg_nb_required_pickers: Set(intake.avg_nb_required_pickers.max(1)),
        public_access: Set(intake.public_access),
        ladder_available: Set(intake.ladder_available),
        ladder_available_for_outside_picks: Set(intake.ladder_available_for_outside_picks),
        additional_info: Set(intake.additional_info),
        changed_by: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    for tree_type_id in &intake.tree_type_ids {
        property_tree::ActiveModel {
            property_id: Set(property.id),
            tree_type_id: Set(*tree_type_id),
        }
        .insert(&txn)
        .await?;
    }
    txn.commit().await?;

    cache.invalidate(Family::Property).await;
    info!(property = property.id, "property registered, awaiting validation");
    Ok(property)
}

/// Recipient for property communications: the owner's login email, or the
/// organization contact, or whoever filled the public form.
async fn property_recipient<C: ConnectionTrait>(
    db: &C,
    property: &property::Model,
) -> Result<Option<(String, Option<i64>)>> {
    if let Some(owner_id) = property.owner_id {
        if let Some(email) = member::actor_email(db, owner_id).await? {
            let person_id = match member::resolve_actor(db, owner_id).await? {
                ActorRef::Person(p) => Some(p.actor_id),
                ActorRef::Organization(o) => o.contact_person_id,
            };
            return Ok(Some((email, person_id)));
        }
    }
    Ok(property
        .pending_contact_email
        .clone()
        .map(|email| (email, None)))
}

/// Validates a pending property. Validating twice is a no-op; the
/// notification goes out only on the first pass.
pub async fn validate_property(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    cache: &ViewCache,
    principal: &Principal,
    property_id: i64,
) -> Result<property::Model> {
    require_core_or_admin(principal)?;
    let property = Property::find_by_id(property_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "property",
            id: property_id,
        })?;
    if !property.pending {
        return Ok(property);
    }

    let mut active = property.clone().into_active_model();
    active.pending = Set(false);
    active.is_active = Set(true);
    active.changed_by = Set(principal.user_id);
    let updated = active.update(db).await?;
    cache.invalidate(Family::Property).await;
    info!(property = property_id, "property validated");

    if let Some((recipient, person_id)) = property_recipient(db, &updated).await? {
        let mut context = HashMap::new();
        context.insert("address", updated.short_address());
        dispatch(
            db,
            mailer,
            NewEmail {
                kind: Some(EmailKind::PropertyRegistered),
                recipient_email: recipient,
                recipient_person_id: person_id,
                property_id: Some(updated.id),
                context,
                ..Default::default()
            },
        )
        .await?;
    }

    Ok(updated)
}

/// Contact surface of a property used by the duplicate scan.
#[derive(Debug, Default)]
struct ContactProfile {
    name: String,
    phone: Option<String>,
    email: Option<String>,
}

fn digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

async fn contact_profile<C: ConnectionTrait>(
    db: &C,
    property: &property::Model,
) -> Result<ContactProfile> {
    if let Some(owner_id) = property.owner_id {
        let (name, phone) = match member::resolve_actor(db, owner_id).await? {
            ActorRef::Person(p) => (p.name(), p.phone.clone()),
            ActorRef::Organization(o) => (o.civil_name.clone(), o.phone.clone()),
        };
        let email = member::actor_email(db, owner_id).await?;
        return Ok(ContactProfile {
            name: name.to_lowercase(),
            phone,
            email: email.map(|e| e.to_lowercase()),
        });
    }
    Ok(ContactProfile {
        name: format!(
            "{} {}",
            property.pending_contact_first_name.clone().unwrap_or_default(),
            property.pending_contact_family_name.clone().unwrap_or_default()
        )
        .trim()
        .to_lowercase(),
        phone: property.pending_contact_phone.clone(),
        email: property
            .pending_contact_email
            .clone()
            .map(|e| e.to_lowercase()),
    })
}

fn icontains(haystack: &Option<String>, needle: &Option<String>) -> bool {
    match (haystack, needle) {
        (Some(h), Some(n)) if !n.trim().is_empty() => {
            h.to_lowercase().contains(&n.trim().to_lowercase())
        }
        _ => false,
    }
}

fn profiles_match(a: &ContactProfile, b: &ContactProfile) -> bool {
    if let (Some(ea), Some(eb)) = (&a.email, &b.email)
        && ea == eb
    {
        return true;
    }
    if !a.name.is_empty() && !b.name.is_empty() && (a.name.contains(&b.name) || b.name.contains(&a.name)) {
        return true;
    }
    if let (Some(pa), Some(pb)) = (&a.phone, &b.phone) {
        let (pa, pb) = (digits(pa), digits(pb));
        if !pa.is_empty() && pa == pb {
            return true;
        }
    }
    false
}

fn addresses_match(a: &property::Model, b: &property::Model) -> bool {
    icontains(&a.street, &b.street)
        && icontains(&a.street_number, &b.street_number)
        && (icontains(&a.postal_code, &b.postal_code)
            || (a.borough.is_some() && a.borough == b.borough))
}

/// Advisory duplicate scan for a pending property: other properties with
/// the same contact email, a matching name or phone, or the same address.
pub async fn similar_properties(
    db: &DatabaseConnection,
    principal: &Principal,
    property_id: i64,
) -> Result<Vec<property::Model>> {
    require_core_or_admin(principal)?;
    let target = Property::find_by_id(property_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "property",
            id: property_id,
        })?;
    let target_profile = contact_profile(db, &target).await?;

    let mut similar = Vec::new();
    for other in Property::find()
        .filter(property::Column::Id.ne(property_id))
        .all(db)
        .await?
    {
        let profile = contact_profile(db, &other).await?;
        if profiles_match(&target_profile, &profile) || addresses_match(&target, &other) {
            similar.push(other);
        }
    }
    Ok(similar)
}

/// Season rollover: forgets last year's consent on every property.
pub async fn reset_authorizations(
    db: &DatabaseConnection,
    cache: &ViewCache,
    principal: &Principal,
) -> Result<u64> {
    require_admin(principal)?;
    let reset = Property::update_many()
        .col_expr(property::Column::Authorized, sea_orm::sea_query::Expr::value(Option::<bool>::None))
        .exec(db)
        .await?
        .rows_affected;
    cache.invalidate(Family::Property).await;
    info!(reset, "seasonal authorizations cleared");
    Ok(reset)
}

/// Asks the owner for this season's consent.
pub async fn send_authorization_email(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    principal: &Principal,
    property_id: i64,
) -> Result<bool> {
    require_admin(principal)?;
    let property = Property::find_by_id(property_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "property",
            id: property_id,
        })?;

    let Some((recipient, person_id)) = property_recipient(db, &property).await? else {
        return Err(Error::validation(format!(
            "property {property_id} has no reachable contact"
        )));
    };
    let mut context = HashMap::new();
    context.insert("address", property.short_address());
    dispatch(
        db,
        mailer,
        NewEmail {
            kind: Some(EmailKind::SeasonAuthorization),
            recipient_email: recipient,
            recipient_person_id: person_id,
            property_id: Some(property.id),
            context,
            ..Default::default()
        },
    )
    .await
}

/// Outreach state of one property in the seasonal authorization round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationOutreach {
    pub property_id: i64,
    /// An authorization request was sent this season
    pub contacted: bool,
    /// The owner has answered either way
    pub responded: bool,
}

/// Reports which owners have been asked and which have answered. Drives the
/// admin follow-up list during the authorization round.
pub async fn authorization_report(
    db: &DatabaseConnection,
    principal: &Principal,
) -> Result<Vec<AuthorizationOutreach>> {
    require_core_or_admin(principal)?;
    let properties = Property::find()
        .filter(property::Column::IsActive.eq(true))
        .all(db)
        .await?;

    let mut report = Vec::with_capacity(properties.len());
    for property in properties {
        let contacted = Email::find()
            .filter(email::Column::PropertyId.eq(property.id))
            .filter(email::Column::Kind.eq(EmailKind::SeasonAuthorization))
            .filter(email::Column::Sent.eq(true))
            .count(db)
            .await?
            > 0;
        report.push(AuthorizationOutreach {
            property_id: property.id,
            contacted,
            responded: property.authorized.is_some(),
        });
    }
    Ok(report)
}

/// Records the owner's answer for the season.
pub async fn set_authorization(
    db: &DatabaseConnection,
    cache: &ViewCache,
    principal: &Principal,
    property_id: i64,
    authorized: bool,
) -> Result<property::Model> {
    require_core_or_admin(principal)?;
    let property = Property::find_by_id(property_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "property",
            id: property_id,
        })?;

    let mut active = property.into_active_model();
    active.authorized = Set(Some(authorized));
    active.changed_by = Set(principal.user_id);
    let updated = active.update(db).await?;
    cache.invalidate(Family::Property).await;
    Ok(updated)
}

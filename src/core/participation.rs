//! Participation requests - the volunteer side of a harvest.
//!
//! Requests arrive through the public form keyed by email; the pick leader
//! accepts or declines them. Capacity is checked at the moment of
//! acceptance, inside the transaction that flips the status.

use crate::{
    cache::{Family, ViewCache},
    core::{
        auth::Principal,
        harvest::{is_open_to_requests, location_of},
        member::{self, NewPerson},
    },
    entities::{
        EmailKind, Harvest, Language, Participation, ParticipationStatus, Role, User, harvest,
        participation,
    },
    errors::{Error, Result},
    notify::{Mailer, NewEmail, dispatch},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;
use tracing::{info, warn};

/// Permitted edges of the request machine. Obsolete is only written by the
/// scheduled sweep, never by hand.
#[must_use]
pub fn allowed_transition(from: ParticipationStatus, to: ParticipationStatus) -> bool {
    use ParticipationStatus::{Accepted, Cancelled, Declined, Obsolete, Pending};
    match from {
        Pending => matches!(to, Accepted | Declined | Cancelled | Obsolete),
        Accepted => matches!(to, Cancelled | Obsolete),
        Declined | Cancelled | Obsolete => false,
    }
}

/// A participation request from the public form.
#[derive(Debug, Clone, Default)]
pub struct NewRequest {
    pub harvest_id: i64,
    pub email: String,
    pub first_name: String,
    pub family_name: String,
    pub phone: Option<String>,
    pub language: Option<Language>,
    /// Group size, 1..=99
    pub number_of_pickers: i32,
    pub comment: Option<String>,
}

/// Files a request to join a harvest. The email either matches an existing
/// account or a volunteer person + login is created on the fly. One request
/// per person per harvest; the pick leader is notified.
pub async fn create_request(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    cache: &ViewCache,
    principal: &Principal,
    new: NewRequest,
) -> Result<participation::Model> {
    if !(1..=99).contains(&new.number_of_pickers) {
        return Err(Error::validation(
            "number of pickers must be between 1 and 99",
        ));
    }

    let harvest = Harvest::find_by_id(new.harvest_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "harvest",
            id: new.harvest_id,
        })?;
    if !is_open_to_requests(&harvest, Utc::now(), !principal.is_staff()) {
        return Err(Error::validation(
            "this harvest is not taking participation requests",
        ));
    }

    let person_id = match member::find_user_by_email(db, &new.email).await? {
        Some(user) => match user.person_id {
            Some(person_id) => person_id,
            None => {
                // Old account without a profile; attach one now
                let person = member::create_person(
                    db,
                    NewPerson {
                        first_name: new.first_name.clone(),
                        family_name: new.family_name.clone(),
                        phone: new.phone.clone(),
                        language: new.language,
                    },
                )
                .await?;
                let mut active = user.into_active_model();
                active.person_id = Set(Some(person.actor_id));
                active.update(db).await?;
                person.actor_id
            }
        },
        None => {
            let person = member::create_person(
                db,
                NewPerson {
                    first_name: new.first_name.clone(),
                    family_name: new.family_name.clone(),
                    phone: new.phone.clone(),
                    language: new.language,
                },
            )
            .await?;
            member::create_user(db, &new.email, Some(person.actor_id), &[Role::Volunteer]).await?;
            person.actor_id
        }
    };

    let already = Participation::find()
        .filter(participation::Column::HarvestId.eq(harvest.id))
        .filter(participation::Column::PersonId.eq(person_id))
        .count(db)
        .await?;
    if already > 0 {
        return Err(Error::validation(
            "you have already requested to join this harvest",
        ));
    }

    let now = Utc::now();
    let request = participation::ActiveModel {
        harvest_id: Set(harvest.id),
        person_id: Set(person_id),
        status: Set(ParticipationStatus::Pending),
        number_of_pickers: Set(new.number_of_pickers),
        comment: Set(new.comment),
        created_at: Set(now),
        status_changed_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    cache.invalidate(Family::Harvest).await;
    info!(
        participation = request.id,
        harvest = harvest.id,
        "participation request filed"
    );

    if let Some(leader_id) = harvest.pick_leader_id
        && let Some(leader) = User::find_by_id(leader_id).one(db).await?
    {
        let mut context = HashMap::new();
        context.insert("harvest_id", harvest.id.to_string());
        context.insert("location", location_of(db, &harvest).await?);
        context.insert(
            "requester",
            format!("{} {}", new.first_name, new.family_name),
        );
        context.insert("number_of_pickers", new.number_of_pickers.to_string());
        dispatch(
            db,
            mailer,
            NewEmail {
                kind: Some(EmailKind::NewRfp),
                recipient_email: leader.email,
                recipient_person_id: leader.person_id,
                harvest_id: Some(harvest.id),
                context,
                ..Default::default()
            },
        )
        .await?;
    }

    Ok(request)
}

/// Sum of accepted group sizes, excluding one request.
async fn accepted_pickers(
    txn: &DatabaseTransaction,
    harvest_id: i64,
    excluding: i64,
) -> Result<i32> {
    let accepted = Participation::find()
        .filter(participation::Column::HarvestId.eq(harvest_id))
        .filter(participation::Column::Status.eq(ParticipationStatus::Accepted))
        .filter(participation::Column::Id.ne(excluding))
        .all(txn)
        .await?;
    Ok(accepted.iter().map(|p| p.number_of_pickers).sum())
}

async fn may_decide(
    db: &DatabaseConnection,
    principal: &Principal,
    harvest: &harvest::Model,
    request: &participation::Model,
    to: ParticipationStatus,
) -> Result<()> {
    if principal.may_edit_harvest(harvest) {
        return Ok(());
    }
    // Volunteers may withdraw their own request
    if to == ParticipationStatus::Cancelled
        && let Some(user_id) = principal.user_id
        && let Some(user) = User::find_by_id(user_id).one(db).await?
        && user.person_id == Some(request.person_id)
    {
        return Ok(());
    }
    Err(Error::authorization(
        "only the pick leader may decide on participation requests",
    ))
}

/// Moves a request to `to`. Acceptance re-checks the harvest capacity inside
/// the transaction; setting the current status again is a no-op that leaves
/// `status_changed_at` untouched.
pub async fn set_status(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    cache: &ViewCache,
    principal: &Principal,
    participation_id: i64,
    to: ParticipationStatus,
    override_body: Option<String>,
) -> Result<participation::Model> {
    let request = Participation::find_by_id(participation_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "participation",
            id: participation_id,
        })?;
    let harvest = Harvest::find_by_id(request.harvest_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "harvest",
            id: request.harvest_id,
        })?;
    may_decide(db, principal, &harvest, &request, to).await?;

    let from = request.status;
    if from == to {
        return Ok(request);
    }
    if from.is_terminal() {
        return Err(Error::Conflict {
            message: format!("request {participation_id} is {from:?} and can no longer change"),
        });
    }
    if !allowed_transition(from, to) {
        return Err(Error::Conflict {
            message: format!("cannot move a {from:?} request to {to:?}"),
        });
    }

    let txn = db.begin().await?;
    if to == ParticipationStatus::Accepted {
        // Lock the harvest row so two concurrent acceptances cannot both
        // pass the capacity check
        Harvest::find_by_id(harvest.id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(Error::NotFound {
                entity: "harvest",
                id: harvest.id,
            })?;
        let taken = accepted_pickers(&txn, harvest.id, request.id).await?;
        if taken + request.number_of_pickers > harvest.nb_required_pickers {
            txn.rollback().await?;
            return Err(Error::validation(format!(
                "accepting this request would exceed the {} pickers needed",
                harvest.nb_required_pickers
            )));
        }
    }
    let person_id = request.person_id;
    let mut active = request.into_active_model();
    active.status = Set(to);
    active.status_changed_at = Set(Utc::now());
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    cache.invalidate(Family::Harvest).await;
    info!(participation = participation_id, from = ?from, to = ?to, "request status changed");

    let kind = match to {
        ParticipationStatus::Accepted => Some(EmailKind::SelectedPicker),
        ParticipationStatus::Declined => Some(EmailKind::RejectedPicker),
        _ => None,
    };
    if let Some(kind) = kind {
        match member::actor_email(db, person_id).await? {
            Some(email) => {
                let mut context = HashMap::new();
                context.insert("location", location_of(db, &harvest).await?);
                context.insert(
                    "start_date",
                    harvest
                        .start_date
                        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default(),
                );
                dispatch(
                    db,
                    mailer,
                    NewEmail {
                        kind: Some(kind),
                        recipient_email: email,
                        recipient_person_id: Some(person_id),
                        harvest_id: Some(harvest.id),
                        context,
                        override_body,
                        ..Default::default()
                    },
                )
                .await?;
            }
            None => warn!(
                participation = participation_id,
                "requester has no reachable email"
            ),
        }
    }

    Ok(updated)
}

/// Records attendance after the pick; allowed on any status, including
/// terminal rows.
pub async fn set_showed_up(
    db: &DatabaseConnection,
    principal: &Principal,
    participation_id: i64,
    showed_up: Option<bool>,
) -> Result<participation::Model> {
    let request = Participation::find_by_id(participation_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "participation",
            id: participation_id,
        })?;
    let harvest = Harvest::find_by_id(request.harvest_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "harvest",
            id: request.harvest_id,
        })?;
    crate::core::auth::require_harvest_editor(principal, &harvest)?;

    let mut active = request.into_active_model();
    active.showed_up = Set(showed_up);
    active.update(db).await.map_err(Into::into)
}

/// Marks pending requests on finished harvests obsolete. Run from the
/// maintenance binary; returns how many rows were swept.
pub async fn sweep_obsolete(db: &DatabaseConnection) -> Result<u64> {
    let now = Utc::now();
    let pending = Participation::find()
        .filter(participation::Column::Status.eq(ParticipationStatus::Pending))
        .find_also_related(Harvest)
        .all(db)
        .await?;

    let mut swept = 0;
    for (request, harvest) in pending {
        let Some(harvest) = harvest else { continue };
        let ended = harvest.status.is_terminal()
            || harvest.end_date.is_some_and(|end| end < now);
        if !ended {
            continue;
        }
        let mut active = request.into_active_model();
        active.status = Set(ParticipationStatus::Obsolete);
        active.status_changed_at = Set(now);
        active.update(db).await?;
        swept += 1;
    }
    if swept > 0 {
        info!(swept, "stale participation requests marked obsolete");
    }
    Ok(swept)
}

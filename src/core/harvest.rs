//! Harvest lifecycle - creation, status transitions, scheduling and yields.
//!
//! All writes go through this module so the state-machine preconditions are
//! enforced in one place. Multi-row mutations run inside a transaction;
//! cache invalidation and notifications run after commit.

use crate::{
    cache::{Family, ViewCache},
    config::AppConfig,
    core::{
        auth::{Principal, require_admin, require_harvest_editor, require_staff},
        equipment, member,
    },
    entities::{
        Harvest, HarvestEquipment, HarvestStatus, Participation, ParticipationStatus, Person,
        Property, PropertyTree, User, comment, harvest, harvest_equipment, harvest_tree,
        harvest_yield, participation, property_tree,
    },
    errors::{Error, Result},
    notify::{Mailer, NewEmail, dispatch},
};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{info, warn};

/// Matches rich-text tags and whitespace; what survives the strip is the
/// visible announcement text.
#[allow(clippy::expect_used)]
static TAG_OR_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<.*?>|\s+").expect("static pattern"));

/// Whether a rich-text announcement renders as visually empty.
#[must_use]
pub fn announcement_is_blank(html: &str) -> bool {
    TAG_OR_SPACE.replace_all(html, "").is_empty()
}

/// Permitted edges of the status machine.
#[must_use]
pub fn allowed_transition(from: HarvestStatus, to: HarvestStatus) -> bool {
    use HarvestStatus::{Adopted, Cancelled, Orphan, Pending, Ready, Scheduled, Succeeded};
    match from {
        Orphan => matches!(to, Adopted | Cancelled),
        Adopted => matches!(to, Pending | Scheduled | Orphan | Cancelled),
        Pending => matches!(to, Scheduled | Adopted | Cancelled),
        Scheduled => matches!(to, Ready | Succeeded | Cancelled),
        Ready => matches!(to, Succeeded | Cancelled),
        Succeeded | Cancelled => false,
    }
}

async fn get<C: ConnectionTrait>(db: &C, id: i64) -> Result<harvest::Model> {
    Harvest::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "harvest",
            id,
        })
}

/// Fields for creating a harvest on a validated property.
#[derive(Debug, Clone, Default)]
pub struct NewHarvest {
    pub property_id: i64,
    /// Trees to pick; must all grow on the property
    pub tree_type_ids: Vec<i64>,
    pub pick_leader_id: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub publication_date: Option<DateTime<Utc>>,
    pub nb_required_pickers: i32,
    pub owner_present: bool,
    pub owner_help: bool,
    pub owner_fruit: bool,
}

/// Creates a harvest. Starts orphan, or adopted when a pick leader is
/// supplied. The property must be active and hold this season's consent.
pub async fn create_harvest(
    db: &DatabaseConnection,
    cache: &ViewCache,
    principal: &Principal,
    new: NewHarvest,
) -> Result<harvest::Model> {
    require_staff(principal)?;

    let property = Property::find_by_id(new.property_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "property",
            id: new.property_id,
        })?;
    if !property.is_active || property.pending {
        return Err(Error::validation(
            "harvests can only be created on active, validated properties",
        ));
    }
    if property.authorized != Some(true) {
        return Err(Error::validation(
            "the owner has not authorized picks on this property this season",
        ));
    }
    if new.nb_required_pickers < 1 {
        return Err(Error::validation("a harvest needs at least one picker"));
    }
    if let (Some(start), Some(end)) = (new.start_date, new.end_date)
        && start >= end
    {
        return Err(Error::validation("harvest must start before it ends"));
    }

    if let Some(user_id) = new.pick_leader_id {
        let leader = User::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or(Error::NotFound {
                entity: "user",
                id: user_id,
            })?;
        if !leader.is_staff {
            return Err(Error::validation(
                "only staff members can lead a harvest",
            ));
        }
    }

    let status = if new.pick_leader_id.is_some() {
        HarvestStatus::Adopted
    } else {
        HarvestStatus::Orphan
    };

    let txn = db.begin().await?;
    // The subset check reads inside the transaction so a concurrent tree
    // removal cannot slip between check and commit
    let property_trees: Vec<i64> = PropertyTree::find()
        .filter(property_tree::Column::PropertyId.eq(property.id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|row| row.tree_type_id)
        .collect();
    for tree_type_id in &new.tree_type_ids {
        if !property_trees.contains(tree_type_id) {
            txn.rollback().await?;
            return Err(Error::validation(format!(
                "tree type {tree_type_id} does not grow on property {}",
                property.id
            )));
        }
    }

    let harvest = harvest::ActiveModel {
        status: Set(status),
        property_id: Set(property.id),
        pick_leader_id: Set(new.pick_leader_id),
        start_date: Set(new.start_date),
        end_date: Set(new.end_date),
        publication_date: Set(new.publication_date),
        nb_required_pickers: Set(new.nb_required_pickers),
        announcement: Set(String::new()),
        owner_present: Set(new.owner_present),
        owner_help: Set(new.owner_help),
        owner_fruit: Set(new.owner_fruit),
        date_created: Set(Utc::now()),
        changed_by: Set(principal.user_id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    for tree_type_id in &new.tree_type_ids {
        harvest_tree::ActiveModel {
            harvest_id: Set(harvest.id),
            tree_type_id: Set(*tree_type_id),
        }
        .insert(&txn)
        .await?;
    }
    txn.commit().await?;

    cache.invalidate(Family::Harvest).await;
    info!(harvest = harvest.id, property = property.id, "harvest created");
    Ok(harvest)
}

fn check_schedule(config: &AppConfig, harvest: &harvest::Model, to: HarvestStatus) -> Result<()> {
    let (Some(start), Some(end)) = (harvest.start_date, harvest.end_date) else {
        return Err(Error::validation(format!(
            "a {to:?} harvest needs both a start and an end time"
        )));
    };
    if start >= end {
        return Err(Error::validation("harvest must start before it ends"));
    }
    let tz = config.timezone;
    if start.with_timezone(&tz).date_naive() != end.with_timezone(&tz).date_naive() {
        return Err(Error::validation(
            "harvest must start and end on the same calendar day",
        ));
    }
    Ok(())
}

/// Transitions a harvest to `to`, enforcing the machine's preconditions.
///
/// Setting orphan on a harvest that has a pick leader promotes to adopted
/// instead of failing. Leaving the reservation-holding states releases any
/// reserved equipment in the same transaction. Closing picker selection
/// (scheduled to ready) notifies the still-pending requesters without
/// touching their status.
pub async fn set_status(
    db: &DatabaseConnection,
    config: &AppConfig,
    mailer: &dyn Mailer,
    cache: &ViewCache,
    principal: &Principal,
    harvest_id: i64,
    to: HarvestStatus,
) -> Result<harvest::Model> {
    let harvest = get(db, harvest_id).await?;
    require_harvest_editor(principal, &harvest)?;

    let from = harvest.status;
    if from.is_terminal() {
        return Err(Error::Conflict {
            message: format!("harvest {harvest_id} is {from:?} and can no longer change status"),
        });
    }

    // A leaderless orphan stays orphan; with a leader the intent is adopted.
    let to = if to == HarvestStatus::Orphan && harvest.pick_leader_id.is_some() {
        HarvestStatus::Adopted
    } else {
        to
    };
    if from == to {
        return Ok(harvest);
    }
    if !allowed_transition(from, to) {
        return Err(Error::Conflict {
            message: format!("cannot move a {from:?} harvest to {to:?}"),
        });
    }

    match to {
        HarvestStatus::Adopted
        | HarvestStatus::Scheduled
        | HarvestStatus::Ready
        | HarvestStatus::Succeeded
            if harvest.pick_leader_id.is_none() =>
        {
            return Err(Error::validation(format!(
                "a {to:?} harvest needs a pick leader"
            )));
        }
        _ => {}
    }
    if to.requires_announcement() && announcement_is_blank(&harvest.announcement) {
        return Err(Error::validation(
            "the public announcement cannot be empty",
        ));
    }
    if matches!(
        to,
        HarvestStatus::Pending
            | HarvestStatus::Scheduled
            | HarvestStatus::Ready
            | HarvestStatus::Succeeded
    ) {
        check_schedule(config, &harvest, to)?;
    }
    let releases_equipment = from.may_hold_reservation() && !to.may_hold_reservation();

    let txn = db.begin().await?;
    // Re-read under lock so a racing request cannot slip in between the
    // open-participation check and the commit
    let harvest = Harvest::find_by_id(harvest_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "harvest",
            id: harvest_id,
        })?;
    if to == HarvestStatus::Orphan {
        let open = Participation::find()
            .filter(participation::Column::HarvestId.eq(harvest_id))
            .filter(participation::Column::Status.is_in([
                ParticipationStatus::Pending,
                ParticipationStatus::Accepted,
            ]))
            .count(&txn)
            .await?;
        if open > 0 {
            txn.rollback().await?;
            return Err(Error::Conflict {
                message: "cannot orphan a harvest with open participation requests".to_string(),
            });
        }
    }
    if releases_equipment {
        HarvestEquipment::delete_many()
            .filter(harvest_equipment::Column::HarvestId.eq(harvest_id))
            .exec(&txn)
            .await?;
    }
    let mut active = harvest.into_active_model();
    active.status = Set(to);
    active.changed_by = Set(principal.user_id);
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    cache.invalidate(Family::Harvest).await;
    if releases_equipment {
        cache.invalidate(Family::Equipment).await;
    }
    info!(harvest = harvest_id, from = ?from, to = ?to, "harvest status changed");

    if from == HarvestStatus::Scheduled && to == HarvestStatus::Ready {
        notify_unselected(db, mailer, &updated).await?;
    }

    Ok(updated)
}

/// Tells the still-pending requesters the pick is full. Their requests stay
/// pending; the leader may still accept one later if someone drops out.
async fn notify_unselected(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    harvest: &harvest::Model,
) -> Result<()> {
    let pending = Participation::find()
        .filter(participation::Column::HarvestId.eq(harvest.id))
        .filter(participation::Column::Status.eq(ParticipationStatus::Pending))
        .all(db)
        .await?;
    if pending.is_empty() {
        return Ok(());
    }

    let location = location_of(db, harvest).await?;
    for request in pending {
        let Some(email) = member::actor_email(db, request.person_id).await? else {
            warn!(
                participation = request.id,
                "pending requester has no reachable email"
            );
            continue;
        };
        let mut context = HashMap::new();
        context.insert("location", location.clone());
        dispatch(
            db,
            mailer,
            NewEmail {
                kind: Some(crate::entities::EmailKind::UnselectedPickers),
                recipient_email: email,
                recipient_person_id: Some(request.person_id),
                harvest_id: Some(harvest.id),
                context,
                ..Default::default()
            },
        )
        .await?;
    }
    Ok(())
}

/// Location string safe for public communications.
pub async fn location_of<C: ConnectionTrait>(db: &C, harvest: &harvest::Model) -> Result<String> {
    let property = Property::find_by_id(harvest.property_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "property",
            id: harvest.property_id,
        })?;
    Ok(property
        .publishable_location
        .clone()
        .unwrap_or_else(|| property.short_address()))
}

/// Assigns or clears the pick leader. Assigning on an orphan promotes it to
/// adopted. Clearing is rejected while the status requires a leader; the
/// harvest must be moved back first.
pub async fn assign_pick_leader(
    db: &DatabaseConnection,
    cache: &ViewCache,
    principal: &Principal,
    harvest_id: i64,
    pick_leader_id: Option<i64>,
) -> Result<harvest::Model> {
    let harvest = get(db, harvest_id).await?;
    require_harvest_editor(principal, &harvest)?;
    if harvest.status.is_terminal() {
        return Err(Error::Conflict {
            message: format!("harvest {harvest_id} is {:?}", harvest.status),
        });
    }

    let mut active = harvest.clone().into_active_model();
    match pick_leader_id {
        Some(user_id) => {
            let leader = User::find_by_id(user_id)
                .one(db)
                .await?
                .ok_or(Error::NotFound {
                    entity: "user",
                    id: user_id,
                })?;
            if !leader.is_staff {
                return Err(Error::validation(
                    "only staff members can lead a harvest",
                ));
            }
            active.pick_leader_id = Set(Some(user_id));
            if harvest.status == HarvestStatus::Orphan {
                active.status = Set(HarvestStatus::Adopted);
            }
        }
        None => {
            if matches!(
                harvest.status,
                HarvestStatus::Adopted
                    | HarvestStatus::Pending
                    | HarvestStatus::Scheduled
                    | HarvestStatus::Ready
                    | HarvestStatus::Succeeded
            ) {
                return Err(Error::Conflict {
                    message: format!(
                        "a {:?} harvest needs a pick leader; change its status first",
                        harvest.status
                    ),
                });
            }
            active.pick_leader_id = Set(None);
        }
    }
    active.changed_by = Set(principal.user_id);
    let updated = active.update(db).await?;
    cache.invalidate(Family::Harvest).await;
    Ok(updated)
}

/// Updates the schedule and announcement of a harvest.
pub async fn set_schedule(
    db: &DatabaseConnection,
    config: &AppConfig,
    cache: &ViewCache,
    principal: &Principal,
    harvest_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    publication_date: Option<DateTime<Utc>>,
    announcement: Option<String>,
) -> Result<harvest::Model> {
    let harvest = get(db, harvest_id).await?;
    require_harvest_editor(principal, &harvest)?;
    if harvest.status.is_terminal() {
        return Err(Error::Conflict {
            message: format!("harvest {harvest_id} is {:?}", harvest.status),
        });
    }

    let mut active = harvest.clone().into_active_model();
    active.start_date = Set(Some(start));
    active.end_date = Set(Some(end));
    active.publication_date = Set(publication_date);
    if let Some(announcement) = announcement {
        active.announcement = Set(announcement);
    }
    active.changed_by = Set(principal.user_id);

    // Re-run the date rules against the prospective values
    let probe = harvest::Model {
        start_date: Some(start),
        end_date: Some(end),
        ..harvest.clone()
    };
    if matches!(
        harvest.status,
        HarvestStatus::Pending
            | HarvestStatus::Scheduled
            | HarvestStatus::Ready
            | HarvestStatus::Succeeded
    ) {
        check_schedule(config, &probe, harvest.status)?;
    } else if start >= end {
        return Err(Error::validation("harvest must start before it ends"));
    }

    // A held reservation must still be free in the new window
    let txn = db.begin().await?;
    if harvest.status.may_hold_reservation()
        && equipment::reservation_conflicts(
            &txn,
            harvest_id,
            start,
            end,
            config.reservation_buffer,
        )
        .await?
    {
        txn.rollback().await?;
        return Err(Error::Conflict {
            message: "the reserved equipment point is not free in the new window".to_string(),
        });
    }
    let updated = active.update(&txn).await?;
    txn.commit().await?;
    cache.invalidate(Family::Harvest).await;
    Ok(updated)
}

/// Calendar year of the harvest in the configured timezone.
#[must_use]
pub fn season(config: &AppConfig, harvest: &harvest::Model) -> Option<i32> {
    use chrono::Datelike;
    harvest
        .start_date
        .map(|start| start.with_timezone(&config.timezone).year())
}

/// An orphan less than 14 days out, or a scheduled pick less than 3 days
/// out, needs attention.
#[must_use]
pub fn is_urgent(harvest: &harvest::Model, now: DateTime<Utc>) -> bool {
    let days = match harvest.status {
        HarvestStatus::Orphan => 14,
        HarvestStatus::Scheduled => 3,
        _ => return false,
    };
    harvest
        .start_date
        .is_some_and(|start| start - now < Duration::days(days))
}

/// A ready harvest starting today (in the configured timezone).
#[must_use]
pub fn is_happening(config: &AppConfig, harvest: &harvest::Model, now: DateTime<Utc>) -> bool {
    harvest.status == HarvestStatus::Ready
        && harvest.start_date.is_some_and(|start| {
            start.with_timezone(&config.timezone).date_naive()
                == now.with_timezone(&config.timezone).date_naive()
        })
}

/// Whether the harvest may appear on public pages.
#[must_use]
pub fn is_publishable(harvest: &harvest::Model, now: DateTime<Utc>) -> bool {
    matches!(
        harvest.status,
        HarvestStatus::Scheduled | HarvestStatus::Ready | HarvestStatus::Succeeded
    ) && harvest.publication_date.is_none_or(|published| now > published)
}

/// Whether new participation requests are taken. The public form only sees
/// scheduled harvests; staff may also file requests earlier in the pipeline.
#[must_use]
pub fn is_open_to_requests(harvest: &harvest::Model, now: DateTime<Utc>, public: bool) -> bool {
    let status_open = if public {
        harvest.status == HarvestStatus::Scheduled
    } else {
        matches!(
            harvest.status,
            HarvestStatus::Scheduled
                | HarvestStatus::Adopted
                | HarvestStatus::Pending
                | HarvestStatus::Ready
        )
    };
    status_open && harvest.end_date.is_some_and(|end| end > now)
}

/// Backfills missing dates: start from the creation timestamp, end from
/// start. Returns how many rows were repaired.
pub async fn cleanup_dates(db: &DatabaseConnection) -> Result<u64> {
    let broken = Harvest::find()
        .filter(
            sea_orm::Condition::any()
                .add(harvest::Column::StartDate.is_null())
                .add(harvest::Column::EndDate.is_null()),
        )
        .all(db)
        .await?;

    let mut repaired = 0;
    for harvest in broken {
        let start = harvest.start_date.unwrap_or(harvest.date_created);
        let end = harvest.end_date.unwrap_or(start);
        let mut active = harvest.into_active_model();
        active.start_date = Set(Some(start));
        active.end_date = Set(Some(end));
        active.update(db).await?;
        repaired += 1;
    }
    if repaired > 0 {
        info!(repaired, "harvest dates backfilled");
    }
    Ok(repaired)
}

/// Outcome of a bulk action, with per-item failures kept for reporting.
#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub done: usize,
    pub total: usize,
    pub failures: Vec<(i64, String)>,
}

impl BulkOutcome {
    /// One-line summary for logs and the admin UI.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("cancelled {} of {}", self.done, self.total)
    }
}

/// Cancels several harvests, continuing past individual failures.
pub async fn bulk_cancel(
    db: &DatabaseConnection,
    config: &AppConfig,
    mailer: &dyn Mailer,
    cache: &ViewCache,
    principal: &Principal,
    harvest_ids: &[i64],
) -> Result<BulkOutcome> {
    require_admin(principal)?;

    let mut outcome = BulkOutcome {
        total: harvest_ids.len(),
        ..Default::default()
    };
    for &id in harvest_ids {
        match set_status(db, config, mailer, cache, principal, id, HarvestStatus::Cancelled).await {
            Ok(_) => outcome.done += 1,
            Err(e) => {
                warn!(harvest = id, error = %e, "bulk cancel skipped one harvest");
                outcome.failures.push((id, e.to_string()));
            }
        }
    }
    info!("{}", outcome.summary());
    Ok(outcome)
}

/// Records a weighed share of the pick handed to a recipient.
pub async fn record_yield(
    db: &DatabaseConnection,
    principal: &Principal,
    harvest_id: i64,
    tree_type_id: i64,
    recipient_id: i64,
    total_in_lb: f64,
) -> Result<harvest_yield::Model> {
    let harvest = get(db, harvest_id).await?;
    require_harvest_editor(principal, &harvest)?;
    if !total_in_lb.is_finite() || total_in_lb < 0.0 {
        return Err(Error::validation("yield weight must be non-negative"));
    }
    // Recipient must exist in the actor space
    member::resolve_actor(db, recipient_id).await?;

    harvest_yield::ActiveModel {
        harvest_id: Set(harvest_id),
        tree_type_id: Set(tree_type_id),
        total_in_lb: Set(total_in_lb),
        recipient_id: Set(recipient_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Adds a staff comment; the pick leader is notified unless they wrote it.
pub async fn add_comment(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    principal: &Principal,
    harvest_id: i64,
    content: &str,
) -> Result<comment::Model> {
    require_staff(principal)?;
    let Some(author_id) = principal.user_id else {
        return Err(Error::authorization("comments require a signed-in user"));
    };
    if content.trim().is_empty() {
        return Err(Error::validation("comment cannot be empty"));
    }
    let harvest = get(db, harvest_id).await?;

    let comment = comment::ActiveModel {
        harvest_id: Set(harvest_id),
        author_id: Set(author_id),
        content: Set(content.trim().to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    if let Some(leader_id) = harvest.pick_leader_id
        && leader_id != author_id
        && let Some(leader) = User::find_by_id(leader_id).one(db).await?
    {
        let author_name = match User::find_by_id(author_id).one(db).await? {
            Some(author) => match author.person_id {
                Some(person_id) => Person::find_by_id(person_id)
                    .one(db)
                    .await?
                    .map_or(author.email.clone(), |p| p.name()),
                None => author.email.clone(),
            },
            None => "someone".to_string(),
        };
        let mut context = HashMap::new();
        context.insert("harvest_id", harvest_id.to_string());
        context.insert("author", author_name);
        context.insert("content", comment.content.clone());
        dispatch(
            db,
            mailer,
            NewEmail {
                kind: Some(crate::entities::EmailKind::NewComment),
                recipient_email: leader.email,
                recipient_person_id: leader.person_id,
                harvest_id: Some(harvest_id),
                context,
                ..Default::default()
            },
        )
        .await?;
    }

    Ok(comment)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{
        RecordingMailer, create_test_harvest, create_test_property, create_test_tree_type,
        create_test_user, setup_test_db, test_config,
    };
    use crate::entities::Role;
    use chrono::TimeZone;

    fn core_principal() -> Principal {
        Principal::new(999, vec![Role::Core])
    }

    #[test]
    fn test_announcement_blankness() {
        assert!(announcement_is_blank(""));
        assert!(announcement_is_blank("<p><br></p>"));
        assert!(announcement_is_blank("<p>  \n\t </p>"));
        assert!(!announcement_is_blank("<p>Apples on Main street!</p>"));
    }

    #[test]
    fn test_transition_matrix() {
        use HarvestStatus::{Adopted, Cancelled, Orphan, Pending, Ready, Scheduled, Succeeded};
        assert!(allowed_transition(Orphan, Adopted));
        assert!(allowed_transition(Adopted, Orphan));
        assert!(allowed_transition(Adopted, Scheduled));
        assert!(allowed_transition(Pending, Scheduled));
        assert!(allowed_transition(Scheduled, Ready));
        assert!(allowed_transition(Scheduled, Succeeded));
        assert!(allowed_transition(Ready, Succeeded));
        for status in [Orphan, Adopted, Pending, Scheduled, Ready] {
            assert!(allowed_transition(status, Cancelled));
        }

        assert!(!allowed_transition(Orphan, Scheduled));
        assert!(!allowed_transition(Orphan, Ready));
        assert!(!allowed_transition(Pending, Ready));
        assert!(!allowed_transition(Succeeded, Cancelled));
        assert!(!allowed_transition(Cancelled, Orphan));
    }

    #[tokio::test]
    async fn test_scheduling_requires_announcement() -> Result<()> {
        let db = setup_test_db().await?;
        let cache = ViewCache::new();
        let mailer = RecordingMailer::default();
        let config = test_config();
        let leader = create_test_user(&db, "leader@example.org").await?;
        let property = create_test_property(&db, None).await?;
        let harvest = create_test_harvest(&db, property.id, Some(leader.id)).await?;

        // adopted -> scheduled with a blank announcement fails
        let result = set_status(
            &db,
            &config,
            &mailer,
            &cache,
            &core_principal(),
            harvest.id,
            HarvestStatus::Scheduled,
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let unchanged = Harvest::find_by_id(harvest.id).one(&db).await?.unwrap();
        assert_eq!(unchanged.status, HarvestStatus::Adopted);
        Ok(())
    }

    #[tokio::test]
    async fn test_trees_must_grow_on_property() -> Result<()> {
        let db = setup_test_db().await?;
        let cache = ViewCache::new();
        let apple = create_test_tree_type(&db, "Apple").await?;
        let pear = create_test_tree_type(&db, "Pear").await?;
        let property = create_test_property(&db, None).await?;
        property_tree::ActiveModel {
            property_id: Set(property.id),
            tree_type_id: Set(apple.id),
        }
        .insert(&db)
        .await?;

        let result = create_harvest(
            &db,
            &cache,
            &core_principal(),
            NewHarvest {
                property_id: property.id,
                tree_type_ids: vec![pear.id],
                nb_required_pickers: 3,
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let ok = create_harvest(
            &db,
            &cache,
            &core_principal(),
            NewHarvest {
                property_id: property.id,
                tree_type_ids: vec![apple.id],
                nb_required_pickers: 3,
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(ok.status, HarvestStatus::Orphan);
        Ok(())
    }

    #[tokio::test]
    async fn test_same_day_rule_and_full_lifecycle() -> Result<()> {
        let db = setup_test_db().await?;
        let cache = ViewCache::new();
        let mailer = RecordingMailer::default();
        let config = test_config();
        let principal = core_principal();
        let leader = create_test_user(&db, "leader@example.org").await?;
        let property = create_test_property(&db, None).await?;
        let harvest = create_test_harvest(&db, property.id, Some(leader.id)).await?;

        // Crossing local midnight is rejected
        let start = Utc.with_ymd_and_hms(2026, 8, 20, 23, 0, 0).unwrap();
        let overnight = set_schedule(
            &db,
            &config,
            &cache,
            &principal,
            harvest.id,
            start,
            start + Duration::hours(8),
            None,
            Some("<p>Apples!</p>".to_string()),
        )
        .await?;
        let result = set_status(
            &db,
            &config,
            &mailer,
            &cache,
            &principal,
            overnight.id,
            HarvestStatus::Scheduled,
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        // Same local day (UTC-5): 14:00-18:00 UTC
        let start = Utc.with_ymd_and_hms(2026, 8, 20, 14, 0, 0).unwrap();
        set_schedule(
            &db,
            &config,
            &cache,
            &principal,
            harvest.id,
            start,
            start + Duration::hours(4),
            None,
            None,
        )
        .await?;
        let scheduled = set_status(
            &db,
            &config,
            &mailer,
            &cache,
            &principal,
            harvest.id,
            HarvestStatus::Scheduled,
        )
        .await?;
        assert_eq!(scheduled.status, HarvestStatus::Scheduled);

        let ready = set_status(
            &db,
            &config,
            &mailer,
            &cache,
            &principal,
            harvest.id,
            HarvestStatus::Ready,
        )
        .await?;
        assert_eq!(ready.status, HarvestStatus::Ready);

        let done = set_status(
            &db,
            &config,
            &mailer,
            &cache,
            &principal,
            harvest.id,
            HarvestStatus::Succeeded,
        )
        .await?;
        assert_eq!(done.status, HarvestStatus::Succeeded);

        // Terminal: no further transitions
        let result = set_status(
            &db,
            &config,
            &mailer,
            &cache,
            &principal,
            harvest.id,
            HarvestStatus::Cancelled,
        )
        .await;
        assert!(matches!(result, Err(Error::Conflict { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_orphan_with_leader_auto_promotes() -> Result<()> {
        let db = setup_test_db().await?;
        let cache = ViewCache::new();
        let mailer = RecordingMailer::default();
        let config = test_config();
        let leader = create_test_user(&db, "leader@example.org").await?;
        let property = create_test_property(&db, None).await?;
        let harvest = create_test_harvest(&db, property.id, Some(leader.id)).await?;

        let updated = set_status(
            &db,
            &config,
            &mailer,
            &cache,
            &core_principal(),
            harvest.id,
            HarvestStatus::Orphan,
        )
        .await?;
        assert_eq!(updated.status, HarvestStatus::Adopted);
        Ok(())
    }

    #[tokio::test]
    async fn test_clearing_leader_rejected_while_required() -> Result<()> {
        let db = setup_test_db().await?;
        let cache = ViewCache::new();
        let leader = create_test_user(&db, "leader@example.org").await?;
        let property = create_test_property(&db, None).await?;
        let harvest = create_test_harvest(&db, property.id, Some(leader.id)).await?;

        let result =
            assign_pick_leader(&db, &cache, &core_principal(), harvest.id, None).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        // A pending harvest needs its leader just as much
        let mut active = harvest.into_active_model();
        active.status = Set(HarvestStatus::Pending);
        let pending = active.update(&db).await?;
        let result =
            assign_pick_leader(&db, &cache, &core_principal(), pending.id, None).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));
        let kept = Harvest::find_by_id(pending.id).one(&db).await?.unwrap();
        assert_eq!(kept.pick_leader_id, Some(leader.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_reschedule_rejected_when_reservation_clashes() -> Result<()> {
        let db = setup_test_db().await?;
        let cache = ViewCache::new();
        let config = test_config();
        let leader = create_test_user(&db, "leader@example.org").await?;
        let point = crate::test_utils::create_test_equipment_point(&db, "Depot").await?;
        let buffer = config.reservation_buffer;

        // Two scheduled picks hold the same point in disjoint windows
        let day = Utc.with_ymd_and_hms(2026, 8, 20, 14, 0, 0).unwrap();
        let mut harvests = Vec::new();
        for offset in [Duration::zero(), Duration::hours(5)] {
            let property = create_test_property(&db, None).await?;
            let harvest = create_test_harvest(&db, property.id, Some(leader.id)).await?;
            let mut active = harvest.into_active_model();
            active.status = Set(HarvestStatus::Scheduled);
            active.start_date = Set(Some(day + offset));
            active.end_date = Set(Some(day + offset + Duration::hours(2)));
            active.announcement = Set("<p>Apples!</p>".to_string());
            let harvest = active.update(&db).await?;
            crate::core::equipment::reserve_equipment_point(
                &db,
                &cache,
                &core_principal(),
                harvest.id,
                point.actor_id,
                buffer,
            )
            .await?;
            harvests.push(harvest);
        }

        // Moving the first pick onto the second's window must fail
        let clash = set_schedule(
            &db,
            &config,
            &cache,
            &core_principal(),
            harvests[0].id,
            day + Duration::hours(5),
            day + Duration::hours(7),
            None,
            None,
        )
        .await;
        assert!(matches!(clash, Err(Error::Conflict { .. })));
        let kept = Harvest::find_by_id(harvests[0].id).one(&db).await?.unwrap();
        assert_eq!(kept.start_date, Some(day));

        // A still-free slot on the same day is fine
        set_schedule(
            &db,
            &config,
            &cache,
            &core_principal(),
            harvests[0].id,
            day + Duration::hours(1),
            day + Duration::hours(2),
            None,
            None,
        )
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_harvest_checks_the_leader() -> Result<()> {
        let db = setup_test_db().await?;
        let cache = ViewCache::new();
        let property = create_test_property(&db, None).await?;

        let dangling = create_harvest(
            &db,
            &cache,
            &core_principal(),
            NewHarvest {
                property_id: property.id,
                pick_leader_id: Some(4242),
                nb_required_pickers: 3,
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(dangling, Err(Error::NotFound { .. })));

        let volunteer =
            member::create_user(&db, "vol@example.org", None, &[Role::Volunteer]).await?;
        let non_staff = create_harvest(
            &db,
            &cache,
            &core_principal(),
            NewHarvest {
                property_id: property.id,
                pick_leader_id: Some(volunteer.id),
                nb_required_pickers: 3,
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(non_staff, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_maturity_window_predicates() {
        let config = test_config();
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        let harvest = harvest::Model {
            id: 1,
            status: HarvestStatus::Orphan,
            property_id: 1,
            pick_leader_id: None,
            start_date: Some(now + Duration::days(10)),
            end_date: Some(now + Duration::days(10) + Duration::hours(3)),
            publication_date: None,
            nb_required_pickers: 3,
            announcement: String::new(),
            owner_present: false,
            owner_help: false,
            owner_fruit: false,
            date_created: now,
            changed_by: None,
        };

        assert!(is_urgent(&harvest, now));
        assert!(!is_urgent(
            &harvest::Model {
                start_date: Some(now + Duration::days(20)),
                ..harvest.clone()
            },
            now
        ));
        assert!(!is_publishable(&harvest, now));
        assert!(is_publishable(
            &harvest::Model {
                status: HarvestStatus::Scheduled,
                ..harvest.clone()
            },
            now
        ));
        assert!(is_open_to_requests(
            &harvest::Model {
                status: HarvestStatus::Scheduled,
                ..harvest.clone()
            },
            now,
            true
        ));
        // Adopted harvests take requests internally but not publicly
        let adopted = harvest::Model {
            status: HarvestStatus::Adopted,
            ..harvest.clone()
        };
        assert!(!is_open_to_requests(&adopted, now, true));
        assert!(is_open_to_requests(&adopted, now, false));

        assert_eq!(season(&config, &harvest), Some(2026));

        // Happening = ready and starting the same local day
        let ready_today = harvest::Model {
            status: HarvestStatus::Ready,
            start_date: Some(now + Duration::hours(5)),
            ..harvest.clone()
        };
        assert!(is_happening(&config, &ready_today, now));
        assert!(!is_happening(
            &config,
            &harvest::Model {
                start_date: Some(now + Duration::days(1)),
                ..ready_today.clone()
            },
            now
        ));
        assert!(!is_happening(
            &config,
            &harvest::Model {
                status: HarvestStatus::Scheduled,
                ..ready_today
            },
            now
        ));
    }

    #[tokio::test]
    async fn test_cleanup_backfills_dates() -> Result<()> {
        let db = setup_test_db().await?;
        let property = create_test_property(&db, None).await?;
        let harvest = create_test_harvest(&db, property.id, None).await?;
        let mut active = harvest.into_active_model();
        active.start_date = Set(None);
        active.end_date = Set(None);
        let harvest = active.update(&db).await?;

        assert_eq!(cleanup_dates(&db).await?, 1);
        let fixed = Harvest::find_by_id(harvest.id).one(&db).await?.unwrap();
        assert_eq!(fixed.start_date, Some(fixed.date_created));
        assert_eq!(fixed.end_date, fixed.start_date);

        // Second run finds nothing
        assert_eq!(cleanup_dates(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_cancel_continues_past_failures() -> Result<()> {
        let db = setup_test_db().await?;
        let cache = ViewCache::new();
        let mailer = RecordingMailer::default();
        let config = test_config();
        let principal = Principal::new(999, vec![Role::Admin]);
        let property = create_test_property(&db, None).await?;
        let a = create_test_harvest(&db, property.id, None).await?;
        let b = create_test_harvest(&db, property.id, None).await?;

        // Pre-cancel b so the bulk run hits a terminal row
        set_status(&db, &config, &mailer, &cache, &principal, b.id, HarvestStatus::Cancelled)
            .await?;

        let outcome =
            bulk_cancel(&db, &config, &mailer, &cache, &principal, &[a.id, b.id, 424_242])
                .await?;
        assert_eq!(outcome.done, 1);
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(outcome.summary(), "cancelled 1 of 3");
        Ok(())
    }

    #[tokio::test]
    async fn test_comment_notifies_leader() -> Result<()> {
        let db = setup_test_db().await?;
        let mailer = RecordingMailer::default();
        let leader = create_test_user(&db, "leader@example.org").await?;
        let author = create_test_user(&db, "core@example.org").await?;
        let property = create_test_property(&db, None).await?;
        let harvest = create_test_harvest(&db, property.id, Some(leader.id)).await?;

        let principal = Principal::new(author.id, vec![Role::Core]);
        add_comment(&db, &mailer, &principal, harvest.id, "Ladder is broken").await?;
        assert_eq!(mailer.messages().len(), 1);
        assert_eq!(mailer.messages()[0].to, "leader@example.org");

        // The leader commenting on their own harvest does not self-notify
        let as_leader = Principal::new(leader.id, vec![Role::Pickleader]);
        add_comment(&db, &mailer, &as_leader, harvest.id, "Fixed it").await?;
        assert_eq!(mailer.messages().len(), 1);
        Ok(())
    }
}

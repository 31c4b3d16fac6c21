//! Equipment points and the reservation engine.
//!
//! Reservations are coarse-grained: a harvest borrows an equipment point's
//! whole inventory for its time window. Availability is computed from the
//! windows of other scheduled or ready harvests, padded by the configured
//! buffer on both sides.

use crate::{
    cache::{Family, ViewCache},
    core::auth::{Principal, require_harvest_editor, require_staff},
    entities::{
        Equipment, Harvest, HarvestEquipment, HarvestStatus, Organization, equipment,
        equipment_type, harvest, harvest_equipment, organization,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use std::collections::HashSet;
use tracing::info;

/// Query window padded by the reservation buffer.
#[derive(Debug, Clone, Copy)]
struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

fn padded_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    buffer: Duration,
) -> Result<Window> {
    if buffer < Duration::zero() {
        return Err(Error::validation("reservation buffer must be non-negative"));
    }
    if start >= end {
        return Err(Error::validation("window must start before it ends"));
    }
    let padded_start = start
        .checked_sub_signed(buffer)
        .ok_or_else(|| Error::validation("window start underflows with buffer"))?;
    let padded_end = end
        .checked_add_signed(buffer)
        .ok_or_else(|| Error::validation("window end overflows with buffer"))?;
    Ok(Window {
        start: padded_start,
        end: padded_end,
    })
}

/// A candidate harvest conflicts when either boundary falls inside the
/// padded window, or when it encloses the window outright (the enclosing arm
/// matters when the buffer is zero).
fn overlaps(window: Window, other_start: DateTime<Utc>, other_end: DateTime<Utc>) -> bool {
    let start_in = other_start >= window.start && other_start < window.end;
    let end_in = other_end > window.start && other_end <= window.end;
    let enclosing = other_start < window.start && other_end > window.end;
    start_in || end_in || enclosing
}

/// Owner actor ids whose equipment is tied up by another harvest during the
/// padded window.
async fn blocked_owners<C: ConnectionTrait>(
    db: &C,
    window: Window,
    excluding_harvest: Option<i64>,
) -> Result<HashSet<i64>> {
    let holding = Harvest::find()
        .filter(harvest::Column::Status.is_in([HarvestStatus::Scheduled, HarvestStatus::Ready]))
        .all(db)
        .await?;

    let mut blocked = HashSet::new();
    for other in holding {
        if Some(other.id) == excluding_harvest {
            continue;
        }
        let (Some(start), Some(end)) = (other.start_date, other.end_date) else {
            continue;
        };
        if !overlaps(window, start, end) {
            continue;
        }
        let reserved = HarvestEquipment::find()
            .filter(harvest_equipment::Column::HarvestId.eq(other.id))
            .find_also_related(Equipment)
            .all(db)
            .await?;
        for (_, item) in reserved {
            if let Some(owner_id) = item.and_then(|i| i.owner_id) {
                blocked.insert(owner_id);
            }
        }
    }
    Ok(blocked)
}

/// Whether moving `harvest_id` to `[start, end]` would pit its reserved
/// equipment against another holding harvest's window.
pub(crate) async fn reservation_conflicts<C: ConnectionTrait>(
    db: &C,
    harvest_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    buffer: Duration,
) -> Result<bool> {
    let own: HashSet<i64> = HarvestEquipment::find()
        .filter(harvest_equipment::Column::HarvestId.eq(harvest_id))
        .find_also_related(Equipment)
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(_, item)| item.and_then(|i| i.owner_id))
        .collect();
    if own.is_empty() {
        return Ok(false);
    }
    let window = padded_window(start, end, buffer)?;
    let blocked = blocked_owners(db, window, Some(harvest_id)).await?;
    Ok(own.intersection(&blocked).next().is_some())
}

/// Equipment points free to lend during `[start - buffer, end + buffer]`.
/// `excluding_harvest` exempts that harvest's own reservation, so a
/// scheduled pick can re-query without seeing itself as a conflict.
pub async fn available_equipment_points(
    db: &DatabaseConnection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    excluding_harvest: Option<i64>,
    buffer: Duration,
) -> Result<Vec<organization::Model>> {
    let window = padded_window(start, end, buffer)?;
    let blocked = blocked_owners(db, window, excluding_harvest).await?;

    let points = Organization::find()
        .filter(organization::Column::IsEquipmentPoint.eq(true))
        .all(db)
        .await?;
    Ok(points
        .into_iter()
        .filter(|point| !blocked.contains(&point.actor_id))
        .collect())
}

/// Reserves an equipment point's whole inventory for a harvest. The
/// availability check reruns inside the transaction, so two harvests racing
/// for the same point cannot both commit.
pub async fn reserve_equipment_point(
    db: &DatabaseConnection,
    cache: &ViewCache,
    principal: &Principal,
    harvest_id: i64,
    organization_id: i64,
    buffer: Duration,
) -> Result<()> {
    let harvest = Harvest::find_by_id(harvest_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "harvest",
            id: harvest_id,
        })?;
    require_harvest_editor(principal, &harvest)?;
    if !harvest.status.may_hold_reservation() {
        return Err(Error::Conflict {
            message: format!(
                "a {:?} harvest cannot hold an equipment reservation",
                harvest.status
            ),
        });
    }
    let (Some(start), Some(end)) = (harvest.start_date, harvest.end_date) else {
        return Err(Error::validation(
            "the harvest needs a schedule before reserving equipment",
        ));
    };

    let point = Organization::find_by_id(organization_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "organization",
            id: organization_id,
        })?;
    if !point.is_equipment_point {
        return Err(Error::validation(format!(
            "{} is not an equipment point",
            point.civil_name
        )));
    }

    let window = padded_window(start, end, buffer)?;
    let txn = db.begin().await?;
    // Lock the harvest row and the point's inventory; two reservations
    // racing for the same point serialize on these rows
    Harvest::find_by_id(harvest_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "harvest",
            id: harvest_id,
        })?;
    let inventory = Equipment::find()
        .filter(equipment::Column::OwnerId.eq(point.actor_id))
        .lock_exclusive()
        .all(&txn)
        .await?;
    if inventory.is_empty() {
        txn.rollback().await?;
        return Err(Error::validation(format!(
            "{} has no equipment to lend",
            point.civil_name
        )));
    }
    let blocked = blocked_owners(&txn, window, Some(harvest_id)).await?;
    if blocked.contains(&point.actor_id) {
        txn.rollback().await?;
        return Err(Error::Conflict {
            message: format!(
                "{} is already lending equipment to an overlapping harvest",
                point.civil_name
            ),
        });
    }

    // Replace any previous reservation wholesale
    HarvestEquipment::delete_many()
        .filter(harvest_equipment::Column::HarvestId.eq(harvest_id))
        .exec(&txn)
        .await?;
    for item in &inventory {
        harvest_equipment::ActiveModel {
            harvest_id: Set(harvest_id),
            equipment_id: Set(item.id),
        }
        .insert(&txn)
        .await?;
    }
    txn.commit().await?;

    cache.invalidate(Family::Equipment).await;
    cache.invalidate(Family::Harvest).await;
    info!(
        harvest = harvest_id,
        point = point.actor_id,
        items = inventory.len(),
        "equipment point reserved"
    );
    Ok(())
}

/// Drops a harvest's equipment reservation. Idempotent.
pub async fn clear_reservation(
    db: &DatabaseConnection,
    cache: &ViewCache,
    principal: &Principal,
    harvest_id: i64,
) -> Result<()> {
    let harvest = Harvest::find_by_id(harvest_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "harvest",
            id: harvest_id,
        })?;
    require_harvest_editor(principal, &harvest)?;

    let dropped = HarvestEquipment::delete_many()
        .filter(harvest_equipment::Column::HarvestId.eq(harvest_id))
        .exec(db)
        .await?
        .rows_affected;
    if dropped > 0 {
        cache.invalidate(Family::Equipment).await;
        cache.invalidate(Family::Harvest).await;
        info!(harvest = harvest_id, dropped, "equipment reservation cleared");
    }
    Ok(())
}

/// Fields for registering a piece of equipment.
#[derive(Debug, Clone, Default)]
pub struct NewEquipment {
    pub type_id: i64,
    pub description: String,
    pub count: i32,
    /// Owning actor, usually an equipment-point organization
    pub owner_id: Option<i64>,
    /// Home property, for owner-provided ladders and such
    pub property_id: Option<i64>,
    pub shared: bool,
}

/// Registers equipment. Exactly one of owner / property must be set, and
/// equipment-point inventory is always shared.
pub async fn create_equipment(
    db: &DatabaseConnection,
    cache: &ViewCache,
    principal: &Principal,
    new: NewEquipment,
) -> Result<equipment::Model> {
    require_staff(principal)?;
    match (new.owner_id, new.property_id) {
        (Some(_), None) | (None, Some(_)) => {}
        _ => {
            return Err(Error::validation(
                "equipment belongs to exactly one of an owner or a property",
            ));
        }
    }
    if new.count < 1 {
        return Err(Error::validation("equipment count must be at least 1"));
    }
    if equipment_type::Entity::find_by_id(new.type_id)
        .one(db)
        .await?
        .is_none()
    {
        return Err(Error::NotFound {
            entity: "equipment type",
            id: new.type_id,
        });
    }

    let mut shared = new.shared;
    if let Some(owner_id) = new.owner_id
        && let Some(org) = Organization::find_by_id(owner_id).one(db).await?
        && org.is_equipment_point
    {
        shared = true;
    }

    let item = equipment::ActiveModel {
        type_id: Set(new.type_id),
        description: Set(new.description),
        count: Set(new.count),
        owner_id: Set(new.owner_id),
        property_id: Set(new.property_id),
        shared: Set(shared),
        ..Default::default()
    }
    .insert(db)
    .await?;

    cache.invalidate(Family::Equipment).await;
    Ok(item)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::Role;
    use crate::test_utils::{
        create_test_equipment_point, create_test_harvest, create_test_property, create_test_user,
        setup_test_db,
    };
    use chrono::TimeZone;
    use sea_orm::IntoActiveModel;

    fn core_principal() -> Principal {
        Principal::new(999, vec![Role::Core])
    }

    async fn scheduled_at(
        db: &DatabaseConnection,
        leader_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<harvest::Model> {
        let property = create_test_property(db, None).await?;
        let harvest = create_test_harvest(db, property.id, Some(leader_id)).await?;
        let mut active = harvest.into_active_model();
        active.status = Set(HarvestStatus::Scheduled);
        active.start_date = Set(Some(start));
        active.end_date = Set(Some(end));
        active.announcement = Set("<p>Apples!</p>".to_string());
        active.update(db).await.map_err(Into::into)
    }

    #[test]
    fn test_window_contract() {
        let start = Utc.with_ymd_and_hms(2026, 8, 20, 10, 0, 0).unwrap();
        assert!(padded_window(start, start, Duration::hours(1)).is_err());
        assert!(padded_window(start + Duration::hours(1), start, Duration::hours(1)).is_err());
        assert!(padded_window(start, start + Duration::hours(2), Duration::hours(-1)).is_err());

        let window = padded_window(start, start + Duration::hours(2), Duration::hours(1)).unwrap();
        assert_eq!(window.start, start - Duration::hours(1));
        assert_eq!(window.end, start + Duration::hours(3));
    }

    #[test]
    fn test_overlap_classification() {
        let start = Utc.with_ymd_and_hms(2026, 8, 20, 10, 0, 0).unwrap();
        let window = padded_window(start, start + Duration::hours(2), Duration::zero()).unwrap();

        // start-during, end-during, enclosing, disjoint
        assert!(overlaps(window, start + Duration::hours(1), start + Duration::hours(4)));
        assert!(overlaps(window, start - Duration::hours(2), start + Duration::hours(1)));
        assert!(overlaps(window, start - Duration::hours(1), start + Duration::hours(3)));
        assert!(!overlaps(window, start + Duration::hours(3), start + Duration::hours(4)));
    }

    #[tokio::test]
    async fn test_availability_excludes_conflicting_point() -> Result<()> {
        let db = setup_test_db().await?;
        let cache = ViewCache::new();
        let leader = create_test_user(&db, "leader@example.org").await?;
        let point = create_test_equipment_point(&db, "Depot A").await?;
        let buffer = Duration::hours(1);

        // Harvest A holds the point 10:00-12:00
        let ten = Utc.with_ymd_and_hms(2026, 8, 20, 10, 0, 0).unwrap();
        let a = scheduled_at(&db, leader.id, ten, ten + Duration::hours(2)).await?;
        reserve_equipment_point(&db, &cache, &core_principal(), a.id, point.actor_id, buffer)
            .await?;

        // 11:00-13:00 overlaps: the point is gone
        let free = available_equipment_points(
            &db,
            ten + Duration::hours(1),
            ten + Duration::hours(3),
            None,
            buffer,
        )
        .await?;
        assert!(free.is_empty());

        // Same query on behalf of harvest A sees its own point
        let free = available_equipment_points(
            &db,
            ten + Duration::hours(1),
            ten + Duration::hours(3),
            Some(a.id),
            buffer,
        )
        .await?;
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].actor_id, point.actor_id);
        Ok(())
    }

    #[tokio::test]
    async fn test_buffer_boundary() -> Result<()> {
        let db = setup_test_db().await?;
        let cache = ViewCache::new();
        let leader = create_test_user(&db, "leader@example.org").await?;
        let point = create_test_equipment_point(&db, "Depot B").await?;
        let buffer = Duration::hours(1);

        let ten = Utc.with_ymd_and_hms(2026, 8, 20, 10, 0, 0).unwrap();
        let a = scheduled_at(&db, leader.id, ten, ten + Duration::hours(2)).await?;
        reserve_equipment_point(&db, &cache, &core_principal(), a.id, point.actor_id, buffer)
            .await?;

        // Starting exactly at end + buffer is fine
        let at_boundary = available_equipment_points(
            &db,
            ten + Duration::hours(3),
            ten + Duration::hours(5),
            None,
            buffer,
        )
        .await?;
        assert_eq!(at_boundary.len(), 1);

        // One second earlier collides
        let inside = available_equipment_points(
            &db,
            ten + Duration::hours(3) - Duration::seconds(1),
            ten + Duration::hours(5),
            None,
            buffer,
        )
        .await?;
        assert!(inside.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_reservation_conflict_fails_atomically() -> Result<()> {
        let db = setup_test_db().await?;
        let cache = ViewCache::new();
        let leader = create_test_user(&db, "leader@example.org").await?;
        let point = create_test_equipment_point(&db, "Depot C").await?;
        let buffer = Duration::hours(1);

        let ten = Utc.with_ymd_and_hms(2026, 8, 20, 10, 0, 0).unwrap();
        let a = scheduled_at(&db, leader.id, ten, ten + Duration::hours(2)).await?;
        let b = scheduled_at(
            &db,
            leader.id,
            ten + Duration::hours(1),
            ten + Duration::hours(3),
        )
        .await?;

        reserve_equipment_point(&db, &cache, &core_principal(), a.id, point.actor_id, buffer)
            .await?;
        let clash =
            reserve_equipment_point(&db, &cache, &core_principal(), b.id, point.actor_id, buffer)
                .await;
        assert!(matches!(clash, Err(Error::Conflict { .. })));

        // Nothing of the failed attempt remains
        let rows = HarvestEquipment::find()
            .filter(harvest_equipment::Column::HarvestId.eq(b.id))
            .all(&db)
            .await?;
        assert!(rows.is_empty());

        // Clearing A frees the point for B
        clear_reservation(&db, &cache, &core_principal(), a.id).await?;
        reserve_equipment_point(&db, &cache, &core_principal(), b.id, point.actor_id, buffer)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_equipment_ownership_is_exclusive() -> Result<()> {
        let db = setup_test_db().await?;
        let cache = ViewCache::new();
        let point = create_test_equipment_point(&db, "Depot D").await?;
        let property = create_test_property(&db, None).await?;
        let ladder_type = equipment_type::ActiveModel {
            name_en: Set("Ladder".to_string()),
            name_fr: Set("Échelle".to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let both = create_equipment(
            &db,
            &cache,
            &core_principal(),
            NewEquipment {
                type_id: ladder_type.id,
                description: "6m ladder".to_string(),
                count: 1,
                owner_id: Some(point.actor_id),
                property_id: Some(property.id),
                shared: false,
            },
        )
        .await;
        assert!(matches!(both, Err(Error::Validation { .. })));

        // Point-owned inventory is forced shared
        let item = create_equipment(
            &db,
            &cache,
            &core_principal(),
            NewEquipment {
                type_id: ladder_type.id,
                description: "6m ladder".to_string(),
                count: 1,
                owner_id: Some(point.actor_id),
                property_id: None,
                shared: false,
            },
        )
        .await?;
        assert!(item.shared);
        Ok(())
    }
}

//! Tree types and the maturity-window cascade.
//!
//! When the team adjusts a species' maturity window, leaderless harvests of
//! that season move with it: nobody has agreed on a date yet, so the window
//! is the best estimate of when the fruit is ready.

use crate::{
    cache::{Family, ViewCache},
    config::AppConfig,
    core::auth::{Principal, require_core_or_admin},
    entities::{
        Harvest, HarvestStatus, HarvestTree, TreeType, harvest, harvest_tree, tree_type,
    },
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set, TransactionTrait,
};
use tracing::info;

/// Fields for a new fruit species.
#[derive(Debug, Clone, Default)]
pub struct NewTreeType {
    pub name_en: String,
    pub name_fr: String,
    pub fruit_name: String,
    pub maturity_start: Option<NaiveDate>,
    pub maturity_end: Option<NaiveDate>,
    pub icon: Option<String>,
}

/// Adds a species to the catalog.
pub async fn create_tree_type(
    db: &DatabaseConnection,
    principal: &Principal,
    new: NewTreeType,
) -> Result<tree_type::Model> {
    require_core_or_admin(principal)?;
    if new.name_en.trim().is_empty() && new.name_fr.trim().is_empty() {
        return Err(Error::validation("a tree type needs a name"));
    }
    if let (Some(start), Some(end)) = (new.maturity_start, new.maturity_end)
        && start > end
    {
        return Err(Error::validation(
            "maturity window must start before it ends",
        ));
    }

    tree_type::ActiveModel {
        name_en: Set(new.name_en.trim().to_string()),
        name_fr: Set(new.name_fr.trim().to_string()),
        fruit_name: Set(new.fruit_name),
        maturity_start: Set(new.maturity_start),
        maturity_end: Set(new.maturity_end),
        icon: Set(new.icon),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Midday local time keeps the stored instant on the intended calendar day
/// in any nearby timezone.
fn midday(config: &AppConfig, date: NaiveDate) -> Result<chrono::DateTime<Utc>> {
    let local = date
        .and_hms_opt(12, 0, 0)
        .ok_or_else(|| Error::validation("invalid maturity date"))?;
    config
        .timezone
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::validation("maturity date is not representable"))
}

/// Updates a species' maturity window and moves that season's orphan
/// harvests referencing it onto the new window. Adopted and later harvests
/// have an agreed date and are left alone.
pub async fn update_maturity(
    db: &DatabaseConnection,
    config: &AppConfig,
    cache: &ViewCache,
    principal: &Principal,
    tree_type_id: i64,
    maturity_start: NaiveDate,
    maturity_end: NaiveDate,
) -> Result<tree_type::Model> {
    require_core_or_admin(principal)?;
    if maturity_start > maturity_end {
        return Err(Error::validation(
            "maturity window must start before it ends",
        ));
    }
    let tree = TreeType::find_by_id(tree_type_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "tree type",
            id: tree_type_id,
        })?;

    let window_start = midday(config, maturity_start)?;
    let window_end = midday(config, maturity_end)?;
    let season = maturity_start.year();

    let txn = db.begin().await?;
    let mut active = tree.into_active_model();
    active.maturity_start = Set(Some(maturity_start));
    active.maturity_end = Set(Some(maturity_end));
    let updated = active.update(&txn).await?;

    let referencing: Vec<i64> = HarvestTree::find()
        .filter(harvest_tree::Column::TreeTypeId.eq(tree_type_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|row| row.harvest_id)
        .collect();

    let mut moved = 0;
    if !referencing.is_empty() {
        let orphans = Harvest::find()
            .filter(harvest::Column::Id.is_in(referencing))
            .filter(harvest::Column::Status.eq(HarvestStatus::Orphan))
            .all(&txn)
            .await?;
        for orphan in orphans {
            let in_season = orphan
                .start_date
                .is_some_and(|start| start.with_timezone(&config.timezone).year() == season);
            if !in_season {
                continue;
            }
            let mut active = orphan.into_active_model();
            active.start_date = Set(Some(window_start));
            active.end_date = Set(Some(window_end));
            active.changed_by = Set(principal.user_id);
            active.update(&txn).await?;
            moved += 1;
        }
    }
    txn.commit().await?;

    cache.invalidate(Family::Harvest).await;
    if moved > 0 {
        info!(
            tree_type = tree_type_id,
            moved, "orphan harvests moved to the new maturity window"
        );
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::Role;
    use crate::test_utils::{
        create_test_harvest, create_test_property, create_test_user, setup_test_db, test_config,
    };

    fn core_principal() -> Principal {
        Principal::new(999, vec![Role::Core])
    }

    #[tokio::test]
    async fn test_maturity_cascade_moves_orphans_only() -> Result<()> {
        let db = setup_test_db().await?;
        let cache = ViewCache::new();
        let config = test_config();
        let principal = core_principal();

        let tree = create_tree_type(
            &db,
            &principal,
            NewTreeType {
                name_en: "Serviceberry".to_string(),
                name_fr: "Amélanchier".to_string(),
                fruit_name: "serviceberry".to_string(),
                maturity_start: NaiveDate::from_ymd_opt(2025, 8, 1),
                maturity_end: NaiveDate::from_ymd_opt(2025, 8, 31),
                ..Default::default()
            },
        )
        .await?;
        let property = create_test_property(&db, None).await?;

        // Orphan in the 2025 season, pointing at the tree
        let orphan = create_test_harvest(&db, property.id, None).await?;
        let mut active = orphan.into_active_model();
        active.start_date = Set(Some(midday(&config, NaiveDate::from_ymd_opt(2025, 8, 5).unwrap())?));
        active.end_date = Set(Some(midday(&config, NaiveDate::from_ymd_opt(2025, 8, 5).unwrap())?));
        let orphan = active.update(&db).await?;
        harvest_tree::ActiveModel {
            harvest_id: Set(orphan.id),
            tree_type_id: Set(tree.id),
        }
        .insert(&db)
        .await?;

        // Adopted harvest on the same tree keeps its agreed date
        let leader = create_test_user(&db, "leader@example.org").await?;
        let adopted = create_test_harvest(&db, property.id, Some(leader.id)).await?;
        let mut active = adopted.into_active_model();
        active.start_date = Set(Some(midday(&config, NaiveDate::from_ymd_opt(2025, 8, 7).unwrap())?));
        active.end_date = Set(Some(midday(&config, NaiveDate::from_ymd_opt(2025, 8, 7).unwrap())?));
        let adopted = active.update(&db).await?;
        harvest_tree::ActiveModel {
            harvest_id: Set(adopted.id),
            tree_type_id: Set(tree.id),
        }
        .insert(&db)
        .await?;

        update_maturity(
            &db,
            &config,
            &cache,
            &principal,
            tree.id,
            NaiveDate::from_ymd_opt(2025, 8, 15).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 10).unwrap(),
        )
        .await?;

        let moved = Harvest::find_by_id(orphan.id).one(&db).await?.unwrap();
        assert_eq!(
            moved.start_date,
            Some(midday(&config, NaiveDate::from_ymd_opt(2025, 8, 15).unwrap())?)
        );
        assert_eq!(
            moved.end_date,
            Some(midday(&config, NaiveDate::from_ymd_opt(2025, 9, 10).unwrap())?)
        );

        let untouched = Harvest::find_by_id(adopted.id).one(&db).await?.unwrap();
        assert_eq!(
            untouched.start_date,
            Some(midday(&config, NaiveDate::from_ymd_opt(2025, 8, 7).unwrap())?)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_inverted_window_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let cache = ViewCache::new();
        let config = test_config();
        let principal = core_principal();
        let tree = create_tree_type(
            &db,
            &principal,
            NewTreeType {
                name_en: "Apple".to_string(),
                name_fr: "Pommier".to_string(),
                fruit_name: "apple".to_string(),
                ..Default::default()
            },
        )
        .await?;

        let result = update_maturity(
            &db,
            &config,
            &cache,
            &principal,
            tree.id,
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }
}

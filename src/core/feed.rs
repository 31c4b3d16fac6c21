//! Calendar feed - serializes harvests into fullcalendar-style events.
//!
//! The public feed only carries publishable harvests; staff see the whole
//! pipeline. Rendered feeds are cached under the harvest family and
//! invalidated with every harvest mutation.

use crate::{
    cache::{Family, ViewCache},
    config::AppConfig,
    core::{
        auth::Principal,
        harvest::{is_publishable, location_of},
    },
    entities::{
        Harvest, HarvestStatus, HarvestTree, HarvestYield, Participation, TreeType, harvest,
        harvest_tree, harvest_yield, participation, tree_type,
    },
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde::{Deserialize, Serialize};

/// Event colors per status, matching the legend on the calendar page.
#[must_use]
pub fn status_color(status: HarvestStatus) -> &'static str {
    match status {
        HarvestStatus::Orphan => "#ff8f00",
        HarvestStatus::Adopted => "#00695c",
        HarvestStatus::Pending => "#757575",
        HarvestStatus::Scheduled => "#1565c0",
        HarvestStatus::Ready => "#2e7d32",
        HarvestStatus::Succeeded => "#6a1b9a",
        HarvestStatus::Cancelled => "#b71c1c",
    }
}

/// Extra event data consumed by the calendar popover
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventProps {
    pub harvest_id: i64,
    pub status: HarvestStatus,
    pub nb_required_pickers: i32,
    /// Open participation requests
    pub nb_requests: u64,
    pub trees: Vec<String>,
    /// Pounds picked so far, summed over recorded yields
    pub total_harvested: f64,
    pub description: String,
    pub start_date: String,
    pub start_time: String,
    pub end_time: String,
}

/// One calendar event in the wire format the frontend calendar expects
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub url: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub background_color: String,
    pub extended_props: EventProps,
}

async fn event_for(
    db: &DatabaseConnection,
    config: &AppConfig,
    harvest: &harvest::Model,
) -> Result<Option<CalendarEvent>> {
    let (Some(start), Some(end)) = (harvest.start_date, harvest.end_date) else {
        return Ok(None);
    };

    let tree_ids: Vec<i64> = HarvestTree::find()
        .filter(harvest_tree::Column::HarvestId.eq(harvest.id))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.tree_type_id)
        .collect();
    let trees: Vec<String> = TreeType::find()
        .filter(tree_type::Column::Id.is_in(tree_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|tree| tree.fruit_name)
        .collect();

    let nb_requests = Participation::find()
        .filter(participation::Column::HarvestId.eq(harvest.id))
        .count(db)
        .await?;
    let total_harvested: f64 = HarvestYield::find()
        .filter(harvest_yield::Column::HarvestId.eq(harvest.id))
        .all(db)
        .await?
        .iter()
        .map(|y| y.total_in_lb)
        .sum();

    let location = location_of(db, harvest).await?;
    let local_start = start.with_timezone(&config.timezone);
    let local_end = end.with_timezone(&config.timezone);

    Ok(Some(CalendarEvent {
        url: format!("/harvest/{}", harvest.id),
        title: if location.is_empty() {
            format!("Harvest #{}", harvest.id)
        } else {
            location
        },
        start,
        end,
        background_color: status_color(harvest.status).to_string(),
        extended_props: EventProps {
            harvest_id: harvest.id,
            status: harvest.status,
            nb_required_pickers: harvest.nb_required_pickers,
            nb_requests,
            trees,
            total_harvested,
            description: harvest.announcement.clone(),
            start_date: local_start.format("%Y-%m-%d").to_string(),
            start_time: local_start.format("%H:%M").to_string(),
            end_time: local_end.format("%H:%M").to_string(),
        },
    }))
}

/// Renders the calendar feed for `[from, to)`, served from the view cache
/// when a fresh copy exists.
pub async fn calendar_events(
    db: &DatabaseConnection,
    config: &AppConfig,
    cache: &ViewCache,
    principal: &Principal,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<String> {
    let scope = if principal.is_staff() { "staff" } else { "public" };
    let key = Family::Harvest.key(&format!(
        "calendar:{scope}:{}:{}",
        from.timestamp(),
        to.timestamp()
    ));
    if let Some(cached) = cache.get(&key).await {
        return Ok(cached);
    }

    let now = Utc::now();
    let harvests = Harvest::find()
        .filter(harvest::Column::StartDate.gte(from))
        .filter(harvest::Column::StartDate.lt(to))
        .all(db)
        .await?;

    let mut events = Vec::new();
    for harvest in &harvests {
        if scope == "public" && !is_publishable(harvest, now) {
            continue;
        }
        if let Some(event) = event_for(db, config, harvest).await? {
            events.push(event);
        }
    }

    let rendered = serde_json::to_string(&events).map_err(|e| crate::errors::Error::External {
        message: format!("failed to render calendar feed: {e}"),
    })?;
    cache.put(key, rendered.clone()).await;
    Ok(rendered)
}

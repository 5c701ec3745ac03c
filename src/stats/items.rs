use chrono::Datelike;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::round::{mean, percentage, round_hours};
use crate::model::Item;
use crate::normalization::parse_timestamp;

/// Label for items whose grouping value is empty.
pub const UNSPECIFIED: &str = "Unspecified";

pub const TREND_MONTHS: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTotals {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub total_hours: f64,
    pub average_hours: f64,
    pub min_release_year: Option<i32>,
    pub max_release_year: Option<i32>,
    pub percentage_completed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionBucket {
    pub value: String,
    pub count: u64,
    pub completed: u64,
    pub pending: u64,
    pub total_hours: f64,
    pub average_hours: f64,
    pub percentage_completed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendBucket {
    pub year: i32,
    pub month: u32,
    /// `YYYY-MM`
    pub period: String,
    pub created: u64,
    pub completed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedItem {
    pub id: String,
    pub title: String,
    pub category: String,
    pub platform: String,
    pub hours_played: f64,
    pub completed: bool,
}

pub fn totals(items: &[Item]) -> ItemTotals {
    let total = items.len() as u64;
    let completed = items.iter().filter(|i| i.completed).count() as u64;
    let hours: f64 = items.iter().map(|i| i.hours_played).sum();
    ItemTotals {
        total,
        completed,
        pending: total - completed,
        total_hours: round_hours(hours),
        average_hours: round_hours(mean(hours, total)),
        min_release_year: items.iter().map(|i| i.release_year).min(),
        max_release_year: items.iter().map(|i| i.release_year).max(),
        percentage_completed: percentage(completed, total),
    }
}

/// Group by a text dimension; buckets come out by count descending, ties in first-seen order.
pub fn distribution<F>(items: &[Item], key: F) -> Vec<DimensionBucket>
where
    F: Fn(&Item) -> &str,
{
    let mut groups: IndexMap<String, Vec<&Item>> = IndexMap::new();
    for item in items {
        let raw = key(item).trim();
        let label = if raw.is_empty() { UNSPECIFIED } else { raw };
        groups.entry(label.to_string()).or_default().push(item);
    }

    let mut buckets: Vec<DimensionBucket> = groups
        .into_iter()
        .map(|(value, members)| {
            let count = members.len() as u64;
            let completed = members.iter().filter(|i| i.completed).count() as u64;
            let hours: f64 = members.iter().map(|i| i.hours_played).sum();
            DimensionBucket {
                value,
                count,
                completed,
                pending: count - completed,
                total_hours: round_hours(hours),
                average_hours: round_hours(mean(hours, count)),
                percentage_completed: percentage(completed, count),
            }
        })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count));
    buckets
}

/// Items created per calendar month, newest month first, at most twelve months.
pub fn monthly_trend(items: &[Item]) -> Vec<TrendBucket> {
    let mut months: IndexMap<(i32, u32), (u64, u64)> = IndexMap::new();
    for item in items {
        let Some(created) = parse_timestamp(&item.created_at) else {
            continue;
        };
        let slot = months.entry((created.year(), created.month())).or_default();
        slot.0 += 1;
        if item.completed {
            slot.1 += 1;
        }
    }
    months.sort_by(|a, _, b, _| b.cmp(a));
    months
        .into_iter()
        .take(TREND_MONTHS)
        .map(|((year, month), (created, completed))| TrendBucket {
            year,
            month,
            period: format!("{year:04}-{month:02}"),
            created,
            completed,
        })
        .collect()
}

/// Top `n` items by hours played; items with no recorded hours are left out.
pub fn top_by_hours(items: &[Item], n: usize) -> Vec<RankedItem> {
    let mut played: Vec<&Item> = items.iter().filter(|i| i.hours_played > 0.0).collect();
    played.sort_by(|a, b| b.hours_played.total_cmp(&a.hours_played));
    played
        .into_iter()
        .take(n)
        .map(|i| RankedItem {
            id: i.id.clone(),
            title: i.title.clone(),
            category: i.category.clone(),
            platform: i.platform.clone(),
            hours_played: round_hours(i.hours_played),
            completed: i.completed,
        })
        .collect()
}

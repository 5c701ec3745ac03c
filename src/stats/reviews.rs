use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::round::{mean, percentage, round_rating};
use crate::model::{Difficulty, Item, Review, MAX_RATING, MIN_RATING};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingCount {
    pub rating: u8,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyBucket {
    pub difficulty: String,
    pub count: u64,
    pub average_rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub recommends: u64,
    pub does_not_recommend: u64,
    pub percentage_recommends: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total: u64,
    pub average_rating: f64,
    pub min_rating: Option<u8>,
    pub max_rating: Option<u8>,
    /// One entry per rating value, zero counts included.
    pub histogram: Vec<RatingCount>,
    pub by_difficulty: Vec<DifficultyBucket>,
    pub recommendations: Recommendations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedItem {
    pub item_id: String,
    pub title: String,
    pub category: String,
    pub platform: String,
    pub average_rating: f64,
    pub review_count: u64,
}

fn rating_sum<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> f64 {
    reviews.into_iter().map(|r| f64::from(r.rating)).sum()
}

pub fn summarize(reviews: &[Review]) -> ReviewStats {
    let total = reviews.len() as u64;

    let histogram = (MIN_RATING..=MAX_RATING)
        .map(|rating| RatingCount {
            rating,
            count: reviews.iter().filter(|r| r.rating == rating).count() as u64,
        })
        .collect();

    // Known difficulties first in their natural order, then anything else as first seen.
    let mut groups: IndexMap<String, Vec<&Review>> = Difficulty::ALL
        .iter()
        .map(|d| (d.as_str().to_string(), Vec::new()))
        .collect();
    for review in reviews {
        groups.entry(review.difficulty.clone()).or_default().push(review);
    }
    let by_difficulty = groups
        .into_iter()
        .filter(|(_, members)| !members.is_empty())
        .map(|(difficulty, members)| {
            let count = members.len() as u64;
            DifficultyBucket {
                difficulty,
                count,
                average_rating: round_rating(mean(rating_sum(members), count)),
            }
        })
        .collect();

    let recommends = reviews.iter().filter(|r| r.recommends).count() as u64;

    ReviewStats {
        total,
        average_rating: round_rating(mean(rating_sum(reviews), total)),
        min_rating: reviews.iter().map(|r| r.rating).min(),
        max_rating: reviews.iter().map(|r| r.rating).max(),
        histogram,
        by_difficulty,
        recommendations: Recommendations {
            recommends,
            does_not_recommend: total - recommends,
            percentage_recommends: percentage(recommends, total),
        },
    }
}

/// Items ranked by average rating, then by number of reviews.
///
/// Reviews pointing at items that no longer exist are ignored.
pub fn top_rated(items: &[Item], reviews: &[Review], n: usize) -> Vec<RatedItem> {
    let by_id: HashMap<&str, &Item> = items.iter().map(|i| (i.id.as_str(), i)).collect();

    let mut groups: IndexMap<&str, Vec<&Review>> = IndexMap::new();
    for review in reviews {
        if by_id.contains_key(review.item_id.as_str()) {
            groups.entry(review.item_id.as_str()).or_default().push(review);
        }
    }

    let mut ranked: Vec<RatedItem> = groups
        .into_iter()
        .filter_map(|(item_id, members)| {
            let item = by_id.get(item_id)?;
            let count = members.len() as u64;
            Some(RatedItem {
                item_id: item_id.to_string(),
                title: item.title.clone(),
                category: item.category.clone(),
                platform: item.platform.clone(),
                average_rating: round_rating(mean(rating_sum(members), count)),
                review_count: count,
            })
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.average_rating
            .total_cmp(&a.average_rating)
            .then(b.review_count.cmp(&a.review_count))
    });
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::{item_from_record, review_from_record};
    use serde_json::json;

    fn review(item: &str, rating: u8, difficulty: &str, recommends: bool) -> Review {
        review_from_record(&json!({
            "id": format!("r-{item}-{rating}"),
            "itemId": item,
            "body": "Long enough review body",
            "rating": rating,
            "difficulty": difficulty,
            "recommends": recommends
        }))
        .unwrap()
    }

    fn item(id: &str) -> Item {
        item_from_record(&json!({"id": id, "title": format!("Title {id}"), "category": "RPG", "platform": "PC"}))
            .unwrap()
    }

    #[test]
    fn two_reviews_four_and_five() {
        let stats = summarize(&[review("g", 4, "Hard", true), review("g", 5, "Hard", false)]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.average_rating, 4.5);
        assert_eq!(stats.min_rating, Some(4));
        assert_eq!(stats.max_rating, Some(5));
        let counts: Vec<u64> = stats.histogram.iter().map(|h| h.count).collect();
        assert_eq!(counts, vec![0, 0, 0, 1, 1]);
        assert_eq!(stats.by_difficulty.len(), 1);
        assert_eq!(stats.by_difficulty[0].difficulty, "Hard");
        assert_eq!(stats.by_difficulty[0].average_rating, 4.5);
        assert_eq!(stats.recommendations.recommends, 1);
        assert_eq!(stats.recommendations.percentage_recommends, 50.0);
    }

    #[test]
    fn no_reviews_yields_zeroes() {
        let stats = summarize(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_rating, 0.0);
        assert_eq!(stats.min_rating, None);
        assert_eq!(stats.histogram.len(), 5);
        assert!(stats.by_difficulty.is_empty());
        assert_eq!(stats.recommendations.percentage_recommends, 0.0);
    }

    #[test]
    fn difficulty_buckets_follow_natural_order() {
        let stats = summarize(&[
            review("g", 2, "Hard", false),
            review("g", 3, "Easy", true),
            review("g", 1, "Easy", false),
        ]);
        let names: Vec<&str> = stats.by_difficulty.iter().map(|b| b.difficulty.as_str()).collect();
        assert_eq!(names, vec!["Easy", "Hard"]);
        assert_eq!(stats.by_difficulty[0].average_rating, 2.0);
    }

    #[test]
    fn top_rated_skips_orphans_and_breaks_ties_by_count() {
        let items = vec![item("a"), item("b"), item("c")];
        let reviews = vec![
            review("a", 4, "Normal", true),
            review("b", 4, "Normal", true),
            review("b", 4, "Easy", true),
            review("c", 5, "Normal", true),
            review("gone", 5, "Normal", true),
        ];
        let ranked = top_rated(&items, &reviews, 10);
        let ids: Vec<&str> = ranked.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(ranked[1].review_count, 2);
        assert_eq!(top_rated(&items, &reviews, 1).len(), 1);
    }
}

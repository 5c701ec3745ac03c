// Canonical entity shapes exposed to callers.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_RELEASE_YEAR: i64 = 1950;
pub const MAX_HOURS_PLAYED: f64 = 10_000.0;
pub const TITLE_MAX_CHARS: usize = 200;
pub const LABEL_MAX_CHARS: usize = 50;
pub const NOTE_MAX_CHARS: usize = 2000;
pub const CREDIT_MAX_CHARS: usize = 100;
pub const AUTHOR_MAX_CHARS: usize = 50;
pub const BODY_MIN_CHARS: usize = 10;
pub const BODY_MAX_CHARS: usize = 2000;
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Author recorded when a review is submitted without one.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// Sentinel for timestamps the store never recorded.
pub const UNKNOWN_TIMESTAMP: &str = "unknown";

/// Latest release year accepted on write (five years ahead of now).
pub fn max_release_year() -> i64 {
    i64::from(Utc::now().year()) + 5
}

pub fn current_year() -> i32 {
    Utc::now().year()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub title: String,
    pub release_year: i32,
    pub cover_url: String,
    pub note: String,
    pub category: String,
    pub platform: String,
    pub source: String,
    pub developer: String,
    pub completed: bool,
    pub hours_played: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl Item {
    /// Key used for case-insensitive title uniqueness.
    pub fn title_key(&self) -> String {
        title_key(&self.title)
    }
}

pub fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub item_id: String,
    pub body: String,
    pub rating: u8,
    pub author: String,
    pub difficulty: String,
    pub recommends: bool,
    pub hours_played: f64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_category: Option<String>,
}

impl Review {
    pub fn is_anonymous(&self) -> bool {
        is_anonymous(&self.author)
    }

    /// Populate the joined item fields for enriched views.
    pub fn enrich(&mut self, item: &Item) {
        self.item_title = Some(item.title.clone());
        self.item_category = Some(item.category.clone());
    }
}

pub fn is_anonymous(author: &str) -> bool {
    let trimmed = author.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ANONYMOUS_AUTHOR)
}

/// Unique key for "one review per author per item"; anonymous reviews are exempt.
pub fn review_author_key(item_id: &str, author: &str) -> Option<String> {
    if is_anonymous(author) {
        None
    } else {
        Some(format!("{}\u{1f}{}", item_id, author.trim().to_lowercase()))
    }
}

/// Perceived difficulty recorded on a review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(raw))
    }
}

/// Categories with a canonical display form. Anything else is kept as free text.
pub const KNOWN_CATEGORIES: [&str; 14] = [
    "Action",
    "Adventure",
    "RPG",
    "Strategy",
    "Shooter",
    "Sports",
    "Racing",
    "Puzzle",
    "Platformer",
    "Fighting",
    "Simulation",
    "Horror",
    "Indie",
    "Other",
];

/// Map a known category to its display casing; free text passes through trimmed.
pub fn canonical_category(raw: &str) -> String {
    let trimmed = raw.trim();
    KNOWN_CATEGORIES
        .iter()
        .find(|c| c.eq_ignore_ascii_case(trimmed))
        .map(|c| (*c).to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// One page of a filtered listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        let size = u64::from(page_size.max(1));
        Self {
            items,
            total,
            page,
            page_size,
            total_pages: total.div_ceil(size),
        }
    }
}

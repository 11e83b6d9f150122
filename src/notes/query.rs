use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::storage::{Category, Note};

/// Display order for a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    /// Stored order, as arranged by the user
    #[default]
    Manual,
    /// Title, case-insensitive
    Alpha,
    /// Most recently used first
    LastUsed,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Manual => "manual",
            Self::Alpha => "alpha",
            Self::LastUsed => "last-used",
        };
        f.write_str(name)
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manual" | "default" => Ok(Self::Manual),
            "alpha" | "title" => Ok(Self::Alpha),
            "last-used" | "lastused" | "recent" => Ok(Self::LastUsed),
            other => Err(format!(
                "unknown sort order '{}' (expected manual, alpha or last-used)",
                other
            )),
        }
    }
}

/// Filter and sort settings for listing notes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteQuery {
    /// Case-insensitive substring matched against title and content
    pub search: Option<String>,
    pub category: Option<Category>,
    pub sort: SortOrder,
}

impl NoteQuery {
    pub fn matches(&self, note: &Note) -> bool {
        if let Some(category) = self.category {
            if note.category != category {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => {
                let q = q.to_lowercase();
                note.title.to_lowercase().contains(&q) || note.content.to_lowercase().contains(&q)
            }
            _ => true,
        }
    }

    /// Matching notes paired with their position in `notes`
    pub fn apply<'a>(&self, notes: &'a [Note]) -> Vec<(usize, &'a Note)> {
        let mut hits: Vec<(usize, &Note)> = notes
            .iter()
            .enumerate()
            .filter(|(_, note)| self.matches(note))
            .collect();

        match self.sort {
            SortOrder::Manual => {}
            SortOrder::Alpha => hits.sort_by(|(_, a), (_, b)| compare_titles(a, b)),
            SortOrder::LastUsed => hits.sort_by(|(_, a), (_, b)| b.last_used_at.cmp(&a.last_used_at)),
        }
        hits
    }
}

fn compare_titles(a: &Note, b: &Note) -> Ordering {
    a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
        .then_with(|| a.title.cmp(&b.title))
}

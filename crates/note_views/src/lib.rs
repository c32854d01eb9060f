//! Derived views over a note collection: filtering, sorting and tag extraction.
//!
//! Everything here is a pure function of its input; callers feed it the
//! collection from a `NoteSnapshot` and render the result.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use core_types::Note;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    #[default]
    Newest,
    Oldest,
    Alphabetical,
    Updated,
}

impl SortOption {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOption::Newest => "newest",
            SortOption::Oldest => "oldest",
            SortOption::Alphabetical => "alphabetical",
            SortOption::Updated => "updated",
        }
    }
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown sort option `{0}` (expected newest, oldest, alphabetical or updated)")]
pub struct ParseSortOptionError(String);

impl FromStr for SortOption {
    type Err = ParseSortOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(SortOption::Newest),
            "oldest" => Ok(SortOption::Oldest),
            "alphabetical" | "title" => Ok(SortOption::Alphabetical),
            "updated" => Ok(SortOption::Updated),
            other => Err(ParseSortOptionError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArchiveFilter {
    #[default]
    Active,
    Archived,
    All,
}

#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    pub archive: ArchiveFilter,
    pub search_term: Option<String>,
    pub tag: Option<String>,
}

impl NoteFilter {
    pub fn matches(&self, note: &Note) -> bool {
        let archive_ok = match self.archive {
            ArchiveFilter::Active => !note.is_archived,
            ArchiveFilter::Archived => note.is_archived,
            ArchiveFilter::All => true,
        };
        if !archive_ok {
            return false;
        }

        if let Some(tag) = self.tag.as_deref().map(str::trim)
            && !tag.is_empty()
            && !note.has_tag(tag)
        {
            return false;
        }

        match self.search_term.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                note.title.to_lowercase().contains(&term)
                    || note.editable_text().to_lowercase().contains(&term)
                    || note.tags.iter().any(|t| t.to_lowercase().contains(&term))
            }
            _ => true,
        }
    }
}

pub fn filter_notes(notes: &[Note], filter: &NoteFilter) -> Vec<Note> {
    notes
        .iter()
        .filter(|note| filter.matches(note))
        .cloned()
        .collect()
}

/// Stable sort; notes with unparseable timestamps go last in time-based orders.
pub fn sort_notes(notes: &mut [Note], sort: SortOption) {
    match sort {
        SortOption::Newest => {
            notes.sort_by(|a, b| newest_first(a.created_at_utc(), b.created_at_utc()))
        }
        SortOption::Oldest => notes.sort_by(|a, b| match (a.created_at_utc(), b.created_at_utc()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
        SortOption::Alphabetical => notes.sort_by(|a, b| {
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.title.cmp(&b.title))
        }),
        SortOption::Updated => {
            notes.sort_by(|a, b| newest_first(a.updated_at_utc(), b.updated_at_utc()))
        }
    }
}

fn newest_first<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn view(notes: &[Note], filter: &NoteFilter, sort: SortOption) -> Vec<Note> {
    let mut out = filter_notes(notes, filter);
    sort_notes(&mut out, sort);
    out
}

/// Distinct lowercase tags, alphabetically ordered.
pub fn extract_tags(notes: &[Note]) -> Vec<String> {
    notes
        .iter()
        .flat_map(|note| note.tags.iter())
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

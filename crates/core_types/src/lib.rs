use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub type NoteId = String;
pub type RevisionId = Uuid;
pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub const DEFAULT_MERGE_SEPARATOR: &str = "\n\n---\n\n";
pub const DEFAULT_SIMILAR_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UiLanguage {
    ZhCn,
    EnUs,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, rename = "archived", alias = "is_archived")]
    pub is_archived: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links_to: Vec<NoteId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links_from: Vec<NoteId>,
}

impl Note {
    /// Markdown source the user edits. Older servers only send `content`.
    pub fn editable_text(&self) -> &str {
        self.raw_content.as_deref().unwrap_or(&self.content)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }

    /// Falls back to `created_at` for notes that were never edited.
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        self.updated_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.created_at_utc())
    }
}

/// Accepts RFC 3339 and the naive ISO-8601 form the service emits; naive values are UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredNote {
    pub note: Note,
    #[serde(default = "full_score")]
    pub similarity_score: f32,
}

const fn full_score() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Revision {
    pub revision_id: RevisionId,
    pub note_id: NoteId,
    pub revision_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_note: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_revision_id: Option<RevisionId>,
    #[serde(default)]
    pub content_raw_diff: String,
    #[serde(default)]
    pub content_diff: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevisionDiff {
    pub unified_diff: String,
    pub before: String,
    pub after: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_by_side_diff: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteAtRevision {
    pub title: String,
    pub raw_content: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NoteCreateInput {
    pub title: String,
    pub raw_content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NoteCreateInput {
    pub fn new(title: impl Into<String>, raw_content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            raw_content: raw_content.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = normalize_tags(tags);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NoteUpdateInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

impl NoteUpdateInput {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn archived(archived: bool) -> Self {
        Self {
            archived: Some(archived),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.raw_content.is_none()
            && self.tags.is_none()
            && self.archived.is_none()
    }
}

/// Lowercases, trims and dedups tags while keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.into().trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub tags: Option<Vec<String>>,
    pub semantic: bool,
    pub limit: Option<usize>,
    pub include_archived: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeRequest {
    pub note_ids: Vec<NoteId>,
    pub new_title: String,
    pub separator: String,
}

impl MergeRequest {
    pub fn new(note_ids: Vec<NoteId>, new_title: impl Into<String>) -> Self {
        Self {
            note_ids,
            new_title: new_title.into(),
            separator: DEFAULT_MERGE_SEPARATOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RevertRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_note: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("note service unreachable: {0}")]
    Transport(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("note service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response payload: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound(_) => Some(404),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|status| status >= 500)
    }

    /// Transient failures that a repeated idempotent request may get past.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ApiError::Transport(_) | ApiError::Timeout(_)) || self.is_server_error()
    }
}

#[async_trait]
pub trait NoteApi: Send + Sync {
    async fn list_notes(&self, include_archived: bool) -> ApiResult<Vec<Note>>;
    async fn get_note(&self, id: &str) -> ApiResult<Note>;
    async fn create_note(&self, input: &NoteCreateInput) -> ApiResult<Note>;
    async fn update_note(&self, id: &str, input: &NoteUpdateInput) -> ApiResult<Note>;
    async fn archive_note(&self, id: &str) -> ApiResult<Note>;
    async fn delete_note(&self, id: &str) -> ApiResult<()>;
    async fn search_notes(&self, query: &SearchQuery) -> ApiResult<Vec<ScoredNote>>;
    async fn similar_notes(&self, id: &str, limit: usize) -> ApiResult<Vec<ScoredNote>>;
    async fn all_tags(&self) -> ApiResult<Vec<String>>;
    async fn notes_by_tag(&self, tag: &str) -> ApiResult<Vec<Note>>;
    async fn merge_notes(&self, request: &MergeRequest) -> ApiResult<Note>;
    async fn list_revisions(&self, note_id: &str) -> ApiResult<Vec<Revision>>;
    async fn get_revision(&self, revision_id: RevisionId) -> ApiResult<Revision>;
    async fn revision_diff(&self, revision_id: RevisionId) -> ApiResult<RevisionDiff>;
    async fn revert_to_revision(
        &self,
        revision_id: RevisionId,
        request: &RevertRequest,
    ) -> ApiResult<Note>;
    async fn note_at_revision(
        &self,
        note_id: &str,
        revision_number: u32,
    ) -> ApiResult<NoteAtRevision>;
}

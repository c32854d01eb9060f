use std::collections::HashSet;

use core_types::{MergeRequest, NoteCreateInput, NoteId, NoteUpdateInput};
use thiserror::Error;

/// Input problems caught before any request leaves the client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title is required")]
    TitleRequired,
    #[error("content is required")]
    ContentRequired,
    #[error("at least two notes are required to merge, got {0}")]
    TooFewNotes(usize),
    #[error("note `{0}` is selected more than once")]
    DuplicateNote(NoteId),
    #[error("merged note title is required")]
    MergeTitleRequired,
}

impl ValidationError {
    pub(crate) fn message_key(&self) -> &'static str {
        match self {
            ValidationError::TitleRequired => "validation.title_required",
            ValidationError::ContentRequired => "validation.content_required",
            ValidationError::TooFewNotes(_) => "validation.merge_min_notes",
            ValidationError::DuplicateNote(_) => "validation.merge_duplicate",
            ValidationError::MergeTitleRequired => "validation.merge_title_required",
        }
    }
}

pub fn validate_create(input: &NoteCreateInput) -> Result<(), ValidationError> {
    if input.title.trim().is_empty() {
        return Err(ValidationError::TitleRequired);
    }
    if input.raw_content.trim().is_empty() {
        return Err(ValidationError::ContentRequired);
    }
    Ok(())
}

/// Fields left out of the update are untouched server-side; present ones must not be blank.
pub fn validate_update(input: &NoteUpdateInput) -> Result<(), ValidationError> {
    if input.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ValidationError::TitleRequired);
    }
    if input
        .raw_content
        .as_deref()
        .is_some_and(|c| c.trim().is_empty())
    {
        return Err(ValidationError::ContentRequired);
    }
    Ok(())
}

pub fn validate_merge(request: &MergeRequest) -> Result<(), ValidationError> {
    if request.note_ids.len() < 2 {
        return Err(ValidationError::TooFewNotes(request.note_ids.len()));
    }
    let mut seen = HashSet::new();
    for id in &request.note_ids {
        if !seen.insert(id.as_str()) {
            return Err(ValidationError::DuplicateNote(id.clone()));
        }
    }
    if request.new_title.trim().is_empty() {
        return Err(ValidationError::MergeTitleRequired);
    }
    Ok(())
}

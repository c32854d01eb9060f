use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use core_types::{
    ApiError, ApiResult, MergeRequest, Note, NoteApi, NoteAtRevision, NoteCreateInput, NoteId,
    NoteUpdateInput, RevertRequest, Revision, RevisionDiff, RevisionId, ScoredNote, SearchQuery,
};
use parking_lot::Mutex;
use tokio::sync::Notify;

pub(crate) fn note(id: &str, title: &str, content: &str) -> Note {
    Note {
        id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        raw_content: Some(content.to_string()),
        tags: Vec::new(),
        created_at: "2024-01-01T00:00:00".to_string(),
        updated_at: None,
        is_archived: false,
        links_to: Vec::new(),
        links_from: Vec::new(),
    }
}

#[derive(Default)]
struct Server {
    notes: Vec<Note>,
    revisions: Vec<Revision>,
    /// Note body recorded with each revision.
    revision_bodies: HashMap<RevisionId, String>,
    next_id: u64,
    calls: Vec<String>,
    fail_next: Option<ApiError>,
}

/// In-memory note service. Gated calls read the server before waiting, so a
/// held response carries whatever the server held at call time.
#[derive(Default)]
pub(crate) struct FakeNoteApi {
    server: Mutex<Server>,
    gates: Mutex<HashMap<NoteId, Arc<Notify>>>,
    list_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeNoteApi {
    pub(crate) fn with_notes(notes: Vec<Note>) -> Arc<Self> {
        let fake = Self::default();
        fake.server.lock().notes = notes;
        Arc::new(fake)
    }

    pub(crate) fn add_revision(&self, revision: Revision, body: &str) {
        let mut server = self.server.lock();
        server
            .revision_bodies
            .insert(revision.revision_id, body.to_string());
        server.revisions.push(revision);
    }

    pub(crate) fn fail_next(&self, err: ApiError) {
        self.server.lock().fail_next = Some(err);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.server.lock().calls.clone()
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.server
            .lock()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// Holds `get_note(id)` responses until the returned handle is notified.
    pub(crate) fn gate(&self, id: &str) -> Arc<Notify> {
        self.gates
            .lock()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// Holds `list_notes` responses until the returned handle is notified.
    pub(crate) fn gate_listing(&self) -> Arc<Notify> {
        self.list_gate
            .lock()
            .get_or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    fn begin(&self, call: String) -> ApiResult<parking_lot::MutexGuard<'_, Server>> {
        let mut server = self.server.lock();
        server.calls.push(call);
        match server.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(server),
        }
    }
}

fn missing(id: &str) -> ApiError {
    ApiError::NotFound(format!("/notes/{id}"))
}

fn find_mut<'a>(notes: &'a mut [Note], id: &str) -> ApiResult<&'a mut Note> {
    notes.iter_mut().find(|n| n.id == id).ok_or_else(|| missing(id))
}

#[async_trait]
impl NoteApi for FakeNoteApi {
    async fn list_notes(&self, include_archived: bool) -> ApiResult<Vec<Note>> {
        let listing: Vec<Note> = {
            let server = self.begin(format!("list_notes:{include_archived}"))?;
            server
                .notes
                .iter()
                .filter(|n| include_archived || !n.is_archived)
                .cloned()
                .collect()
        };
        let gate = self.list_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(listing)
    }

    async fn get_note(&self, id: &str) -> ApiResult<Note> {
        let found = {
            let server = self.begin(format!("get_note:{id}"))?;
            server.notes.iter().find(|n| n.id == id).cloned()
        };
        let gate = self.gates.lock().get(id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        found.ok_or_else(|| missing(id))
    }

    async fn create_note(&self, input: &NoteCreateInput) -> ApiResult<Note> {
        let mut server = self.begin("create_note".to_string())?;
        server.next_id += 1;
        let mut created = note(
            &format!("new-{}", server.next_id),
            &input.title,
            &input.raw_content,
        );
        created.tags = input.tags.clone();
        server.notes.push(created.clone());
        Ok(created)
    }

    async fn update_note(&self, id: &str, input: &NoteUpdateInput) -> ApiResult<Note> {
        let mut server = self.begin(format!("update_note:{id}"))?;
        let note = find_mut(&mut server.notes, id)?;
        if let Some(title) = &input.title {
            note.title = title.clone();
        }
        if let Some(raw) = &input.raw_content {
            note.raw_content = Some(raw.clone());
            note.content = raw.clone();
        }
        if let Some(tags) = &input.tags {
            note.tags = tags.clone();
        }
        if let Some(archived) = input.archived {
            note.is_archived = archived;
        }
        note.updated_at = Some("2024-02-01T00:00:00".to_string());
        Ok(note.clone())
    }

    async fn archive_note(&self, id: &str) -> ApiResult<Note> {
        let mut server = self.begin(format!("archive_note:{id}"))?;
        let note = find_mut(&mut server.notes, id)?;
        note.is_archived = true;
        Ok(note.clone())
    }

    async fn delete_note(&self, id: &str) -> ApiResult<()> {
        let mut server = self.begin(format!("delete_note:{id}"))?;
        let before = server.notes.len();
        server.notes.retain(|n| n.id != id);
        if server.notes.len() == before {
            return Err(missing(id));
        }
        Ok(())
    }

    async fn search_notes(&self, query: &SearchQuery) -> ApiResult<Vec<ScoredNote>> {
        let server = self.begin(format!("search_notes:{}", query.query))?;
        let term = query.query.to_lowercase();
        Ok(server
            .notes
            .iter()
            .filter(|n| query.include_archived || !n.is_archived)
            .filter(|n| {
                n.title.to_lowercase().contains(&term)
                    || n.editable_text().to_lowercase().contains(&term)
            })
            .map(|n| ScoredNote {
                note: n.clone(),
                similarity_score: 1.0,
            })
            .collect())
    }

    async fn similar_notes(&self, id: &str, limit: usize) -> ApiResult<Vec<ScoredNote>> {
        let server = self.begin(format!("similar_notes:{id}"))?;
        Ok(server
            .notes
            .iter()
            .filter(|n| n.id != id && !n.is_archived)
            .take(limit)
            .map(|n| ScoredNote {
                note: n.clone(),
                similarity_score: 0.5,
            })
            .collect())
    }

    async fn all_tags(&self) -> ApiResult<Vec<String>> {
        let server = self.begin("all_tags".to_string())?;
        let mut tags: Vec<String> = server.notes.iter().flat_map(|n| n.tags.clone()).collect();
        tags.sort();
        tags.dedup();
        Ok(tags)
    }

    async fn notes_by_tag(&self, tag: &str) -> ApiResult<Vec<Note>> {
        let server = self.begin(format!("notes_by_tag:{tag}"))?;
        Ok(server
            .notes
            .iter()
            .filter(|n| n.has_tag(tag))
            .cloned()
            .collect())
    }

    async fn merge_notes(&self, request: &MergeRequest) -> ApiResult<Note> {
        let mut server = self.begin("merge_notes".to_string())?;
        let mut parts = Vec::new();
        for id in &request.note_ids {
            let source = server
                .notes
                .iter()
                .find(|n| &n.id == id)
                .ok_or_else(|| missing(id))?;
            parts.push(source.editable_text().to_string());
        }
        server.next_id += 1;
        let merged = note(
            &format!("merged-{}", server.next_id),
            &request.new_title,
            &parts.join(&request.separator),
        );
        server.notes.push(merged.clone());
        Ok(merged)
    }

    async fn list_revisions(&self, note_id: &str) -> ApiResult<Vec<Revision>> {
        let server = self.begin(format!("list_revisions:{note_id}"))?;
        Ok(server
            .revisions
            .iter()
            .filter(|r| r.note_id == note_id)
            .cloned()
            .collect())
    }

    async fn get_revision(&self, revision_id: RevisionId) -> ApiResult<Revision> {
        let server = self.begin(format!("get_revision:{revision_id}"))?;
        server
            .revisions
            .iter()
            .find(|r| r.revision_id == revision_id)
            .cloned()
            .ok_or_else(|| missing(&revision_id.to_string()))
    }

    async fn revision_diff(&self, revision_id: RevisionId) -> ApiResult<RevisionDiff> {
        let server = self.begin(format!("revision_diff:{revision_id}"))?;
        let revision = server
            .revisions
            .iter()
            .find(|r| r.revision_id == revision_id)
            .ok_or_else(|| missing(&revision_id.to_string()))?;
        Ok(RevisionDiff {
            unified_diff: revision.content_raw_diff.clone(),
            before: String::new(),
            after: String::new(),
            side_by_side_diff: None,
        })
    }

    async fn revert_to_revision(
        &self,
        revision_id: RevisionId,
        _request: &RevertRequest,
    ) -> ApiResult<Note> {
        let mut server = self.begin(format!("revert_to_revision:{revision_id}"))?;
        let (note_id, body) = server
            .revisions
            .iter()
            .find(|r| r.revision_id == revision_id)
            .map(|r| r.note_id.clone())
            .zip(server.revision_bodies.get(&revision_id).cloned())
            .ok_or_else(|| missing(&revision_id.to_string()))?;
        let note = find_mut(&mut server.notes, &note_id)?;
        note.raw_content = Some(body.clone());
        note.content = body;
        note.updated_at = Some("2024-03-01T00:00:00".to_string());
        Ok(note.clone())
    }

    async fn note_at_revision(
        &self,
        note_id: &str,
        revision_number: u32,
    ) -> ApiResult<NoteAtRevision> {
        let server = self.begin(format!("note_at_revision:{note_id}:{revision_number}"))?;
        let note = server
            .notes
            .iter()
            .find(|n| n.id == note_id)
            .ok_or_else(|| missing(note_id))?;
        Ok(NoteAtRevision {
            title: note.title.clone(),
            raw_content: note.editable_text().to_string(),
            content: note.content.clone(),
            tags: note.tags.clone(),
        })
    }
}

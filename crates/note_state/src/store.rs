use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use config::ClientConfig;
use core_types::{
    ApiError, MergeRequest, Note, NoteApi, NoteAtRevision, NoteCreateInput, NoteId,
    NoteUpdateInput, RevertRequest, Revision, RevisionDiff, RevisionId, ScoredNote, SearchQuery,
    UiLanguage, normalize_tags,
};
use i18n::I18n;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::events::{ListenerRegistry, Notice, NoticeLevel, NoteSnapshot, StateEvent, Subscription};
use crate::state::{State, normalize_listing};
use crate::validation::{ValidationError, validate_create, validate_merge, validate_update};

const DEFAULT_CURRENT_NOTE_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub language: UiLanguage,
    /// How long a fetched current note is served without a round-trip. Zero disables the cache.
    pub current_note_ttl: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            language: UiLanguage::EnUs,
            current_note_ttl: DEFAULT_CURRENT_NOTE_TTL,
        }
    }
}

impl StoreOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            language: config.language,
            current_note_ttl: config.cache.current_note_ttl(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub tags: Vec<String>,
    pub include_archived: bool,
    pub semantic: bool,
    pub limit: Option<usize>,
}

/// Client-side note collection kept in step with the note service.
///
/// Operations never return errors: failures are logged, surfaced through the
/// snapshot's `error` and an error [`Notice`], and the call resolves to a
/// sentinel (`None`, `false` or an empty vec).
#[derive(Clone)]
pub struct NoteStore {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn NoteApi>,
    i18n: I18n,
    current_note_ttl: Duration,
    state: Mutex<State>,
    listeners: Arc<ListenerRegistry>,
}

/// Counts one operation as in flight until dropped, including when the
/// owning future is cancelled.
struct InFlight<'a> {
    inner: &'a Inner,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.inner.update(|state| {
            state.in_flight = state.in_flight.saturating_sub(1);
        });
    }
}

impl Inner {
    /// Applies `f` under the state lock, then publishes the new snapshot with the lock released.
    fn update<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let (out, snapshot) = {
            let mut state = self.state.lock();
            let out = f(&mut *state);
            let snapshot = (!self.listeners.is_empty()).then(|| state.snapshot());
            (out, snapshot)
        };
        if let Some(snapshot) = snapshot {
            self.listeners.emit(&StateEvent::Changed(snapshot));
        }
        out
    }

    fn notify(&self, level: NoticeLevel, key: &str) {
        self.listeners.emit(&StateEvent::Notice(Notice {
            level,
            message: self.i18n.t(key).to_string(),
        }));
    }

    fn begin(&self) -> InFlight<'_> {
        self.update(|state| {
            state.in_flight += 1;
            state.error = None;
        });
        InFlight { inner: self }
    }

    fn fail(&self, operation: &'static str, key: &str, err: &dyn fmt::Display) {
        warn!(operation, error = %err, "note operation failed");
        let message = self.i18n.t(key).to_string();
        self.update(|state| state.error = Some(message.clone()));
        self.listeners.emit(&StateEvent::Notice(Notice {
            level: NoticeLevel::Error,
            message,
        }));
    }

    fn reject(&self, operation: &'static str, err: ValidationError) {
        debug!(operation, error = %err, "rejected before sending");
        self.fail(operation, err.message_key(), &err);
    }
}

impl NoteStore {
    pub fn new(api: Arc<dyn NoteApi>, options: StoreOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                i18n: I18n::new(options.language),
                current_note_ttl: options.current_note_ttl,
                state: Mutex::new(State::default()),
                listeners: Arc::new(ListenerRegistry::default()),
            }),
        }
    }

    pub fn snapshot(&self) -> NoteSnapshot {
        self.inner.state.lock().snapshot()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StateEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(Arc::new(listener))
    }

    /// Writes confirmed while the request is out are replayed onto the
    /// listing, so a slow listing never drops a newer create or archive.
    pub async fn list_notes(&self, include_archived: bool) -> Option<Vec<Note>> {
        let _in_flight = self.inner.begin();
        let ticket = self.inner.state.lock().begin_listing();
        match self.inner.api.list_notes(include_archived).await {
            Ok(notes) => {
                let notes = normalize_listing(notes, include_archived);
                let applied = self
                    .inner
                    .update(|state| state.finish_listing(ticket, notes.clone()));
                if applied {
                    debug!(count = notes.len(), include_archived, "note collection replaced");
                } else {
                    debug!("discarding superseded note listing");
                }
                Some(notes)
            }
            Err(err) => {
                self.inner.state.lock().abandon_listing(ticket);
                self.inner.fail("list_notes", "error.fetch_notes", &err);
                None
            }
        }
    }

    /// Returns the cached current note when it is `id` and younger than the TTL.
    pub async fn get_note(&self, id: &str) -> Option<Note> {
        let cached = {
            let mut state = self.inner.state.lock();
            let hit = state.fresh_current(id, self.inner.current_note_ttl).cloned();
            if hit.is_some() {
                state.current_tokens.issue();
                state.current_request = Some(id.to_string());
            }
            hit
        };
        if let Some(note) = cached {
            debug!(note_id = id, "current note served from cache");
            return Some(note);
        }
        self.fetch_current(id).await
    }

    pub async fn refresh_note(&self, id: &str) -> Option<Note> {
        self.fetch_current(id).await
    }

    async fn fetch_current(&self, id: &str) -> Option<Note> {
        let _in_flight = self.inner.begin();
        let ticket = {
            let mut state = self.inner.state.lock();
            state.current_request = Some(id.to_string());
            state.current_tokens.issue()
        };
        match self.inner.api.get_note(id).await {
            Ok(note) => {
                let applied = self.inner.update(|state| {
                    let current = state.current_tokens.is_current(ticket);
                    if current {
                        state.set_current(note.clone());
                    }
                    current
                });
                if !applied {
                    debug!(note_id = id, "discarding superseded current note response");
                }
                Some(note)
            }
            Err(err @ ApiError::NotFound(_)) => {
                self.inner.update(|state| {
                    if state.current_tokens.is_current(ticket) {
                        state.current = None;
                    }
                });
                self.inner.fail("get_note", "error.not_found", &err);
                None
            }
            Err(err) => {
                self.inner.fail("get_note", "error.fetch_note", &err);
                None
            }
        }
    }

    pub async fn create_note(&self, input: NoteCreateInput) -> Option<Note> {
        if let Err(err) = validate_create(&input) {
            self.inner.reject("create_note", err);
            return None;
        }
        let _in_flight = self.inner.begin();
        match self.inner.api.create_note(&input).await {
            Ok(note) => {
                info!(note_id = %note.id, "note created");
                self.prepend(note.clone());
                self.inner.notify(NoticeLevel::Success, "notice.note_created");
                Some(note)
            }
            Err(err) => {
                self.inner.fail("create_note", "error.create_note", &err);
                None
            }
        }
    }

    pub async fn update_note(&self, id: &str, input: NoteUpdateInput) -> Option<Note> {
        if let Err(err) = validate_update(&input) {
            self.inner.reject("update_note", err);
            return None;
        }
        let _in_flight = self.inner.begin();
        match self.inner.api.update_note(id, &input).await {
            Ok(note) => {
                info!(note_id = id, archived = note.is_archived, "note updated");
                self.inner.update(|state| state.apply_written(note.clone(), false));
                self.inner.notify(NoticeLevel::Success, "notice.note_updated");
                Some(note)
            }
            Err(err) => {
                self.inner.fail("update_note", "error.update_note", &err);
                None
            }
        }
    }

    pub async fn archive_note(&self, id: &str) -> bool {
        let _in_flight = self.inner.begin();
        match self.inner.api.archive_note(id).await {
            Ok(_) => {
                info!(note_id = id, "note archived");
                self.inner.update(|state| state.apply_removed(id));
                self.inner.notify(NoticeLevel::Success, "notice.note_archived");
                true
            }
            Err(err) => {
                self.inner.fail("archive_note", "error.archive_note", &err);
                false
            }
        }
    }

    pub async fn restore_note(&self, id: &str) -> Option<Note> {
        let _in_flight = self.inner.begin();
        match self
            .inner
            .api
            .update_note(id, &NoteUpdateInput::archived(false))
            .await
        {
            Ok(note) => {
                info!(note_id = id, "note restored");
                self.inner.update(|state| state.apply_written(note.clone(), true));
                self.inner.notify(NoticeLevel::Success, "notice.note_restored");
                Some(note)
            }
            Err(err) => {
                self.inner.fail("restore_note", "error.restore_note", &err);
                None
            }
        }
    }

    pub async fn delete_note(&self, id: &str) -> bool {
        let _in_flight = self.inner.begin();
        match self.inner.api.delete_note(id).await {
            Ok(()) => {
                info!(note_id = id, "note deleted");
                self.inner.update(|state| state.apply_removed(id));
                self.inner.notify(NoticeLevel::Success, "notice.note_deleted");
                true
            }
            Err(err) => {
                self.inner.fail("delete_note", "error.delete_note", &err);
                false
            }
        }
    }

    /// Search results are transient and never touch the collection.
    pub async fn search_notes(&self, query: &str, options: SearchOptions) -> Vec<Note> {
        let _in_flight = self.inner.begin();
        let tags = normalize_tags(options.tags);
        let query = SearchQuery {
            query: query.trim().to_string(),
            tags: (!tags.is_empty()).then_some(tags),
            semantic: options.semantic,
            limit: options.limit,
            include_archived: options.include_archived,
        };
        match self.inner.api.search_notes(&query).await {
            Ok(hits) => {
                debug!(query = %query.query, hits = hits.len(), "search finished");
                hits.into_iter().map(|hit| hit.note).collect()
            }
            Err(err) => {
                self.inner.fail("search_notes", "error.search_notes", &err);
                Vec::new()
            }
        }
    }

    pub async fn similar_notes(&self, id: &str, limit: usize) -> Vec<ScoredNote> {
        let _in_flight = self.inner.begin();
        match self.inner.api.similar_notes(id, limit).await {
            Ok(hits) => hits,
            Err(err) => {
                self.inner.fail("similar_notes", "error.similar_notes", &err);
                Vec::new()
            }
        }
    }

    pub async fn all_tags(&self) -> Vec<String> {
        let _in_flight = self.inner.begin();
        match self.inner.api.all_tags().await {
            Ok(tags) => tags,
            Err(err) => {
                self.inner.fail("all_tags", "error.fetch_tags", &err);
                Vec::new()
            }
        }
    }

    pub async fn notes_by_tag(&self, tag: &str) -> Vec<Note> {
        let _in_flight = self.inner.begin();
        match self.inner.api.notes_by_tag(tag.trim()).await {
            Ok(notes) => notes,
            Err(err) => {
                self.inner.fail("notes_by_tag", "error.fetch_notes", &err);
                Vec::new()
            }
        }
    }

    /// Sources stay in place; the merged note is prepended.
    pub async fn merge_notes(
        &self,
        note_ids: Vec<NoteId>,
        new_title: &str,
        separator: Option<&str>,
    ) -> Option<Note> {
        let mut request = MergeRequest::new(note_ids, new_title.trim());
        if let Some(separator) = separator {
            request.separator = separator.to_string();
        }
        if let Err(err) = validate_merge(&request) {
            self.inner.reject("merge_notes", err);
            return None;
        }
        let _in_flight = self.inner.begin();
        match self.inner.api.merge_notes(&request).await {
            Ok(note) => {
                info!(note_id = %note.id, sources = request.note_ids.len(), "notes merged");
                self.prepend(note.clone());
                self.inner.notify(NoticeLevel::Success, "notice.notes_merged");
                Some(note)
            }
            Err(err) => {
                self.inner.fail("merge_notes", "error.merge_notes", &err);
                None
            }
        }
    }

    /// Newest revision first.
    pub async fn revisions(&self, note_id: &str) -> Vec<Revision> {
        let _in_flight = self.inner.begin();
        match self.inner.api.list_revisions(note_id).await {
            Ok(mut revisions) => {
                revisions.sort_by(|a, b| b.revision_number.cmp(&a.revision_number));
                revisions
            }
            Err(err) => {
                self.inner.fail("revisions", "error.fetch_revisions", &err);
                Vec::new()
            }
        }
    }

    pub async fn revision(&self, revision_id: RevisionId) -> Option<Revision> {
        let _in_flight = self.inner.begin();
        match self.inner.api.get_revision(revision_id).await {
            Ok(revision) => Some(revision),
            Err(err) => {
                self.inner.fail("revision", "error.fetch_revisions", &err);
                None
            }
        }
    }

    pub async fn revision_diff(&self, revision_id: RevisionId) -> Option<RevisionDiff> {
        let _in_flight = self.inner.begin();
        match self.inner.api.revision_diff(revision_id).await {
            Ok(diff) => Some(diff),
            Err(err) => {
                self.inner.fail("revision_diff", "error.fetch_diff", &err);
                None
            }
        }
    }

    pub async fn note_at_revision(
        &self,
        note_id: &str,
        revision_number: u32,
    ) -> Option<NoteAtRevision> {
        let _in_flight = self.inner.begin();
        match self
            .inner
            .api
            .note_at_revision(note_id, revision_number)
            .await
        {
            Ok(content) => Some(content),
            Err(err) => {
                self.inner.fail("note_at_revision", "error.fetch_revisions", &err);
                None
            }
        }
    }

    pub async fn revert_to_revision(
        &self,
        revision_id: RevisionId,
        request: RevertRequest,
    ) -> Option<Note> {
        let _in_flight = self.inner.begin();
        match self
            .inner
            .api
            .revert_to_revision(revision_id, &request)
            .await
        {
            Ok(note) => {
                info!(note_id = %note.id, %revision_id, "note reverted");
                self.inner.update(|state| state.apply_written(note.clone(), false));
                self.inner.notify(NoticeLevel::Success, "notice.note_reverted");
                Some(note)
            }
            Err(err) => {
                self.inner.fail("revert_to_revision", "error.revert", &err);
                None
            }
        }
    }

    /// Drops the current note and any response still on its way for it.
    pub fn invalidate_current(&self) {
        self.inner.update(|state| {
            state.current_tokens.issue();
            state.current = None;
            state.current_request = None;
        });
    }

    fn prepend(&self, note: Note) {
        self.inner.update(|state| state.prepend_note(note));
    }
}

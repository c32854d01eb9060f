use std::time::{Duration, Instant};

use core_types::{Note, NoteId};

use crate::events::NoteSnapshot;

/// Monotonic request counter for one slot of state. A response may only land
/// in the slot if no newer ticket has been issued since it was taken.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket(u64);

#[derive(Debug, Default)]
pub(crate) struct SlotTokens {
    latest: u64,
}

impl SlotTokens {
    pub(crate) fn issue(&mut self) -> Ticket {
        self.latest += 1;
        Ticket(self.latest)
    }

    pub(crate) fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.latest
    }
}

#[derive(Debug)]
pub(crate) struct CachedNote {
    pub(crate) note: Note,
    pub(crate) fetched_at: Instant,
}

/// A confirmed write as it lands in the collection.
#[derive(Debug, Clone)]
pub(crate) enum CollectionWrite {
    Prepend(Note),
    Written { note: Note, insert_missing: bool },
    Removed(NoteId),
}

impl CollectionWrite {
    fn apply(&self, notes: &mut Vec<Note>) {
        match self {
            CollectionWrite::Prepend(note) => {
                notes.retain(|n| n.id != note.id);
                notes.insert(0, note.clone());
            }
            CollectionWrite::Written { note, .. } if note.is_archived => {
                notes.retain(|n| n.id != note.id);
            }
            CollectionWrite::Written {
                note,
                insert_missing,
            } => {
                if let Some(slot) = notes.iter_mut().find(|n| n.id == note.id) {
                    *slot = note.clone();
                } else if *insert_missing {
                    notes.insert(0, note.clone());
                }
            }
            CollectionWrite::Removed(id) => notes.retain(|n| &n.id != id),
        }
    }
}

/// Issued when a listing request starts; `since` marks the journal position
/// after which writes must be replayed onto the listing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ListTicket {
    ticket: Ticket,
    since: u64,
}

#[derive(Debug, Default)]
pub(crate) struct State {
    pub(crate) notes: Vec<Note>,
    pub(crate) current: Option<CachedNote>,
    /// Id asked for by the newest current-note request, resolved or not.
    pub(crate) current_request: Option<NoteId>,
    pub(crate) in_flight: usize,
    pub(crate) error: Option<String>,
    pub(crate) current_tokens: SlotTokens,
    list_tokens: SlotTokens,
    listing_pending: bool,
    write_seq: u64,
    /// Writes confirmed while a listing was in flight. Cleared when the newest listing resolves.
    journal: Vec<(u64, CollectionWrite)>,
}

impl State {
    pub(crate) fn snapshot(&self) -> NoteSnapshot {
        NoteSnapshot {
            notes: self.notes.clone(),
            current_note: self.current.as_ref().map(|cached| cached.note.clone()),
            loading: self.in_flight > 0,
            error: self.error.clone(),
        }
    }

    pub(crate) fn fresh_current(&self, id: &str, ttl: Duration) -> Option<&Note> {
        if ttl.is_zero() {
            return None;
        }
        self.current
            .as_ref()
            .filter(|cached| cached.note.id == id && cached.fetched_at.elapsed() < ttl)
            .map(|cached| &cached.note)
    }

    pub(crate) fn set_current(&mut self, note: Note) {
        self.current = Some(CachedNote {
            note,
            fetched_at: Instant::now(),
        });
    }

    /// The current-note slot belongs to the newest request. Only when nothing
    /// was requested does the cached note decide.
    pub(crate) fn current_targets(&self, id: &str) -> bool {
        match self.current_request.as_deref() {
            Some(requested) => requested == id,
            None => self
                .current
                .as_ref()
                .is_some_and(|cached| cached.note.id == id),
        }
    }

    pub(crate) fn begin_listing(&mut self) -> ListTicket {
        self.listing_pending = true;
        ListTicket {
            ticket: self.list_tokens.issue(),
            since: self.write_seq,
        }
    }

    /// Installs `listing` if no newer listing was started, replaying the writes
    /// confirmed since `ticket` was issued. Returns whether it was installed.
    pub(crate) fn finish_listing(&mut self, ticket: ListTicket, mut listing: Vec<Note>) -> bool {
        if !self.list_tokens.is_current(ticket.ticket) {
            return false;
        }
        for (_, write) in self.journal.iter().filter(|(seq, _)| *seq > ticket.since) {
            write.apply(&mut listing);
        }
        self.notes = listing;
        self.end_listing();
        true
    }

    pub(crate) fn abandon_listing(&mut self, ticket: ListTicket) {
        if self.list_tokens.is_current(ticket.ticket) {
            self.end_listing();
        }
    }

    fn end_listing(&mut self) {
        self.listing_pending = false;
        self.journal.clear();
    }

    pub(crate) fn record(&mut self, write: CollectionWrite) {
        write.apply(&mut self.notes);
        if self.listing_pending {
            self.write_seq += 1;
            self.journal.push((self.write_seq, write));
        }
    }

    /// Applies a confirmed write of `note` to both the collection and the current slot.
    pub(crate) fn apply_written(&mut self, note: Note, insert_missing: bool) {
        if self.current_targets(&note.id) {
            self.current_tokens.issue();
            if note.is_archived {
                self.current = None;
                self.current_request = None;
            } else {
                self.set_current(note.clone());
            }
        }
        self.record(CollectionWrite::Written {
            note,
            insert_missing,
        });
    }

    /// Drops `id` locally after an archive or delete was confirmed.
    pub(crate) fn apply_removed(&mut self, id: &str) {
        self.record(CollectionWrite::Removed(id.to_string()));
        if self.current_targets(id) {
            self.current_tokens.issue();
            self.current = None;
            self.current_request = None;
        }
    }

    pub(crate) fn prepend_note(&mut self, note: Note) {
        self.record(CollectionWrite::Prepend(note));
    }
}

/// Keeps the first occurrence of each id and, for default listings, only active notes.
pub(crate) fn normalize_listing(notes: Vec<Note>, include_archived: bool) -> Vec<Note> {
    let mut seen = std::collections::HashSet::new();
    notes
        .into_iter()
        .filter(|note| include_archived || !note.is_archived)
        .filter(|note| seen.insert(note.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str) -> Note {
        Note {
            id: id.to_string(),
            title: id.to_uppercase(),
            content: String::new(),
            raw_content: Some(format!("{id} text")),
            tags: Vec::new(),
            created_at: "2024-01-01T00:00:00".to_string(),
            updated_at: None,
            is_archived: false,
            links_to: Vec::new(),
            links_from: Vec::new(),
        }
    }

    #[test]
    fn newer_ticket_supersedes_older() {
        let mut tokens = SlotTokens::default();
        let first = tokens.issue();
        let second = tokens.issue();
        assert!(!tokens.is_current(first));
        assert!(tokens.is_current(second));
    }

    #[test]
    fn listing_drops_duplicates_and_archived() {
        let mut archived = note("b");
        archived.is_archived = true;
        let listing = normalize_listing(vec![note("a"), archived.clone(), note("a")], false);
        assert_eq!(listing, vec![note("a")]);

        let all = normalize_listing(vec![note("a"), archived.clone()], true);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn written_archived_note_leaves_collection_and_current() {
        let mut state = State {
            notes: vec![note("a"), note("b")],
            ..State::default()
        };
        state.set_current(note("a"));
        let mut archived = note("a");
        archived.is_archived = true;

        state.apply_written(archived, false);
        assert_eq!(state.notes, vec![note("b")]);
        assert!(state.current.is_none());
    }

    #[test]
    fn writes_during_a_listing_are_replayed_onto_it() {
        let mut state = State::default();
        let ticket = state.begin_listing();
        state.prepend_note(note("c"));
        state.apply_removed("b");

        assert!(state.finish_listing(ticket, vec![note("a"), note("b")]));
        assert_eq!(state.notes, vec![note("c"), note("a")]);
        assert!(state.journal.is_empty());
    }

    #[test]
    fn older_listing_loses_to_newer_one() {
        let mut state = State::default();
        let older = state.begin_listing();
        let newer = state.begin_listing();
        assert!(state.finish_listing(newer, vec![note("b")]));
        assert!(!state.finish_listing(older, vec![note("a")]));
        assert_eq!(state.notes, vec![note("b")]);
    }

    #[test]
    fn pending_request_for_another_note_keeps_the_slot() {
        let mut state = State::default();
        state.set_current(note("a"));
        assert!(state.current_targets("a"));

        state.current_request = Some("b".to_string());
        assert!(!state.current_targets("a"));
        assert!(state.current_targets("b"));
    }

    #[test]
    fn fresh_current_respects_ttl_and_id() {
        let mut state = State::default();
        state.set_current(note("a"));
        assert!(state.fresh_current("a", Duration::from_secs(60)).is_some());
        assert!(state.fresh_current("b", Duration::from_secs(60)).is_none());
        assert!(state.fresh_current("a", Duration::ZERO).is_none());
    }
}

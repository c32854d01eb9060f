use std::sync::{Arc, Weak};

use core_types::Note;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

/// Point-in-time copy of the store's state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NoteSnapshot {
    pub notes: Vec<Note>,
    pub current_note: Option<Note>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Outcome message meant for a transient toast or banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    Changed(NoteSnapshot),
    Notice(Notice),
}

type Listener = Arc<dyn Fn(&StateEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    inner: Mutex<Registered>,
}

#[derive(Default)]
struct Registered {
    next_id: u64,
    listeners: IndexMap<u64, Listener>,
}

impl ListenerRegistry {
    pub(crate) fn subscribe(self: &Arc<Self>, listener: Listener) -> Subscription {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.listeners.insert(id, listener);
        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.lock().listeners.is_empty()
    }

    /// Calls listeners in subscription order without holding the registry lock,
    /// so a listener may subscribe or unsubscribe from inside its callback.
    pub(crate) fn emit(&self, event: &StateEvent) {
        let listeners: Vec<Listener> = self.inner.lock().listeners.values().cloned().collect();
        for listener in listeners {
            listener(event);
        }
    }

    fn remove(&self, id: u64) {
        self.inner.lock().listeners.shift_remove(&id);
    }
}

/// Handle returned by `NoteStore::subscribe`. Dropping it unsubscribes.
#[must_use = "the listener is removed as soon as the subscription is dropped"]
pub struct Subscription {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

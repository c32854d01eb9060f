//! In-memory note collection kept consistent with the note service.
//!
//! [`NoteStore`] owns the collection, the current-note slot and the
//! loading/error flags. Callers observe it through [`NoteStore::snapshot`] or
//! by subscribing to [`StateEvent`]s.

mod events;
mod state;
mod store;
pub mod validation;

#[cfg(test)]
mod fake;

pub use events::{Notice, NoticeLevel, NoteSnapshot, StateEvent, Subscription};
pub use store::{NoteStore, SearchOptions, StoreOptions};
pub use validation::ValidationError;

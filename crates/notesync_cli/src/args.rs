use std::path::PathBuf;

use clap::{Parser, Subcommand};
use core_types::{DEFAULT_SIMILAR_LIMIT, NoteId, RevisionId};
use note_views::SortOption;

#[derive(Parser, Debug)]
#[command(name = "notesync")]
#[command(about = "Command-line client for the NoteSync note service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding config.json (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Note service base URL, overriding config and NOTESYNC_API_URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List notes
    #[command(alias = "ls")]
    List {
        /// Include archived notes
        #[arg(long)]
        archived: bool,

        /// Keep notes whose title, text or tags contain this term
        #[arg(short, long)]
        filter: Option<String>,

        /// Keep notes carrying this tag
        #[arg(short, long)]
        tag: Option<String>,

        /// newest, oldest, alphabetical or updated
        #[arg(short, long, default_value_t = SortOption::Newest)]
        sort: SortOption,
    },

    /// Show one note
    #[command(alias = "v")]
    Show { id: NoteId },

    /// Create a note
    #[command(alias = "n")]
    Create {
        #[arg(long)]
        title: String,

        #[arg(long)]
        content: String,

        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Edit a note; only the given fields change
    Edit {
        id: NoteId,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        content: Option<String>,

        /// Replaces the note's tags
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    Archive { id: NoteId },

    Restore { id: NoteId },

    /// Permanently delete a note
    #[command(alias = "rm")]
    Delete { id: NoteId },

    /// Search notes on the server
    Search {
        query: String,

        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        archived: bool,

        /// Use semantic rather than keyword matching
        #[arg(long)]
        semantic: bool,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Notes related to the given one
    Similar {
        id: NoteId,

        #[arg(long, default_value_t = DEFAULT_SIMILAR_LIMIT)]
        limit: usize,
    },

    /// All tags known to the server
    Tags {
        /// Derive tags from the active note listing instead
        #[arg(long)]
        local: bool,
    },

    ByTag { tag: String },

    /// Merge two or more notes into a new one
    Merge {
        #[arg(required = true, num_args = 2..)]
        ids: Vec<NoteId>,

        #[arg(long)]
        title: String,

        #[arg(long)]
        separator: Option<String>,
    },

    Revisions { id: NoteId },

    /// Show the diff recorded for a revision
    Diff { revision_id: RevisionId },

    /// Revert a note to the given revision
    Revert {
        revision_id: RevisionId,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        note: Option<String>,
    },

    /// Show a note's text as of a revision number
    AtRevision { id: NoteId, number: u32 },
}

mod args;

use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use api_http::HttpNoteApi;
use args::{Cli, Commands};
use clap::Parser;
use config::{ClientConfig, ConfigStore};
use core_types::{NoteCreateInput, NoteUpdateInput, RevertRequest, normalize_tags};
use note_state::{NoteStore, NoticeLevel, SearchOptions, StateEvent, StoreOptions};
use note_views::{ArchiveFilter, NoteFilter, extract_tags, view};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
    data_dir.push("notesync");
    let _log_guard = init_local_logger(&data_dir.join("logs"));

    let config = load_config(&cli);
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to create tokio runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.command, &config)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("command failed: {err:#}");
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn load_config(cli: &Cli) -> ClientConfig {
    let store = match &cli.config_dir {
        Some(dir) => Ok(ConfigStore::from_dir(dir.clone())),
        None => ConfigStore::from_default_location(),
    };
    let config = match store.and_then(|store| store.load_or_init()) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to load config: {err:#}");
            ClientConfig::default()
        }
    };
    config
        .with_env_overrides()
        .with_api_url_override(cli.api_url.clone())
}

/// Runs one command. `Ok(false)` means the operation failed and has already
/// been reported through a notice.
async fn run(command: Commands, config: &ClientConfig) -> Result<bool> {
    let api = HttpNoteApi::new(&config.api).context("invalid note service configuration")?;
    info!(base_url = %api.base_url(), "note service client ready");
    let store = NoteStore::new(Arc::new(api), StoreOptions::from_config(config));

    let _notices = store.subscribe(|event| {
        if let StateEvent::Notice(notice) = event {
            let label = match notice.level {
                NoticeLevel::Success => "ok",
                NoticeLevel::Error => "error",
            };
            eprintln!("[{label}] {}", notice.message);
        }
    });

    match command {
        Commands::List {
            archived,
            filter,
            tag,
            sort,
        } => {
            let notes = store.list_notes(archived).await.unwrap_or_default();
            let filter = NoteFilter {
                archive: if archived {
                    ArchiveFilter::All
                } else {
                    ArchiveFilter::Active
                },
                search_term: filter,
                tag,
            };
            print_json(&view(&notes, &filter, sort))?;
        }
        Commands::Show { id } => print_json(&store.get_note(&id).await)?,
        Commands::Create {
            title,
            content,
            tags,
        } => {
            let input = NoteCreateInput::new(title, content).with_tags(tags);
            print_json(&store.create_note(input).await)?;
        }
        Commands::Edit {
            id,
            title,
            content,
            tags,
        } => {
            let input = NoteUpdateInput {
                title,
                raw_content: content,
                tags: (!tags.is_empty()).then(|| normalize_tags(tags)),
                archived: None,
            };
            if input.is_empty() {
                bail!("nothing to change: pass --title, --content or --tag");
            }
            print_json(&store.update_note(&id, input).await)?;
        }
        Commands::Archive { id } => print_json(&store.archive_note(&id).await)?,
        Commands::Restore { id } => print_json(&store.restore_note(&id).await)?,
        Commands::Delete { id } => print_json(&store.delete_note(&id).await)?,
        Commands::Search {
            query,
            tags,
            archived,
            semantic,
            limit,
        } => {
            let options = SearchOptions {
                tags,
                include_archived: archived,
                semantic,
                limit,
            };
            print_json(&store.search_notes(&query, options).await)?;
        }
        Commands::Similar { id, limit } => print_json(&store.similar_notes(&id, limit).await)?,
        Commands::Tags { local } => {
            let tags = if local {
                let notes = store.list_notes(false).await.unwrap_or_default();
                extract_tags(&notes)
            } else {
                store.all_tags().await
            };
            print_json(&tags)?;
        }
        Commands::ByTag { tag } => print_json(&store.notes_by_tag(&tag).await)?,
        Commands::Merge {
            ids,
            title,
            separator,
        } => {
            let merged = store
                .merge_notes(ids, &title, separator.as_deref())
                .await;
            print_json(&merged)?;
        }
        Commands::Revisions { id } => print_json(&store.revisions(&id).await)?,
        Commands::Diff { revision_id } => print_json(&store.revision_diff(revision_id).await)?,
        Commands::Revert {
            revision_id,
            name,
            note,
        } => {
            let request = RevertRequest {
                revision_name: name,
                revision_note: note,
            };
            print_json(&store.revert_to_revision(revision_id, request).await)?;
        }
        Commands::AtRevision { id, number } => {
            print_json(&store.note_at_revision(&id, number).await)?
        }
    }

    Ok(store.snapshot().error.is_none())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{text}");
    Ok(())
}

fn init_local_logger(log_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    if let Err(err) = fs::create_dir_all(log_dir) {
        eprintln!("failed to create log dir `{}`: {err}", log_dir.display());
    }
    let file_appender = tracing_appender::rolling::daily(log_dir, "notesync.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,notesync_cli=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .with_writer(writer)
        .init();

    guard
}

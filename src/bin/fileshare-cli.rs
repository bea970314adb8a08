use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use base64::Engine;
use clap::{Parser, Subcommand};
use serde::Serialize;

use fileshare::config::Config;
use fileshare::engine::{AvailabilitySelector, FileEngine, ReactionEngine, Session};
use fileshare::snapshot::{Snapshot, SnapshotStore};
use fileshare::storage::models::{FileCategory, NewFile, Reaction};
use fileshare::storage::{LocalStore, RecordStore, RemoteStore};

#[derive(Parser, Debug)]
#[command(author, version, about = "Browse, upload and react to shared files", long_about = None)]
struct Args {
    /// Server base URL; overrides REMOTE_URL
    #[arg(long, global = true)]
    remote: Option<String>,

    /// Ignore any configured server and use only the local store
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List files, newest first
    List {
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,
    },
    /// Upload a file from disk
    Upload {
        path: PathBuf,
        #[arg(long)]
        caption: Option<String>,
    },
    /// Like a file, or remove an existing like
    Like { file_id: String },
    /// Dislike a file, or remove an existing dislike
    Dislike { file_id: String },
    /// Count one view of a file
    View { file_id: String },
    Delete { file_id: String },
    /// Show this user's reactions
    Reactions,
    Stats,
    /// Write the local store to a JSON snapshot
    Export { path: PathBuf },
    /// Replace the local store with a JSON snapshot
    Import { path: PathBuf },
    /// Show local storage usage against the quota
    Usage,
    /// Remove everything from the local store
    Clear,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CategoryArg {
    Document,
    Image,
    Text,
}

impl From<CategoryArg> for FileCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Document => FileCategory::Document,
            CategoryArg::Image => FileCategory::Image,
            CategoryArg::Text => FileCategory::Text,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::load()?;
    if let Some(remote) = args.remote {
        config.remote.base_url = Some(remote.trim_end_matches('/').to_string());
    }
    if args.offline {
        config.remote.base_url = None;
    }
    config.validate()?;

    let local = Arc::new(
        LocalStore::open(&config.local.data_dir, config.local.quota_bytes)
            .with_context(|| format!("opening local store at {}", config.local.data_dir))?,
    );

    let remote: Option<Arc<dyn RecordStore>> = match &config.remote.base_url {
        Some(url) => Some(Arc::new(RemoteStore::new(
            url,
            Duration::from_millis(config.remote.timeout_ms),
        )?)),
        None => None,
    };

    let session = Session::load_or_create(&local)?;
    let local_store: Arc<dyn RecordStore> = local.clone();
    let selector = Arc::new(AvailabilitySelector::new(local_store, remote));
    let files = FileEngine::new(Arc::clone(&selector), config.max_upload_size);
    let reactions = ReactionEngine::new(selector);

    match args.command {
        Command::List { category } => {
            print_json(&files.list_files(category.map(Into::into)).await?)?
        }
        Command::Upload { path, caption } => {
            let file = read_upload(&path, caption)?;
            print_json(&files.create_file(&session, file).await?)?
        }
        Command::Like { file_id } => print_json(
            &reactions
                .apply_reaction(&session, &file_id, Reaction::Like)
                .await?,
        )?,
        Command::Dislike { file_id } => print_json(
            &reactions
                .apply_reaction(&session, &file_id, Reaction::Dislike)
                .await?,
        )?,
        Command::View { file_id } => print_json(&files.record_view(&file_id).await?)?,
        Command::Delete { file_id } => print_json(&files.delete_file(&file_id).await?)?,
        Command::Reactions => print_json(&reactions.reactions_for(&session).await?)?,
        Command::Stats => print_json(&files.stats().await?)?,
        Command::Export { path } => {
            let snapshot = local.export_snapshot().await?;
            std::fs::write(&path, snapshot.to_json()?)
                .with_context(|| format!("writing {}", path.display()))?;
            print_json(&snapshot.stats())?
        }
        Command::Import { path } => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let snapshot = Snapshot::from_json(&json)?;
            let stats = snapshot.stats();
            local.import_snapshot(snapshot).await?;
            print_json(&stats)?
        }
        Command::Usage => print_json(&local.usage()?)?,
        Command::Clear => {
            let removed = local.clear()?;
            print_json(&serde_json::json!({ "keys_removed": removed }))?
        }
    }

    Ok(())
}

/// Build an upload from a file on disk, carrying its bytes as a data URI.
fn read_upload(path: &Path, caption: Option<String>) -> anyhow::Result<NewFile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut file = NewFile {
        name,
        mime_type: String::new(),
        size_bytes: bytes.len() as u64,
        content: String::new(),
        text_content: None,
        caption,
    };
    file.resolve_mime_type();

    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    file.content = format!("data:{};base64,{}", file.mime_type, encoded);
    if file.mime_type == "text/plain" {
        file.text_content = Some(String::from_utf8_lossy(&bytes).to_string());
    }
    Ok(file)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

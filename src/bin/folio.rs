//! # Folio CLI - Inspect and edit a versioned archive
//!
//! A command-line interface over a file-backed folio archive.
//!
//! ## Features
//! - Create directories and pages in the sorted archive tree
//! - Add and edit text components
//! - Capture, list and revert snapshots
//! - Change a directory's sort order
//!
//! ## Usage
//! ```bash
//! # Initialize an archive in .folio
//! folio init
//!
//! # Create a page and write a note
//! folio mkdir Main/Projects
//! folio page Main/Projects/Plan
//! folio text Main/Projects/Plan Goals
//! folio write Main/Projects/Plan Goals "ship it"
//!
//! # Capture and inspect history
//! folio capture Main/Projects/Plan -m "first draft"
//! folio history Main/Projects/Plan Goals
//! ```

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use folio::{
    hydrate, Archive, ArchiveBuilder, ArchiveConfig, CaptureState, ComponentKind, Component,
    FileStore, SaveMode, SortKey, SortOrder, StorageItem, StoreFormat, Synchronizer,
};
use humantime::format_duration;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Folio CLI - Versioned document archive
#[derive(Parser)]
#[command(name = "folio")]
#[command(version)]
#[command(about = "Sorted directories, pages of components and snapshot history")]
#[command(long_about = None)]
struct Cli {
    /// Archive directory (defaults to .folio)
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize an archive
    Init {
        /// Store file encoding
        #[arg(long, value_enum, default_value = "json")]
        format: FormatArg,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Show the archive tree
    #[command(alias = "ls")]
    Tree,

    /// Create a directory
    Mkdir {
        /// Path of the new directory, e.g. Main/Projects
        path: String,
    },

    /// Create a page
    Page {
        /// Path of the new page
        path: String,

        /// Page holds exactly one component
        #[arg(long)]
        single: bool,
    },

    /// Rename a directory or page
    #[command(alias = "mv")]
    Rename {
        /// Current path
        path: String,

        /// New name
        name: String,
    },

    /// Move an item to the trash, or delete it if it is already there
    Rm {
        /// Path of the item
        path: String,
    },

    /// Change a directory's sort order
    Sort {
        /// Directory path
        dir: String,

        /// Sort key
        #[arg(long, value_enum, default_value = "name")]
        by: SortArg,

        /// Sort descending
        #[arg(long)]
        descending: bool,
    },

    /// Add a text component to a page
    Text {
        /// Page path
        page: String,

        /// Component title
        title: String,
    },

    /// Replace the text of a component
    Write {
        /// Page path
        page: String,

        /// Component title
        component: String,

        /// New text
        text: String,
    },

    /// Capture snapshots of pending components
    #[command(alias = "cp")]
    Capture {
        /// Only capture components on this page
        page: Option<String>,

        /// Snapshot description
        #[arg(short, long)]
        message: Option<String>,
    },

    /// List a component's snapshots
    #[command(alias = "log")]
    History {
        /// Page path
        page: String,

        /// Component title
        component: String,
    },

    /// Restore a component from a snapshot
    Revert {
        /// Page path
        page: String,

        /// Component title
        component: String,

        /// Snapshot id or prefix
        snapshot: String,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Json,
    Bincode,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum SortArg {
    Name,
    Created,
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("FOLIO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    };

    // Run command
    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main command runner
async fn run(cli: Cli) -> Result<()> {
    let dir = cli.store.unwrap_or_else(|| PathBuf::from(".folio"));

    if let Commands::Init { format, force } = cli.command {
        return cmd_init(&dir, format, force);
    }

    let mut session = Session::open(&dir)?;
    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Tree => cmd_tree(&session),
        Commands::Mkdir { path } => cmd_mkdir(&mut session, &path).await,
        Commands::Page { path, single } => cmd_page(&mut session, &path, single).await,
        Commands::Rename { path, name } => cmd_rename(&mut session, &path, &name).await,
        Commands::Rm { path } => cmd_rm(&mut session, &path).await,
        Commands::Sort { dir, by, descending } => cmd_sort(&mut session, &dir, by, descending).await,
        Commands::Text { page, title } => cmd_text(&mut session, &page, &title).await,
        Commands::Write { page, component, text } => {
            cmd_write(&mut session, &page, &component, text).await
        }
        Commands::Capture { page, message } => cmd_capture(&mut session, page, message).await,
        Commands::History { page, component } => cmd_history(&session, &page, &component),
        Commands::Revert { page, component, snapshot } => {
            cmd_revert(&mut session, &page, &component, &snapshot).await
        }
    }
}

/// Open archive plus its write worker
struct Session {
    config: ArchiveConfig,
    archive: Archive,
    sync: Synchronizer,
}

impl Session {
    fn open(dir: &Path) -> Result<Self> {
        let config = ArchiveConfig::load(dir)
            .with_context(|| format!("no archive in {} (run `folio init`)", dir.display()))?;
        let store = Arc::new(FileStore::open(config.store_file(dir), config.store_format)?);
        let archive = hydrate::open_archive(store.as_ref(), &config)?;
        let sync = Synchronizer::spawn(store).with_auto_description(config.auto_capture_description.clone());
        Ok(Self { config, archive, sync })
    }

    fn resolve(&self, path: &str) -> Result<Uuid> {
        self.archive
            .resolve_path(path)
            .ok_or_else(|| anyhow!("no item at '{}'", path))
    }

    /// Parent directory id and the last path segment
    fn split<'a>(&self, path: &'a str) -> Result<(Uuid, &'a str)> {
        let (parent, name) = path
            .trim_end_matches('/')
            .rsplit_once('/')
            .ok_or_else(|| anyhow!("'{}' has no parent directory", path))?;
        if name.is_empty() {
            bail!("empty name in '{}'", path);
        }
        Ok((self.resolve(parent)?, name))
    }

    fn component_id(&self, page: Uuid, title: &str) -> Result<Uuid> {
        self.archive
            .page(page)?
            .component_titled(title)
            .map(|c| c.id)
            .ok_or_else(|| anyhow!("no component titled '{}'", title))
    }
}

/// Initialize an archive directory
///
/// Writes `config.json` and creates the main and trash directories in the
/// store file.
fn cmd_init(dir: &Path, format: FormatArg, force: bool) -> Result<()> {
    if dir.join(folio::config::CONFIG_FILE).exists() && !force {
        bail!("{} already holds an archive. Use --force to reinitialize.", dir.display());
    }

    println!("{}", "Initializing archive...".blue().bold());
    let format = match format {
        FormatArg::Json => StoreFormat::Json,
        FormatArg::Bincode => StoreFormat::Bincode,
    };
    let config = ArchiveBuilder::new().store_format(format).build(dir)?;
    let store = FileStore::open(config.store_file(dir), config.store_format)?;
    hydrate::bootstrap(&store, &config)?;

    println!("{} Initialized archive", "✓".green().bold());
    println!("  Config: {}", dir.join(folio::config::CONFIG_FILE).display().to_string().cyan());
    println!("  Store: {}", config.store_file(dir).display().to_string().cyan());
    println!("\nNext steps:");
    println!("  - Create a page: {}", format!("folio page {}/Notes", config.system.main_name).yellow());
    println!("  - View the tree: {}", "folio tree".yellow());
    Ok(())
}

/// Print the archive tree, main directory first
fn cmd_tree(session: &Session) -> Result<()> {
    let system = &session.config.system;
    for root in [system.main, system.trash] {
        print_item(&session.archive, root, 0)?;
    }
    Ok(())
}

fn print_item(archive: &Archive, id: Uuid, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    match archive.get(id) {
        Some(StorageItem::Directory(dir)) => {
            let order = match (dir.sort_order().key, dir.sort_order().ascending) {
                (SortKey::Name, true) => "name ↑",
                (SortKey::Name, false) => "name ↓",
                (SortKey::CreationDate, true) => "created ↑",
                (SortKey::CreationDate, false) => "created ↓",
            };
            println!("{}{}/ {}", indent, dir.name.blue().bold(), order.dimmed());
            for child in dir.children() {
                print_item(archive, child.id, depth + 1)?;
            }
        }
        Some(StorageItem::Page(page)) => {
            println!("{}{}", indent, page.name.cyan());
            for component in page.components() {
                let marker = match component.capture_state() {
                    Some(CaptureState::NeedsCapture) => "*".yellow().bold(),
                    _ => " ".normal(),
                };
                println!(
                    "{}  {} {} {}",
                    indent,
                    marker,
                    component.title,
                    format!("[{}]", component.kind()).dimmed()
                );
            }
        }
        None => bail!("dangling child {}", id),
    }
    Ok(())
}

async fn cmd_mkdir(session: &mut Session, path: &str) -> Result<()> {
    let (parent, name) = session.split(path)?;
    let (id, index) = session.archive.create_directory(parent, name)?;
    session.sync.create_item(&session.archive, id).await?;
    println!("{} Created {} at position {}", "✓".green().bold(), path.cyan(), index);
    Ok(())
}

async fn cmd_page(session: &mut Session, path: &str, single: bool) -> Result<()> {
    let (parent, name) = session.split(path)?;
    let (id, index) = session.archive.create_page(parent, name, single)?;
    session.sync.create_item(&session.archive, id).await?;
    println!("{} Created page {} at position {}", "✓".green().bold(), path.cyan(), index);
    Ok(())
}

async fn cmd_rename(session: &mut Session, path: &str, name: &str) -> Result<()> {
    let id = session.resolve(path)?;
    let index = session.archive.rename(id, name)?;
    session.sync.rename_item(&session.archive, id).await?;
    match index {
        Some(index) => println!("{} Renamed to {} (now at position {})", "✓".green().bold(), name.cyan(), index),
        None => println!("{} Renamed to {}", "✓".green().bold(), name.cyan()),
    }
    Ok(())
}

/// Move to trash, or delete for good when the item already sits in the trash
async fn cmd_rm(session: &mut Session, path: &str) -> Result<()> {
    let id = session.resolve(path)?;
    let trash = session.config.system.trash;
    if session.archive.is_ancestor_or_self(trash, id) {
        let removal = session.archive.remove_item(id)?;
        session.sync.remove_items(&removal).await?;
        println!(
            "{} Deleted {} items and {} components",
            "✓".green().bold(),
            removal.items.len(),
            removal.components.len()
        );
    } else {
        session.archive.move_to_trash(id)?;
        session.sync.move_item(&session.archive, id).await?;
        println!("{} Moved {} to {}", "✓".green().bold(), path.cyan(), session.config.system.trash_name);
    }
    Ok(())
}

async fn cmd_sort(session: &mut Session, dir: &str, by: SortArg, descending: bool) -> Result<()> {
    let id = session.resolve(dir)?;
    let key = match by {
        SortArg::Name => SortKey::Name,
        SortArg::Created => SortKey::CreationDate,
    };
    let moves = session
        .archive
        .set_sort_criterion(id, SortOrder { key, ascending: !descending })?;
    session.sync.save_sort_order(&session.archive, id).await?;
    let moved = moves.iter().filter(|m| m.is_move()).count();
    println!("{} Re-sorted {} ({} of {} items moved)", "✓".green().bold(), dir.cyan(), moved, moves.len());
    Ok(())
}

async fn cmd_text(session: &mut Session, page: &str, title: &str) -> Result<()> {
    let page_id = session.resolve(page)?;
    let component = Component::empty(title, ComponentKind::Text);
    let id = component.id;
    session.archive.page_mut(page_id)?.add_component(component)?;
    let component = session.archive.component_mut(page_id, id)?;
    session.sync.add_component(page_id, component).await?;
    println!("{} Added text component {}", "✓".green().bold(), title.cyan());
    Ok(())
}

async fn cmd_write(session: &mut Session, page: &str, title: &str, text: String) -> Result<()> {
    let page_id = session.resolve(page)?;
    let id = session.component_id(page_id, title)?;
    let component = session.archive.component_mut(page_id, id)?;
    component.set_text(text)?;
    let written = session.sync.sync_content_change(component).await?;
    println!("{} Saved {} ({} writes)", "✓".green().bold(), title.cyan(), written);
    Ok(())
}

/// Capture pending components
///
/// With a page, every pending component on it is captured manually with the
/// given message. Without one, the whole archive gets an automatic capture.
async fn cmd_capture(session: &mut Session, page: Option<String>, message: Option<String>) -> Result<()> {
    println!("{}", "Capturing snapshots...".blue().bold());
    let (captured, skipped) = match page {
        Some(page) => {
            let page_id = session.resolve(&page)?;
            let description = message.unwrap_or_default();
            let (mut captured, mut skipped) = (0, 0);
            for component in session.archive.page_mut(page_id)?.components_mut() {
                if !component.needs_capture() {
                    skipped += 1;
                    continue;
                }
                let id = session
                    .sync
                    .capture_snapshot(component, &description, SaveMode::Manual)
                    .await?;
                println!("  {} {}", id.simple().to_string()[..8].yellow(), component.title);
                captured += 1;
            }
            (captured, skipped)
        }
        None => {
            let report = session.sync.capture_all_pending(session.archive.components_mut()).await?;
            (report.captured, report.skipped)
        }
    };
    println!("{} Captured {}, skipped {}", "✓".green().bold(), captured, skipped);
    Ok(())
}

fn cmd_history(session: &Session, page: &str, title: &str) -> Result<()> {
    let page_id = session.resolve(page)?;
    let component = session
        .archive
        .page(page_id)?
        .component_titled(title)
        .ok_or_else(|| anyhow!("no component titled '{}'", title))?;
    let history = component.snapshot_infos();
    if history.is_empty() {
        println!("{}", "No snapshots found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Snapshots of {}:", title).blue().bold());
    println!();
    let now = Utc::now();
    for (index, info) in history.iter().enumerate() {
        let age = (now - info.making_date).to_std().unwrap_or_default();
        let mode = match info.save_mode {
            SaveMode::Automatic => "auto".dimmed(),
            SaveMode::Manual => "manual".normal(),
        };
        print!("{:>3} {} ", index, info.id.simple().to_string()[..8].yellow().bold());
        print!("{} ago ", format_duration(Duration::from_secs(age.as_secs())).to_string().dimmed());
        print!("{} ", mode);
        if !info.description.is_empty() {
            print!("{}", info.description.cyan());
        }
        println!();
    }
    if component.is_in_sync() {
        println!("\n{}", "Live content matches the newest snapshot.".dimmed());
    }
    Ok(())
}

async fn cmd_revert(session: &mut Session, page: &str, title: &str, prefix: &str) -> Result<()> {
    let page_id = session.resolve(page)?;
    let id = session.component_id(page_id, title)?;
    let component = session.archive.component_mut(page_id, id)?;

    let matches: Vec<Uuid> = component
        .snapshot_infos()
        .iter()
        .map(|info| info.id)
        .filter(|id| id.simple().to_string().starts_with(prefix) || id.to_string() == prefix)
        .collect();
    let snapshot = match matches.as_slice() {
        [single] => *single,
        [] => bail!("no snapshot matches '{}'", prefix),
        _ => bail!("'{}' matches {} snapshots", prefix, matches.len()),
    };

    component.revert_to_snapshot(snapshot)?;
    session.sync.sync_content_change(component).await?;
    println!("{} Reverted {} to {}", "✓".green().bold(), title.cyan(), prefix.yellow());
    Ok(())
}

//! Menu Administration CLI
//!
//! Runs single menu tree operations against a libsql database and prints the
//! result as JSON on stdout.
//!
//! # Usage
//!
//! ```bash
//! # Build a small menu
//! menu-admin --db ./menus.db create --title Home --url /
//! menu-admin --db ./menus.db create --title About --parent 1
//!
//! # Inspect it
//! menu-admin --db ./menus.db list
//!
//! # Restructure
//! menu-admin --db ./menus.db move 2
//! menu-admin --db ./menus.db reorder 2 0
//! ```
//!
//! # Environment Variables
//!
//! - `MENUTREE_DB_PATH`: Database file (same as `--db`, which overrides it)
//! - `MENUTREE_BUSY_TIMEOUT_MS`, `MENUTREE_MAX_DEPTH`: Engine tuning
//! - `RUST_LOG`: Logging level (e.g., "info", "debug"); logs go to stderr

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use menutree_core::models::{MenuNodeUpdate, NewMenuNode};
use menutree_core::{EngineConfig, MenuService};
use serde::Serialize;

/// Inspect and edit a menu tree database
#[derive(Parser, Debug)]
#[command(name = "menu-admin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Database file
    #[arg(long, global = true, env = "MENUTREE_DB_PATH")]
    db: Option<PathBuf>,

    /// Use a throwaway in-memory database (wins over --db)
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the whole forest
    List,

    /// Show a node with its parent and children
    Get { id: i64 },

    /// Print the tree rooted at a node
    Subtree { id: i64 },

    /// Print the chain from the root down to a node's parent
    Ancestors { id: i64 },

    /// Append a node to a sibling group
    Create {
        #[arg(long)]
        title: String,

        #[arg(long)]
        url: Option<String>,

        /// Parent id (default: root group)
        #[arg(long)]
        parent: Option<i64>,
    },

    /// Change title, url and/or parent
    Update {
        id: i64,

        #[arg(long)]
        title: Option<String>,

        #[arg(long, conflicts_with = "clear_url")]
        url: Option<String>,

        /// Remove the url
        #[arg(long)]
        clear_url: bool,

        /// New parent id
        #[arg(long, conflicts_with = "root")]
        parent: Option<i64>,

        /// Detach to the root group
        #[arg(long)]
        root: bool,
    },

    /// Delete a node and its whole subtree
    Delete { id: i64 },

    /// Re-parent a node, appending it to the new group
    Move {
        id: i64,

        /// New parent id (default: root group)
        #[arg(long)]
        parent: Option<i64>,
    },

    /// Move a node to a position within its sibling group
    Reorder {
        id: i64,

        #[arg(allow_negative_numbers = true)]
        order: i64,
    },
}

impl Commands {
    fn update_payload(
        title: Option<String>,
        url: Option<String>,
        clear_url: bool,
        parent: Option<i64>,
        root: bool,
    ) -> MenuNodeUpdate {
        MenuNodeUpdate {
            title,
            url: if clear_url { Some(None) } else { url.map(Some) },
            parent_id: if root { Some(None) } else { parent.map(Some) },
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = EngineConfig::from_env();
    if cli.in_memory {
        config = config.in_memory();
    } else if let Some(path) = cli.db {
        config = config.with_database_path(path);
    }

    match &config.database_path {
        Some(path) => tracing::info!("Database: {}", path.display()),
        None => tracing::info!("Database: in-memory"),
    }

    let store = config.open_store().await?;
    let service = MenuService::with_config(store, &config);

    match cli.command {
        Commands::List => print_json(&service.list_tree().await?),
        Commands::Get { id } => print_json(&service.get_node(id).await?),
        Commands::Subtree { id } => print_json(&service.get_subtree(id).await?),
        Commands::Ancestors { id } => print_json(&service.get_ancestors(id).await?),
        Commands::Create { title, url, parent } => {
            let new_node = NewMenuNode {
                title,
                url,
                parent_id: parent,
            };
            print_json(&service.create_node(new_node).await?)
        }
        Commands::Update {
            id,
            title,
            url,
            clear_url,
            parent,
            root,
        } => {
            let update = Commands::update_payload(title, url, clear_url, parent, root);
            print_json(&service.update_node(id, update).await?)
        }
        Commands::Delete { id } => print_json(&service.delete_node(id).await?),
        Commands::Move { id, parent } => print_json(&service.move_node(id, parent).await?),
        Commands::Reorder { id, order } => print_json(&service.reorder_node(id, order).await?),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use viewsync::config::Config;
use viewsync::model::{ChangeId, CodebaseId, SnapshotId, UserId, ViewId, WorkspaceId};
use viewsync::{Engine, NewView, NewWorkspace};

mod format;

use format::OutputFormat;

/// Keep long-lived working copies in sync with named lines of work
///
/// A codebase owns one trunk repository. Workspaces are branches on that
/// trunk. A view is a working copy cloned from the trunk that shows one
/// workspace at a time; opening another workspace on it snapshots the
/// current working tree first and restores the incoming workspace's last
/// snapshot after, so nothing is lost and no branch history is written.
///
/// QUICK START:
///
///   viewsync codebase create
///   viewsync workspace create <codebase> --user alice
///   viewsync view create <codebase> <workspace> --user alice
///   viewsync view open <view> <other-workspace>
#[derive(Parser)]
#[command(name = "viewsync")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'viewsync <command> --help' for more information on a specific command.")]
struct Cli {
    /// Configuration file (missing file means defaults)
    #[arg(long, global = true, env = "VIEWSYNC_CONFIG", default_value = "viewsync.toml")]
    config: PathBuf,

    /// Output format: text or json
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage codebases
    #[command(subcommand)]
    Codebase(CodebaseCommands),

    /// Manage workspaces
    #[command(subcommand, alias = "ws")]
    Workspace(WorkspaceCommands),

    /// Manage views (working copies)
    #[command(subcommand)]
    View(ViewCommands),

    /// Capture, list and restore snapshots
    #[command(subcommand)]
    Snapshot(SnapshotCommands),
}

#[derive(Subcommand)]
enum CodebaseCommands {
    /// Create a codebase with an empty trunk
    Create {
        /// Short human-readable id (default: derived from the generated id)
        #[arg(long)]
        short_id: Option<String>,
    },
    /// Show a codebase record
    Show { codebase: CodebaseId },
}

#[derive(Subcommand)]
enum WorkspaceCommands {
    /// Create a workspace branch on the codebase's trunk
    Create {
        codebase: CodebaseId,
        /// Owner of the workspace
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        name: Option<String>,
        /// Start from a recorded change instead of the trunk tip
        #[arg(long)]
        from_change: Option<ChangeId>,
    },
    /// Show a workspace record
    Show { workspace: WorkspaceId },
}

#[derive(Subcommand)]
enum ViewCommands {
    /// Clone a new working copy and open a workspace on it
    Create {
        codebase: CodebaseId,
        workspace: WorkspaceId,
        /// Owner of the view
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        name: Option<String>,
        /// Where the working copy is mounted on the user's machine
        #[arg(long)]
        mount_path: Option<PathBuf>,
        #[arg(long)]
        mount_hostname: Option<String>,
    },
    /// Switch a view to another workspace
    ///
    /// The outgoing workspace's working tree is snapshotted before the
    /// switch. Opening the workspace the view already shows does nothing.
    Open { view: ViewId, workspace: WorkspaceId },
    /// Show a view record and the path of its working copy
    Show { view: ViewId },
    /// Snapshot the bound workspace and delete the view's working copy
    Remove { view: ViewId },
}

#[derive(Subcommand)]
enum SnapshotCommands {
    /// Snapshot a view's working tree as its bound workspace's state
    Capture { view: ViewId },
    /// List a workspace's snapshots, oldest first
    List { workspace: WorkspaceId },
    /// Reset a view's working tree to one of its workspace's snapshots
    Restore { view: ViewId, snapshot: SnapshotId },
}

#[derive(serde::Serialize)]
struct ViewOutput {
    #[serde(flatten)]
    view: viewsync::model::View,
    path: PathBuf,
}

fn main() -> Result<()> {
    viewsync::telemetry::init();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    let engine = Engine::from_config(&config);
    let out = cli.format;

    let rendered = match cli.command {
        Commands::Codebase(cmd) => match cmd {
            CodebaseCommands::Create { short_id } => {
                out.render(&engine.create_codebase(short_id.as_deref())?)?
            }
            CodebaseCommands::Show { codebase } => out.render(&engine.get_codebase(&codebase)?)?,
        },
        Commands::Workspace(cmd) => match cmd {
            WorkspaceCommands::Create {
                codebase,
                user,
                name,
                from_change,
            } => out.render(&engine.create_workspace(
                &codebase,
                &user,
                NewWorkspace { name, from_change },
            )?)?,
            WorkspaceCommands::Show { workspace } => {
                out.render(&engine.get_workspace(&workspace)?)?
            }
        },
        Commands::View(cmd) => match cmd {
            ViewCommands::Create {
                codebase,
                workspace,
                user,
                name,
                mount_path,
                mount_hostname,
            } => {
                let view = engine.create_view(
                    &codebase,
                    &workspace,
                    &user,
                    NewView {
                        name,
                        mount_path,
                        mount_hostname,
                    },
                )?;
                out.render(&with_path(&engine, view))?
            }
            ViewCommands::Open { view, workspace } => {
                let view = engine
                    .open_workspace_on_view(&view, &workspace)
                    .with_context(|| format!("opening workspace {workspace} on view {view}"))?;
                out.render(&with_path(&engine, view))?
            }
            ViewCommands::Show { view } => out.render(&with_path(&engine, engine.get_view(&view)?))?,
            ViewCommands::Remove { view } => {
                engine.remove_view(&view)?;
                out.render(&serde_json::json!({ "removed": view }))?
            }
        },
        Commands::Snapshot(cmd) => match cmd {
            SnapshotCommands::Capture { view } => out.render(&engine.capture_snapshot(&view)?)?,
            SnapshotCommands::List { workspace } => {
                out.render(&engine.list_snapshots(&workspace)?)?
            }
            SnapshotCommands::Restore { view, snapshot } => {
                engine.restore_snapshot(&view, &snapshot)?;
                out.render(&serde_json::json!({ "restored": snapshot, "view": view }))?
            }
        },
    };

    if !rendered.is_empty() {
        println!("{rendered}");
    }
    Ok(())
}

fn with_path(engine: &Engine, view: viewsync::model::View) -> ViewOutput {
    let path = engine.locator().view_path(&view.codebase_id, &view.id);
    ViewOutput { view, path }
}

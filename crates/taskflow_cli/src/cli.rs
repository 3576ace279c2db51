//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use taskflow_core::{DependencyKind, Priority, TaskStatus};

/// Hierarchical tasks with weighted progress, kept in a JSON file
#[derive(Parser)]
#[command(name = "taskflow", about, version, propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Task file (default: $TASKFLOW_DATA or ./taskflow.json)
    #[arg(short, long, global = true)]
    pub data: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format: text (human-readable) or json (machine-readable)
    #[arg(short, long, global = true, default_value = "text")]
    pub output: OutputFormat,
}

impl Cli {
    pub fn data_path(&self) -> PathBuf {
        self.data
            .clone()
            .or_else(|| std::env::var_os("TASKFLOW_DATA").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("taskflow.json"))
    }
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Colored terminal output for humans
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Args, Debug)]
pub struct TaskArgs {
    /// Task title
    pub title: String,
    /// Explicit id (default: random)
    #[arg(long)]
    pub id: Option<String>,
    /// First day, YYYY-MM-DD
    #[arg(long, requires = "due")]
    pub start: Option<NaiveDate>,
    /// Last day, YYYY-MM-DD
    #[arg(long, requires = "start")]
    pub due: Option<NaiveDate>,
    /// low, medium, high or urgent
    #[arg(long)]
    pub priority: Option<Priority>,
    /// Effort estimate in hours
    #[arg(long)]
    pub effort: Option<f64>,
    #[arg(long)]
    pub assignee: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum KindArg {
    /// FROM must finish before TO
    Blocks,
    /// FROM waits for TO
    DependsOn,
}

impl From<KindArg> for DependencyKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Blocks => DependencyKind::Blocks,
            KindArg::DependsOn => DependencyKind::DependsOn,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an empty task file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the task forest
    Tree,
    /// Show one task with its actions and dependencies
    Show { task: String },
    /// Create a root task
    Add(TaskArgs),
    /// Create a subtask; unset fields are inherited from the parent
    Subtask {
        parent: String,
        #[command(flatten)]
        task: TaskArgs,
        /// Action title; repeat to add several, all with equal weight
        #[arg(long = "action", value_name = "TITLE")]
        actions: Vec<String>,
    },
    /// Flip an action between done and not done
    Toggle { action: String },
    /// Move a task under another parent, or to the root level
    Reparent {
        task: String,
        /// New parent (default: root level)
        #[arg(long)]
        parent: Option<String>,
        /// Index among the new siblings (default: last)
        #[arg(long)]
        position: Option<usize>,
    },
    /// Set a task's date range
    Dates {
        task: String,
        start: NaiveDate,
        due: NaiveDate,
    },
    /// Set a task's status explicitly (todo, doing, blocked, done)
    Status { task: String, status: TaskStatus },
    /// Set progress of a task that has no actions
    Progress { task: String, value: u8 },
    /// Add or remove a dependency between two tasks
    Depend {
        from: String,
        to: String,
        #[arg(long, value_enum, default_value = "blocks")]
        kind: KindArg,
        /// Remove the dependency instead
        #[arg(long)]
        remove: bool,
    },
    /// Manage weighted actions
    Action {
        #[command(subcommand)]
        action: ActionCommand,
    },
    /// Delete a task and its subtree
    Delete {
        task: String,
        /// Delete only the task and move its children up one level
        #[arg(long)]
        detach: bool,
    },
    /// Copy a task and its actions as a new sibling
    Duplicate { task: String },
    /// Summary counts
    Stats,
}

#[derive(Subcommand)]
pub enum ActionCommand {
    /// List the actions of a task
    List { task: String },
    /// Add an action to a task
    Add {
        task: String,
        title: String,
        /// Share of the task's progress, 0-100 (default: equal share for every action)
        #[arg(long)]
        weight: Option<f64>,
    },
    Remove { action: String },
    Rename { action: String, title: String },
    /// Give every action of a task the same weight
    Spread { task: String },
}

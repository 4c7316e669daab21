//! Command-line interface for goal-forest.
//!
//! Every command opens the project's forest database, loads it into a
//! [`NodeStore`](crate::forest::NodeStore), performs one operation and prints
//! the result.

mod run;

#[cfg(test)]
mod tests;

pub use run::{run, run_in, CliOutput};

use clap::{Parser, Subcommand};

/// Goal forest - goals, milestones, requirements and tasks as one tree.
///
/// Node types are `goal`, `milestone`, `requirement` and `task`. Goals,
/// milestones and requirements share one id space and tasks have their own,
/// so commands that take an id also take the node type.
#[derive(Parser, Debug)]
#[command(name = "goal-forest")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add a node.
    ///
    /// Tasks need a parent. The new node goes after its existing siblings.
    Add {
        /// Node type: goal, milestone, requirement or task
        node_type: String,

        /// Title for the node
        title: String,

        /// Parent goal, milestone or requirement id
        #[arg(short, long)]
        parent: Option<i64>,

        /// Description with more details
        #[arg(short, long)]
        description: Option<String>,

        /// Task frequency: once, daily, weekly or custom
        #[arg(short, long, default_value = "once")]
        frequency: String,

        /// Weekday indices for weekly tasks (0=Sunday..6=Saturday), comma separated
        #[arg(long, value_delimiter = ',')]
        days: Vec<u8>,

        /// Date for one-off tasks (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// Quantity label, e.g. "30 minutes"
        #[arg(short, long)]
        measurement: Option<String>,
    },

    /// Print the forest.
    List {
        /// Print JSON instead of an indented tree
        #[arg(long)]
        json: bool,
    },

    /// Change a node's title or description.
    Update {
        /// Node type: goal, milestone, requirement or task
        node_type: String,

        /// Node id
        id: i64,

        /// New title
        #[arg(short, long)]
        title: Option<String>,

        /// New description (empty string clears it)
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Flip a task between done and not done.
    Toggle {
        /// Task id
        id: i64,
    },

    /// Set the status of a goal, milestone or requirement.
    Status {
        /// Goal-like node id
        id: i64,

        /// New status: active or completed
        status: String,
    },

    /// Move a node under a new parent.
    ///
    /// Without --parent the node becomes a root. A node cannot be moved
    /// under itself or one of its descendants.
    Move {
        /// Node type: goal, milestone, requirement or task
        node_type: String,

        /// Node id
        id: i64,

        /// New parent id
        #[arg(short, long)]
        parent: Option<i64>,
    },

    /// Set the display order of a sibling group.
    Reorder {
        /// Parent id of the group (omit for roots)
        #[arg(short, long)]
        parent: Option<i64>,

        /// Node type of the listed ids
        #[arg(short = 't', long = "type", default_value = "goal")]
        node_type: String,

        /// Ids in their new order
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Delete a node and everything below it.
    Delete {
        /// Node type: goal, milestone, requirement or task
        node_type: String,

        /// Node id
        id: i64,
    },

    /// Ensure config file exists (create with defaults if not).
    #[command(name = "ensure-config")]
    EnsureConfig,

    /// Show version information.
    Version,
}

impl Command {
    /// Returns true if this command reads or writes the forest database.
    #[must_use]
    pub const fn needs_store(&self) -> bool {
        !matches!(self, Self::EnsureConfig | Self::Version)
    }
}

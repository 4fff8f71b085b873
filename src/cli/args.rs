//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

use crate::domain::{NodeId, NodeKind, Position, ResponseId};

/// Response tree inspector: ordered answer hierarchies, subtree re-association, debug dumps
#[derive(Parser, Debug)]
#[command(name = "restree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Config file layered over the global config
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Data file (overrides configured data_file)
    #[arg(long, global = true, env = "RESTREE_DATA", value_hint = ValueHint::FilePath)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Sibling placement shared by attach and move.
#[derive(Args, Debug, Clone, Default)]
pub struct PositionArgs {
    /// Explicit rank (placed after equal-rank siblings)
    #[arg(long, conflicts_with = "index")]
    pub rank: Option<i32>,

    /// Sibling index (later siblings are shifted)
    #[arg(long)]
    pub index: Option<usize>,
}

impl PositionArgs {
    pub fn position(&self) -> Position {
        match (self.rank, self.index) {
            (Some(rank), _) => Position::Rank(rank),
            (None, Some(index)) => Position::Index(index),
            (None, None) => Position::Last,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show a response as a tree
    Tree {
        /// Response id
        response: ResponseId,
    },

    /// Dump a response line by line (rank, kind, form item, value)
    Debug {
        /// Response id
        response: ResponseId,
    },

    /// List ordered children of a node (roots when omitted)
    Children {
        /// Response id
        response: ResponseId,
        /// Parent node id
        node: Option<NodeId>,
    },

    /// Attach a new node
    Attach {
        /// Response id
        response: ResponseId,
        /// Form item answered by the node
        #[arg(long)]
        item: String,
        /// Parent node id (root when omitted)
        #[arg(long)]
        parent: Option<NodeId>,
        /// Node kind
        #[arg(long, default_value = "answer")]
        kind: NodeKind,
        /// Answer value
        #[arg(long)]
        value: Option<String>,
        #[command(flatten)]
        position: PositionArgs,
    },

    /// Find the node answering a form item
    Find {
        /// Response id
        response: ResponseId,
        /// Form item key
        item: String,
        /// Parent node id (roots when omitted)
        #[arg(long)]
        parent: Option<NodeId>,
    },

    /// Remove a node and its subtree
    Remove {
        /// Response id
        response: ResponseId,
        /// Node id
        node: NodeId,
    },

    /// Set or clear a node's value
    SetValue {
        /// Response id
        response: ResponseId,
        /// Node id
        node: NodeId,
        /// New value (cleared when omitted)
        value: Option<String>,
    },

    /// Move a node (with its subtree) under another parent
    Move {
        /// Response id
        response: ResponseId,
        /// Node id
        node: NodeId,
        /// New parent (root when omitted)
        #[arg(long)]
        parent: Option<NodeId>,
        #[command(flatten)]
        position: PositionArgs,
    },

    /// Hand a root node and its subtree to another response
    Reassociate {
        /// Current response id
        response: ResponseId,
        /// Root node id
        root: NodeId,
        /// Target response id
        target: ResponseId,
    },

    /// List responses in the data file
    Responses,

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Print a template config file
    Template,
    /// Show config file locations
    Path,
}

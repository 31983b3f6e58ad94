//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for ccfsync using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Ccfsync - Drug-test result reconciliation and CRM sync
#[derive(Parser, Debug)]
#[command(name = "ccfsync")]
#[command(version, about, long_about = None)]
#[command(author = "Ccfsync Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "ccfsync.toml", env = "CCFSYNC_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CCFSYNC_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile source results: stage incomplete records, push complete ones
    Reconcile(commands::reconcile::ReconcileArgs),

    /// Add CCFIDs present in the CRM but missing from the local uploaded set
    SyncUploaded(commands::sync_uploaded::SyncUploadedArgs),

    /// Map a raw source file to canonical records without side effects
    Normalize(commands::normalize::NormalizeArgs),

    /// Stage the incomplete records of a raw source file for review
    Stage(commands::stage::StageArgs),

    /// List staged records awaiting review
    Worklist(commands::worklist::WorklistArgs),

    /// Show, correct and submit, or dismiss a staged record
    Review(commands::review::ReviewArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

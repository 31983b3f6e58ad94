// Ccfsync - Drug-test result reconciliation and CRM sync
// Copyright (c) 2025 Ccfsync Contributors
// Licensed under the MIT License

//! # Ccfsync - Drug-test result reconciliation and CRM sync
//!
//! Ccfsync collects drug-test results from several collection vendors, maps them
//! to one canonical record shape and delivers them to a CRM. Records that are
//! missing required fields wait in a PostgreSQL staging table until a reviewer
//! corrects them.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Normalizing** vendor rows (CRL, i3screen, eScreen) into canonical records
//! - **Classifying** records as complete or incomplete
//! - **Deduplicating** by CCFID against the uploaded set and the review queue
//! - **Staging** incomplete records in one transaction per source
//! - **Pushing** complete records to the CRM and confirming accepted CCFIDs
//! - **Reviewing** staged records: corrections, resubmission, dismissal
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Reconciliation logic (normalize, classify, dedup, reference, sync, run, review)
//! - [`adapters`] - External integrations (CRM, PostgreSQL, source inbox)
//! - [`domain`] - Canonical record, identifiers and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ccfsync::adapters::crm::CrmClient;
//! use ccfsync::adapters::database::create_store;
//! use ccfsync::config::load_config;
//! use ccfsync::core::run::ReconcileCoordinator;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("ccfsync.toml")?;
//!     let sources = config.sources.order.clone();
//!     let remote = Arc::new(CrmClient::new(config.crm.clone())?);
//!     let store = create_store(&config.postgresql).await?;
//!
//!     let summary = ReconcileCoordinator::new(config, remote, store)
//!         .run(&sources)
//!         .await?;
//!
//!     println!("Pushed {} records", summary.total_pushed());
//!     Ok(())
//! }
//! ```
//!
//! ## Normalization
//!
//! ```rust
//! use ccfsync::core::normalize::canon::{map_result, parse_date};
//!
//! assert_eq!(map_result("NEG"), "Negative");
//! assert_eq!(parse_date("03/14/2025").map(|d| d.to_string()).as_deref(), Some("2025-03-14"));
//! assert_eq!(parse_date("N/A"), None);
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`domain::Result`], an alias over
//! [`domain::ReconcileError`]. Each error maps onto a run error kind through
//! [`domain::ReconcileError::kind`] so summaries can count them.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;

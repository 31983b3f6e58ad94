//! Core reconciliation logic for Ccfsync.
//!
//! # Modules
//!
//! - [`normalize`] - Per-source field mappers and canonical vocabularies
//! - [`classify`] - Completeness classification
//! - [`dedup`] - The uploaded and pending-review CCFID sets
//! - [`reference`] - CRM reference data and collection-site creation
//! - [`sync`] - Pushing complete records and confirming them as uploaded
//! - [`run`] - Per-source run orchestration and summaries
//! - [`review`] - Corrections and resubmission of staged records
//!
//! # Run Workflow
//!
//! 1. **Prepare**: Refresh reference data and snapshot the dedup sets
//! 2. **Load**: Read each source's raw rows from the inbox
//! 3. **Normalize**: Map rows to canonical records
//! 4. **Filter**: Drop known CCFIDs and classify the rest
//! 5. **Stage**: Write incomplete records for review in one transaction
//! 6. **Push**: Create missing collection sites, submit complete records, confirm accepted ones
//! 7. **Report**: Log the run summary
//!
//! # Example
//!
//! ```rust,no_run
//! use ccfsync::adapters::crm::CrmClient;
//! use ccfsync::adapters::database::create_store;
//! use ccfsync::config::load_config;
//! use ccfsync::core::normalize::SourceKind;
//! use ccfsync::core::run::ReconcileCoordinator;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("ccfsync.toml")?;
//! let remote = Arc::new(CrmClient::new(config.crm.clone())?);
//! let store = create_store(&config.postgresql).await?;
//!
//! let coordinator = ReconcileCoordinator::new(config, remote, store);
//! let summary = coordinator.run(&SourceKind::ALL).await?;
//!
//! println!("Pushed: {}", summary.total_pushed());
//! println!("Staged: {}", summary.total_staged());
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod dedup;
pub mod normalize;
pub mod reference;
pub mod review;
pub mod run;
pub mod sync;

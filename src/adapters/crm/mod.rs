//! CRM adapter
//!
//! OAuth token handling, the REST client and the [`RemoteSystem`] seam the core
//! talks to.

pub mod auth;
pub mod client;
pub mod models;
pub mod traits;

pub use auth::TokenCache;
pub use client::CrmClient;
pub use models::{
    AccountEntry, LabEntry, NewSite, ReferenceSnapshot, SiteCreateOutcome, SiteEntry,
    SubmitOutcome,
};
pub use traits::RemoteSystem;

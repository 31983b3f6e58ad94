//! Review command implementation
//!
//! `show`, `submit` and `dismiss` for one staged record.

use super::{connect_remote, connect_store, load};
use crate::core::review::{ResubmitOutcome, ReviewService};
use crate::domain::ids::Ccfid;
use crate::domain::record::CanonicalField;
use crate::domain::ReconcileError;
use clap::{Args, Subcommand};

/// Arguments for the review command
#[derive(Args, Debug)]
pub struct ReviewArgs {
    #[command(subcommand)]
    pub action: ReviewAction,
}

#[derive(Subcommand, Debug)]
pub enum ReviewAction {
    /// Print a staged record and its missing fields
    Show {
        ccfid: Ccfid,
    },

    /// Apply corrections and push the record
    Submit {
        ccfid: Ccfid,

        /// Correction as Field=Value (API or column name); repeatable
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_correction)]
        corrections: Vec<(CanonicalField, String)>,

        /// Reclassify and report without writing or pushing
        #[arg(long)]
        dry_run: bool,
    },

    /// Mark the record reviewed without pushing it
    Dismiss {
        ccfid: Ccfid,
    },
}

/// Parse `Field=Value`; an empty value clears the field
fn parse_correction(input: &str) -> Result<(CanonicalField, String), String> {
    let (field, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{input}'"))?;
    let field: CanonicalField = field.parse()?;
    if !field.is_editable() {
        return Err(format!("{field} cannot be edited"));
    }
    Ok((field, value.to_string()))
}

impl ReviewArgs {
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let remote = match connect_remote(&config) {
            Ok(r) => r,
            Err(code) => return Ok(code),
        };
        let store = match connect_store(&config).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        let dry_run = matches!(self.action, ReviewAction::Submit { dry_run: true, .. });
        let service = ReviewService::new(config, remote, store).with_dry_run(dry_run);

        let result = match &self.action {
            ReviewAction::Show { ccfid } => show(&service, ccfid).await,
            ReviewAction::Submit {
                ccfid, corrections, ..
            } => submit(&service, ccfid, corrections).await,
            ReviewAction::Dismiss { ccfid } => service.mark_reviewed(ccfid).await.map(|()| {
                println!("✅ {ccfid} dismissed");
                0
            }),
        };

        match result {
            Ok(code) => Ok(code),
            Err(e @ (ReconcileError::NotFound(_) | ReconcileError::Validation(_))) => {
                println!("❌ {e}");
                Ok(1)
            }
            Err(e) => {
                tracing::error!(error = %e, "Review action failed");
                println!("❌ Review action failed: {e}");
                Ok(5)
            }
        }
    }
}

async fn show(service: &ReviewService, ccfid: &Ccfid) -> crate::domain::Result<i32> {
    let staged = service.fetch(ccfid).await?;
    let missing = service.missing_fields(&staged.record);

    println!("📄 {} (source: {}, staged {})", ccfid, staged.source, staged.uploaded_timestamp);
    println!("   Reviewed: {}", staged.reviewed);
    println!();
    for field in CanonicalField::ALL {
        let marker = if missing.contains(&field) { "✗" } else { " " };
        println!("  {marker} {:<20} {}", field.api_name(), staged.record.display(field));
    }
    Ok(0)
}

async fn submit(
    service: &ReviewService,
    ccfid: &Ccfid,
    corrections: &[(CanonicalField, String)],
) -> crate::domain::Result<i32> {
    let code = match service.resubmit(ccfid, corrections).await? {
        ResubmitOutcome::Pushed => {
            println!("✅ {ccfid} pushed to the CRM");
            0
        }
        ResubmitOutcome::StillIncomplete(missing) => {
            let names: Vec<&str> = missing.iter().map(|f| f.api_name()).collect();
            println!("⚠️  {ccfid} is still incomplete; missing: {}", names.join(", "));
            1
        }
        ResubmitOutcome::AlreadyUploaded => {
            println!("ℹ️  {ccfid} is already in the CRM; staged row retired");
            0
        }
        ResubmitOutcome::DryRun => {
            println!("🔍 DRY RUN - {ccfid} is complete and would be pushed");
            0
        }
        ResubmitOutcome::Rejected(reason) => {
            println!("❌ {ccfid} was rejected: {reason}");
            println!("   The record is back on the worklist");
            1
        }
    };
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_correction() {
        let (field, value) = parse_correction("Test_Result=Negative").unwrap();
        assert_eq!(field, CanonicalField::TestResult);
        assert_eq!(value, "Negative");

        let (field, value) = parse_correction("location=").unwrap();
        assert_eq!(field, CanonicalField::Location);
        assert_eq!(value, "");

        assert!(parse_correction("Test_Result").is_err());
        assert!(parse_correction("Primary_ID=123").is_err());
        assert!(parse_correction("Bogus=1").is_err());
    }
}

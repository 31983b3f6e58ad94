//! Per-run context
//!
//! Everything a reconciliation run shares across its sources lives here and
//! nowhere else: the CRM client (and with it the token cache), the store, the
//! reference snapshot, the dedup snapshot and the mapper context.

use crate::adapters::crm::RemoteSystem;
use crate::adapters::database::Store;
use crate::config::CcfsyncConfig;
use crate::core::classify::ClassifierRules;
use crate::core::dedup::DedupAuthority;
use crate::core::normalize::MapperContext;
use crate::core::reference::ReferenceCache;
use crate::domain::Result;
use std::sync::Arc;
use uuid::Uuid;

pub struct RunContext {
    pub run_id: Uuid,
    pub remote: Arc<dyn RemoteSystem>,
    pub store: Arc<dyn Store>,
    pub reference: ReferenceCache,
    pub dedup: DedupAuthority,
    pub mapper: MapperContext,
    pub rules: ClassifierRules,
    pub push_batch_size: usize,
    pub dry_run: bool,
}

impl RunContext {
    /// Refresh reference data and take the dedup snapshot
    ///
    /// # Errors
    ///
    /// Fails when the CRM reference data or the local dedup sets cannot be
    /// read. Without them no source can be classified safely.
    pub async fn prepare(
        config: &CcfsyncConfig,
        remote: Arc<dyn RemoteSystem>,
        store: Arc<dyn Store>,
        dry_run: bool,
    ) -> Result<Self> {
        let run_id = Uuid::new_v4();

        let reference = ReferenceCache::refresh(remote.as_ref(), store.as_ref()).await?;
        let dedup = DedupAuthority::snapshot(store.as_ref()).await?;
        let mapper = MapperContext::new(&config.sources, &config.pipeline, reference.accounts());

        tracing::info!(
            run_id = %run_id,
            accounts = reference.accounts().len(),
            sites = reference.site_count(),
            known_ccfids = dedup.known(),
            dry_run,
            "Run context prepared"
        );

        Ok(Self {
            run_id,
            remote,
            store,
            reference,
            dedup,
            mapper,
            rules: ClassifierRules::from(&config.pipeline),
            push_batch_size: config.crm.push_batch_size,
            dry_run,
        })
    }
}

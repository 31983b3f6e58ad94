//! PostgreSQL implementation of the storage traits

use super::client::PostgreSQLClient;
use super::models::{staged_from_row, staging_columns};
use crate::adapters::crm::models::{NewSite, SiteEntry};
use crate::adapters::database::traits::{
    SiteStore, StageResult, StagedRecord, StagingStore, UploadedStore,
};
use crate::domain::ids::{Ccfid, RemoteId};
use crate::domain::record::CanonicalRecord;
use crate::domain::{ReconcileError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

const INSERT_STAGING: &str = r#"
    INSERT INTO staging_records (
        company_name, company_code, ccfid, first_name, last_name, primary_id,
        collection_date, test_reason, test_result, test_type, regulation,
        mro_received, laboratory, collection_site, collection_site_id, location,
        source
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
    ON CONFLICT (ccfid) DO NOTHING
"#;

const UPDATE_STAGING: &str = r#"
    UPDATE staging_records SET
        company_name = $1, company_code = $2, first_name = $4, last_name = $5,
        primary_id = $6, collection_date = $7, test_reason = $8, test_result = $9,
        test_type = $10, regulation = $11, mro_received = $12, laboratory = $13,
        collection_site = $14, collection_site_id = $15, location = $16
    WHERE ccfid = $3
"#;

/// Staging, uploaded-set and site storage in PostgreSQL
pub struct PostgresStore {
    client: Arc<PostgreSQLClient>,
}

impl PostgresStore {
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

/// The 16 canonical values in column order, as SQL parameters
fn record_params(record: &CanonicalRecord) -> [&(dyn ToSql + Sync); 16] {
    [
        &record.company,
        &record.code,
        &record.ccfid,
        &record.first_name,
        &record.last_name,
        &record.primary_id,
        &record.collection_date,
        &record.test_reason,
        &record.test_result,
        &record.test_type,
        &record.regulation,
        &record.mro_received,
        &record.laboratory,
        &record.collection_site,
        &record.collection_site_id,
        &record.location,
    ]
}

fn staging_err(e: tokio_postgres::Error) -> ReconcileError {
    ReconcileError::Staging(format!("{e}; batch rolled back"))
}

fn db_err(e: tokio_postgres::Error) -> ReconcileError {
    ReconcileError::Database(e.to_string())
}

#[async_trait]
impl StagingStore for PostgresStore {
    async fn insert_batch(&self, source: &str, records: &[CanonicalRecord]) -> Result<StageResult> {
        let mut conn = self.client.get_connection().await?;
        let tx = conn.transaction().await.map_err(staging_err)?;
        let stmt = tx.prepare(INSERT_STAGING).await.map_err(staging_err)?;
        let source = source.to_string();

        let mut result = StageResult::default();
        for record in records {
            if record.ccfid.trim().is_empty() {
                return Err(ReconcileError::Staging(
                    "record without CCFID; batch rolled back".to_string(),
                ));
            }

            let mut params: Vec<&(dyn ToSql + Sync)> = record_params(record).to_vec();
            params.push(&source);

            match tx.execute(&stmt, &params).await.map_err(staging_err)? {
                0 => result.already_present += 1,
                _ => result.inserted += 1,
            }
        }

        tx.commit().await.map_err(staging_err)?;
        Ok(result)
    }

    async fn unreviewed_ccfids(&self) -> Result<HashSet<Ccfid>> {
        let rows = self
            .client
            .query(
                "SELECT ccfid FROM staging_records WHERE reviewed = FALSE",
                &[],
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<_, String>(0).ok())
            .filter_map(|c| Ccfid::new(c).ok())
            .collect())
    }

    async fn list_unreviewed(&self) -> Result<Vec<StagedRecord>> {
        let query = format!(
            "SELECT {} FROM staging_records WHERE reviewed = FALSE ORDER BY ccfid",
            staging_columns()
        );
        let rows = self.client.query(&query, &[]).await?;
        rows.iter().map(staged_from_row).collect()
    }

    async fn fetch(&self, ccfid: &Ccfid) -> Result<Option<StagedRecord>> {
        let query = format!(
            "SELECT {} FROM staging_records WHERE ccfid = $1",
            staging_columns()
        );
        let rows = self.client.query(&query, &[&ccfid.as_str()]).await?;
        rows.first().map(staged_from_row).transpose()
    }

    async fn update_record(&self, record: &CanonicalRecord) -> Result<()> {
        let updated = self
            .client
            .execute(UPDATE_STAGING, &record_params(record))
            .await?;
        if updated == 0 {
            return Err(ReconcileError::NotFound(format!(
                "staged record {}",
                record.ccfid
            )));
        }
        Ok(())
    }

    async fn set_reviewed(&self, ccfid: &Ccfid, reviewed: bool) -> Result<()> {
        let updated = self
            .client
            .execute(
                "UPDATE staging_records SET reviewed = $1 WHERE ccfid = $2",
                &[&reviewed, &ccfid.as_str()],
            )
            .await?;
        if updated == 0 {
            return Err(ReconcileError::NotFound(format!("staged record {ccfid}")));
        }
        Ok(())
    }
}

#[async_trait]
impl UploadedStore for PostgresStore {
    async fn uploaded_ccfids(&self) -> Result<HashSet<Ccfid>> {
        let rows = self
            .client
            .query("SELECT ccfid FROM uploaded_ccfid", &[])
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<_, String>(0).ok())
            .filter_map(|c| Ccfid::new(c).ok())
            .collect())
    }

    async fn confirm_uploaded(&self, ccfids: &[Ccfid]) -> Result<usize> {
        if ccfids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = ccfids.iter().map(|c| c.as_str().to_string()).collect();

        let mut conn = self.client.get_connection().await?;
        let tx = conn.transaction().await.map_err(db_err)?;

        let added = tx
            .execute(
                "INSERT INTO uploaded_ccfid (ccfid) SELECT UNNEST($1::text[]) ON CONFLICT (ccfid) DO NOTHING",
                &[&ids],
            )
            .await
            .map_err(db_err)?;

        let retired = tx
            .execute(
                "UPDATE staging_records SET reviewed = TRUE WHERE reviewed = FALSE AND ccfid = ANY($1)",
                &[&ids],
            )
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        if retired > 0 {
            tracing::info!(retired, "Retired staging rows confirmed by the CRM");
        }
        Ok(added as usize)
    }
}

#[async_trait]
impl SiteStore for PostgresStore {
    async fn local_sites(&self) -> Result<Vec<SiteEntry>> {
        let rows = self
            .client
            .query(
                "SELECT collection_site_id, collection_site, record_id FROM collection_sites",
                &[],
            )
            .await?;

        let mut sites = Vec::with_capacity(rows.len());
        for row in &rows {
            let site_id: String = row.try_get(0).map_err(db_err)?;
            let name: String = row.try_get(1).map_err(db_err)?;
            let record_id: String = row.try_get(2).map_err(db_err)?;
            match RemoteId::parse(&record_id) {
                Some(id) => sites.push(SiteEntry { site_id, name, id }),
                None => tracing::warn!(site_id = %site_id, "Local site has no CRM id, ignoring"),
            }
        }
        Ok(sites)
    }

    async fn log_pending(&self, sites: &[NewSite]) -> Result<()> {
        if sites.is_empty() {
            return Ok(());
        }
        let mut conn = self.client.get_connection().await?;
        let tx = conn.transaction().await.map_err(db_err)?;
        let stmt = tx
            .prepare(
                r#"
                INSERT INTO site_creation_log (collection_site_id, collection_site, state)
                VALUES ($1, $2, 'pending')
                ON CONFLICT (collection_site_id) DO UPDATE
                    SET collection_site = EXCLUDED.collection_site
                    WHERE site_creation_log.state = 'pending'
                "#,
            )
            .await
            .map_err(db_err)?;
        for site in sites {
            tx.execute(&stmt, &[&site.site_id, &site.name])
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    async fn pending_sites(&self) -> Result<Vec<NewSite>> {
        let rows = self
            .client
            .query(
                "SELECT collection_site_id, collection_site FROM site_creation_log WHERE state = 'pending' ORDER BY collection_site_id",
                &[],
            )
            .await?;
        rows.iter()
            .map(|row| {
                Ok(NewSite {
                    site_id: row.try_get(0).map_err(db_err)?,
                    name: row.try_get(1).map_err(db_err)?,
                })
            })
            .collect()
    }

    async fn commit_sites(&self, sites: &[SiteEntry]) -> Result<()> {
        if sites.is_empty() {
            return Ok(());
        }
        let mut conn = self.client.get_connection().await?;
        let tx = conn.transaction().await.map_err(db_err)?;
        let upsert_site = tx
            .prepare(
                r#"
                INSERT INTO collection_sites (collection_site_id, collection_site, record_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (collection_site_id) DO UPDATE
                    SET collection_site = EXCLUDED.collection_site, record_id = EXCLUDED.record_id
                "#,
            )
            .await
            .map_err(db_err)?;
        let commit_log = tx
            .prepare(
                r#"
                INSERT INTO site_creation_log (collection_site_id, collection_site, state, committed_at)
                VALUES ($1, $2, 'committed', NOW())
                ON CONFLICT (collection_site_id) DO UPDATE
                    SET state = 'committed', committed_at = NOW()
                "#,
            )
            .await
            .map_err(db_err)?;

        for site in sites {
            let record_id = site.id.as_str();
            tx.execute(&upsert_site, &[&site.site_id, &site.name, &record_id])
                .await
                .map_err(db_err)?;
            tx.execute(&commit_log, &[&site.site_id, &site.name])
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }
}

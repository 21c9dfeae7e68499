//! SQLite-backed [`ContractStore`] implementation.
//!
//! Contracts keep their first-insertion order through an autoincrement
//! `seq` column, so a full scan returns rows in the order they were
//! imported. Dates are stored as `YYYY-MM-DD` text and timestamps as Unix
//! milliseconds.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use contract_desk_core::analysis::{ContractAnalysis, RiskBucket};
use contract_desk_core::custom_filter::{ContractField, CustomFilter, FilterKind};
use contract_desk_core::models::{parse_iso_date, ContractRecord, StoredAnalysis};
use contract_desk_core::store::ContractStore;

use crate::config::Config;
use crate::{db, migrate};

/// SQLite implementation of the [`ContractStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database, creating the schema if needed.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const CONTRACT_COLUMNS: &str = "id, supplier, flow_type, contract_value, payment_value, region, \
     state, city, signed_date, due_date, responsible_area, status, priority, risk_level, owner, \
     document_url";

fn contract_from_row(row: &SqliteRow) -> Result<ContractRecord> {
    let date = |column: &str| -> Result<_> {
        let raw: Option<String> = row.try_get(column)?;
        Ok(raw.as_deref().and_then(parse_iso_date))
    };
    Ok(ContractRecord {
        id: row.try_get("id")?,
        supplier: row.try_get("supplier")?,
        flow_type: row.try_get("flow_type")?,
        contract_value: row.try_get("contract_value")?,
        payment_value: row.try_get("payment_value")?,
        region: row.try_get("region")?,
        state: row.try_get("state")?,
        city: row.try_get("city")?,
        signed_date: date("signed_date")?,
        due_date: date("due_date")?,
        responsible_area: row.try_get("responsible_area")?,
        status: row.try_get("status")?,
        priority: row.try_get("priority")?,
        risk_level: row.try_get("risk_level")?,
        owner: row.try_get("owner")?,
        document_url: row.try_get("document_url")?,
    })
}

fn timestamp(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn analysis_from_row(row: &SqliteRow) -> Result<StoredAnalysis> {
    let json: String = row.try_get("analysis_json")?;
    let analysis: ContractAnalysis =
        serde_json::from_str(&json).context("Corrupt analysis_json in analyses table")?;
    let bucket: String = row.try_get("risk_bucket")?;
    let processing_ms: i64 = row.try_get("processing_ms")?;
    Ok(StoredAnalysis {
        id: row.try_get("id")?,
        contract_id: row.try_get("contract_id")?,
        file_name: row.try_get("file_name")?,
        text_hash: row.try_get("text_hash")?,
        risk_bucket: RiskBucket::from_label(&bucket).unwrap_or_else(|| analysis.risk_bucket()),
        analysis,
        processing_ms: u64::try_from(processing_ms).unwrap_or(0),
        error: row.try_get("error")?,
        created_at: timestamp(row.try_get("created_at")?),
    })
}

fn custom_filter_from_row(row: &SqliteRow) -> Result<CustomFilter> {
    let kind: String = row.try_get("kind")?;
    let field: String = row.try_get("field")?;
    let options: String = row.try_get("options_json")?;
    Ok(CustomFilter {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        kind: FilterKind::from_label(&kind)
            .with_context(|| format!("Unknown filter kind '{}' in custom_filters", kind))?,
        field: ContractField::from_column(&field)
            .with_context(|| format!("Unknown contract field '{}' in custom_filters", field))?,
        options: serde_json::from_str(&options).unwrap_or_default(),
        description: row.try_get("description")?,
    })
}

#[async_trait]
impl ContractStore for SqliteStore {
    async fn upsert_contract(&self, record: &ContractRecord) -> Result<()> {
        let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string());
        sqlx::query(
            r#"
            INSERT INTO contracts (id, supplier, flow_type, contract_value, payment_value,
                                   region, state, city, signed_date, due_date,
                                   responsible_area, status, priority, risk_level, owner,
                                   document_url, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                supplier = excluded.supplier,
                flow_type = excluded.flow_type,
                contract_value = excluded.contract_value,
                payment_value = excluded.payment_value,
                region = excluded.region,
                state = excluded.state,
                city = excluded.city,
                signed_date = excluded.signed_date,
                due_date = excluded.due_date,
                responsible_area = excluded.responsible_area,
                status = excluded.status,
                priority = excluded.priority,
                risk_level = excluded.risk_level,
                owner = excluded.owner,
                document_url = excluded.document_url,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.supplier)
        .bind(&record.flow_type)
        .bind(record.contract_value)
        .bind(record.payment_value)
        .bind(&record.region)
        .bind(&record.state)
        .bind(&record.city)
        .bind(date(record.signed_date))
        .bind(date(record.due_date))
        .bind(&record.responsible_area)
        .bind(&record.status)
        .bind(&record.priority)
        .bind(&record.risk_level)
        .bind(&record.owner)
        .bind(&record.document_url)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_contract(&self, id: &str) -> Result<Option<ContractRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM contracts WHERE id = ?",
            CONTRACT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(contract_from_row).transpose()
    }

    async fn all_contracts(&self) -> Result<Vec<ContractRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM contracts ORDER BY seq",
            CONTRACT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(contract_from_row).collect()
    }

    async fn save_analysis(&self, stored: &StoredAnalysis) -> Result<()> {
        let json = serde_json::to_string(&stored.analysis)?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO analyses (id, contract_id, file_name, text_hash,
                                             analysis_json, score, risk_bucket,
                                             processing_ms, error, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stored.id)
        .bind(&stored.contract_id)
        .bind(&stored.file_name)
        .bind(&stored.text_hash)
        .bind(json)
        .bind(i64::from(stored.analysis.score))
        .bind(stored.risk_bucket.label())
        .bind(i64::try_from(stored.processing_ms).unwrap_or(i64::MAX))
        .bind(&stored.error)
        .bind(stored.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn analyses_for(&self, contract_id: &str) -> Result<Vec<StoredAnalysis>> {
        let rows = sqlx::query(
            "SELECT id, contract_id, file_name, text_hash, analysis_json, risk_bucket, \
             processing_ms, error, created_at \
             FROM analyses WHERE contract_id = ? ORDER BY created_at DESC",
        )
        .bind(contract_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(analysis_from_row).collect()
    }

    async fn save_custom_filter(&self, filter: &CustomFilter) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO custom_filters (id, name, kind, field, options_json, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                kind = excluded.kind,
                field = excluded.field,
                options_json = excluded.options_json,
                description = excluded.description
            "#,
        )
        .bind(&filter.id)
        .bind(&filter.name)
        .bind(filter.kind.label())
        .bind(filter.field.column())
        .bind(serde_json::to_string(&filter.options)?)
        .bind(&filter.description)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn custom_filters(&self) -> Result<Vec<CustomFilter>> {
        let rows = sqlx::query(
            "SELECT id, name, kind, field, options_json, description \
             FROM custom_filters ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(custom_filter_from_row).collect()
    }

    async fn delete_custom_filter(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM custom_filters WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use chrono::NaiveDate;

    async fn store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::db::connect_path(&dir.path().join("test.sqlite"))
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();
        (dir, SqliteStore::new(pool))
    }

    #[tokio::test]
    async fn contracts_round_trip_in_insertion_order() {
        let (_dir, store) = store().await;
        let mut first = ContractRecord::new("CT-2");
        first.region = Some("South".into());
        first.due_date = NaiveDate::from_ymd_opt(2025, 3, 15);
        first.contract_value = Some(300_000.0);
        store.upsert_contract(&first).await.unwrap();
        store.upsert_contract(&ContractRecord::new("CT-1")).await.unwrap();

        first.status = Some("Paid".into());
        store.upsert_contract(&first).await.unwrap();

        let all = store.all_contracts().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], first);
        assert_eq!(all[1].id, "CT-1");
        assert_eq!(store.get_contract("CT-2").await.unwrap(), Some(first));
        assert!(store.get_contract("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn analyses_are_stored_and_listed() {
        let (_dir, store) = store().await;
        let analysis = ContractAnalysis::fallback("no text");
        let stored = StoredAnalysis {
            id: "an-1".into(),
            contract_id: Some("CT-1".into()),
            file_name: "ct1.pdf".into(),
            text_hash: "abc".into(),
            risk_bucket: analysis.risk_bucket(),
            analysis,
            processing_ms: 42,
            error: Some("no text".into()),
            created_at: timestamp(1_700_000_000_000),
        };
        store.save_analysis(&stored).await.unwrap();
        let found = store.analyses_for("CT-1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].analysis, stored.analysis);
        assert_eq!(found[0].risk_bucket, RiskBucket::High);
        assert_eq!(found[0].created_at, stored.created_at);
    }

    #[tokio::test]
    async fn custom_filters_round_trip() {
        let (_dir, store) = store().await;
        let filter = CustomFilter {
            id: "f-risk".into(),
            name: "Risk".into(),
            kind: FilterKind::MultiSelect,
            field: ContractField::RiskLevel,
            options: vec!["High".into(), "Low".into()],
            description: Some("Risk level".into()),
        };
        store.save_custom_filter(&filter).await.unwrap();
        assert_eq!(store.custom_filters().await.unwrap(), vec![filter]);
        assert!(store.delete_custom_filter("f-risk").await.unwrap());
        assert!(!store.delete_custom_filter("f-risk").await.unwrap());
    }
}

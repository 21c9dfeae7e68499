use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Safe to run repeatedly.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contracts (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            supplier TEXT,
            flow_type TEXT,
            contract_value REAL,
            payment_value REAL,
            region TEXT,
            state TEXT,
            city TEXT,
            signed_date TEXT,
            due_date TEXT,
            responsible_area TEXT,
            status TEXT,
            priority TEXT,
            risk_level TEXT,
            owner TEXT,
            document_url TEXT,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analyses (
            id TEXT PRIMARY KEY,
            contract_id TEXT,
            file_name TEXT NOT NULL,
            text_hash TEXT NOT NULL,
            analysis_json TEXT NOT NULL,
            score INTEGER NOT NULL,
            risk_bucket TEXT NOT NULL,
            processing_ms INTEGER NOT NULL,
            error TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS custom_filters (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            field TEXT NOT NULL,
            options_json TEXT NOT NULL DEFAULT '[]',
            description TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_contracts_region ON contracts(region)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_contracts_due_date ON contracts(due_date)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analyses_contract_id ON analyses(contract_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

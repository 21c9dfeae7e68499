//! Storage abstraction for Contract Desk.
//!
//! The [`ContractStore`] trait defines every persistence operation the
//! sampling, filtering and analysis pipelines need, so backends stay
//! pluggable (SQLite in the application crate, in-memory here).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::custom_filter::CustomFilter;
use crate::filter::ContractFilter;
use crate::models::{ContractRecord, StoredAnalysis};

/// Abstract storage backend for contracts, analyses and custom filters.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_contract`](ContractStore::upsert_contract) | Insert or replace a contract by id |
/// | [`get_contract`](ContractStore::get_contract) | Fetch one contract |
/// | [`all_contracts`](ContractStore::all_contracts) | Full scan in insertion order |
/// | [`query_contracts`](ContractStore::query_contracts) | Filtered scan |
/// | [`save_analysis`](ContractStore::save_analysis) | Persist an analysis run |
/// | [`analyses_for`](ContractStore::analyses_for) | Analyses of one contract |
/// | [`save_custom_filter`](ContractStore::save_custom_filter) | Insert or replace a custom filter |
/// | [`custom_filters`](ContractStore::custom_filters) | All custom filters |
/// | [`delete_custom_filter`](ContractStore::delete_custom_filter) | Remove a custom filter |
#[async_trait]
pub trait ContractStore: Send + Sync {
    async fn upsert_contract(&self, record: &ContractRecord) -> Result<()>;

    async fn get_contract(&self, id: &str) -> Result<Option<ContractRecord>>;

    async fn all_contracts(&self) -> Result<Vec<ContractRecord>>;

    /// Contracts passing `filter`, in insertion order, truncated to the
    /// filter's limit.
    ///
    /// The default implementation scans [`all_contracts`](ContractStore::all_contracts).
    async fn query_contracts(
        &self,
        filter: &ContractFilter,
        today: NaiveDate,
    ) -> Result<Vec<ContractRecord>> {
        let all = self.all_contracts().await?;
        Ok(filter.apply(all, today))
    }

    async fn save_analysis(&self, analysis: &StoredAnalysis) -> Result<()>;

    /// Analyses recorded for `contract_id`, newest first.
    async fn analyses_for(&self, contract_id: &str) -> Result<Vec<StoredAnalysis>>;

    async fn save_custom_filter(&self, filter: &CustomFilter) -> Result<()>;

    async fn custom_filters(&self) -> Result<Vec<CustomFilter>>;

    /// Returns `false` when no filter had that id.
    async fn delete_custom_filter(&self, id: &str) -> Result<bool>;
}

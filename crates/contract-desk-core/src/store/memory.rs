//! In-memory [`ContractStore`] implementation for tests and embedding.
//!
//! Uses `Vec`s behind `std::sync::RwLock`. Contracts keep insertion order;
//! re-upserting an id replaces the record in place.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::custom_filter::CustomFilter;
use crate::models::{ContractRecord, StoredAnalysis};

use super::ContractStore;

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    contracts: RwLock<Vec<ContractRecord>>,
    analyses: RwLock<Vec<StoredAnalysis>>,
    filters: RwLock<Vec<CustomFilter>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with `records`.
    pub fn with_contracts(records: Vec<ContractRecord>) -> Self {
        Self {
            contracts: RwLock::new(records),
            ..Self::default()
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

#[async_trait]
impl ContractStore for InMemoryStore {
    async fn upsert_contract(&self, record: &ContractRecord) -> Result<()> {
        let mut contracts = write(&self.contracts)?;
        match contracts.iter_mut().find(|c| c.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => contracts.push(record.clone()),
        }
        Ok(())
    }

    async fn get_contract(&self, id: &str) -> Result<Option<ContractRecord>> {
        let contracts = read(&self.contracts)?;
        Ok(contracts.iter().find(|c| c.id == id).cloned())
    }

    async fn all_contracts(&self) -> Result<Vec<ContractRecord>> {
        Ok(read(&self.contracts)?.clone())
    }

    async fn save_analysis(&self, analysis: &StoredAnalysis) -> Result<()> {
        write(&self.analyses)?.push(analysis.clone());
        Ok(())
    }

    async fn analyses_for(&self, contract_id: &str) -> Result<Vec<StoredAnalysis>> {
        let analyses = read(&self.analyses)?;
        let mut found: Vec<StoredAnalysis> = analyses
            .iter()
            .filter(|a| a.contract_id.as_deref() == Some(contract_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn save_custom_filter(&self, filter: &CustomFilter) -> Result<()> {
        let mut filters = write(&self.filters)?;
        match filters.iter_mut().find(|f| f.id == filter.id) {
            Some(existing) => *existing = filter.clone(),
            None => filters.push(filter.clone()),
        }
        Ok(())
    }

    async fn custom_filters(&self) -> Result<Vec<CustomFilter>> {
        Ok(read(&self.filters)?.clone())
    }

    async fn delete_custom_filter(&self, id: &str) -> Result<bool> {
        let mut filters = write(&self.filters)?;
        let before = filters.len();
        filters.retain(|f| f.id != id);
        Ok(filters.len() != before)
    }
}

//! Portfolio statistics.
//!
//! Summarizes the stored contracts by category across every analytics
//! dimension (value and due-date bands included). Used by `cdesk stats`
//! and `GET /stats`.

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;

use contract_desk_core::category::CategoryBreakdown;
use contract_desk_core::store::ContractStore;

use crate::config::Config;

/// Categories shown per dimension in the human-readable output.
const TOP_CATEGORIES: usize = 8;

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub database_bytes: Option<u64>,
    pub breakdown: CategoryBreakdown,
}

/// Compute category counts over every stored contract.
pub async fn collect_stats(
    store: &dyn ContractStore,
    config: &Config,
    today: NaiveDate,
) -> Result<StatsReport> {
    let contracts = store.all_contracts().await?;
    Ok(StatsReport {
        database_bytes: std::fs::metadata(&config.db.path).map(|m| m.len()).ok(),
        breakdown: CategoryBreakdown::compute(&contracts, today),
    })
}

/// Print a report as text.
pub fn print_stats(config: &Config, report: &StatsReport) {
    println!("Contract Desk — Portfolio Stats");
    println!("===============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    if let Some(bytes) = report.database_bytes {
        println!("  Size:        {}", format_bytes(bytes));
    }
    println!("  Contracts:   {}", report.breakdown.total);

    if report.breakdown.total == 0 {
        println!();
        return;
    }

    for dimension in &report.breakdown.dimensions {
        println!();
        println!("  By {}:", dimension.dimension.label());
        for c in dimension.categories.iter().take(TOP_CATEGORIES) {
            println!(
                "    {:<32} {:>6}  {:>5.1}%",
                c.category,
                c.count,
                c.count as f64 * 100.0 / report.breakdown.total as f64
            );
        }
        let hidden = dimension.categories.len().saturating_sub(TOP_CATEGORIES);
        if hidden > 0 {
            println!("    … {} more", hidden);
        }
    }
    println!();
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}

//! Categorization of contracts along the eight descriptive dimensions.
//!
//! Categorical fields map straight to their (trimmed) value, with missing or
//! blank values mapped to [`NOT_INFORMED`]. The two numeric/temporal
//! dimensions are bucketed into fixed literal bands ([`ValueBand`],
//! [`DueDateBand`]). Bands are constants, never computed from the data.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::ContractRecord;

/// Sentinel category for missing or blank categorical fields.
pub const NOT_INFORMED: &str = "Not Informed";

/// Map an optional categorical field onto its category value.
pub fn categorical(value: Option<&str>) -> &str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => NOT_INFORMED,
    }
}

/// True when the field carries a real (non-sentinel) value.
pub fn is_informed(value: Option<&str>) -> bool {
    categorical(value) != NOT_INFORMED
}

/// A dimension along which contracts are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Region,
    FlowType,
    Status,
    ResponsibleArea,
    ValueRange,
    DueDateRange,
    RiskLevel,
    Supplier,
}

impl Dimension {
    pub const ALL: [Dimension; 8] = [
        Dimension::Region,
        Dimension::FlowType,
        Dimension::Status,
        Dimension::ResponsibleArea,
        Dimension::ValueRange,
        Dimension::DueDateRange,
        Dimension::RiskLevel,
        Dimension::Supplier,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Region => "region",
            Dimension::FlowType => "flow type",
            Dimension::Status => "status",
            Dimension::ResponsibleArea => "responsible area",
            Dimension::ValueRange => "value range",
            Dimension::DueDateRange => "due date range",
            Dimension::RiskLevel => "risk level",
            Dimension::Supplier => "supplier",
        }
    }

    /// Category of `record` along this dimension. `today` only matters for
    /// [`Dimension::DueDateRange`].
    pub fn category<'a>(&self, record: &'a ContractRecord, today: NaiveDate) -> Cow<'a, str> {
        match self {
            Dimension::Region => Cow::Borrowed(categorical(record.region.as_deref())),
            Dimension::FlowType => Cow::Borrowed(categorical(record.flow_type.as_deref())),
            Dimension::Status => Cow::Borrowed(categorical(record.status.as_deref())),
            Dimension::ResponsibleArea => {
                Cow::Borrowed(categorical(record.responsible_area.as_deref()))
            }
            Dimension::RiskLevel => Cow::Borrowed(categorical(record.risk_level.as_deref())),
            Dimension::Supplier => Cow::Borrowed(categorical(record.supplier.as_deref())),
            Dimension::ValueRange => Cow::Borrowed(ValueBand::of(record.contract_value).label()),
            Dimension::DueDateRange => {
                Cow::Borrowed(DueDateBand::of(record.due_date, today).label())
            }
        }
    }
}

/// Contract value bands. Upper bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueBand {
    UpTo10k,
    From10kTo50k,
    From50kTo100k,
    From100kTo500k,
    From500kTo1M,
    From1MTo5M,
    Above5M,
}

impl ValueBand {
    /// A missing value counts as zero.
    pub fn of(value: Option<f64>) -> Self {
        let v = value.unwrap_or(0.0);
        if v <= 10_000.0 {
            ValueBand::UpTo10k
        } else if v <= 50_000.0 {
            ValueBand::From10kTo50k
        } else if v <= 100_000.0 {
            ValueBand::From50kTo100k
        } else if v <= 500_000.0 {
            ValueBand::From100kTo500k
        } else if v <= 1_000_000.0 {
            ValueBand::From500kTo1M
        } else if v <= 5_000_000.0 {
            ValueBand::From1MTo5M
        } else {
            ValueBand::Above5M
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ValueBand::UpTo10k => "0-10k",
            ValueBand::From10kTo50k => "10k-50k",
            ValueBand::From50kTo100k => "50k-100k",
            ValueBand::From100kTo500k => "100k-500k",
            ValueBand::From500kTo1M => "500k-1M",
            ValueBand::From1MTo5M => "1M-5M",
            ValueBand::Above5M => "5M+",
        }
    }
}

/// Due-date bands relative to a reference day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DueDateBand {
    Overdue,
    Next30Days,
    Next90Days,
    Next6Months,
    Next12Months,
    MoreThanOneYear,
    NoDate,
}

impl DueDateBand {
    pub fn of(due: Option<NaiveDate>, today: NaiveDate) -> Self {
        let Some(due) = due else {
            return DueDateBand::NoDate;
        };
        let days = (due - today).num_days();
        if days < 0 {
            DueDateBand::Overdue
        } else if days <= 30 {
            DueDateBand::Next30Days
        } else if days <= 90 {
            DueDateBand::Next90Days
        } else if days <= 180 {
            DueDateBand::Next6Months
        } else if days <= 365 {
            DueDateBand::Next12Months
        } else {
            DueDateBand::MoreThanOneYear
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DueDateBand::Overdue => "Overdue",
            DueDateBand::Next30Days => "Next 30 days",
            DueDateBand::Next90Days => "Next 90 days",
            DueDateBand::Next6Months => "Next 6 months",
            DueDateBand::Next12Months => "Next 12 months",
            DueDateBand::MoreThanOneYear => "More than 1 year",
            DueDateBand::NoDate => "No Date",
        }
    }
}

/// Group record indices by category, preserving first-seen category order
/// and input order within each group.
pub fn group_by_dimension(
    records: &[ContractRecord],
    dimension: Dimension,
    today: NaiveDate,
) -> Vec<(String, Vec<usize>)> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let key = dimension.category(record, today);
        match slots.get(key.as_ref()) {
            Some(&slot) => groups[slot].1.push(idx),
            None => {
                slots.insert(key.to_string(), groups.len());
                groups.push((key.into_owned(), vec![idx]));
            }
        }
    }
    groups
}

/// Count of contracts in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// Per-dimension category counts, largest first.
#[derive(Debug, Clone, Serialize)]
pub struct DimensionBreakdown {
    pub dimension: Dimension,
    pub categories: Vec<CategoryCount>,
}

/// Category counts across all eight dimensions.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryBreakdown {
    pub total: usize,
    pub dimensions: Vec<DimensionBreakdown>,
}

impl CategoryBreakdown {
    pub fn compute(records: &[ContractRecord], today: NaiveDate) -> Self {
        let dimensions = Dimension::ALL
            .iter()
            .map(|&dimension| {
                let mut categories: Vec<CategoryCount> =
                    group_by_dimension(records, dimension, today)
                        .into_iter()
                        .map(|(category, members)| CategoryCount {
                            category,
                            count: members.len(),
                        })
                        .collect();
                // Stable: equal counts keep first-seen order.
                categories.sort_by(|a, b| b.count.cmp(&a.count));
                DimensionBreakdown {
                    dimension,
                    categories,
                }
            })
            .collect();
        Self {
            total: records.len(),
            dimensions,
        }
    }
}

/// How many of a dimension's population categories a selection covers.
#[derive(Debug, Clone, Serialize)]
pub struct DimensionCoverage {
    pub dimension: Dimension,
    pub population_categories: usize,
    pub covered_categories: usize,
}

/// Coverage of a selection against its population, per dimension.
#[derive(Debug, Clone, Serialize)]
pub struct DiversityReport {
    pub population: usize,
    pub selected: usize,
    pub dimensions: Vec<DimensionCoverage>,
}

impl DiversityReport {
    pub fn compare(
        population: &[ContractRecord],
        selection: &[&ContractRecord],
        today: NaiveDate,
    ) -> Self {
        let dimensions = Dimension::ALL
            .iter()
            .map(|&dimension| {
                let all: HashSet<Cow<'_, str>> = population
                    .iter()
                    .map(|r| dimension.category(r, today))
                    .collect();
                let covered: HashSet<Cow<'_, str>> = selection
                    .iter()
                    .map(|r| dimension.category(r, today))
                    .collect();
                DimensionCoverage {
                    dimension,
                    population_categories: all.len(),
                    covered_categories: covered.len(),
                }
            })
            .collect();
        Self {
            population: population.len(),
            selected: selection.len(),
            dimensions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn blank_and_missing_map_to_sentinel() {
        assert_eq!(categorical(None), NOT_INFORMED);
        assert_eq!(categorical(Some("   ")), NOT_INFORMED);
        assert_eq!(categorical(Some(" South ")), "South");
        assert!(!is_informed(Some("")));
    }

    #[test]
    fn value_band_edges_are_upper_inclusive() {
        assert_eq!(ValueBand::of(None).label(), "0-10k");
        assert_eq!(ValueBand::of(Some(10_000.0)).label(), "0-10k");
        assert_eq!(ValueBand::of(Some(10_000.01)).label(), "10k-50k");
        assert_eq!(ValueBand::of(Some(100_000.0)).label(), "50k-100k");
        assert_eq!(ValueBand::of(Some(1_000_000.0)).label(), "500k-1M");
        assert_eq!(ValueBand::of(Some(5_000_000.0)).label(), "1M-5M");
        assert_eq!(ValueBand::of(Some(5_000_001.0)).label(), "5M+");
    }

    #[test]
    fn due_date_bands() {
        let today = day(2025, 1, 1);
        assert_eq!(DueDateBand::of(None, today), DueDateBand::NoDate);
        assert_eq!(
            DueDateBand::of(Some(day(2024, 12, 31)), today),
            DueDateBand::Overdue
        );
        assert_eq!(
            DueDateBand::of(Some(today), today),
            DueDateBand::Next30Days
        );
        assert_eq!(
            DueDateBand::of(Some(day(2025, 1, 31)), today),
            DueDateBand::Next30Days
        );
        assert_eq!(
            DueDateBand::of(Some(day(2025, 2, 1)), today),
            DueDateBand::Next90Days
        );
        assert_eq!(
            DueDateBand::of(Some(day(2025, 6, 30)), today),
            DueDateBand::Next6Months
        );
        assert_eq!(
            DueDateBand::of(Some(day(2026, 1, 1)), today),
            DueDateBand::Next12Months
        );
        assert_eq!(
            DueDateBand::of(Some(day(2026, 1, 2)), today).label(),
            "More than 1 year"
        );
    }

    #[test]
    fn grouping_preserves_first_seen_order() {
        let mut a = ContractRecord::new("a");
        a.region = Some("North".into());
        let b = ContractRecord::new("b");
        let mut c = ContractRecord::new("c");
        c.region = Some("North".into());
        let groups = group_by_dimension(&[a, b, c], Dimension::Region, day(2025, 1, 1));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], ("North".to_string(), vec![0, 2]));
        assert_eq!(groups[1], (NOT_INFORMED.to_string(), vec![1]));
    }

    #[test]
    fn breakdown_sorts_by_count() {
        let records: Vec<ContractRecord> = ["x", "y", "y"]
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let mut r = ContractRecord::new(i.to_string());
                r.supplier = Some(s.to_string());
                r
            })
            .collect();
        let breakdown = CategoryBreakdown::compute(&records, day(2025, 1, 1));
        let supplier = breakdown
            .dimensions
            .iter()
            .find(|d| d.dimension == Dimension::Supplier)
            .unwrap();
        assert_eq!(supplier.categories[0].category, "y");
        assert_eq!(supplier.categories[0].count, 2);
    }
}

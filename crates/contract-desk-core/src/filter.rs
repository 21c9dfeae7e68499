//! Conjunctive contract filters.
//!
//! A [`ContractFilter`] combines optional predicates; a record passes when
//! every predicate that is set accepts it. Text predicates ignore case and
//! accents. Date windows are computed relative to a caller-supplied `today`
//! so results are reproducible.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::custom_filter::{CustomFilter, FilterValue};
use crate::models::ContractRecord;
use crate::text::contains_normalized;

/// Upper bound of the contract value slider. A value range equal to
/// `[0, VALUE_RANGE_CEILING]` does not filter anything.
pub const VALUE_RANGE_CEILING: f64 = 10_000_000.0;

/// Due-date window relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueWindow {
    Overdue,
    Next7Days,
    Next30Days,
    Days30To60,
    Days60To90,
    Custom {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

impl DueWindow {
    /// Parse a window label: `overdue`, `next7days`, `next30days`, `30-60`
    /// or `60-90`. Custom windows are built directly.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "overdue" => Some(DueWindow::Overdue),
            "next7days" => Some(DueWindow::Next7Days),
            "next30days" => Some(DueWindow::Next30Days),
            "30-60" => Some(DueWindow::Days30To60),
            "60-90" => Some(DueWindow::Days60To90),
            _ => None,
        }
    }

    /// Inclusive date bounds of the window. `None` on a side means
    /// unbounded; `None` overall means the window does not filter.
    fn bounds(&self, today: NaiveDate) -> Option<(Option<NaiveDate>, Option<NaiveDate>)> {
        let ahead = |days: i64| Some(today + Duration::days(days));
        match *self {
            DueWindow::Overdue => Some((None, today.pred_opt())),
            DueWindow::Next7Days => Some((Some(today), ahead(7))),
            DueWindow::Next30Days => Some((Some(today), ahead(30))),
            DueWindow::Days30To60 => Some((ahead(30), ahead(60))),
            DueWindow::Days60To90 => Some((ahead(60), ahead(90))),
            DueWindow::Custom {
                start: Some(start),
                end: Some(end),
            } => Some((Some(start), Some(end))),
            DueWindow::Custom { .. } => None,
        }
    }

    pub fn contains(&self, due: Option<NaiveDate>, today: NaiveDate) -> bool {
        let Some((lower, upper)) = self.bounds(today) else {
            return true;
        };
        let Some(due) = due else { return false };
        lower.map_or(true, |l| due >= l) && upper.map_or(true, |u| due <= u)
    }
}

/// Optional, conjunctive contract predicates.
#[derive(Debug, Clone, Default)]
pub struct ContractFilter {
    /// Exact flow type membership.
    pub flow_types: Vec<String>,
    pub supplier: Option<String>,
    pub contract_number: Option<String>,
    pub region: Option<String>,
    /// Any-of substring match on state.
    pub states: Vec<String>,
    /// Inclusive contract value bounds.
    pub value_range: Option<(f64, f64)>,
    /// Inclusive payment value bounds.
    pub payment_range: Option<(f64, f64)>,
    pub due_window: Option<DueWindow>,
    pub custom: Vec<(CustomFilter, FilterValue)>,
    pub limit: Option<usize>,
}

fn substring_matches(wanted: &Option<String>, field: Option<&str>) -> bool {
    match wanted.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(w) => field.is_some_and(|f| contains_normalized(f, w)),
    }
}

fn in_range(range: Option<(f64, f64)>, value: Option<f64>) -> bool {
    match range {
        None => true,
        Some((min, max)) => value.is_some_and(|v| v >= min && v <= max),
    }
}

impl ContractFilter {
    /// True when `record` passes every predicate that is set.
    pub fn matches(&self, record: &ContractRecord, today: NaiveDate) -> bool {
        if !self.flow_types.is_empty()
            && !record
                .flow_type
                .as_deref()
                .is_some_and(|ft| self.flow_types.iter().any(|w| w == ft))
        {
            return false;
        }
        if !substring_matches(&self.supplier, record.supplier.as_deref())
            || !substring_matches(&self.contract_number, Some(record.id.as_str()))
            || !substring_matches(&self.region, record.region.as_deref())
        {
            return false;
        }
        if !self.states.is_empty()
            && !record
                .state
                .as_deref()
                .is_some_and(|s| self.states.iter().any(|w| contains_normalized(s, w)))
        {
            return false;
        }
        let value_range = self
            .value_range
            .filter(|(min, max)| *min > 0.0 || *max < VALUE_RANGE_CEILING);
        if !in_range(value_range, record.contract_value)
            || !in_range(self.payment_range, record.payment_value)
        {
            return false;
        }
        if let Some(window) = &self.due_window {
            if !window.contains(record.due_date, today) {
                return false;
            }
        }
        self.custom
            .iter()
            .all(|(filter, value)| filter.matches(record, value))
    }

    /// Filter `records`, keeping their order, then apply `limit`.
    pub fn apply<I>(&self, records: I, today: NaiveDate) -> Vec<ContractRecord>
    where
        I: IntoIterator<Item = ContractRecord>,
    {
        let limit = self.limit.unwrap_or(usize::MAX);
        records
            .into_iter()
            .filter(|r| self.matches(r, today))
            .take(limit)
            .collect()
    }
}

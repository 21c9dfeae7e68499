//! Representative sampling of contracts.
//!
//! Selects a subset of contracts that covers the spread of categories in the
//! population rather than a statistically random sample. The heuristic is a
//! two-phase greedy pass:
//!
//! 1. **Category coverage.** For each main dimension (region, flow type,
//!    status, responsible area) and each of its categories in first-seen
//!    order, take the most representative record not yet selected, until the
//!    target is reached.
//! 2. **Diversity fill.** Score every remaining record by how unlike the
//!    current selection it is and take the best until the target is reached.
//!
//! Missing categorical values take part as the sentinel category
//! [`NOT_INFORMED`](crate::category::NOT_INFORMED), so a cluster of
//! uncategorized contracts is covered like any other group.
//!
//! The procedure is deterministic: score ties resolve to input order.
//! Weights and thresholds below are tuned heuristics; changing any of them
//! changes which contracts are sampled.

use std::collections::{HashMap, HashSet};

use crate::category::{categorical, is_informed};
use crate::models::ContractRecord;

/// Phase-2 weight for an unseen region.
pub const REGION_WEIGHT: u32 = 10;
/// Phase-2 weight for an unseen flow type.
pub const FLOW_TYPE_WEIGHT: u32 = 10;
/// Phase-2 weight for an unseen status.
pub const STATUS_WEIGHT: u32 = 8;
/// Phase-2 weight for an unseen responsible area.
pub const RESPONSIBLE_AREA_WEIGHT: u32 = 6;
/// Phase-2 bonus when no selected contract shares the (region, flow type,
/// status) triple.
pub const NOVEL_COMBINATION_BONUS: u32 = 15;

/// Lower bound (exclusive) of the "moderate" contract value range.
pub const MODERATE_VALUE_FLOOR: f64 = 10_000.0;
/// Upper bound (exclusive) of the "moderate" contract value range.
pub const MODERATE_VALUE_CEILING: f64 = 1_000_000.0;

/// Main dimensions walked by phase 1, in order.
#[derive(Debug, Clone, Copy)]
enum MainDimension {
    Region,
    FlowType,
    Status,
    ResponsibleArea,
}

const PHASE_ONE_ORDER: [MainDimension; 4] = [
    MainDimension::Region,
    MainDimension::FlowType,
    MainDimension::Status,
    MainDimension::ResponsibleArea,
];

impl MainDimension {
    fn value<'a>(&self, record: &'a ContractRecord) -> &'a str {
        match self {
            MainDimension::Region => categorical(record.region.as_deref()),
            MainDimension::FlowType => categorical(record.flow_type.as_deref()),
            MainDimension::Status => categorical(record.status.as_deref()),
            MainDimension::ResponsibleArea => categorical(record.responsible_area.as_deref()),
        }
    }
}

/// Diversity-maximizing contract sampler.
pub struct RepresentativeSampler;

impl RepresentativeSampler {
    /// Select up to `target_size` contracts from `all`.
    ///
    /// Returns every record (in input order) when `target_size` covers the
    /// whole input, nothing when `target_size` is zero or the input is
    /// empty, and otherwise exactly `target_size` distinct records.
    pub fn select(all: &[ContractRecord], target_size: usize) -> Vec<&ContractRecord> {
        Self::select_indices(all, target_size)
            .into_iter()
            .map(|idx| &all[idx])
            .collect()
    }

    /// Same as [`select`](Self::select) but returns input positions.
    pub fn select_indices(all: &[ContractRecord], target_size: usize) -> Vec<usize> {
        if target_size == 0 || all.is_empty() {
            return Vec::new();
        }
        if target_size >= all.len() {
            return (0..all.len()).collect();
        }

        let mut selected: Vec<usize> = Vec::with_capacity(target_size);
        let mut taken: HashSet<usize> = HashSet::with_capacity(target_size);

        // Phase 1: one representative per category of each main dimension.
        'dimensions: for dimension in PHASE_ONE_ORDER {
            for members in group_members(all, dimension) {
                if selected.len() >= target_size {
                    break 'dimensions;
                }
                if let Some(idx) = most_representative(all, &members, &taken) {
                    taken.insert(idx);
                    selected.push(idx);
                }
            }
        }

        // Phase 2: fill the remaining slots by diversity score.
        let remaining = target_size - selected.len();
        if remaining > 0 {
            let counts = SelectionCounts::from_selection(selected.iter().map(|&i| &all[i]));
            let mut scored: Vec<(usize, u32)> = (0..all.len())
                .filter(|idx| !taken.contains(idx))
                .map(|idx| (idx, diversity_score(&all[idx], &counts)))
                .collect();
            // sort_by is stable, so equal scores keep input order.
            scored.sort_by(|a, b| b.1.cmp(&a.1));
            selected.extend(scored.into_iter().take(remaining).map(|(idx, _)| idx));
        }

        selected
    }
}

/// Record indices per category, categories in first-seen order.
fn group_members(all: &[ContractRecord], dimension: MainDimension) -> Vec<Vec<usize>> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (idx, record) in all.iter().enumerate() {
        let key = dimension.value(record);
        match slots.get(key) {
            Some(&slot) => groups[slot].push(idx),
            None => {
                slots.insert(key, groups.len());
                groups.push(vec![idx]);
            }
        }
    }
    groups
}

/// First member with the highest [`representative_score`] among those not
/// already taken.
fn most_representative(
    all: &[ContractRecord],
    members: &[usize],
    taken: &HashSet<usize>,
) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for &idx in members.iter().filter(|idx| !taken.contains(idx)) {
        let score = representative_score(&all[idx]);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((idx, score)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// How typical a contract is of its group.
///
/// Moderate values score above extreme ones; a due date, a named responsible
/// area and a named supplier each add a point.
pub fn representative_score(record: &ContractRecord) -> u32 {
    let mut score = 0;
    let value = record.contract_value.unwrap_or(0.0);
    if value > MODERATE_VALUE_FLOOR && value < MODERATE_VALUE_CEILING {
        score += 2;
    } else if value > 0.0 {
        score += 1;
    }
    if record.due_date.is_some() {
        score += 1;
    }
    if is_informed(record.responsible_area.as_deref()) {
        score += 1;
    }
    if is_informed(record.supplier.as_deref()) {
        score += 1;
    }
    score
}

/// Category occurrence counts of an already-selected set.
#[derive(Debug, Default)]
pub struct SelectionCounts<'a> {
    region: HashMap<&'a str, u32>,
    flow_type: HashMap<&'a str, u32>,
    status: HashMap<&'a str, u32>,
    responsible_area: HashMap<&'a str, u32>,
    combination: HashMap<(&'a str, &'a str, &'a str), u32>,
}

impl<'a> SelectionCounts<'a> {
    pub fn from_selection(selection: impl IntoIterator<Item = &'a ContractRecord>) -> Self {
        let mut counts = Self::default();
        for record in selection {
            let region = MainDimension::Region.value(record);
            let flow_type = MainDimension::FlowType.value(record);
            let status = MainDimension::Status.value(record);
            *counts.region.entry(region).or_default() += 1;
            *counts.flow_type.entry(flow_type).or_default() += 1;
            *counts.status.entry(status).or_default() += 1;
            *counts
                .responsible_area
                .entry(MainDimension::ResponsibleArea.value(record))
                .or_default() += 1;
            *counts
                .combination
                .entry((region, flow_type, status))
                .or_default() += 1;
        }
        counts
    }
}

fn count_of(map: &HashMap<&str, u32>, key: &str) -> u32 {
    map.get(key).copied().unwrap_or(0)
}

fn decaying(weight: u32, count: u32) -> u32 {
    if count == 0 {
        weight
    } else {
        weight.saturating_sub(count).max(1)
    }
}

/// How unlike the current selection a contract is.
pub fn diversity_score(record: &ContractRecord, counts: &SelectionCounts<'_>) -> u32 {
    let region = MainDimension::Region.value(record);
    let flow_type = MainDimension::FlowType.value(record);
    let status = MainDimension::Status.value(record);
    let area = MainDimension::ResponsibleArea.value(record);

    let mut score = decaying(REGION_WEIGHT, count_of(&counts.region, region))
        + decaying(FLOW_TYPE_WEIGHT, count_of(&counts.flow_type, flow_type))
        + decaying(STATUS_WEIGHT, count_of(&counts.status, status))
        + decaying(
            RESPONSIBLE_AREA_WEIGHT,
            count_of(&counts.responsible_area, area),
        );
    if !counts.combination.contains_key(&(region, flow_type, status)) {
        score += NOVEL_COMBINATION_BONUS;
    }
    score
}

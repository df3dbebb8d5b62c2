//! Datasets for the charts panel, as plain arrays of rows.

use crate::processing::{
    rank_top, resolve_metric_value, saturating_total, zone_distribution, RankedLocality, ZoneTotal,
};
use crate::types::{FeatureRecord, MetricSelection};
use serde::Serialize;
use std::collections::BTreeMap;

const COMPARISON_ROWS: usize = 10;
const SHARE_SLICES: usize = 5;
const TOP_LOCALITIES: usize = 5;
const OTHERS_LABEL: &str = "Otros";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenderRow {
    pub name: String,
    pub male: u64,
    pub female: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstitutionRow {
    pub name: String,
    pub public: u64,
    pub private: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearAverage {
    pub year: i32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartsReport {
    pub metric_label: &'static str,
    pub gender_comparison: Vec<GenderRow>,
    pub institution_comparison: Vec<InstitutionRow>,
    pub zones: Vec<ZoneTotal>,
    pub shares: Vec<RankedLocality>,
    pub top_localities: Vec<RankedLocality>,
    pub evolution: Vec<YearAverage>,
}

/// Builds every chart series. `history` is the full collection for the
/// selected theme, across all years.
pub fn charts_report(
    filtered: &[&FeatureRecord],
    history: &[&FeatureRecord],
    selection: &MetricSelection,
) -> ChartsReport {
    let named = named_only(filtered);

    ChartsReport {
        metric_label: selection.metric.label(),
        gender_comparison: gender_comparison(&named),
        institution_comparison: institution_comparison(&named),
        zones: zone_distribution(&named, selection),
        shares: share_series(&named, selection),
        top_localities: top_localities(&named, selection),
        evolution: evolution(&named_only(history), selection),
    }
}

fn named_only<'a>(records: &[&'a FeatureRecord]) -> Vec<&'a FeatureRecord> {
    records
        .iter()
        .copied()
        .filter(|r| !r.locality_name.is_empty())
        .collect()
}

pub fn gender_comparison(records: &[&FeatureRecord]) -> Vec<GenderRow> {
    records
        .iter()
        .take(COMPARISON_ROWS)
        .map(|r| GenderRow {
            name: r.locality_name.clone(),
            male: r.metrics.enrollment_male,
            female: r.metrics.enrollment_female,
            total: r.metrics.enrollment_total,
        })
        .collect()
}

pub fn institution_comparison(records: &[&FeatureRecord]) -> Vec<InstitutionRow> {
    records
        .iter()
        .take(COMPARISON_ROWS)
        .map(|r| InstitutionRow {
            name: r.locality_name.clone(),
            public: r.metrics.institutions_public,
            private: r.metrics.institutions_private,
            total: r.metrics.institutions_total,
        })
        .collect()
}

/// Largest localities plus one slice for the remainder. Empty slices are dropped.
pub fn share_series(records: &[&FeatureRecord], selection: &MetricSelection) -> Vec<RankedLocality> {
    let mut ranked = rank_top(records, selection, records.len(), false);
    let rest = saturating_total(ranked.iter().skip(SHARE_SLICES).map(|r| r.value));
    ranked.truncate(SHARE_SLICES);

    if rest > 0 {
        ranked.push(RankedLocality {
            name: OTHERS_LABEL.to_string(),
            value: rest,
        });
    }
    ranked.retain(|r| r.value > 0);
    ranked
}

pub fn top_localities(records: &[&FeatureRecord], selection: &MetricSelection) -> Vec<RankedLocality> {
    let mut top = rank_top(records, selection, TOP_LOCALITIES, false);
    top.retain(|r| r.value > 0);
    top
}

/// Mean resolved value per year, oldest first.
pub fn evolution(records: &[&FeatureRecord], selection: &MetricSelection) -> Vec<YearAverage> {
    let mut per_year: BTreeMap<i32, (u64, usize)> = BTreeMap::new();
    for record in records {
        let entry = per_year.entry(record.year).or_insert((0, 0));
        entry.0 = entry.0.saturating_add(resolve_metric_value(record, selection));
        entry.1 += 1;
    }

    per_year
        .into_iter()
        .map(|(year, (sum, count))| YearAverage {
            year,
            value: if count > 0 { sum as f64 / count as f64 } else { 0.0 },
        })
        .collect()
}

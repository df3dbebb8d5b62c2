//! Summary statistics for the stats panel.
//!
//! Every value is read through [`resolve_metric_value`] except the
//! year-over-year change and the gender/institution breakdowns, which work on
//! the raw fields.

use crate::processing::{rank_top, resolve_metric_value, saturating_total, RankedLocality};
use crate::types::{FeatureRecord, Metric, MetricSelection};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordRef {
    pub fid: i64,
    pub locality_name: String,
}

impl From<&FeatureRecord> for RecordRef {
    fn from(record: &FeatureRecord) -> Self {
        Self {
            fid: record.fid,
            locality_name: record.locality_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveStatistics {
    pub count: usize,
    pub total: u64,
    pub average: f64,
    pub min: Option<u64>,
    pub max: Option<u64>,
    /// Element at `count / 2` of the ascending values: the upper-middle one
    /// for even counts, not the mean of the two middle values.
    pub median: Option<u64>,
    pub min_record: Option<RecordRef>,
    pub max_record: Option<RecordRef>,
}

impl DescriptiveStatistics {
    pub fn range(&self) -> Option<u64> {
        Some(self.max? - self.min?)
    }
}

pub fn descriptive_statistics(
    records: &[&FeatureRecord],
    selection: &MetricSelection,
) -> DescriptiveStatistics {
    let values: Vec<u64> = records
        .iter()
        .map(|record| resolve_metric_value(record, selection))
        .collect();

    let count = values.len();
    let total = saturating_total(values.iter().copied());
    let average = if count > 0 { total as f64 / count as f64 } else { 0.0 };

    let min = values.iter().copied().min();
    let max = values.iter().copied().max();

    // First record holding the extremum.
    let record_with = |target: Option<u64>| {
        let target = target?;
        values
            .iter()
            .position(|v| *v == target)
            .map(|i| RecordRef::from(records[i]))
    };

    let mut sorted = values.clone();
    sorted.sort_unstable();
    let median = sorted.get(count / 2).copied();

    DescriptiveStatistics {
        count,
        total,
        average,
        min,
        max,
        median,
        min_record: record_with(min),
        max_record: record_with(max),
    }
}

/// Percentage change of the raw metric total between the two most recent
/// years in `records`. `None` with fewer than two years or a zero base.
pub fn year_over_year_change(records: &[&FeatureRecord], metric: Metric) -> Option<f64> {
    let years: Vec<i32> = records
        .iter()
        .map(|r| r.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if years.len() < 2 {
        return None;
    }
    let current_year = years[years.len() - 1];
    let previous_year = years[years.len() - 2];

    let sum_for = |year: i32| {
        saturating_total(
            records
                .iter()
                .filter(|r| r.year == year)
                .map(|r| r.metrics.get(metric)),
        )
    };

    let current = sum_for(current_year);
    let previous = sum_for(previous_year);
    if previous == 0 {
        return None;
    }

    Some((current as f64 - previous as f64) / previous as f64 * 100.0)
}

/// Inclusive bin; `max: None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValueRange {
    pub label: &'static str,
    pub min: u64,
    pub max: Option<u64>,
}

impl ValueRange {
    pub fn contains(&self, value: u64) -> bool {
        value >= self.min && self.max.map_or(true, |max| value <= max)
    }
}

pub const DEFAULT_RANGES: [ValueRange; 4] = [
    ValueRange { label: "0-50", min: 0, max: Some(50) },
    ValueRange { label: "51-100", min: 51, max: Some(100) },
    ValueRange { label: "101-200", min: 101, max: Some(200) },
    ValueRange { label: "200+", min: 201, max: None },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeCount {
    #[serde(flatten)]
    pub range: ValueRange,
    pub count: usize,
}

pub fn value_range_histogram(values: &[u64], ranges: &[ValueRange]) -> Vec<RangeCount> {
    ranges
        .iter()
        .map(|range| RangeCount {
            range: *range,
            count: values.iter().filter(|v| range.contains(**v)).count(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenderBreakdown {
    pub male: u64,
    pub female: u64,
    pub total: u64,
    pub male_percentage: f64,
    pub female_percentage: f64,
}

pub fn gender_breakdown(records: &[&FeatureRecord]) -> GenderBreakdown {
    let male = saturating_total(records.iter().map(|r| r.metrics.enrollment_male));
    let female = saturating_total(records.iter().map(|r| r.metrics.enrollment_female));
    let total = saturating_total(records.iter().map(|r| r.metrics.enrollment_total));

    GenderBreakdown {
        male,
        female,
        total,
        male_percentage: percentage(male, total),
        female_percentage: percentage(female, total),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstitutionBreakdown {
    pub public: u64,
    pub private: u64,
    pub total: u64,
    pub public_percentage: f64,
}

pub fn institution_breakdown(records: &[&FeatureRecord]) -> InstitutionBreakdown {
    let public = saturating_total(records.iter().map(|r| r.metrics.institutions_public));
    let private = saturating_total(records.iter().map(|r| r.metrics.institutions_private));
    let total = saturating_total(records.iter().map(|r| r.metrics.institutions_total));

    InstitutionBreakdown {
        public,
        private,
        total,
        public_percentage: percentage(public, total),
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub metric: Metric,
    pub metric_label: &'static str,
    pub selection: MetricSelection,
    pub statistics: DescriptiveStatistics,
    pub range: Option<u64>,
    pub year_over_year_change: Option<f64>,
    pub distribution: Vec<RangeCount>,
    pub gender: GenderBreakdown,
    pub institutions: InstitutionBreakdown,
    pub top: Vec<RankedLocality>,
    pub bottom: Vec<RankedLocality>,
}

/// Everything the stats panel shows. `filtered` is the current view;
/// `all` is the whole collection, used for the year-over-year change.
pub fn stats_report(
    filtered: &[&FeatureRecord],
    all: &[&FeatureRecord],
    selection: &MetricSelection,
) -> StatsReport {
    let statistics = descriptive_statistics(filtered, selection);
    let values: Vec<u64> = filtered
        .iter()
        .map(|r| resolve_metric_value(r, selection))
        .collect();

    StatsReport {
        metric: selection.metric,
        metric_label: selection.metric.label(),
        selection: *selection,
        range: statistics.range(),
        statistics,
        year_over_year_change: year_over_year_change(all, selection.metric),
        distribution: value_range_histogram(&values, &DEFAULT_RANGES),
        gender: gender_breakdown(filtered),
        institutions: institution_breakdown(filtered),
        top: rank_top(filtered, selection, 5, false),
        bottom: rank_top(filtered, selection, 5, true),
    }
}

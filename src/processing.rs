use crate::types::{FeatureRecord, FilterConfig, GenderFilter, InstitutionFilter, Metric, MetricSelection};
use serde::Serialize;

/// Keeps the records matching every constraint in `filter`, in their original order.
pub fn filter_features<'a, I>(records: I, filter: &FilterConfig) -> Vec<&'a FeatureRecord>
where
    I: IntoIterator<Item = &'a FeatureRecord>,
{
    let query = filter.locality_query.to_lowercase();

    records
        .into_iter()
        .filter(|record| {
            let matches_year = record.year == filter.year;
            let matches_theme = record.theme == filter.theme;
            let matches_zone = filter
                .zone
                .as_ref()
                .map_or(true, |zone| &record.zone_code == zone);
            let matches_locality =
                query.is_empty() || record.locality_name.to_lowercase().contains(&query);

            matches_year && matches_theme && matches_zone && matches_locality
        })
        .collect()
}

/// Reads the selected metric from a record, applying the gender and
/// institution-type overrides. The first matching override wins.
pub fn resolve_metric_value(record: &FeatureRecord, selection: &MetricSelection) -> u64 {
    let m = &record.metrics;
    match (selection.metric, selection.gender, selection.institution) {
        (Metric::EnrollmentTotal, GenderFilter::Male, _) => m.enrollment_male,
        (Metric::EnrollmentTotal, GenderFilter::Female, _) => m.enrollment_female,
        (Metric::InstitutionsTotal, _, InstitutionFilter::Public) => m.institutions_public,
        (Metric::InstitutionsTotal, _, InstitutionFilter::Private) => m.institutions_private,
        (metric, _, _) => m.get(metric),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneTotal {
    pub zone: String,
    pub value: u64,
}

/// Sum that stops at `u64::MAX` instead of overflowing.
pub fn saturating_total<I: IntoIterator<Item = u64>>(values: I) -> u64 {
    values.into_iter().fold(0, u64::saturating_add)
}

/// Sums resolved values per zone. Zones appear in first-seen order.
pub fn zone_distribution(records: &[&FeatureRecord], selection: &MetricSelection) -> Vec<ZoneTotal> {
    let mut zones: Vec<ZoneTotal> = Vec::new();

    for record in records {
        let value = resolve_metric_value(record, selection);
        match zones.iter_mut().find(|z| z.zone == record.zone_code) {
            Some(entry) => entry.value = entry.value.saturating_add(value),
            None => zones.push(ZoneTotal {
                zone: record.zone_code.clone(),
                value,
            }),
        }
    }

    zones
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedLocality {
    pub name: String,
    pub value: u64,
}

/// First `n` localities ordered by resolved value. Ties keep their original order.
pub fn rank_top(
    records: &[&FeatureRecord],
    selection: &MetricSelection,
    n: usize,
    ascending: bool,
) -> Vec<RankedLocality> {
    let mut ranked: Vec<RankedLocality> = records
        .iter()
        .map(|record| RankedLocality {
            name: record.locality_name.clone(),
            value: resolve_metric_value(record, selection),
        })
        .collect();

    if ascending {
        ranked.sort_by(|a, b| a.value.cmp(&b.value));
    } else {
        ranked.sort_by(|a, b| b.value.cmp(&a.value));
    }
    ranked.truncate(n);
    ranked
}

/// Min and max resolved value, or `None` for an empty set.
pub fn value_range(records: &[&FeatureRecord], selection: &MetricSelection) -> Option<(u64, u64)> {
    records
        .iter()
        .map(|record| resolve_metric_value(record, selection))
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}


#[cfg(test)]
mod tests {
    use super::test_support::record;
    use super::*;
    use crate::types::MetricValues;
    use proptest::prelude::*;

    fn sample() -> Vec<FeatureRecord> {
        vec![
            record(1, "Bocagrande", "L1", 2021, 100),
            record(2, "Manga", "L2", 2021, 50),
            record(3, "Bocachica", "L1", 2021, 200),
            record(4, "Bocagrande", "L1", 2020, 90),
        ]
    }

    #[test]
    fn test_filter_by_year_and_theme() {
        let records = sample();
        let filtered = filter_features(&records, &FilterConfig::new(2021, "Educación"));
        let fids: Vec<i64> = filtered.iter().map(|r| r.fid).collect();
        assert_eq!(fids, vec![1, 2, 3]);

        let filtered = filter_features(&records, &FilterConfig::new(2021, "Salud"));
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_filter_by_zone_and_locality_query() {
        let records = sample();
        let filter = FilterConfig::new(2021, "Educación").with_zone(Some("L1"));
        let fids: Vec<i64> = filter_features(&records, &filter).iter().map(|r| r.fid).collect();
        assert_eq!(fids, vec![1, 3]);

        let filter = FilterConfig::new(2021, "Educación").with_locality_query("BOCA");
        let fids: Vec<i64> = filter_features(&records, &filter).iter().map(|r| r.fid).collect();
        assert_eq!(fids, vec![1, 3]);

        let filter = FilterConfig::new(2021, "Educación").with_locality_query("chica");
        let fids: Vec<i64> = filter_features(&records, &filter).iter().map(|r| r.fid).collect();
        assert_eq!(fids, vec![3]);
    }

    #[test]
    fn test_resolve_override_precedence() {
        let mut r = record(1, "A", "L1", 2021, 100);
        r.metrics = MetricValues {
            enrollment_total: 100,
            enrollment_male: 40,
            enrollment_female: 70,
            institutions_total: 9,
            institutions_public: 2,
            institutions_private: 5,
            ..MetricValues::default()
        };

        let mut sel = MetricSelection::new(Metric::EnrollmentTotal);
        assert_eq!(resolve_metric_value(&r, &sel), 100);

        sel.gender = GenderFilter::Male;
        assert_eq!(resolve_metric_value(&r, &sel), 40);
        sel.gender = GenderFilter::Female;
        sel.institution = InstitutionFilter::Private;
        assert_eq!(resolve_metric_value(&r, &sel), 70);

        // Gender override only touches total enrollment.
        sel.metric = Metric::InstitutionsTotal;
        assert_eq!(resolve_metric_value(&r, &sel), 5);
        sel.institution = InstitutionFilter::Public;
        assert_eq!(resolve_metric_value(&r, &sel), 2);

        // Institution override only touches total institutions.
        sel.metric = Metric::EnrollmentMale;
        assert_eq!(resolve_metric_value(&r, &sel), 40);
        sel.metric = Metric::InstitutionsPrivate;
        sel.institution = InstitutionFilter::Public;
        assert_eq!(resolve_metric_value(&r, &sel), 5);
    }

    #[test]
    fn test_resolve_missing_field_is_zero() {
        let r = record(1, "A", "L1", 2021, 100);
        let sel = MetricSelection::new(Metric::EnrollmentMedia);
        assert_eq!(resolve_metric_value(&r, &sel), 0);
    }

    #[test]
    fn test_zone_distribution_first_seen_order() {
        let records = sample();
        let filtered = filter_features(&records, &FilterConfig::new(2021, "Educación"));
        let zones = zone_distribution(&filtered, &MetricSelection::new(Metric::EnrollmentTotal));
        assert_eq!(
            zones,
            vec![
                ZoneTotal { zone: "L1".into(), value: 300 },
                ZoneTotal { zone: "L2".into(), value: 50 },
            ]
        );
    }

    #[test]
    fn test_rank_top_both_directions() {
        let records = sample();
        let filtered = filter_features(&records, &FilterConfig::new(2021, "Educación"));
        let sel = MetricSelection::new(Metric::EnrollmentTotal);

        let top = rank_top(&filtered, &sel, 2, false);
        assert_eq!(top[0].name, "Bocachica");
        assert_eq!(top[1].name, "Bocagrande");

        let bottom = rank_top(&filtered, &sel, 5, true);
        let names: Vec<&str> = bottom.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Manga", "Bocagrande", "Bocachica"]);
    }

    #[test]
    fn test_rank_top_ties_keep_order() {
        let records = vec![
            record(1, "A", "L1", 2021, 10),
            record(2, "B", "L1", 2021, 10),
            record(3, "C", "L1", 2021, 10),
        ];
        let refs: Vec<&FeatureRecord> = records.iter().collect();
        let sel = MetricSelection::new(Metric::EnrollmentTotal);
        let names: Vec<String> = rank_top(&refs, &sel, 3, false).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_value_range() {
        let records = sample();
        let refs: Vec<&FeatureRecord> = records.iter().collect();
        let sel = MetricSelection::new(Metric::EnrollmentTotal);
        assert_eq!(value_range(&refs, &sel), Some((50, 200)));
        assert_eq!(value_range(&[], &sel), None);
    }

    #[test]
    fn test_zone_distribution_saturates() {
        let records = vec![
            record(1, "A", "L1", 2021, u64::MAX),
            record(2, "B", "L1", 2021, 5),
            record(3, "C", "L2", 2021, 7),
        ];
        let refs: Vec<&FeatureRecord> = records.iter().collect();
        let zones = zone_distribution(&refs, &MetricSelection::new(Metric::EnrollmentTotal));
        assert_eq!(zones[0].value, u64::MAX);
        assert_eq!(zones[1].value, 7);
        assert_eq!(saturating_total([u64::MAX, 1, 2]), u64::MAX);
        assert_eq!(saturating_total(Vec::new()), 0);
    }

    fn arb_records() -> impl Strategy<Value = Vec<FeatureRecord>> {
        prop::collection::vec(
            (
                prop::sample::select(vec!["Bocagrande", "Manga", "Crespo", "Pie de la Popa"]),
                prop::sample::select(vec!["L1", "L2", "L3"]),
                2019..2022i32,
                0..500u64,
                0..300u64,
            ),
            0..30,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (name, zone, year, total, male))| {
                    let mut r = record(i as i64, name, zone, year, total);
                    r.metrics.enrollment_male = male;
                    r
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn filtering_is_idempotent(
            records in arb_records(),
            year in 2019..2022i32,
            zone in prop::sample::select(vec!["__ALL__", "L1", "L2"]),
            query in prop::sample::select(vec!["", "boca", "MAN", "a"]),
        ) {
            let filter = FilterConfig::new(year, "Educación")
                .with_zone(Some(zone))
                .with_locality_query(query);
            let once = filter_features(&records, &filter);
            let twice = filter_features(once.iter().copied(), &filter);
            let once_ids: Vec<i64> = once.iter().map(|r| r.fid).collect();
            let twice_ids: Vec<i64> = twice.iter().map(|r| r.fid).collect();
            prop_assert_eq!(once_ids, twice_ids);
        }

        #[test]
        fn zone_sums_match_total(records in arb_records(), male in any::<bool>()) {
            let refs: Vec<&FeatureRecord> = records.iter().collect();
            let mut sel = MetricSelection::new(Metric::EnrollmentTotal);
            if male {
                sel.gender = GenderFilter::Male;
            }
            let zone_sum: u64 = zone_distribution(&refs, &sel).iter().map(|z| z.value).sum();
            let total: u64 = refs.iter().map(|r| resolve_metric_value(r, &sel)).sum();
            prop_assert_eq!(zone_sum, total);
        }

        #[test]
        fn rank_top_is_sorted(records in arb_records(), n in 0..10usize, ascending in any::<bool>()) {
            let refs: Vec<&FeatureRecord> = records.iter().collect();
            let sel = MetricSelection::new(Metric::EnrollmentTotal);
            let ranked = rank_top(&refs, &sel, n, ascending);
            prop_assert!(ranked.len() <= n);
            for pair in ranked.windows(2) {
                if ascending {
                    prop_assert!(pair[0].value <= pair[1].value);
                } else {
                    prop_assert!(pair[0].value >= pair[1].value);
                }
            }
        }
    }
}

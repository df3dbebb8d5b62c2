//! End-to-end tests over the sample locality dataset.

use enrollmap::charts::charts_report;
use enrollmap::config::AppConfig;
use enrollmap::data::{load_dataset, Dataset, FilterOptions};
use enrollmap::error::DatasetError;
use enrollmap::map::{layer_collection, map_layer};
use enrollmap::processing::{filter_features, resolve_metric_value, zone_distribution};
use enrollmap::render::{render_choropleth, write_png};
use enrollmap::stats::{descriptive_statistics, stats_report, year_over_year_change};
use enrollmap::types::{FeatureRecord, FilterConfig, GenderFilter, Metric, MetricSelection};
use std::io::Write;
use std::path::PathBuf;

fn fixture_path(filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(filename)
}

fn load_fixture() -> Dataset {
    load_dataset(&fixture_path("localities.geojson")).expect("fixture should load")
}

fn current_filter() -> FilterConfig {
    FilterConfig::new(2021, "Educación")
}

#[test]
fn test_load_fixture() {
    let dataset = load_fixture();
    assert_eq!(dataset.records.len(), 7);

    let options = FilterOptions::from_records(&dataset.records);
    assert_eq!(options.years, vec![2019, 2020, 2021]);
    assert_eq!(options.themes, vec!["Educación".to_string(), "Salud".to_string()]);
    assert_eq!(options.zones, vec!["Localidad 1".to_string(), "Localidad 2".to_string()]);
    assert_eq!(options.localities.len(), 3);
}

#[test]
fn test_filter_and_describe() {
    let dataset = load_fixture();
    let filtered = filter_features(&dataset.records, &current_filter());
    let fids: Vec<i64> = filtered.iter().map(|r| r.fid).collect();
    assert_eq!(fids, vec![1, 2, 3]);

    let stats = descriptive_statistics(&filtered, &MetricSelection::new(Metric::EnrollmentTotal));
    assert_eq!(stats.total, 350);
    assert!((stats.average - 350.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.median, Some(100));
    assert_eq!(stats.max, Some(200));
    assert_eq!(stats.max_record.unwrap().locality_name, "El Pozón");
    assert_eq!(stats.min, Some(50));
    assert_eq!(stats.min_record.unwrap().locality_name, "Manga");
}

#[test]
fn test_zone_and_locality_filters() {
    let dataset = load_fixture();
    let filter = current_filter()
        .with_zone(Some("Localidad 1"))
        .with_locality_query("BOCA");
    let filtered = filter_features(&dataset.records, &filter);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].fid, 1);

    let nothing = filter_features(&dataset.records, &current_filter().with_locality_query("zzz"));
    let stats = descriptive_statistics(&nothing, &MetricSelection::new(Metric::EnrollmentTotal));
    assert_eq!(stats.average, 0.0);
    assert_eq!(stats.max, None);
}

#[test]
fn test_zone_distribution_matches_total() {
    let dataset = load_fixture();
    let filtered = filter_features(&dataset.records, &current_filter());
    let mut selection = MetricSelection::new(Metric::EnrollmentTotal);
    selection.gender = GenderFilter::Male;

    let zones = zone_distribution(&filtered, &selection);
    assert_eq!(zones.len(), 2);
    assert_eq!(zones[0].zone, "Localidad 1");
    assert_eq!(zones[0].value, 78);
    assert_eq!(zones[1].value, 90);

    let total: u64 = filtered.iter().map(|r| resolve_metric_value(r, &selection)).sum();
    assert_eq!(zones.iter().map(|z| z.value).sum::<u64>(), total);
}

#[test]
fn test_year_over_year_uses_two_latest_years() {
    let dataset = load_fixture();
    let all: Vec<&FeatureRecord> = dataset.records.iter().collect();
    // Institutions: 2021 = 17, 2020 = 8, 2019 = 0.
    let change = year_over_year_change(&all, Metric::InstitutionsTotal).unwrap();
    assert!((change - 112.5).abs() < 1e-9);
}

#[test]
fn test_reports_and_map_layer() {
    let dataset = load_fixture();
    let filtered = filter_features(&dataset.records, &current_filter());
    let all: Vec<&FeatureRecord> = dataset.records.iter().collect();
    let selection = MetricSelection::new(Metric::EnrollmentTotal);

    let report = stats_report(&filtered, &all, &selection);
    assert_eq!(report.top[0].name, "El Pozón");
    assert_eq!(report.bottom[0].name, "Manga");
    let counts: Vec<usize> = report.distribution.iter().map(|b| b.count).collect();
    assert_eq!(counts, vec![1, 1, 1, 0]);

    let history: Vec<&FeatureRecord> = all.iter().copied().filter(|r| r.theme == "Educación").collect();
    let charts = charts_report(&filtered, &history, &selection);
    let years: Vec<i32> = charts.evolution.iter().map(|y| y.year).collect();
    assert_eq!(years, vec![2019, 2020, 2021]);

    let layer = map_layer(&filtered, &selection);
    let collection = layer_collection(&filtered, &layer);
    assert_eq!(collection.features.len(), 3);
    let colors: Vec<String> = layer.styles.iter().map(|s| s.fill_color.to_string()).collect();
    assert_eq!(colors[1], "hsl(120, 70%, 50%)");
    assert_eq!(colors[2], "hsl(0, 70%, 50%)");
}

#[test]
fn test_config_render_round() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    writeln!(
        file,
        "[input]\ngeojson = {:?}\n\n[render]\nwidth = 128\nheight = 64\npadding = 4",
        fixture_path("localities.geojson").to_string_lossy()
    )
    .unwrap();

    let config = AppConfig::load_from_file(&config_path).unwrap();
    let dataset = load_dataset(&config.input.geojson).unwrap();
    let filtered = filter_features(&dataset.records, &current_filter());

    let img = render_choropleth(&config.render, &filtered, &MetricSelection::new(Metric::EnrollmentTotal));
    assert_eq!(img.dimensions(), (128, 64));
    assert!(img.pixels().any(|p| p.0[3] == 255));

    let out = dir.path().join("map.png");
    write_png(&img, &out).unwrap();
    assert!(out.exists());
}

#[test]
fn test_invalid_payload_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{\"type\": \"FeatureCollection\"}}").unwrap();
    let err = load_dataset(file.path()).unwrap_err();
    assert!(matches!(err, DatasetError::InvalidFormat(_)));
}

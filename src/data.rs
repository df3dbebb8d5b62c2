use crate::error::DatasetError;
use crate::types::{FeatureRecord, MetricValues};
use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, Value};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// The loaded collection, held read-only for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<FeatureRecord>,
    /// The validated source payload, re-served unchanged.
    pub collection: FeatureCollection,
}

pub fn load_dataset(path: &Path) -> Result<Dataset, DatasetError> {
    info!("Loading GeoJSON from {:?}...", path);
    if !path.exists() {
        return Err(DatasetError::NotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset = parse_dataset(&text)?;
    info!("Loaded {} feature records", dataset.records.len());
    Ok(dataset)
}

pub fn parse_dataset(text: &str) -> Result<Dataset, DatasetError> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    let object = value
        .as_object()
        .ok_or_else(|| DatasetError::InvalidFormat("payload is not a JSON object".into()))?;
    if !object.contains_key("type") || !object.contains_key("features") {
        return Err(DatasetError::InvalidFormat(
            "missing top-level \"type\" or \"features\"".into(),
        ));
    }

    let geojson = GeoJson::from_json_value(value)
        .map_err(|e| DatasetError::InvalidFormat(e.to_string()))?;
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => {
            return Err(DatasetError::InvalidFormat(
                "GeoJSON must be a FeatureCollection".into(),
            ))
        }
    };

    let mut records = Vec::with_capacity(collection.features.len());
    let mut seen_fids = HashSet::new();

    for (index, feature) in collection.features.iter().enumerate() {
        let Some(record) = feature_to_record(feature) else {
            warn!("Skipping feature #{} without properties", index);
            continue;
        };
        if !seen_fids.insert(record.fid) {
            warn!("Duplicate FID {} at feature #{}", record.fid, index);
        }
        records.push(record);
    }

    Ok(Dataset { records, collection })
}

fn feature_to_record(feature: &Feature) -> Option<FeatureRecord> {
    let props = feature.properties.as_ref()?;

    let metrics = MetricValues {
        enrollment_total: read_count(props, "Matrícula"),
        enrollment_male: read_count(props, "M_hombres"),
        enrollment_female: read_count(props, "M_mujeres"),
        institutions_total: read_count(props, "N_IE"),
        institutions_public: read_count(props, "N_IE_O"),
        institutions_private: read_count(props, "N_IE_"),
        enrollment_preschool: read_count(props, "M_Prees"),
        enrollment_primary: read_count(props, "M_Prim"),
        enrollment_secondary: read_count(props, "M_Sec"),
        enrollment_media: read_count(props, "M_Media"),
    };

    Some(FeatureRecord {
        fid: read_int(props, "FID"),
        locality_name: read_string(props, "NOMBRE"),
        zone_code: read_string(props, "LOC"),
        locality_id: read_int(props, "ID"),
        year: i32::try_from(read_int(props, "Año")).unwrap_or(0),
        annual_id: read_int(props, "ID_A"),
        theme: read_string(props, "Tema"),
        metrics,
        geometry: read_geometry(feature),
        shape_area: read_float(props, "Shape__Area"),
        shape_length: read_float(props, "Shape__Length"),
    })
}

/// Non-negative count; anything else reads as 0.
fn read_count(props: &JsonObject, key: &str) -> u64 {
    match props.get(key) {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .map(|v| v as u64)
            })
            .unwrap_or(0),
        _ => 0,
    }
}

fn read_int(props: &JsonObject, key: &str) -> i64 {
    match props.get(key) {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|v| v.is_finite()).map(|v| v as i64))
            .unwrap_or(0),
        _ => 0,
    }
}

fn read_float(props: &JsonObject, key: &str) -> f64 {
    props
        .get(key)
        .and_then(serde_json::Value::as_f64)
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// String label; numbers and other types read as empty.
fn read_string(props: &JsonObject, key: &str) -> String {
    match props.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

fn read_geometry(feature: &Feature) -> MultiPolygon<f64> {
    let Some(geometry) = &feature.geometry else {
        return MultiPolygon::new(vec![]);
    };

    match &geometry.value {
        Value::Polygon(_) | Value::MultiPolygon(_) => {
            let converted: Result<geo::Geometry<f64>, _> = geometry.value.clone().try_into();
            match converted {
                Ok(geo::Geometry::Polygon(p)) => MultiPolygon::new(vec![p]),
                Ok(geo::Geometry::MultiPolygon(mp)) => mp,
                Ok(_) => MultiPolygon::new(vec![]),
                Err(e) => {
                    debug!("Failed to convert geometry: {:?}", e);
                    MultiPolygon::new(vec![])
                }
            }
        }
        _ => MultiPolygon::new(vec![]),
    }
}

/// Values offered by the filter panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub years: Vec<i32>,
    pub themes: Vec<String>,
    pub zones: Vec<String>,
    pub localities: Vec<String>,
}

impl FilterOptions {
    pub fn from_records(records: &[FeatureRecord]) -> Self {
        let mut years: Vec<i32> = records.iter().map(|r| r.year).filter(|y| *y != 0).collect();
        years.sort_unstable();
        years.dedup();

        let mut themes: Vec<String> = Vec::new();
        for record in records {
            if !record.theme.is_empty() && !themes.contains(&record.theme) {
                themes.push(record.theme.clone());
            }
        }

        Self {
            years,
            themes,
            zones: sorted_distinct(records.iter().map(|r| &r.zone_code)),
            localities: sorted_distinct(records.iter().map(|r| &r.locality_name)),
        }
    }
}

fn sorted_distinct<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = values.filter(|v| !v.is_empty()).cloned().collect();
    out.sort();
    out.dedup();
    out
}

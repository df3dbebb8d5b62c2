use crate::color::{color_for_value, FillColor};
use crate::processing::{filter_features, resolve_metric_value, value_range};
use crate::types::{FeatureRecord, FilterConfig, Metric, MetricSelection, MetricValues};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::{Point, Rect};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use rstar::{RTree, RTreeObject, AABB};
use serde::Serialize;

/// Style of one polygon on the choropleth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureStyle {
    pub fid: i64,
    pub value: u64,
    pub fill_color: FillColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl From<Rect<f64>> for Bounds {
    fn from(rect: Rect<f64>) -> Self {
        Self {
            min_lon: rect.min().x,
            min_lat: rect.min().y,
            max_lon: rect.max().x,
            max_lat: rect.max().y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorScale {
    pub min: u64,
    pub max: u64,
}

/// Per-feature styles plus what the map needs to fit and colour them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLayer {
    pub styles: Vec<FeatureStyle>,
    pub scale: Option<ColorScale>,
    pub bounds: Option<Bounds>,
}

pub fn map_layer(records: &[&FeatureRecord], selection: &MetricSelection) -> MapLayer {
    let range = value_range(records, selection);

    let styles = records
        .iter()
        .map(|record| {
            let value = resolve_metric_value(record, selection);
            let (min, max) = range.unwrap_or((value, value));
            FeatureStyle {
                fid: record.fid,
                value,
                fill_color: color_for_value(value, min, max),
            }
        })
        .collect();

    MapLayer {
        styles,
        scale: range.map(|(min, max)| ColorScale { min, max }),
        bounds: bounds_of(records).map(Bounds::from),
    }
}

/// Union of every record's bounding box.
pub fn bounds_of(records: &[&FeatureRecord]) -> Option<Rect<f64>> {
    records
        .iter()
        .filter_map(|r| r.geometry.bounding_rect())
        .reduce(|acc, rect| {
            Rect::new(
                geo::Coord {
                    x: acc.min().x.min(rect.min().x),
                    y: acc.min().y.min(rect.min().y),
                },
                geo::Coord {
                    x: acc.max().x.max(rect.max().x),
                    y: acc.max().y.max(rect.max().y),
                },
            )
        })
}

/// The layer as a GeoJSON collection, with `value` and `fill_color` added to
/// each feature's properties. Records without geometry are left out.
pub fn layer_collection(records: &[&FeatureRecord], layer: &MapLayer) -> FeatureCollection {
    let features = records
        .iter()
        .zip(&layer.styles)
        .filter(|(record, _)| !record.geometry.0.is_empty())
        .map(|(record, style)| {
            let mut properties = record_properties(record);
            properties.insert("value".into(), style.value.into());
            properties.insert("fill_color".into(), style.fill_color.to_string().into());

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::from(&record.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn record_properties(record: &FeatureRecord) -> JsonObject {
    let mut props = JsonObject::new();
    props.insert("FID".into(), record.fid.into());
    props.insert("NOMBRE".into(), record.locality_name.clone().into());
    props.insert("LOC".into(), record.zone_code.clone().into());
    props.insert("ID".into(), record.locality_id.into());
    props.insert("Año".into(), record.year.into());
    props.insert("ID_A".into(), record.annual_id.into());
    props.insert("Tema".into(), record.theme.clone().into());
    for metric in Metric::ALL {
        props.insert(metric.source_key().into(), record.metrics.get(metric).into());
    }
    props
}

/// What a popup shows for one locality.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalityDetails {
    pub fid: i64,
    pub name: String,
    pub zone: String,
    pub locality_id: i64,
    pub year: i32,
    pub theme: String,
    pub metric_label: &'static str,
    pub value: u64,
    pub metrics: MetricValues,
}

impl LocalityDetails {
    pub fn new(record: &FeatureRecord, selection: &MetricSelection) -> Self {
        Self {
            fid: record.fid,
            name: record.locality_name.clone(),
            zone: record.zone_code.clone(),
            locality_id: record.locality_id,
            year: record.year,
            theme: record.theme.clone(),
            metric_label: selection.metric.label(),
            value: resolve_metric_value(record, selection),
            metrics: record.metrics,
        }
    }
}

struct AreaIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for AreaIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Spatial index over every record's polygon.
pub struct LocalityIndex {
    tree: RTree<AreaIndex>,
}

impl LocalityIndex {
    pub fn build(records: &[FeatureRecord]) -> Self {
        let items: Vec<AreaIndex> = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                let rect = record.geometry.bounding_rect()?;
                Some(AreaIndex {
                    index,
                    aabb: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        Self {
            tree: RTree::bulk_load(items),
        }
    }

    /// First record (in collection order) passing `filter` whose polygon contains the point.
    pub fn locate<'a>(
        &self,
        records: &'a [FeatureRecord],
        lon: f64,
        lat: f64,
        filter: &FilterConfig,
    ) -> Option<&'a FeatureRecord> {
        let point = Point::new(lon, lat);
        let envelope = AABB::from_point([lon, lat]);

        let mut candidates: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|item| item.index)
            .collect();
        candidates.sort_unstable();

        let hits = candidates
            .into_iter()
            .filter_map(|i| records.get(i))
            .filter(|record| record.geometry.contains(&point));

        filter_features(hits, filter).into_iter().next()
    }
}

use crate::config::RenderConfig;
use crate::map::map_layer;
use crate::types::{FeatureRecord, MetricSelection};
use anyhow::{Context, Result};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::{Coord, MapCoords, MultiPolygon, Point, Rect};
use image::{ImageBuffer, Rgba, RgbaImage};
use rayon::prelude::*;
use rstar::{Envelope, RTree, RTreeObject, AABB};
use std::f64::consts::PI;
use std::path::Path;
use tracing::info;

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 0]);

struct ProjectedArea {
    geometry: MultiPolygon<f64>,
    color: Rgba<u8>,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for ProjectedArea {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Rasterises the choropleth of `records`, fitted to their bounds.
pub fn render_choropleth(
    config: &RenderConfig,
    records: &[&FeatureRecord],
    selection: &MetricSelection,
) -> RgbaImage {
    let (width, height) = (config.width.max(1), config.height.max(1));
    let layer = map_layer(records, selection);

    let areas: Vec<ProjectedArea> = records
        .iter()
        .zip(&layer.styles)
        .filter_map(|(record, style)| {
            let geometry = record.geometry.map_coords(mercator);
            let rect = geometry.bounding_rect()?;
            Some(ProjectedArea {
                geometry,
                color: style.fill_color.to_rgba(),
                aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
            })
        })
        .collect();

    let Some(bounds) = union_bounds(&areas) else {
        return ImageBuffer::from_pixel(width, height, BACKGROUND);
    };
    let view = Viewport::fit(bounds, width, height, config.padding);
    let tree = RTree::bulk_load(areas);

    info!("Rendering {} areas into {}x{} image", tree.size(), width, height);

    let rows: Vec<Vec<Rgba<u8>>> = (0..height)
        .into_par_iter()
        .map(|py| {
            (0..width)
                .map(|px| {
                    let c = view.to_world(px, py);
                    tree.locate_in_envelope_intersecting(&AABB::from_point([c.x, c.y]))
                        .find(|area| area.geometry.contains(&Point::from(c)))
                        .map_or(BACKGROUND, |area| area.color)
                })
                .collect()
        })
        .collect();

    let mut img: RgbaImage = ImageBuffer::new(width, height);
    for (py, row) in rows.into_iter().enumerate() {
        for (px, color) in row.into_iter().enumerate() {
            img.put_pixel(px as u32, py as u32, color);
        }
    }
    img
}

pub fn write_png(img: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    img.save(path)
        .with_context(|| format!("Failed to save image: {:?}", path))?;
    Ok(())
}

fn union_bounds(areas: &[ProjectedArea]) -> Option<Rect<f64>> {
    areas.iter().map(|a| a.aabb).reduce(|acc, b| acc.merged(&b)).map(|aabb| {
        let (lo, hi) = (aabb.lower(), aabb.upper());
        Rect::new(Coord { x: lo[0], y: lo[1] }, Coord { x: hi[0], y: hi[1] })
    })
}

/// Web Mercator in unit square coordinates, y growing southward.
fn mercator(c: Coord<f64>) -> Coord<f64> {
    let lat_rad = c.y.to_radians();
    Coord {
        x: (c.x + 180.0) / 360.0,
        y: (1.0 - (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() / PI) / 2.0,
    }
}

/// Maps pixel centres back to projected coordinates, keeping aspect ratio.
struct Viewport {
    origin: Coord<f64>,
    offset: (f64, f64),
    scale: f64,
}

impl Viewport {
    fn fit(bounds: Rect<f64>, width: u32, height: u32, padding: u32) -> Self {
        let margin = padding.saturating_mul(2);
        let usable_w = width.saturating_sub(margin).max(1) as f64;
        let usable_h = height.saturating_sub(margin).max(1) as f64;
        let (dx, dy) = (bounds.width().max(f64::EPSILON), bounds.height().max(f64::EPSILON));
        let scale = (usable_w / dx).min(usable_h / dy);

        Self {
            origin: bounds.min(),
            offset: (
                (width as f64 - dx * scale) / 2.0,
                (height as f64 - dy * scale) / 2.0,
            ),
            scale,
        }
    }

    fn to_world(&self, px: u32, py: u32) -> Coord<f64> {
        Coord {
            x: self.origin.x + (px as f64 + 0.5 - self.offset.0) / self.scale,
            y: self.origin.y + (py as f64 + 0.5 - self.offset.1) / self.scale,
        }
    }
}

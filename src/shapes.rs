//! Procedural debris outlines.

use rand::Rng;
use std::f32::consts::TAU;

const MIN_VERTICES: usize = 5;
const MAX_VERTICES: usize = 9;

/// Irregular "chipped rock" polygon around the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ChippedPolygon {
    /// Vertex offsets from the particle center, in cell units.
    pub points: Vec<(f32, f32)>,
    /// Largest vertex distance from the origin. Used for every collision test.
    pub bounding_radius: f32,
}

/// 5..=9 vertices at evenly spaced angles with jitter below half a step;
/// each radius is `base_radius × (0.6 + r × 0.4)`.
pub fn generate_chipped_polygon(base_radius: f32, rng: &mut impl Rng) -> ChippedPolygon {
    let count = rng.gen_range(MIN_VERTICES..=MAX_VERTICES);
    let step = TAU / count as f32;
    let mut bounding_radius = 0.0_f32;
    let points = (0..count)
        .map(|i| {
            let jitter = rng.gen_range(-0.5..0.5) * step;
            let angle = i as f32 * step + jitter;
            let radius = base_radius * (0.6 + rng.gen_range(0.0..1.0) * 0.4);
            let (px, py) = (angle.cos() * radius, angle.sin() * radius);
            bounding_radius = bounding_radius.max(px.hypot(py));
            (px, py)
        })
        .collect();
    ChippedPolygon {
        points,
        bounding_radius,
    }
}

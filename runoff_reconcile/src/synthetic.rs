// Placeholder geometry for units that no real source could provide.

use geo::{coord, MultiPolygon, Rect};

use crate::config::RegionBounds;
use crate::records::RegionId;

/// Box used for units whose region is unknown or has no configured bounds.
/// It lies off the coast so placeholders never hide real boundaries.
pub fn fallback_bounds(region: Option<RegionId>) -> RegionBounds {
    RegionBounds {
        region: region.unwrap_or(RegionId(0)),
        min_x: -80.0,
        min_y: -56.0,
        max_x: -78.0,
        max_y: -17.0,
    }
}

/// The `index`-th of `count` equal-width vertical strips of the box.
pub fn strip(bounds: &RegionBounds, index: usize, count: usize) -> MultiPolygon<f64> {
    let count = count.max(index + 1);
    let width = (bounds.max_x - bounds.min_x) / count as f64;
    let x0 = bounds.min_x + width * index as f64;
    let rect = Rect::new(
        coord! { x: x0, y: bounds.min_y },
        coord! { x: x0 + width, y: bounds.max_y },
    );
    MultiPolygon::new(vec![rect.to_polygon()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, BoundingRect};

    #[test]
    fn strips_tile_the_box() {
        let b = RegionBounds {
            region: RegionId(13),
            min_x: -71.5,
            min_y: -34.5,
            max_x: -69.5,
            max_y: -32.5,
        };
        let total: f64 = (0..4).map(|i| strip(&b, i, 4).unsigned_area()).sum();
        assert!((total - 4.0).abs() < 1e-9);
        let second = strip(&b, 1, 4).bounding_rect().unwrap();
        assert!((second.min().x - -71.0).abs() < 1e-9);
        assert!((second.max().x - -70.5).abs() < 1e-9);
    }

    #[test]
    fn index_past_count_still_yields_a_shape() {
        let b = fallback_bounds(None);
        assert!(strip(&b, 5, 2).unsigned_area() > 0.0);
    }
}

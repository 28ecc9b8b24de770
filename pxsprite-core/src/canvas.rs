use std::collections::HashMap;

use crate::error::Result;
use crate::format::{Color, Point, Size};

/// Something sprites can be drawn on.
///
/// [`PixelClient`](crate::client::PixelClient) is the real one; tests use an
/// in-memory grid.
pub trait Canvas {
    fn size(&self) -> Size;

    /// Read back the colors at `coords`. Every input coordinate gets an entry;
    /// coordinates off the canvas map to `None` and are never sent.
    fn query_pixels(&mut self, coords: &[Point]) -> Result<HashMap<Point, Option<Color>>>;

    /// Write `pixels`, silently dropping any that fall off the canvas.
    fn set_pixels(&mut self, pixels: &HashMap<Point, Color>) -> Result<()>;
}

/// Split `coords` into the sorted, de-duplicated on-canvas ones, and a result
/// map pre-filled with `None` for the rest.
pub(crate) fn partition_coords(
    size: Size,
    coords: &[Point],
) -> (Vec<Point>, HashMap<Point, Option<Color>>) {
    let mut valid = Vec::with_capacity(coords.len());
    let mut result = HashMap::with_capacity(coords.len());

    for &p in coords {
        if size.contains(p) {
            valid.push(p);
        } else {
            result.insert(p, None);
        }
    }
    valid.sort_unstable();
    valid.dedup();

    (valid, result)
}

/// On-canvas pixels of `pixels`, in coordinate order.
pub(crate) fn sorted_valid(size: Size, pixels: &HashMap<Point, Color>) -> Vec<(Point, Color)> {
    let mut valid: Vec<(Point, Color)> = pixels
        .iter()
        .filter(|(p, _)| size.contains(**p))
        .map(|(&p, &c)| (p, c))
        .collect();
    valid.sort_unstable();
    valid
}

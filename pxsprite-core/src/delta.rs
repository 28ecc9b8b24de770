use std::collections::HashMap;

use crate::format::{Color, Frame, Point};

/// Compute the writes that turn `drawn` into `next`, and update `drawn` to match.
///
/// Pixels that leave the sprite's footprint go back to their `background`
/// color. A pixel already showing the right color is never rewritten, and
/// each coordinate appears at most once in the result.
pub fn compute_delta(
    drawn: &mut HashMap<Point, Color>,
    next: &Frame,
    background: &HashMap<Point, Option<Color>>,
) -> HashMap<Point, Color> {
    let mut changes = HashMap::new();

    drawn.retain(|p, current| {
        if next.contains_key(p) {
            return true;
        }
        // Background is unknown only for cells we never captured; leave those alone.
        if let Some(&Some(restore)) = background.get(p) {
            if restore != *current {
                changes.insert(*p, restore);
            }
        }
        false
    });

    for (&p, &color) in next {
        if drawn.get(&p) != Some(&color) {
            changes.insert(p, color);
            drawn.insert(p, color);
        }
    }

    changes
}

use std::collections::HashMap;

use tracing::error;

use crate::canvas::Canvas;
use crate::delta::compute_delta;
use crate::error::Result;
use crate::format::{Color, Frame, Point};
use crate::sprite::SpriteType;

/// One sprite currently walking across a canvas.
///
/// On creation it reads back the full-width band of canvas rows it can ever
/// cover. That band is written back when the instance is finished or dropped,
/// whichever comes first.
pub struct SpriteInstance<'a, C: Canvas> {
    sprite: &'a SpriteType,
    canvas: &'a mut C,
    start: Point,
    tick: i32,
    hold: HashMap<Point, Option<Color>>,
    drawn: HashMap<Point, Color>,
    hidden: bool,
}

impl<'a, C: Canvas> SpriteInstance<'a, C> {
    pub fn new(sprite: &'a SpriteType, canvas: &'a mut C, start: Point) -> Result<Self> {
        let bounds = sprite.bounding_box();
        let width = canvas.size().width;
        let band: Vec<Point> = (bounds.min.y..bounds.max.y)
            .flat_map(|y| (0..width).map(move |x| Point::new(x, y + start.y)))
            .collect();
        let hold = canvas.query_pixels(&band)?;

        Ok(Self {
            sprite,
            canvas,
            start,
            tick: 0,
            hold,
            drawn: HashMap::new(),
            hidden: false,
        })
    }

    /// Derived from the tick counter, never stored.
    pub fn position(&self) -> Point {
        self.start + self.sprite.step() * self.tick
    }

    /// Advance one frame. Does not touch the canvas.
    pub fn step(&mut self) {
        self.tick += 1;
    }

    /// Draw the current frame, sending only pixels whose color changed since the last paint.
    pub fn paint(&mut self) -> Result<()> {
        let size = self.canvas.size();
        let offset = self.position();
        let next: Frame = self
            .sprite
            .frame(self.tick as usize)
            .iter()
            .map(|(&p, &c)| (p + offset, c))
            .filter(|(p, _)| size.contains(*p))
            .collect();

        let changes = compute_delta(&mut self.drawn, &next, &self.hold);
        if changes.is_empty() {
            return Ok(());
        }
        self.canvas.set_pixels(&changes)
    }

    /// Restore the captured band and consume the instance.
    pub fn finish(mut self) -> Result<()> {
        self.hide()
    }

    fn hide(&mut self) -> Result<()> {
        if self.hidden {
            return Ok(());
        }
        self.hidden = true;
        self.drawn.clear();

        let restore: HashMap<Point, Color> = self
            .hold
            .iter()
            .filter_map(|(&p, c)| c.map(|c| (p, c)))
            .collect();
        self.canvas.set_pixels(&restore)
    }
}

impl<C: Canvas> Drop for SpriteInstance<'_, C> {
    fn drop(&mut self) {
        if let Err(e) = self.hide() {
            error!(sprite = self.sprite.name(), "failed to restore canvas: {e}");
        }
    }
}

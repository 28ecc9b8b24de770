use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::decode::ImageDecoder;
use crate::error::{Error, Result};
use crate::format::{BoundingBox, Frame, Point};

/// An animated figure: cyclic frames, how far it moves per tick, and the box all frames fit in.
#[derive(Debug, Clone)]
pub struct SpriteType {
    name: String,
    frames: Vec<Frame>,
    step: Point,
    bounds: BoundingBox,
}

impl SpriteType {
    /// Fails if no frame paints anything, or if `step` is not a nonzero
    /// horizontal move. Only the rows a sprite starts on are restored, and a
    /// sprite that does not move never leaves the canvas.
    pub fn new(name: impl Into<String>, frames: Vec<Frame>, step: Point) -> Result<Self> {
        let name = name.into();
        if step.y != 0 {
            return Err(Error::load(&name, format!("vertical step {} is not supported", step.y)));
        }
        if step.x == 0 {
            return Err(Error::load(&name, "sprite does not move horizontally"));
        }
        let bounds = frames
            .iter()
            .filter_map(|frame| BoundingBox::enclosing(frame.keys().copied()))
            .reduce(BoundingBox::union)
            .ok_or_else(|| Error::load(&name, "sprite has no visible pixels"))?;

        Ok(Self {
            name,
            frames,
            step,
            bounds,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Frame for a tick counter; wraps around.
    pub fn frame(&self, index: usize) -> &Frame {
        &self.frames[index % self.frames.len()]
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn step(&self) -> Point {
        self.step
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounds
    }
}

/// Load one sprite: every `*.png` in `images_dir` (by file name) is a frame,
/// `definition_file` holds the horizontal step per tick.
pub fn load_sprite_type(
    images_dir: &Path,
    definition_file: &Path,
    decoder: &impl ImageDecoder,
) -> Result<SpriteType> {
    let definition =
        fs::read_to_string(definition_file).map_err(|e| Error::load(definition_file, e))?;
    let step_x: i32 = definition
        .trim()
        .parse()
        .map_err(|_| Error::load(definition_file, format!("not an integer: {:?}", definition.trim())))?;

    let mut image_paths = Vec::new();
    for entry in fs::read_dir(images_dir).map_err(|e| Error::load(images_dir, e))? {
        let path = entry.map_err(|e| Error::load(images_dir, e))?.path();
        if path.extension().is_some_and(|ext| ext == "png") {
            image_paths.push(path);
        }
    }
    image_paths.sort();

    if image_paths.is_empty() {
        return Err(Error::load(images_dir, "no .png frames found"));
    }

    let frames = image_paths
        .iter()
        .map(|path| decoder.decode(path))
        .collect::<Result<Vec<_>>>()?;

    let name = images_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| images_dir.display().to_string());

    let sprite = SpriteType::new(name, frames, Point::new(step_x, 0)).map_err(|e| match e {
        Error::Load { reason, .. } => Error::load(images_dir, reason),
        other => other,
    })?;
    debug!(
        sprite = sprite.name(),
        frames = sprite.frame_count(),
        step = step_x,
        "loaded sprite"
    );

    Ok(sprite)
}

/// Load every sprite named by a `<name>.txt` in `defs_dir`, with frames in `images_dir/<name>`.
pub fn load_sprite_pool(
    defs_dir: &Path,
    images_dir: &Path,
    decoder: &impl ImageDecoder,
) -> Result<Vec<Arc<SpriteType>>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(defs_dir).map_err(|e| Error::load(defs_dir, e))? {
        let path = entry.map_err(|e| Error::load(defs_dir, e))?.path();
        if path.extension().is_some_and(|ext| ext == "txt") {
            if let Some(stem) = path.file_stem() {
                names.push(stem.to_os_string());
            }
        }
    }
    names.sort();

    if names.is_empty() {
        return Err(Error::load(defs_dir, "no sprite definitions found"));
    }

    info!("Loading {} sprites ...", names.len());
    let mut pool = Vec::with_capacity(names.len());
    for name in names {
        let mut def_file = name.clone();
        def_file.push(".txt");
        let sprite = load_sprite_type(&images_dir.join(&name), &defs_dir.join(def_file), decoder)?;
        pool.push(Arc::new(sprite));
    }
    info!("Done.");

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::format::Color;

    fn frame(points: &[(i32, i32)]) -> Frame {
        points
            .iter()
            .map(|&(x, y)| (Point::new(x, y), Color::new(0xff, 0xff, 0xff)))
            .collect()
    }

    /// Treats the file contents as a list of "x,y" points.
    struct TextDecoder;

    impl ImageDecoder for TextDecoder {
        fn decode(&self, path: &Path) -> Result<Frame> {
            let text = fs::read_to_string(path).map_err(|e| Error::load(path, e))?;
            text.split_whitespace()
                .map(|pair| {
                    let (x, y) = pair.split_once(',').ok_or_else(|| Error::load(path, "bad point"))?;
                    let p = Point::new(
                        x.parse().map_err(|_| Error::load(path, "bad x"))?,
                        y.parse().map_err(|_| Error::load(path, "bad y"))?,
                    );
                    Ok((p, Color::new(0, 0, 0)))
                })
                .collect()
        }
    }

    fn write(path: PathBuf, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn bounding_box_covers_all_frames() {
        let sprite = SpriteType::new(
            "test",
            vec![frame(&[(0, 0), (2, 3)]), frame(&[(1, 5)])],
            Point::new(1, 0),
        )
        .unwrap();

        let bb = sprite.bounding_box();
        assert_eq!((bb.min, bb.max), (Point::new(0, 0), Point::new(3, 6)));
    }

    #[test]
    fn frames_are_cyclic() {
        let a = frame(&[(0, 0)]);
        let b = frame(&[(1, 1)]);
        let sprite = SpriteType::new("test", vec![a.clone(), b.clone()], Point::new(1, 0)).unwrap();

        assert_eq!(sprite.frame(0), &a);
        assert_eq!(sprite.frame(3), &b);
        assert_eq!(sprite.frame(4), &a);
    }

    #[test]
    fn invisible_sprite_is_rejected() {
        let result = SpriteType::new("ghost", vec![HashMap::new()], Point::new(1, 0));
        assert!(matches!(result, Err(Error::Load { .. })));
    }

    #[test]
    fn vertical_step_is_rejected() {
        let result = SpriteType::new("climber", vec![frame(&[(0, 0)])], Point::new(1, 1));
        assert!(matches!(result, Err(Error::Load { .. })));

        let result = SpriteType::new("faller", vec![frame(&[(0, 0)])], Point::new(0, -2));
        assert!(matches!(result, Err(Error::Load { .. })));
    }

    #[test]
    fn stationary_sprite_is_rejected() {
        let result = SpriteType::new("statue", vec![frame(&[(0, 0)])], Point::ZERO);
        assert!(matches!(result, Err(Error::Load { .. })));
    }

    #[test]
    fn zero_step_definition_is_load_error() {
        let dir = TempDir::new().unwrap();
        let images = dir.path().join("images");
        write(images.join("a.png"), "0,0");
        let def = dir.path().join("statue.txt");
        write(def.clone(), "0\n");

        match load_sprite_type(&images, &def, &TextDecoder) {
            Err(Error::Load { path, reason }) => {
                assert_eq!(path, images);
                assert!(reason.contains("does not move"), "{reason}");
            }
            other => panic!("expected load error, got {other:?}"),
        }
    }

    #[test]
    fn loads_frames_in_file_name_order() {
        let dir = TempDir::new().unwrap();
        let images = dir.path().join("images");
        write(images.join("b.png"), "1,1");
        write(images.join("a.png"), "0,0 -1,2");
        write(images.join("notes.txt"), "ignored");
        let def = dir.path().join("walker.txt");
        write(def.clone(), " -3\n");

        let sprite = load_sprite_type(&images, &def, &TextDecoder).unwrap();

        assert_eq!(sprite.name(), "images");
        assert_eq!(sprite.step(), Point::new(-3, 0));
        assert_eq!(sprite.frame_count(), 2);
        assert_eq!(sprite.frame(0).len(), 2);
        assert!(sprite.frame(1).contains_key(&Point::new(1, 1)));
        assert_eq!(sprite.bounding_box().min, Point::new(-1, 0));
        assert_eq!(sprite.bounding_box().max, Point::new(2, 3));
    }

    #[test]
    fn empty_image_dir_is_load_error() {
        let dir = TempDir::new().unwrap();
        let images = dir.path().join("images");
        fs::create_dir_all(&images).unwrap();
        let def = dir.path().join("walker.txt");
        write(def.clone(), "2");

        let result = load_sprite_type(&images, &def, &TextDecoder);
        assert!(matches!(result, Err(Error::Load { .. })));
    }

    #[test]
    fn bad_definition_is_load_error() {
        let dir = TempDir::new().unwrap();
        let images = dir.path().join("images");
        write(images.join("a.png"), "0,0");
        let def = dir.path().join("walker.txt");
        write(def.clone(), "fast");

        let result = load_sprite_type(&images, &def, &TextDecoder);
        assert!(matches!(result, Err(Error::Load { .. })));
    }

    #[test]
    fn undecodable_frame_is_load_error() {
        let dir = TempDir::new().unwrap();
        let images = dir.path().join("images");
        write(images.join("a.png"), "garbage");
        let def = dir.path().join("walker.txt");
        write(def.clone(), "1");

        let result = load_sprite_type(&images, &def, &TextDecoder);
        assert!(matches!(result, Err(Error::Load { .. })));
    }

    #[test]
    fn pool_loads_every_definition() {
        let dir = TempDir::new().unwrap();
        let defs = dir.path().join("defs");
        let images = dir.path().join("images");
        write(defs.join("zebra.txt"), "-1");
        write(defs.join("apple.txt"), "2");
        write(defs.join("readme.md"), "not a sprite");
        write(images.join("zebra").join("0.png"), "0,0");
        write(images.join("apple").join("0.png"), "1,0");

        let pool = load_sprite_pool(&defs, &images, &TextDecoder).unwrap();
        let names: Vec<&str> = pool.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["apple", "zebra"]);
        assert_eq!(pool[1].step(), Point::new(-1, 0));
    }

    #[test]
    fn empty_pool_is_load_error() {
        let dir = TempDir::new().unwrap();
        let defs = dir.path().join("defs");
        fs::create_dir_all(&defs).unwrap();
        let result = load_sprite_pool(&defs, dir.path(), &TextDecoder);
        assert!(matches!(result, Err(Error::Load { .. })));
    }
}

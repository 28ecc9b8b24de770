pub mod animate;
pub mod canvas;
pub mod client;
pub mod decode;
pub mod delta;
pub mod error;
pub mod format;
pub mod instance;
pub mod protocol;
pub mod sequence;
pub mod sprite;

pub use canvas::Canvas;
pub use client::PixelClient;
pub use error::{Error, Result};
pub use format::{BoundingBox, Color, Frame, Point, Size};

use std::path::Path;

use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};

use crate::error::{Error, Result};
use crate::format::{Color, Frame, Point};

/// Turns an image file into a sparse frame.
pub trait ImageDecoder {
    fn decode(&self, path: &Path) -> Result<Frame>;
}

/// Decodes images by running `ffmpeg` and reading raw RGBA back.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegDecoder;

impl ImageDecoder for FfmpegDecoder {
    fn decode(&self, path: &Path) -> Result<Frame> {
        let input = path
            .to_str()
            .ok_or_else(|| Error::load(path, "path is not valid UTF-8"))?;

        let mut child = FfmpegCommand::new()
            .hide_banner()
            .input(input)
            .frames(1)
            .format("rawvideo")
            .pix_fmt("rgba")
            .output("-")
            .spawn()
            .map_err(|e| Error::load(path, format!("failed to spawn ffmpeg, is it installed? {e}")))?;

        let events = child
            .iter()
            .map_err(|e| Error::load(path, format!("failed to read ffmpeg output: {e}")))?;

        let mut frame = None;
        let mut errors = Vec::new();

        for event in events {
            match event {
                FfmpegEvent::OutputFrame(out) if frame.is_none() => {
                    frame = Some(frame_from_rgba(&out.data, out.width, out.height));
                }
                FfmpegEvent::Error(msg) | FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, msg) => {
                    errors.push(msg);
                }
                _ => {}
            }
        }

        let status = child
            .wait()
            .map_err(|e| Error::load(path, format!("waiting for ffmpeg: {e}")))?;

        match frame {
            Some(frame) if status.success() => Ok(frame),
            _ if errors.is_empty() => Err(Error::load(path, format!("ffmpeg produced no image ({status})"))),
            _ => Err(Error::load(path, errors.join("; "))),
        }
    }
}

/// Build a frame from tightly packed RGBA rows. Fully transparent pixels are dropped.
pub fn frame_from_rgba(data: &[u8], width: u32, height: u32) -> Frame {
    let width = width as usize;
    let pixel_count = width * height as usize;

    data.chunks_exact(4)
        .take(pixel_count)
        .enumerate()
        .filter(|(_, px)| px[3] != 0)
        .map(|(i, px)| {
            let p = Point::new((i % width) as i32, (i / width) as i32);
            (p, Color::new(px[0], px[1], px[2]))
        })
        .collect()
}

use std::fmt::Write;

use crate::error::{Error, Result};
use crate::format::{Color, Point, Size};

/// Commands sent to the canvas server, one line each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `SIZE`
    Size,
    /// `PX <x> <y>`
    Query(Point),
    /// `PX <x> <y> <rrggbb>`
    Set(Point, Color),
}

impl Command {
    /// Append the wire form of this command, newline included.
    pub fn encode(&self, buf: &mut String) {
        // Writing into a String cannot fail.
        let _ = match self {
            Command::Size => writeln!(buf, "SIZE"),
            Command::Query(p) => writeln!(buf, "PX {} {}", p.x, p.y),
            Command::Set(p, color) => writeln!(buf, "PX {} {} {}", p.x, p.y, color),
        };
    }
}

/// Encode a run of commands as a single transmission.
pub fn encode_batch<I: IntoIterator<Item = Command>>(commands: I) -> String {
    let mut buf = String::new();
    for cmd in commands {
        cmd.encode(&mut buf);
    }
    buf
}

/// Replies read back from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// `SIZE <width> <height>`
    Size(Size),
    /// `PX <x> <y> <rrggbb...>`
    Pixel(Point, Color),
}

impl Reply {
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();

        match fields.as_slice() {
            ["SIZE", w, h] => Ok(Reply::Size(Size::new(int(w)?, int(h)?))),
            ["PX", x, y, color] => {
                let color = color
                    .parse::<Color>()
                    .map_err(|e| Error::Protocol(e.to_string()))?;
                Ok(Reply::Pixel(Point::new(int(x)?, int(y)?), color))
            }
            _ => Err(Error::Protocol(format!("unexpected reply: {:?}", line.trim_end()))),
        }
    }

    /// Expect a size reply, as sent in answer to `SIZE`.
    pub fn into_size(self) -> Result<Size> {
        match self {
            Reply::Size(size) => Ok(size),
            other => Err(Error::Protocol(format!("expected SIZE reply, got {other:?}"))),
        }
    }

    /// Expect a pixel reply echoing `requested`.
    pub fn into_pixel(self, requested: Point) -> Result<Color> {
        match self {
            Reply::Pixel(p, color) if p == requested => Ok(color),
            Reply::Pixel(p, _) => Err(Error::Protocol(format!(
                "asked for pixel {},{} but server answered for {},{}",
                requested.x, requested.y, p.x, p.y
            ))),
            other => Err(Error::Protocol(format!("expected PX reply, got {other:?}"))),
        }
    }
}

fn int(field: &str) -> Result<i32> {
    field
        .parse()
        .map_err(|_| Error::Protocol(format!("not an integer: {field:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_commands_one_per_line() {
        let batch = encode_batch([
            Command::Size,
            Command::Query(Point::new(3, 4)),
            Command::Set(Point::new(-1, 0), Color::new(1, 2, 255)),
        ]);
        assert_eq!(batch, "SIZE\nPX 3 4\nPX -1 0 0102ff\n");
    }

    #[test]
    fn parses_replies() {
        assert_eq!(Reply::parse("SIZE 800 600\n").unwrap(), Reply::Size(Size::new(800, 600)));
        assert_eq!(
            Reply::parse("PX 1 2 ff00aa80\n").unwrap(),
            Reply::Pixel(Point::new(1, 2), Color::new(0xff, 0, 0xaa))
        );
    }

    #[test]
    fn rejects_malformed_replies() {
        for line in ["", "HELLO\n", "SIZE 1\n", "SIZE a b\n", "PX 1 2\n", "PX 1 2 zzzzzz\n"] {
            assert!(matches!(Reply::parse(line), Err(Error::Protocol(_))), "{line:?}");
        }
    }

    #[test]
    fn pixel_reply_must_echo_coordinate() {
        let reply = Reply::Pixel(Point::new(1, 2), Color::new(0, 0, 0));
        assert!(reply.into_pixel(Point::new(1, 2)).is_ok());
        assert!(matches!(reply.into_pixel(Point::new(2, 1)), Err(Error::Protocol(_))));
        assert!(matches!(reply.into_size(), Err(Error::Protocol(_))));
    }
}

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::canvas::{partition_coords, sorted_valid, Canvas};
use crate::error::{Error, Result};
use crate::format::{Color, Point, Size};
use crate::protocol::{encode_batch, Command, Reply};

/// Work items for the sender thread.
enum Outgoing {
    Data(String),
    /// Terminal marker: the thread exits after seeing this.
    Stop,
}

/// Client for one canvas connection.
///
/// Writes go through a queue drained by a background thread, so `set_pixels`
/// never blocks on the socket. Reads happen on the caller's thread.
pub struct PixelClient {
    size: Size,
    reader: BufReader<TcpStream>,
    stream: Option<TcpStream>,
    queue: Option<Sender<Outgoing>>,
    sender: Option<JoinHandle<io::Result<()>>>,
    line: String,
}

impl PixelClient {
    /// Connect and fetch the canvas size.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port))?;
        Self::from_stream(stream)
    }

    /// Take over an already connected stream and perform the size handshake.
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        let reader = BufReader::new(stream.try_clone()?);
        let writer = stream.try_clone()?;
        let (tx, rx) = mpsc::channel();
        let sender = thread::Builder::new()
            .name("pixel-sender".into())
            .spawn(move || send_loop(writer, rx))?;

        let mut client = Self {
            size: Size::new(0, 0),
            reader,
            stream: Some(stream),
            queue: Some(tx),
            sender: Some(sender),
            line: String::new(),
        };

        client.enqueue(encode_batch([Command::Size]))?;
        client.size = client.read_reply()?.into_size()?;
        debug!(width = client.size.width, height = client.size.height, "canvas size");

        Ok(client)
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Read one pixel. Off-canvas coordinates give `None`.
    pub fn query_pixel(&mut self, x: i32, y: i32) -> Result<Option<Color>> {
        let p = Point::new(x, y);
        Ok(self.query_pixels(&[p])?.remove(&p).flatten())
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) -> Result<()> {
        self.set_pixels(&HashMap::from([(Point::new(x, y), color)]))
    }

    /// Stop the sender thread and shut the socket down. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(queue) = self.queue.take() {
            // The thread may already be gone after a write error.
            let _ = queue.send(Outgoing::Stop);
        }

        if let Some(handle) = self.sender.take() {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("sender thread stopped with error: {e}"),
                Err(_) => warn!("sender thread panicked"),
            }
        }

        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn enqueue(&mut self, data: String) -> Result<()> {
        let Some(queue) = &self.queue else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "client is closed").into());
        };

        if queue.send(Outgoing::Data(data)).is_ok() {
            return Ok(());
        }

        // The receiver only goes away when the sender thread exits, which it
        // does on a write error. Surface that error.
        self.queue = None;
        let err = match self.sender.take().map(JoinHandle::join) {
            Some(Ok(Err(e))) => e,
            _ => io::Error::new(io::ErrorKind::BrokenPipe, "sender thread stopped"),
        };
        Err(err.into())
    }

    fn read_reply(&mut self) -> Result<Reply> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "canvas server closed the connection",
            )
            .into());
        }
        Reply::parse(&self.line)
    }
}

impl Canvas for PixelClient {
    fn size(&self) -> Size {
        self.size
    }

    /// All queries go out as one batch before the first reply is read.
    fn query_pixels(&mut self, coords: &[Point]) -> Result<HashMap<Point, Option<Color>>> {
        let (valid, mut result) = partition_coords(self.size, coords);
        if valid.is_empty() {
            return Ok(result);
        }

        self.enqueue(encode_batch(valid.iter().map(|&p| Command::Query(p))))?;

        for p in valid {
            let color = self.read_reply()?.into_pixel(p)?;
            result.insert(p, Some(color));
        }

        Ok(result)
    }

    fn set_pixels(&mut self, pixels: &HashMap<Point, Color>) -> Result<()> {
        let valid = sorted_valid(self.size, pixels);
        if valid.is_empty() {
            return Ok(());
        }
        self.enqueue(encode_batch(valid.into_iter().map(|(p, c)| Command::Set(p, c))))
    }
}

impl Drop for PixelClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn send_loop(stream: TcpStream, rx: Receiver<Outgoing>) -> io::Result<()> {
    let mut writer = BufWriter::new(stream);

    for item in rx {
        match item {
            Outgoing::Data(data) => {
                writer.write_all(data.as_bytes())?;
                writer.flush()?;
            }
            Outgoing::Stop => break,
        }
    }

    writer.flush()
}

#[cfg(test)]
pub(crate) mod stub {
    use std::io::{BufRead, BufReader, Write};
    use std::net::{SocketAddr, TcpListener};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Copy, PartialEq)]
    pub enum Mode {
        Honest,
        /// Answers pixel queries for the wrong coordinate.
        Liar,
    }

    /// Minimal canvas server on loopback. Serves one connection and keeps a log of received lines.
    pub struct StubServer {
        pub addr: SocketAddr,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl StubServer {
        pub fn spawn(size_reply: &'static str, mode: Mode) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            let log = Arc::new(Mutex::new(Vec::new()));
            let server_log = Arc::clone(&log);

            thread::spawn(move || {
                let (stream, _) = listener.accept().unwrap();
                let reader = BufReader::new(stream.try_clone().unwrap());
                let mut writer = stream;
                let mut cells: HashMap<(i32, i32), String> = HashMap::new();

                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    server_log.lock().unwrap().push(line.clone());
                    let fields: Vec<&str> = line.split_whitespace().collect();
                    let written = match fields.as_slice() {
                        ["SIZE"] => writeln!(writer, "{size_reply}"),
                        ["PX", x, y] => {
                            let (x, y) = (x.parse::<i32>().unwrap(), y.parse::<i32>().unwrap());
                            let color = cells.get(&(x, y)).cloned().unwrap_or_else(|| "000000".into());
                            let x = if mode == Mode::Liar { x + 1 } else { x };
                            writeln!(writer, "PX {x} {y} {color}ff")
                        }
                        ["PX", x, y, color] => {
                            cells.insert((x.parse().unwrap(), y.parse().unwrap()), color.to_string());
                            Ok(())
                        }
                        _ => Ok(()),
                    };
                    if written.is_err() {
                        break;
                    }
                }
            });

            Self { addr, log }
        }

        pub fn connect(&self) -> Result<PixelClient> {
            PixelClient::connect(&self.addr.ip().to_string(), self.addr.port())
        }

        pub fn lines(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }
}

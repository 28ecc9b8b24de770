use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::canvas::Canvas;
use crate::client::PixelClient;
use crate::error::{Error, Result};
use crate::format::{Point, Size};
use crate::instance::SpriteInstance;
use crate::sequence::Sequence;
use crate::sprite::SpriteType;

/// Tick cadence and the random pause between sprites.
#[derive(Debug, Clone, PartialEq)]
pub struct Timing {
    pub frame_period: Duration,
    pub min_pause: Duration,
    pub max_pause: Duration,
}

impl Timing {
    pub fn new(fps: f64, min_pause: Duration, max_pause: Duration) -> Result<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(Error::Config(format!("frame rate must be positive, got {fps}")));
        }
        if min_pause > max_pause {
            return Err(Error::Config(format!(
                "minimum pause {min_pause:?} exceeds maximum pause {max_pause:?}"
            )));
        }

        Ok(Self {
            frame_period: Duration::from_secs_f64(1.0 / fps),
            min_pause,
            max_pause,
        })
    }

    #[cfg(test)]
    pub(crate) fn immediate() -> Self {
        Self {
            frame_period: Duration::ZERO,
            min_pause: Duration::ZERO,
            max_pause: Duration::ZERO,
        }
    }

    pub fn random_pause(&self, rng: &mut impl Rng) -> Duration {
        if self.min_pause >= self.max_pause {
            return self.min_pause;
        }
        rng.gen_range(self.min_pause..self.max_pause)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            frame_period: Duration::from_secs_f64(1.0 / 12.0),
            min_pause: Duration::from_secs(2),
            max_pause: Duration::from_secs(7),
        }
    }
}

/// Everything the reconnect loop needs.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub host: String,
    pub port: u16,
    pub timing: Timing,
    pub reconnect_delay: Duration,
    /// Defaults to half the pool size.
    pub min_distance: Option<usize>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            host: "px6.nerdkunst.de".into(),
            port: 1234,
            timing: Timing::default(),
            reconnect_delay: Duration::from_secs(5),
            min_distance: None,
        }
    }
}

/// Fixed-rate schedule against an absolute deadline, so slow ticks do not
/// push every later tick back.
#[derive(Debug)]
pub struct Ticker {
    next: Instant,
    period: Duration,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self {
            next: Instant::now(),
            period,
        }
    }

    /// Push the next deadline back by `extra`.
    pub fn delay(&mut self, extra: Duration) {
        self.next += extra;
    }

    /// Sleep until one period past the previous deadline. Returns at once if that has passed.
    pub fn wait(&mut self) {
        self.next += self.period;
        if let Some(rest) = self.next.checked_duration_since(Instant::now()) {
            thread::sleep(rest);
        }
    }

    #[cfg(test)]
    fn deadline(&self) -> Instant {
        self.next
    }
}

/// Where a sprite enters: just off the edge it walks in from, at a random row
/// that leaves room for its height.
pub fn entry_point(sprite: &SpriteType, canvas: Size, rng: &mut impl Rng) -> Point {
    let extent = sprite.bounding_box().max;
    let room = canvas.height - extent.y;
    let y = if room > 0 { rng.gen_range(0..room) } else { 0 };
    let x = if sprite.step().x < 0 {
        canvas.width
    } else {
        -extent.x
    };

    Point::new(x, y)
}

fn still_visible(sprite: &SpriteType, canvas: Size, position: Point) -> bool {
    if sprite.step().x < 0 {
        position.x > -sprite.bounding_box().max.x
    } else {
        position.x < canvas.width
    }
}

/// Walk one sprite across the canvas from `start`, then restore what it covered.
///
/// Returns the number of ticks taken. The covered area is restored even if a
/// paint fails.
pub fn traverse<C: Canvas>(
    canvas: &mut C,
    sprite: &SpriteType,
    start: Point,
    ticker: &mut Ticker,
) -> Result<usize> {
    let size = canvas.size();
    let mut instance = SpriteInstance::new(sprite, canvas, start)?;
    let mut ticks = 0;

    while still_visible(sprite, size, instance.position()) {
        ticker.wait();

        let began = Instant::now();
        instance.step();
        instance.paint()?;
        ticks += 1;

        let position = instance.position();
        debug!(
            sprite = sprite.name(),
            x = position.x,
            y = position.y,
            "painting took {:.2?}",
            began.elapsed()
        );
    }

    instance.finish()?;
    Ok(ticks)
}

/// Send every sprite from `sprites` across the canvas, one after another.
pub fn parade<C, I, R>(canvas: &mut C, sprites: I, timing: &Timing, rng: &mut R) -> Result<()>
where
    C: Canvas,
    I: IntoIterator<Item = Arc<SpriteType>>,
    R: Rng,
{
    let mut ticker = Ticker::new(timing.frame_period);

    for sprite in sprites {
        ticker.delay(timing.random_pause(rng));
        let start = entry_point(&sprite, canvas.size(), rng);
        info!(sprite = sprite.name(), x = start.x, y = start.y, "sprite entering");

        let ticks = traverse(canvas, &sprite, start, &mut ticker)?;
        info!(sprite = sprite.name(), ticks, "sprite left");
    }

    Ok(())
}

/// Connect, parade sprites forever, and reconnect after `reconnect_delay`
/// whenever the connection or the protocol fails.
///
/// Only returns on a configuration or load error.
pub fn run(config: &DriverConfig, pool: Vec<Arc<SpriteType>>) -> Result<()> {
    run_with(config, pool, PixelClient::connect)
}

/// [`run`] with the connection made by `connect` instead of a [`PixelClient`].
pub fn run_with<C, F>(
    config: &DriverConfig,
    pool: Vec<Arc<SpriteType>>,
    mut connect: F,
) -> Result<()>
where
    C: Canvas,
    F: FnMut(&str, u16) -> Result<C>,
{
    let min_distance = config.min_distance.unwrap_or(pool.len() / 2);
    let mut sequence = Sequence::with_rng(pool, min_distance, StdRng::from_entropy())?;
    let mut rng = StdRng::from_entropy();

    loop {
        let result = connect(&config.host, config.port).and_then(|mut client| {
            let size = client.size();
            info!(
                host = %config.host,
                port = config.port,
                width = size.width,
                height = size.height,
                "connected"
            );
            parade(&mut client, &mut sequence, &config.timing, &mut rng)
        });

        match result {
            Ok(()) => return Ok(()),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("{e}, reconnecting in {:?}", config.reconnect_delay);
                thread::sleep(config.reconnect_delay);
            }
        }
    }
}

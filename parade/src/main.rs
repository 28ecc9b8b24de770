use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use pxsprite_core::animate::{self, DriverConfig, Timing};
use pxsprite_core::decode::FfmpegDecoder;
use pxsprite_core::sprite::load_sprite_pool;

#[derive(Parser)]
#[command(name = "pxsprite-parade", about = "Walk animated sprites across a pixelflut canvas")]
struct Cli {
    /// Canvas server host
    #[arg(default_value = "px6.nerdkunst.de")]
    host: String,

    /// Canvas server port
    #[arg(default_value_t = 1234)]
    port: u16,

    /// Directory of `<name>.txt` files, each holding a sprite's step per tick
    #[arg(long, default_value = "ponies_gif")]
    defs_dir: PathBuf,

    /// Directory with one sub-directory of PNG frames per sprite
    #[arg(long, default_value = "ponies")]
    images_dir: PathBuf,

    /// Animation ticks per second
    #[arg(long, default_value_t = 12.0)]
    fps: f64,

    /// Seconds to wait before reconnecting
    #[arg(long, default_value_t = 5.0)]
    reconnect_secs: f64,

    /// Shortest pause between sprites, in seconds
    #[arg(long, default_value_t = 2.0)]
    min_pause_secs: f64,

    /// Longest pause between sprites, in seconds
    #[arg(long, default_value_t = 7.0)]
    max_pause_secs: f64,

    /// How many picks must pass before a sprite may appear again (default: half the pool)
    #[arg(long)]
    min_distance: Option<usize>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let timing = Timing::new(
        cli.fps,
        secs(cli.min_pause_secs, "--min-pause-secs")?,
        secs(cli.max_pause_secs, "--max-pause-secs")?,
    )?;
    let config = DriverConfig {
        host: cli.host,
        port: cli.port,
        timing,
        reconnect_delay: secs(cli.reconnect_secs, "--reconnect-secs")?,
        min_distance: cli.min_distance,
    };

    let pool = load_sprite_pool(&cli.defs_dir, &cli.images_dir, &FfmpegDecoder).with_context(|| {
        format!(
            "loading sprites from {} and {}",
            cli.defs_dir.display(),
            cli.images_dir.display()
        )
    })?;
    info!("Loaded {} sprites", pool.len());

    animate::run(&config, pool)?;
    Ok(())
}

fn secs(value: f64, flag: &str) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("{flag}: invalid duration {value}"))
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("pxsprite_parade={level},pxsprite_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

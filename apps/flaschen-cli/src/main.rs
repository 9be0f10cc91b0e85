use std::{env, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flaschen_ops::{ensure_capture_dir, init_tracing};
use flaschen_player::FlaschenClient;
use flaschen_types::{
    config::{FlaschenConfig, PlayerConfig},
    events::PlaybackEvent,
    raster::{ImageOverrides, Rgb},
};
use futures::StreamExt;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "configs/dev.toml";
const DEFAULT_CAPTURE_DIR: &str = "captures";

#[derive(Parser)]
#[command(name = "flaschen", about = "Stream images to a Flaschen Taschen display")]
struct Cli {
    /// Config file; falls back to $FLASCHEN_CONFIG, then configs/dev.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides display.host.
    #[arg(long)]
    host: Option<String>,
    /// Overrides display.port.
    #[arg(long)]
    port: Option<u16>,
    /// Print playback events as JSON lines on stdout.
    #[arg(long)]
    json_events: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Loop a still or animated image from a URL or path until interrupted.
    Play {
        location: String,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// Stop after this many milliseconds instead of waiting for Ctrl-C.
        #[arg(long)]
        duration_ms: Option<u64>,
    },
    /// Fill the display with one colour.
    Fill { r: u8, g: u8, b: u8 },
    /// Blank the display.
    Clear,
    /// Composite a source and write every frame as a PPM file.
    Dump {
        location: String,
        dir: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.clone());
    if let Some(host) = cli.host.clone() {
        config.display.host = host;
    }
    if let Some(port) = cli.port {
        config.display.port = port;
    }
    config.validate()?;
    init_tracing(&config.ops)?;

    let client = FlaschenClient::from_config(&config.display);
    match cli.command {
        Command::Play {
            location,
            width,
            height,
            duration_ms,
        } => {
            let player_config = PlayerConfig {
                width: width.unwrap_or(config.player.width),
                height: height.unwrap_or(config.player.height),
                ..config.player.clone()
            };
            play(&client, &player_config, &location, duration_ms, cli.json_events).await
        }
        Command::Fill { r, g, b } => fill(&client, Rgb::new(r, g, b)).await,
        Command::Clear => fill(&client, Rgb::BLACK).await,
        Command::Dump { location, dir } => {
            let dir = dir
                .or_else(|| config.ops.capture_dir.clone())
                .unwrap_or_else(|| DEFAULT_CAPTURE_DIR.into());
            dump(&client, &config.player, &location, &dir).await
        }
    }
}

async fn play(
    client: &FlaschenClient,
    player_config: &PlayerConfig,
    location: &str,
    duration_ms: Option<u64>,
    json_events: bool,
) -> Result<()> {
    let player = client.create_player_with(player_config)?;
    let mut events = player.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            report(&event, json_events);
        }
    });

    player
        .play(location)
        .await
        .with_context(|| format!("unable to play {location}"))?;
    info!("Streaming to {}", client.target());

    match duration_ms {
        Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
        None => tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?,
    }
    player.stop();
    printer.abort();
    Ok(())
}

fn report(event: &PlaybackEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => eprintln!("failed to encode event: {err}"),
        }
    } else {
        tracing::debug!("{:?} {:?}", event.kind, event.payload);
    }
}

async fn fill(client: &FlaschenClient, color: Rgb) -> Result<()> {
    let mut image = client.create(ImageOverrides::default())?;
    for y in 0..image.height() {
        for x in 0..image.width() {
            image.plot(x, y, color);
        }
    }
    let bytes = client.render(&image).await?;
    info!("Sent {} bytes to {}", bytes, client.target());
    Ok(())
}

async fn dump(
    client: &FlaschenClient,
    player_config: &PlayerConfig,
    location: &str,
    dir: &str,
) -> Result<()> {
    let dir = ensure_capture_dir(dir)?;
    let player = client.create_player_with(player_config)?;
    let frames = player.prepare(location).await?;
    for (index, frame) in frames.iter().enumerate() {
        let path = dir.join(format!("frame_{index:03}.ppm"));
        frame.image.write(&path)?;
        info!("Wrote {:?} (delay {}ms)", path, frame.delay_ms);
    }
    Ok(())
}

fn load_config(from_args: Option<PathBuf>) -> FlaschenConfig {
    let from_env = env::var("FLASCHEN_CONFIG").ok().map(PathBuf::from);
    let path = from_args
        .or(from_env)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    match FlaschenConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                default_config()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            default_config()
        }
    }
}

fn default_config() -> FlaschenConfig {
    let config = FlaschenConfig::for_host("localhost");
    debug_assert!(config.validate().is_ok());
    config
}

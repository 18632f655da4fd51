//! Playback simulator (playcore-sim) - Main entry point
//!
//! Drives one player against the in-memory pipeline and DRM gate: an initial
//! seek, a stream of interleaved audio/video samples (optionally encrypted,
//! with the key arriving late), an optional mid-stream seek and end of
//! stream. Prints the final `PlayerInfo` and every outbound notification as
//! JSON lines on stdout.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use playcore::sim::{SimulatedPipeline, StaticDrmGate};
use playcore::{
    AudioCodec, ChannelCallbacks, Codecs, EncodedSample, EncryptionInfo, KeyId, MediaTime, Player, PlayerConfig,
    PlayerRegistry, SessionId, StreamType, VideoCodec,
};
use playcore_common::config::LoggingConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for playcore-sim
#[derive(Parser, Debug)]
#[command(name = "playcore-sim")]
#[command(about = "Drive the playcore engine against a simulated pipeline")]
#[command(version)]
struct Args {
    /// Config file (overrides PLAYCORE_CONFIG and platform locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Samples to write per stream
    #[arg(short, long, default_value = "100")]
    samples: u32,

    /// Sample duration in milliseconds
    #[arg(long, default_value = "20")]
    frame_ms: u64,

    /// Encrypt video samples; the key is granted after --key-delay-ms
    #[arg(long)]
    encrypted: bool,

    /// Delay before the content key becomes usable
    #[arg(long, default_value = "200")]
    key_delay_ms: u64,

    /// Seek to this position halfway through
    #[arg(long)]
    seek_to_ms: Option<u64>,

    /// Log level (overrides the config file; RUST_LOG wins over both)
    #[arg(long)]
    log_level: Option<String>,
}

const SIM_KEY: &str = "playcore-sim-key";

fn main() -> Result<()> {
    let args = Args::parse();

    let config = PlayerConfig::load(args.config.clone()).context("Failed to load configuration")?;
    init_tracing(&config.logging, args.log_level.as_deref())?;
    info!(?args, "Starting playback simulation");

    let pipeline = Arc::new(SimulatedPipeline::new());
    let drm = Arc::new(StaticDrmGate::new());
    let registry = Arc::new(PlayerRegistry::new());
    let (callbacks, events) = ChannelCallbacks::new();

    let player = Player::builder(Codecs::new(AudioCodec::Aac, VideoCodec::H264), pipeline.clone(), callbacks)
        .drm(drm.clone())
        .registry(registry)
        .config(config)
        .build()
        .context("Failed to create player")?;

    player.seek(MediaTime::ZERO, 1);
    run_scenario(&args, &player, &pipeline, &drm);

    // Let the control thread settle before taking the snapshot
    std::thread::sleep(Duration::from_millis(200));
    let snapshot = player.info();
    println!("{}", serde_json::to_string(&snapshot).context("Failed to serialize player info")?);

    drop(player);
    for event in events.try_iter() {
        println!("{}", serde_json::to_string(&event).context("Failed to serialize event")?);
    }

    info!("Simulation complete");
    Ok(())
}

fn run_scenario(args: &Args, player: &Player, pipeline: &SimulatedPipeline, drm: &StaticDrmGate) {
    let frame = Duration::from_millis(args.frame_ms);
    let key = KeyId::from(SIM_KEY);
    let mut key_granted = !args.encrypted;
    let mut position_ms = 0;

    for i in 0..args.samples {
        if let Some(seek_to) = args.seek_to_ms.filter(|_| i == args.samples / 2) {
            position_ms = seek_to;
            pipeline.set_position(MediaTime::from_millis(seek_to as i64));
            player.seek(MediaTime::from_millis(seek_to as i64), 2);
        }

        let timestamp = MediaTime::from_millis(position_ms as i64);
        player.write_sample(EncodedSample::clear(StreamType::Audio, timestamp, vec![0xa0; 64]));

        let video = if args.encrypted {
            let payload = StaticDrmGate::encrypt(&[0x0f; 256]);
            EncodedSample::encrypted(
                StreamType::Video,
                timestamp,
                payload,
                EncryptionInfo::new(key.clone(), vec![i as u8; 8]),
            )
        } else {
            EncodedSample::clear(StreamType::Video, timestamp, vec![0x0f; 256])
        };
        player.write_sample(video.with_video_info(1280, 720));

        if !key_granted && u64::from(i) * args.frame_ms >= args.key_delay_ms {
            drm.grant_key(key.clone(), SessionId::new("sim-session"));
            key_granted = true;
        }

        position_ms += args.frame_ms;
        pipeline.advance(frame / 2);
        std::thread::sleep(frame / 4);
    }

    if !key_granted {
        drm.grant_key(key, SessionId::new("sim-session"));
    }
    player.mark_end_of_stream(StreamType::Audio);
    player.mark_end_of_stream(StreamType::Video);
}

fn init_tracing(logging: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let level = level_override.unwrap_or(&logging.level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("playcore={level},playcore_common={level}")));

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

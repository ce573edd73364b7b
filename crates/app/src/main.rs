use std::path::{Path, PathBuf};
use std::time::Duration;

use beatline_core::{
    AppConfig, BeatMap, BeatMapCompiler, HttpFetcher, KiraBackend, PlaybackEngine, Scheduler,
    VolumeControls, VolumeStore,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Time the autoplay loop keeps running after the last trigger.
const TAIL_MS: i64 = 2_000;

#[tokio::main(flavor = "current_thread")]
async fn main() -> beatline_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Compile { map, lanes, pretty } => {
            run_compile(&map, lanes.unwrap_or(config.engine.lane_count), pretty)
        }
        Commands::Play { map } => run_play(&map, &config).await,
    }
}

fn run_compile(map: &Path, lanes: usize, pretty: bool) -> beatline_core::Result<()> {
    tracing::info!(?map, lanes, "compiling beat map");

    let beat_map = BeatMap::load(map)?;
    let events = BeatMapCompiler::new(lanes).compile(&beat_map)?;
    let json = if pretty {
        serde_json::to_string_pretty(&events)?
    } else {
        serde_json::to_string(&events)?
    };
    println!("{json}");
    Ok(())
}

async fn run_play(map: &Path, config: &AppConfig) -> beatline_core::Result<()> {
    let beat_map = BeatMap::load(map)?;
    let events = BeatMapCompiler::new(config.engine.lane_count).compile(&beat_map)?;
    let mut scheduler = Scheduler::from_events(&events, beat_map.start_offset.unwrap_or(0.0));
    tracing::info!(
        name = %beat_map.name,
        composer = %beat_map.composer,
        mapper = %beat_map.mapper,
        triggers = scheduler.len(),
        "starting autoplay"
    );

    let base_dir = map.parent().map(Path::to_path_buf).unwrap_or_default();
    let fetcher = HttpFetcher::new().with_base_dir(base_dir);
    let mut engine = PlaybackEngine::new(beat_map, KiraBackend, fetcher);
    engine.initialize_audio().await?;

    let master = VolumeStore::new(config.volume.master);
    let music = VolumeStore::new(config.volume.music);
    let sound = VolumeStore::new(config.volume.sound);
    engine.connect_volume_control(VolumeControls {
        master: &master,
        music: &music,
        sound: &sound,
    })?;

    engine.start_playing()?;
    let end_ms = scheduler.last_time().unwrap_or(0) + TAIL_MS;
    let tick = Duration::from_millis(config.engine.tick_ms.max(1));

    let result = loop {
        let now_ms = (engine.current_time() * 1000.0) as i64;
        let mut failed = None;
        for trigger in scheduler.due(now_ms) {
            if let Err(e) = engine.play_sound_with_volume(trigger.type_index, trigger.volume) {
                failed = Some(e);
                break;
            }
        }
        if let Some(e) = failed {
            break Err(e);
        }
        if scheduler.is_finished() && now_ms >= end_ms {
            break Ok(());
        }
        tokio::time::sleep(tick).await;
    };

    engine.dispose_resources();
    tracing::info!("autoplay finished");
    result
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Rhythm game beat-map compiler and player", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a beat map and print its timeline as JSON.
    Compile {
        /// Path to the beat map JSON file.
        map: PathBuf,
        /// Override the configured lane count.
        #[arg(short, long)]
        lanes: Option<usize>,
        /// Pretty-print the output.
        #[arg(long)]
        pretty: bool,
    },
    /// Play the track and auto-trigger every note on time.
    Play {
        /// Path to the beat map JSON file.
        map: PathBuf,
    },
}

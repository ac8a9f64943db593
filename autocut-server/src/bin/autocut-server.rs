use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::{env, fs};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use autocut_analyzers::{
    AnalyzerRegistry, CentroidTracker, DisabledDetector, DisabledSceneDescriber,
    EnergySpeechRecognizer, HttpDetector, HttpDetectorConfig, HttpSceneDescriber,
    HttpSceneDescriberConfig, HttpSpeechRecognizer, HttpSpeechRecognizerConfig, ObservationCache,
};
use autocut_analyzers::traits::{Detector, SceneDescriber, SpeechRecognizer};
use autocut_director::ProgramShared;
use autocut_events::Bus;
use autocut_ingress::{Ingress, IngressConfig, MediaRoom, SimRoom};
use autocut_narrate::{HttpTtsConfig, HttpTtsEngine, SilenceTts, TtsEngine};
use autocut_server::{start_autocut, AppState, Cli, Server};

fn get_base_dir(custom_path: &Option<String>) -> anyhow::Result<PathBuf> {
    let default_path = dirs::home_dir()
        .context("failed to get home directory")?
        .join(".autocut");
    let base_dir = custom_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or(default_path);
    fs::create_dir_all(base_dir.join("narration"))?;
    Ok(base_dir)
}

fn setup_logging(base_dir: &PathBuf, cli: &Cli) -> anyhow::Result<WorkerGuard> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("autocut")
        .filename_suffix("log")
        .max_log_files(5)
        .build(base_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("info".parse().unwrap())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("tower_http=warn".parse().unwrap());

    let env_filter = env::var("AUTOCUT_LOG")
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .fold(env_filter, |filter, directive| match directive.parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(e) => {
                eprintln!("warning: invalid log directive '{}': {}", directive, e);
                filter
            }
        });

    let env_filter = if cli.debug {
        env_filter.add_directive("autocut=debug".parse().unwrap())
    } else {
        env_filter
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let base_dir = get_base_dir(&cli.data_dir)?;
    let _log_guard = setup_logging(&base_dir, &cli)?;

    // Invalid configuration is fatal before anything starts.
    let cfg = cli.director_config()?;
    info!("autocut starting, data dir {:?}", base_dir);

    let bus = Arc::new(Bus::new());
    let cache = ObservationCache::new();
    let shared = ProgramShared::new();

    let ingress = Ingress::new(IngressConfig {
        max_cameras: cfg.max_cameras,
        ..Default::default()
    });

    let detector: Arc<dyn Detector> = match &cli.detector_endpoint {
        Some(endpoint) => Arc::new(HttpDetector::new(HttpDetectorConfig {
            endpoint: endpoint.clone(),
            ..Default::default()
        })),
        None => Arc::new(DisabledDetector),
    };
    let scene: Arc<dyn SceneDescriber> = match &cli.scene_endpoint {
        Some(endpoint) => Arc::new(HttpSceneDescriber::new(HttpSceneDescriberConfig {
            endpoint: endpoint.clone(),
            jpeg_quality: 80,
        })),
        None => Arc::new(DisabledSceneDescriber),
    };
    let speech: Arc<dyn SpeechRecognizer> = match &cli.asr_endpoint {
        Some(endpoint) => Arc::new(HttpSpeechRecognizer::new(
            HttpSpeechRecognizerConfig {
                endpoint: endpoint.clone(),
                vad_floor_db: -45.0,
            },
            &cfg.keywords,
        )),
        None => Arc::new(EnergySpeechRecognizer::default()),
    };
    let (registry, faults) = AnalyzerRegistry::new(
        detector,
        scene,
        speech,
        Box::new(CentroidTracker::default()),
    );

    let tts: Arc<dyn TtsEngine> = match &cli.tts_endpoint {
        Some(endpoint) => Arc::new(HttpTtsEngine::new(HttpTtsConfig {
            endpoint: endpoint.clone(),
            length_scale: 1.0,
        })),
        None => Arc::new(SilenceTts::default()),
    };

    // Connect the room. Without an SFU transport on the build, the synthetic
    // room keeps the whole pipeline exercisable end to end.
    let (room, room_url): (Arc<dyn MediaRoom>, String) = match (&cli.room_url, cli.sim) {
        (Some(url), false) => {
            anyhow::bail!(
                "no SFU transport is built in for {}; run with --sim or wire a MediaRoom",
                url
            );
        }
        _ => {
            if cli.room_url.is_some() {
                warn!("--sim overrides --room-url");
            }
            (
                SimRoom::new(cli.sim_cameras, cfg.analysis_rate_hz),
                "sim://local".to_string(),
            )
        }
    };
    ingress.start(room, &room_url, &cli.room_token).await?;

    let handles = start_autocut(
        &cfg,
        Arc::clone(&ingress),
        registry,
        faults,
        tts,
        Arc::clone(&bus),
        cache,
        Arc::clone(&shared),
        Some(base_dir.join("narration")),
    )
    .await?;

    let state = Arc::new(AppState {
        shared,
        ingress,
        bus,
        config: cfg,
        app_start_time: Utc::now(),
    });
    let addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    let server = Server::new(state, addr);
    let server_task = tokio::spawn(server.start());

    signal::ctrl_c().await?;
    info!("interrupt received");
    handles.shutdown().await;
    server_task.abort();
    Ok(())
}

pub mod algorithm;
pub mod capture;
pub mod commands;
pub mod models;
pub mod telemetry;

use std::path::PathBuf;

use capture::replay::{load_session, replay_session, resolve_session_file, ReplayError, ReplaySummary};
use commands::sink::{CommandSink, StdoutSink};
use models::config::ControlConfig;

pub use algorithm::gaze_engine::{FrameOutcome, GazeEngine};

const CONFIG_ENV: &str = "GAZECONTROL_CONFIG";

/// Replays a recorded session: `gazecontrol <session.json|dir> [config.json]`.
///
/// The config path falls back to `GAZECONTROL_CONFIG`, then to defaults.
pub fn run() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(session_arg) = args.get(1) else {
        log::error!("usage: gazecontrol <session.json | session-dir> [config.json]");
        std::process::exit(2);
    };
    let config_path = args
        .get(2)
        .cloned()
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from);

    match replay_from_paths(session_arg, config_path) {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                log::error!("Failed to serialize replay summary: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn replay_from_paths(
    session_arg: &str,
    config_path: Option<PathBuf>,
) -> Result<ReplaySummary, ReplayError> {
    let config = match config_path {
        Some(path) => {
            log::info!("config: path={}", path.display());
            ControlConfig::from_file(&path)?
        }
        None => ControlConfig::default(),
    };

    let session = load_session(&resolve_session_file(session_arg))?;
    let sink: Option<Box<dyn CommandSink>> = if config.gate.simulation_mode {
        None
    } else {
        Some(Box::new(StdoutSink))
    };
    replay_session(&config, &session, sink)
}

//! Offline replay of recorded gaze sessions through the engine.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::algorithm::gaze_engine::GazeEngine;
use crate::commands::sink::CommandSink;
use crate::models::config::{ConfigError, ControlConfig};
use crate::models::events::{CommandEvent, SessionFile, SCHEMA_VERSION};
use crate::telemetry::command_log::CommandLogEntry;
use crate::telemetry::performance::PerformanceStats;

const SESSION_FILE_NAME: &str = "session.json";

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Failed to read session file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse session file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(
        "Unsupported session schemaVersion: expected {expected}, got {0}",
        expected = SCHEMA_VERSION
    )]
    UnsupportedSchema(u32),
    #[error("Frame {index} goes back in time ({t} < {previous})")]
    NonMonotonic { index: usize, t: f64, previous: f64 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub session_id: String,
    pub frames: usize,
    pub detected_frames: usize,
    pub emitted: Vec<CommandEvent>,
    pub command_log: Vec<CommandLogEntry>,
    pub performance: PerformanceStats,
}

/// Accepts either a session file or a directory containing `session.json`.
pub fn resolve_session_file(input: &str) -> PathBuf {
    let path = PathBuf::from(input.trim());
    if path.is_dir() {
        path.join(SESSION_FILE_NAME)
    } else {
        path
    }
}

pub fn load_session(path: &Path) -> Result<SessionFile, ReplayError> {
    log::info!("load_session: path={}", path.display());

    let raw = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let session: SessionFile = serde_json::from_str(&raw).map_err(|source| ReplayError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    if session.schema_version != SCHEMA_VERSION {
        return Err(ReplayError::UnsupportedSchema(session.schema_version));
    }

    Ok(session)
}

/// Runs every frame through a fresh engine. The session's canvas replaces the
/// configured one so zone thresholds apply to the recorded coordinates.
pub fn replay_session(
    config: &ControlConfig,
    session: &SessionFile,
    sink: Option<Box<dyn CommandSink>>,
) -> Result<ReplaySummary, ReplayError> {
    if let Some((index, pair)) = session
        .frames
        .windows(2)
        .enumerate()
        .find(|(_, pair)| pair[1].t < pair[0].t)
    {
        return Err(ReplayError::NonMonotonic {
            index: index + 1,
            t: pair[1].t,
            previous: pair[0].t,
        });
    }

    let mut config = config.clone();
    config.direction.canvas_width = session.canvas_width;
    config.direction.canvas_height = session.canvas_height;

    let mut engine = GazeEngine::new(&config)?;
    if let Some(sink) = sink {
        engine = engine.with_sink(sink);
    }

    let mut emitted = Vec::new();
    for frame in &session.frames {
        let outcome = engine.process_frame(frame);
        emitted.extend(outcome.emitted);
    }

    let summary = ReplaySummary {
        session_id: session.session_id.clone(),
        frames: session.frames.len(),
        detected_frames: session
            .frames
            .iter()
            .filter(|frame| frame.detection.is_some())
            .count(),
        emitted,
        command_log: engine.command_log().entries().cloned().collect(),
        performance: engine.performance_stats(),
    };
    log::info!(
        "replayed {}: {} frames, {} command(s)",
        summary.session_id,
        summary.frames,
        summary.emitted.len()
    );
    Ok(summary)
}

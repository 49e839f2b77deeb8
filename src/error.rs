use thiserror::Error;

use crate::target::TargetKind;

#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Could not parse {field}: unbalanced quoting in `{input}`")]
    ArgumentParse { field: &'static str, input: String },

    #[error("Failed to launch `{program}`: {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Preset not found: {0}")]
    PresetNotFound(String),

    #[error("Preset name `{0}` exists for several targets, pass --kind to choose one")]
    AmbiguousPreset(String),

    #[error("Invalid preset name: {0:?}")]
    InvalidPresetName(String),

    #[error("Preset `{name}` already exists for {kind} targets")]
    PresetExists { name: String, kind: TargetKind },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LauncherError>;

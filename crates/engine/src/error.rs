use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cue sheet not found at {}", .0.display())]
    CueSheetMissing(PathBuf),

    #[error("no version found for {0}")]
    VersionNotFound(String),

    #[error("clip map is empty; populate it before selecting")]
    EmptyClipMap,

    #[error("malformed document: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong in the pet runtime. None of these are fatal:
/// each one has a local recovery (fallback image, default breed, fallback
/// bounds, z-order retry) and at most produces a log line.
#[derive(Debug, Error)]
pub enum PetError {
    #[error("sprite asset missing: {}", .0.display())]
    AssetMissing(PathBuf),

    #[error("preferences at {} unreadable: {reason}", .path.display())]
    PreferenceCorrupt { path: PathBuf, reason: String },

    #[error("platform call `{call}` failed: {reason}")]
    PlatformCallFailed { call: &'static str, reason: String },

    #[error("timed task `{task}` failed: {reason}")]
    TimedTaskFailure { task: String, reason: String },

    #[error("overlay window is gone")]
    WindowGone,

    #[error("config file {} is invalid: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PetError {
    pub fn platform(call: &'static str, reason: impl ToString) -> Self {
        Self::PlatformCallFailed {
            call,
            reason: reason.to_string(),
        }
    }
}

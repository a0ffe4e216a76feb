use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the usage library
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("no Claude data directories found, searched: {}", join_paths(.0))]
    NoDataDirectories(Vec<PathBuf>),

    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error("failed to build loader thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("failed to fetch pricing data: {0}")]
    PricingFetch(#[from] reqwest::Error),
}

impl UsageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UsageError::Io {
            path: path.into(),
            source,
        }
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, UsageError>;

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::compiler::Collision;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Malformed roster at row {row}: {reason}")]
    SourceFormat { row: usize, reason: String },

    #[error("Failed to read roster {location}: {source}")]
    SourceRead {
        location: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to fetch roster: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Roster mapping I/O failed for {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed roster mapping: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Another compilation holds {}", .0.display())]
    Busy(PathBuf),

    #[error("{} roster keys collided", .0.len())]
    Collisions(Vec<Collision>),
}

impl RosterError {
    pub(crate) fn persistence(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| RosterError::Persistence { path, source }
    }

    pub(crate) fn source_format(row: usize, reason: impl Into<String>) -> Self {
        RosterError::SourceFormat {
            row,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = RosterError> = std::result::Result<T, E>;

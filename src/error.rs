// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading capture data or computing joint angles.
///
/// Each class is a distinct variant so callers can tell a data-format
/// problem from a bad marker or joint request. None of these are ever
/// converted into NaN or placeholder values.
#[derive(Debug, Error)]
pub enum MocapError {
    #[error("{path}: malformed header: {reason}")]
    MalformedHeader { path: PathBuf, reason: String },

    #[error("{path}: marker '{marker}' not found in capture")]
    UnknownMarker { path: PathBuf, marker: String },

    #[error("unknown joint '{joint}' (available: {available})")]
    UnknownJoint { joint: String, available: String },

    #[error("{path}: metric '{metric}' not found")]
    UnknownMetric { path: PathBuf, metric: String },

    #[error("{path}: degenerate geometry for joint '{joint}' at frame {frame}: coincident markers give a zero-length vector")]
    DegenerateGeometry {
        path: PathBuf,
        joint: String,
        frame: usize,
    },

    #[error("{path}:{line}: {reason}")]
    BadRow {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, MocapError>;

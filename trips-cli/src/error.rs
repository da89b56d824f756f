//! Error types emitted by the trips CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;
use trips_core::{BoundingBoxParseError, PointColumnParseError, TripStoreError};
use trips_data::LoadTripsError;

/// Errors emitted by the trips CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// The bounding box literal could not be parsed.
    #[error("invalid --bbox {value:?}: {source}")]
    InvalidBoundingBox {
        value: String,
        #[source]
        source: BoundingBoxParseError,
    },
    /// The point column name is not recognised.
    #[error("invalid --column: {0}")]
    InvalidColumn(#[from] PointColumnParseError),
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The directory holding the store file could not be created.
    #[error("failed to create directory for store {path:?}: {source}")]
    CreateStoreDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Opening, initialising or querying the store failed.
    #[error(transparent)]
    Store(#[from] TripStoreError),
    /// Loading the CSV file failed.
    #[error(transparent)]
    Load(#[from] LoadTripsError),
    /// Serialising aggregate rows failed.
    #[error("failed to serialise weekly averages: {0}")]
    SerialiseResults(#[source] serde_json::Error),
    /// Writing to stdout failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}

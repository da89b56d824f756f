//! Streaming CSV loader.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use thiserror::Error;
use trips_core::{TripSink, TripStore, TripStoreError};

mod progress;
mod record;
mod source;

pub use progress::{LoadProgress, LogProgress, ProgressCadence, ProgressUpdate};
pub use record::{CsvTripRow, RowError};

use record::REQUIRED_COLUMNS;

/// Outcome of a completed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    /// Data rows counted before loading (file lines minus the header).
    pub rows_expected: u64,
    /// Rows written to the sink.
    pub rows_inserted: u64,
}

/// Errors raised while loading a trips CSV.
#[derive(Debug, Error)]
pub enum LoadTripsError {
    /// The CSV file could not be opened.
    #[error("failed to open trips CSV {path}: {source}")]
    Open {
        /// Path of the CSV file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Counting the rows of the CSV file failed.
    #[error("failed to count rows in {path}: {source}")]
    CountRows {
        /// Path of the CSV file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The header line could not be read.
    #[error("failed to read header of {path}: {source}")]
    ReadHeader {
        /// Path of the CSV file.
        path: Utf8PathBuf,
        /// Source error returned by `csv`.
        #[source]
        source: csv::Error,
    },
    /// A required column is absent from the header.
    #[error("{path} has no {column} column")]
    MissingColumn {
        /// Path of the CSV file.
        path: Utf8PathBuf,
        /// Name of the missing column.
        column: &'static str,
    },
    /// A data row could not be read or decoded.
    #[error("failed to read row {row}: {source}")]
    ReadRow {
        /// 1-based data row number.
        row: u64,
        /// Source error returned by `csv`.
        #[source]
        source: csv::Error,
    },
    /// A data row held an invalid value.
    #[error("invalid row {row}: {source}")]
    InvalidRow {
        /// 1-based data row number.
        row: u64,
        /// Validation failure.
        #[source]
        source: RowError,
    },
    /// Writing a row to the store failed.
    #[error("failed to insert row {row}: {source}")]
    InsertRow {
        /// 1-based data row number.
        row: u64,
        /// Source error returned by the store.
        #[source]
        source: TripStoreError,
    },
    /// Preparing or committing the store for the load failed.
    #[error(transparent)]
    Store(#[from] TripStoreError),
}

/// Count data rows in `path`: its line count minus the header line.
pub fn count_data_rows(path: &Utf8Path) -> Result<u64, LoadTripsError> {
    let file = source::open_file(path).map_err(|source| LoadTripsError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let lines = source::count_lines(file).map_err(|source| LoadTripsError::CountRows {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(lines.saturating_sub(1))
}

/// Stream the trips in `path` into `sink`, reporting progress to `progress`.
///
/// Rows are inserted in file order. The first malformed row stops the load
/// with an error naming its 1-based position; rows already handed to the
/// sink stay there. No transaction is opened here.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use trips_core::TripRecord;
/// use trips_data::{LogProgress, load_trips};
///
/// let mut trips: Vec<TripRecord> = Vec::new();
/// let summary = load_trips(Utf8Path::new("trips.csv"), &mut trips, &mut LogProgress)?;
/// assert_eq!(summary.rows_inserted, trips.len() as u64);
/// # Ok::<(), trips_data::LoadTripsError>(())
/// ```
pub fn load_trips<S, P>(
    path: &Utf8Path,
    sink: &mut S,
    progress: &mut P,
) -> Result<LoadSummary, LoadTripsError>
where
    S: TripSink + ?Sized,
    P: LoadProgress + ?Sized,
{
    let total = count_data_rows(path)?;
    info!("loading {total} trips from {path}");

    let file = source::open_file(path).map_err(|source| LoadTripsError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new().from_reader(file);
    check_headers(path, &mut reader)?;

    let cadence = ProgressCadence::new(total);
    let mut inserted = 0_u64;
    for (row, result) in (1_u64..).zip(reader.deserialize::<CsvTripRow>()) {
        let record = result.map_err(|source| LoadTripsError::ReadRow { row, source })?;
        let trip = record
            .into_trip()
            .map_err(|source| LoadTripsError::InvalidRow { row, source })?;
        if cadence.is_due(row) {
            progress.on_progress(&ProgressUpdate { index: row, total });
        }
        sink.insert_trip(&trip)
            .map_err(|source| LoadTripsError::InsertRow { row, source })?;
        inserted += 1;
    }

    info!("loaded {inserted} trips from {path}");
    Ok(LoadSummary {
        rows_expected: total,
        rows_inserted: inserted,
    })
}

/// Load `path` into `store` inside one load session and commit it.
///
/// Fails with [`TripStoreError::MissingSchema`] when the store has not been
/// initialised. On a row error the rows before it are still committed.
pub fn load_trips_file<P>(
    store: &mut TripStore,
    path: &Utf8Path,
    progress: &mut P,
) -> Result<LoadSummary, LoadTripsError>
where
    P: LoadProgress + ?Sized,
{
    store.require_schema()?;
    let mut session = store.begin_load()?;
    let summary = load_trips(path, &mut session, progress)?;
    session.commit()?;
    Ok(summary)
}

fn check_headers<R: io::Read>(
    path: &Utf8Path,
    reader: &mut csv::Reader<R>,
) -> Result<(), LoadTripsError> {
    let headers = reader
        .headers()
        .map_err(|source| LoadTripsError::ReadHeader {
            path: path.to_path_buf(),
            source,
        })?;
    let has = |name: &str| headers.iter().any(|header| header == name);
    for (column, alias) in REQUIRED_COLUMNS {
        if !has(column) && !alias.is_some_and(has) {
            return Err(LoadTripsError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }
    Ok(())
}

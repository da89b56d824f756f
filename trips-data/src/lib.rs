//! CSV ingestion for the trips engine.
//!
//! Responsibilities:
//! - Stream trip rows from CSV files into a [`trips_core::TripSink`].
//! - Count rows up front and report coarse progress through an observer.
//!
//! Boundaries:
//! - Storage, schema and aggregation live in `trips-core`.
//! - Transactions are owned by the caller; [`load_trips_file`] is the
//!   convenience that opens and commits one around a load.

#![forbid(unsafe_code)]

pub mod ingest;

pub use ingest::{
    CsvTripRow, LoadProgress, LoadSummary, LoadTripsError, LogProgress, ProgressCadence,
    ProgressUpdate, RowError, count_data_rows, load_trips, load_trips_file,
};

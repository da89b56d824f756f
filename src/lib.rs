//! Facade crate for the trips engine.
//!
//! Re-exports the store and aggregate types from `trips-core` together with
//! the CSV loader from `trips-data`, so embedders need a single dependency.

#![forbid(unsafe_code)]

pub use trips_core::{
    AggregateFilter, BoundingBox, BoundingBoxParseError, DEFAULT_STORE_FILE, LoadSession,
    POINT_SRID, PointColumn, PointColumnParseError, RegionWeeklyAverage, TripRecord, TripSink,
    TripStore, TripStoreError, WeekBucket, WeekBucketError, WeeklyAverageQuery,
};
pub use trips_data::{
    LoadProgress, LoadSummary, LoadTripsError, LogProgress, ProgressUpdate, load_trips,
    load_trips_file,
};

//! Core domain types for the trips engine.
//!
//! The crate owns the trip model, the geometry encoding used by the store,
//! and the SQLite-backed [`TripStore`] that initialises the schema and answers
//! the weekly-average aggregate. Constructors and parsers return `Result` so
//! malformed input is rejected before it reaches the database.

#![forbid(unsafe_code)]

use std::{fmt, str::FromStr};

use geo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod bbox;
pub mod geometry;
pub mod store;
mod week;

pub use bbox::{BoundingBox, BoundingBoxParseError};
pub use geometry::{GeometryError, POINT_SRID, SridGeometry};
pub use store::{
    DEFAULT_STORE_FILE, LoadSession, TripSink, TripStore, TripStoreError, WeeklyAverageQuery,
};
pub use week::{WeekBucket, WeekBucketError};

/// A validated trip ready to be inserted into the store.
///
/// Points use WGS84 coordinates (`x = longitude`, `y = latitude`) and are
/// tagged with [`POINT_SRID`] when persisted.
///
/// # Examples
///
/// ```
/// use geo::Point;
/// use trips_core::TripRecord;
///
/// let trip = TripRecord {
///     region: "Prague".into(),
///     point_origin: Point::new(14.49, 50.00),
///     point_dest: Point::new(14.43, 50.04),
///     datetime: "2018-05-28 09:03:40".into(),
///     datasource: Some("funny_car".into()),
/// };
/// assert_eq!(trip.datasource.as_deref(), Some("funny_car"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    /// Free-text region label, matched case-sensitively.
    pub region: String,
    /// Where the trip started.
    pub point_origin: Point<f64>,
    /// Where the trip ended.
    pub point_dest: Point<f64>,
    /// Timestamp text, stored verbatim.
    pub datetime: String,
    /// Optional provenance label.
    pub datasource: Option<String>,
}

/// Geometry column tested by the bounding-box filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointColumn {
    /// The `point_origin` column.
    #[default]
    #[serde(rename = "point_origin")]
    Origin,
    /// The `point_dest` column.
    #[serde(rename = "point_dest")]
    Dest,
}

impl PointColumn {
    /// Both geometry columns, origin first.
    pub const ALL: [Self; 2] = [Self::Origin, Self::Dest];

    /// Column name in the `trips` table.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Origin => "point_origin",
            Self::Dest => "point_dest",
        }
    }

    /// Name of the R*Tree table indexing this column.
    #[must_use]
    pub const fn index_table(self) -> &'static str {
        match self {
            Self::Origin => "idx_trips_point_origin",
            Self::Dest => "idx_trips_point_dest",
        }
    }
}

impl fmt::Display for PointColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a column name is neither `point_origin` nor `point_dest`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown point column {found:?} (expected point_origin or point_dest)")]
pub struct PointColumnParseError {
    /// The rejected input.
    pub found: String,
}

impl FromStr for PointColumn {
    type Err = PointColumnParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|column| column.as_str() == value)
            .ok_or_else(|| PointColumnParseError {
                found: value.to_owned(),
            })
    }
}

/// Filters applied to the weekly-average aggregate.
///
/// Both filters are optional; when both are present a trip must satisfy
/// each of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateFilter {
    /// Exact, case-sensitive region match.
    pub region: Option<String>,
    /// Rectangle the selected point column must fall inside.
    pub bbox: Option<BoundingBox>,
    /// Column tested against `bbox`.
    pub column: PointColumn,
}

impl AggregateFilter {
    /// Filter matching every trip.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict the aggregate to a single region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Restrict the aggregate to trips whose `column` point lies in `bbox`.
    #[must_use]
    pub const fn with_bbox(mut self, bbox: BoundingBox, column: PointColumn) -> Self {
        self.bbox = Some(bbox);
        self.column = column;
        self
    }
}

/// Average number of trips per week for one region.
///
/// The average is an integer: the trip count divided by the number of
/// distinct week buckets, rounding down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionWeeklyAverage {
    /// Region label.
    pub region: String,
    /// Trips divided by distinct weeks, floored.
    pub avg_trips_per_week: i64,
}

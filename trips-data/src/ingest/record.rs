//! CSV row shape and its conversion into a [`TripRecord`].

use serde::Deserialize;
use thiserror::Error;
use trips_core::{GeometryError, TripRecord, WeekBucket, WeekBucketError, geometry};

/// Column names a trips CSV must provide, with the alternative header each
/// one may appear under.
pub(super) const REQUIRED_COLUMNS: [(&str, Option<&str>); 4] = [
    ("region", None),
    ("point_origin", Some("origin_coord")),
    ("point_dest", Some("destination_coord")),
    ("datetime", None),
];

/// One raw CSV row, deserialised by header name.
///
/// Coordinates are WKT `POINT` text; `origin_coord` and `destination_coord`
/// are accepted in place of `point_origin` and `point_dest`. An empty or
/// missing `datasource` becomes `None`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CsvTripRow {
    /// Region label.
    pub region: String,
    /// Origin point as WKT.
    #[serde(alias = "origin_coord")]
    pub point_origin: String,
    /// Destination point as WKT.
    #[serde(alias = "destination_coord")]
    pub point_dest: String,
    /// Timestamp text.
    pub datetime: String,
    /// Provenance label.
    #[serde(default)]
    pub datasource: Option<String>,
}

impl CsvTripRow {
    /// Validate the row and convert it into a [`TripRecord`].
    pub fn into_trip(self) -> Result<TripRecord, RowError> {
        if self.region.is_empty() {
            return Err(RowError::EmptyField { field: "region" });
        }
        let point_origin =
            geometry::parse_point_wkt(&self.point_origin).map_err(|source| RowError::Point {
                field: "point_origin",
                source,
            })?;
        let point_dest =
            geometry::parse_point_wkt(&self.point_dest).map_err(|source| RowError::Point {
                field: "point_dest",
                source,
            })?;
        WeekBucket::from_timestamp(&self.datetime)
            .map_err(|source| RowError::Datetime { source })?;
        Ok(TripRecord {
            region: self.region,
            point_origin,
            point_dest,
            datetime: self.datetime,
            datasource: self.datasource.filter(|value| !value.is_empty()),
        })
    }
}

/// Reasons a well-formed CSV row is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowError {
    /// A required field was empty.
    #[error("field {field} is empty")]
    EmptyField {
        /// Column name.
        field: &'static str,
    },
    /// A coordinate column did not hold a finite WKT point.
    #[error("field {field} is not a WKT point: {source}")]
    Point {
        /// Column name.
        field: &'static str,
        /// Geometry parser error.
        #[source]
        source: GeometryError,
    },
    /// The timestamp could not be bucketed into a week.
    #[error("field datetime is invalid: {source}")]
    Datetime {
        /// Timestamp parser error.
        #[source]
        source: WeekBucketError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;
    use rstest::{fixture, rstest};

    #[fixture]
    fn row() -> CsvTripRow {
        CsvTripRow {
            region: "Prague".into(),
            point_origin: "POINT (14.4973794438195 50.00136875782316)".into(),
            point_dest: "POINT (14.43109483523328 50.04052930943246)".into(),
            datetime: "2018-05-28 09:03:40".into(),
            datasource: Some("funny_car".into()),
        }
    }

    #[rstest]
    fn converts_valid_row(row: CsvTripRow) {
        let trip = row.into_trip().expect("row should convert");
        assert_eq!(trip.region, "Prague");
        assert_eq!(
            trip.point_origin,
            Point::new(14.497_379_443_819_5, 50.001_368_757_823_16)
        );
        assert_eq!(trip.datasource.as_deref(), Some("funny_car"));
    }

    #[rstest]
    fn empty_datasource_becomes_none(mut row: CsvTripRow) {
        row.datasource = Some(String::new());
        let trip = row.into_trip().expect("row should convert");
        assert_eq!(trip.datasource, None);
    }

    #[rstest]
    fn rejects_empty_region(mut row: CsvTripRow) {
        row.region = String::new();
        assert_eq!(
            row.into_trip(),
            Err(RowError::EmptyField { field: "region" })
        );
    }

    #[rstest]
    #[case("", "point_origin")]
    #[case("LINESTRING (0 0, 1 1)", "point_origin")]
    fn rejects_bad_origin(mut row: CsvTripRow, #[case] text: &str, #[case] field: &str) {
        row.point_origin = text.into();
        match row.into_trip() {
            Err(RowError::Point { field: found, .. }) => assert_eq!(found, field),
            other => panic!("expected point error, got {other:?}"),
        }
    }

    #[rstest]
    fn rejects_bad_destination(mut row: CsvTripRow) {
        row.point_dest = "POINT (x y)".into();
        assert!(matches!(
            row.into_trip(),
            Err(RowError::Point {
                field: "point_dest",
                ..
            })
        ));
    }

    #[rstest]
    #[case("28/05/2018")]
    #[case("2018-02-30 10:00:00")]
    #[case("2018-05-28 23:59:60")]
    fn rejects_unbucketable_datetime(mut row: CsvTripRow, #[case] datetime: &str) {
        row.datetime = datetime.into();
        assert!(matches!(row.into_trip(), Err(RowError::Datetime { .. })));
    }
}

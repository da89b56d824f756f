//! SQLite-backed trip store.
//!
//! [`TripStore`] owns the single connection used for a process run. Opening it
//! registers the geometry SQL functions; initialising it creates the spatial
//! schema. Loads go through a [`LoadSession`] and the weekly aggregate is
//! exposed as a lazily evaluated [`WeeklyAverageQuery`].

use std::path::{Path, PathBuf};

use log::{debug, info};
use rusqlite::{
    Connection, DropBehavior, Error as SqliteError, Statement, Transaction, params_from_iter,
    types::Value,
};
use thiserror::Error;

use crate::{AggregateFilter, POINT_SRID, RegionWeeklyAverage, SridGeometry, TripRecord};

mod aggregate;
mod functions;
mod schema;

/// Store file used when no path is configured.
pub const DEFAULT_STORE_FILE: &str = "trips.db";

const INSERT_TRIP_SQL: &str = "INSERT INTO trips \
    (id, region, point_origin, point_dest, datetime, datasource) \
    VALUES (NULL, ?1, ?2, ?3, ?4, ?5)";

/// Errors raised by [`TripStore`] and its sessions.
#[derive(Debug, Error)]
pub enum TripStoreError {
    /// Opening the SQLite database failed.
    #[error("failed to open trip store at {path:?}: {source}")]
    Open {
        /// Location of the store file.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// The geometry functions could not be registered on the connection.
    #[error("failed to enable geometry functions: {source}")]
    RegisterFunctions {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A schema creation step failed.
    #[error("failed to initialise trip store schema at step '{step}': {source}")]
    Schema {
        /// Name of the failing step.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// The store has not been initialised.
    #[error("trip store {path:?} has no trips schema; run with --init first")]
    MissingSchema {
        /// Location of the store file.
        path: PathBuf,
    },
    /// Beginning or committing a load transaction failed.
    #[error("failed to {operation} load transaction: {source}")]
    Transaction {
        /// Either `begin` or `commit`.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Writing a trip row failed.
    #[error("failed to insert trip: {source}")]
    InsertTrip {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Preparing or running the aggregate query failed.
    #[error("weekly average query failed: {source}")]
    Query {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Reading store metadata failed.
    #[error("failed to inspect trip store: {source}")]
    Inspect {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// Destination for validated trips.
///
/// The loader writes through this trait so it can be exercised without a
/// database.
pub trait TripSink {
    /// Persist `trip` and return its assigned identifier.
    fn insert_trip(&mut self, trip: &TripRecord) -> Result<i64, TripStoreError>;
}

impl TripSink for Vec<TripRecord> {
    fn insert_trip(&mut self, trip: &TripRecord) -> Result<i64, TripStoreError> {
        self.push(trip.clone());
        Ok(i64::try_from(self.len()).unwrap_or(i64::MAX))
    }
}

/// Handle over an open trip store.
///
/// # Examples
///
/// ```
/// use geo::Point;
/// use trips_core::{AggregateFilter, TripRecord, TripSink, TripStore};
///
/// let mut store = TripStore::open_in_memory(true)?;
/// let mut session = store.begin_load()?;
/// session.insert_trip(&TripRecord {
///     region: "Prague".into(),
///     point_origin: Point::new(14.49, 50.00),
///     point_dest: Point::new(14.43, 50.04),
///     datetime: "2018-05-28 09:03:40".into(),
///     datasource: None,
/// })?;
/// session.commit()?;
///
/// let rows = store.average_weekly_trips(&AggregateFilter::all())?;
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].avg_trips_per_week, 1);
/// # Ok::<(), trips_core::TripStoreError>(())
/// ```
#[derive(Debug)]
pub struct TripStore {
    connection: Connection,
    path: PathBuf,
}

impl TripStore {
    /// Open the store at `path`, creating the file when absent.
    ///
    /// When `first_run` is set the schema is created; existing objects are
    /// left untouched.
    pub fn open(path: impl AsRef<Path>, first_run: bool) -> Result<Self, TripStoreError> {
        let path = path.as_ref().to_path_buf();
        let connection = Connection::open(&path).map_err(|source| TripStoreError::Open {
            path: path.clone(),
            source,
        })?;
        Self::from_connection(connection, path, first_run)
    }

    /// Open a private in-memory store.
    pub fn open_in_memory(first_run: bool) -> Result<Self, TripStoreError> {
        let path = PathBuf::from(":memory:");
        let connection = Connection::open_in_memory().map_err(|source| TripStoreError::Open {
            path: path.clone(),
            source,
        })?;
        Self::from_connection(connection, path, first_run)
    }

    fn from_connection(
        connection: Connection,
        path: PathBuf,
        first_run: bool,
    ) -> Result<Self, TripStoreError> {
        functions::register_geometry_functions(&connection)
            .map_err(|source| TripStoreError::RegisterFunctions { source })?;
        let mut store = Self { connection, path };
        if first_run {
            store.initialise()?;
        }
        Ok(store)
    }

    /// Location the store was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Underlying connection, for read-only inspection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Create the spatial metadata, the `trips` table, its point columns and
    /// their spatial indexes. Safe to call on an initialised store.
    pub fn initialise(&mut self) -> Result<(), TripStoreError> {
        schema::initialise_schema(&mut self.connection)?;
        info!(
            "initialised trip store schema at {} (SRID {POINT_SRID})",
            self.path.display()
        );
        Ok(())
    }

    /// Fail with [`TripStoreError::MissingSchema`] unless the store has been
    /// initialised.
    pub fn require_schema(&self) -> Result<(), TripStoreError> {
        let present = schema::schema_present(&self.connection)
            .map_err(|source| TripStoreError::Inspect { source })?;
        if present {
            Ok(())
        } else {
            Err(TripStoreError::MissingSchema {
                path: self.path.clone(),
            })
        }
    }

    /// Start a load. Rows written through the session are committed when it
    /// is dropped, including on error paths.
    pub fn begin_load(&mut self) -> Result<LoadSession<'_>, TripStoreError> {
        let mut transaction =
            self.connection
                .transaction()
                .map_err(|source| TripStoreError::Transaction {
                    operation: "begin",
                    source,
                })?;
        transaction.set_drop_behavior(DropBehavior::Commit);
        Ok(LoadSession { transaction })
    }

    /// Number of stored trips.
    pub fn trip_count(&self) -> Result<i64, TripStoreError> {
        self.require_schema()?;
        self.connection
            .query_row("SELECT COUNT(*) FROM trips", [], |row| row.get(0))
            .map_err(|source| TripStoreError::Query { source })
    }

    /// Prepare the weekly-average aggregate for `filter` without running it.
    pub fn prepare_average_weekly_trips(
        &self,
        filter: &AggregateFilter,
    ) -> Result<WeeklyAverageQuery<'_>, TripStoreError> {
        self.require_schema()?;
        let aggregate::AggregateSql { sql, params } = aggregate::build_weekly_average(filter);
        debug!("weekly average query: {sql}");
        let statement = self
            .connection
            .prepare(&sql)
            .map_err(|source| TripStoreError::Query { source })?;
        Ok(WeeklyAverageQuery {
            statement,
            params,
            sql,
        })
    }

    /// Run the weekly-average aggregate and collect every row.
    pub fn average_weekly_trips(
        &self,
        filter: &AggregateFilter,
    ) -> Result<Vec<RegionWeeklyAverage>, TripStoreError> {
        let mut query = self.prepare_average_weekly_trips(filter)?;
        query.rows()?.collect()
    }
}

/// Open load transaction over a [`TripStore`].
///
/// Call [`LoadSession::commit`] after a successful load. Dropping the session
/// also commits, so rows written before a failure are kept.
#[derive(Debug)]
pub struct LoadSession<'store> {
    transaction: Transaction<'store>,
}

impl LoadSession<'_> {
    /// Commit every row written so far.
    pub fn commit(self) -> Result<(), TripStoreError> {
        self.transaction
            .commit()
            .map_err(|source| TripStoreError::Transaction {
                operation: "commit",
                source,
            })
    }
}

impl TripSink for LoadSession<'_> {
    fn insert_trip(&mut self, trip: &TripRecord) -> Result<i64, TripStoreError> {
        let origin = SridGeometry::point(trip.point_origin, POINT_SRID).encode();
        let dest = SridGeometry::point(trip.point_dest, POINT_SRID).encode();
        let mut statement = self
            .transaction
            .prepare_cached(INSERT_TRIP_SQL)
            .map_err(|source| TripStoreError::InsertTrip { source })?;
        statement
            .execute((
                &trip.region,
                origin,
                dest,
                &trip.datetime,
                trip.datasource.as_deref(),
            ))
            .map_err(|source| TripStoreError::InsertTrip { source })?;
        Ok(self.transaction.last_insert_rowid())
    }
}

/// Prepared weekly-average aggregate.
///
/// Rows are produced on demand by [`WeeklyAverageQuery::rows`], ordered by
/// region.
#[derive(Debug)]
pub struct WeeklyAverageQuery<'store> {
    statement: Statement<'store>,
    params: Vec<Value>,
    sql: String,
}

impl WeeklyAverageQuery<'_> {
    /// SQL text of the prepared statement.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Execute the statement and iterate over its rows.
    pub fn rows(
        &mut self,
    ) -> Result<impl Iterator<Item = Result<RegionWeeklyAverage, TripStoreError>> + '_, TripStoreError>
    {
        let rows = self
            .statement
            .query_map(params_from_iter(self.params.iter()), |row| {
                Ok(RegionWeeklyAverage {
                    region: row.get(0)?,
                    avg_trips_per_week: row.get(1)?,
                })
            })
            .map_err(|source| TripStoreError::Query { source })?;
        Ok(rows.map(|row| row.map_err(|source| TripStoreError::Query { source })))
    }
}

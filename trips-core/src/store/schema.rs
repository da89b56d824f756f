//! Schema creation for the trips store.
//!
//! Mirrors what `InitSpatialMetadata`, `AddGeometryColumn` and
//! `CreateSpatialIndex` produce in a SpatiaLite database: spatial metadata
//! tables, geometry columns guarded by type/SRID triggers, and one R*Tree per
//! geometry column kept in sync by triggers.

use rusqlite::{Connection, OptionalExtension, Transaction};

use super::TripStoreError;
use crate::{POINT_SRID, PointColumn};

/// SpatiaLite's numeric code for a 2-D POINT geometry type.
const GEOMETRY_TYPE_POINT: i64 = 1;

/// Create the spatial metadata, the `trips` table, its geometry columns and
/// their spatial indexes. Every step is idempotent.
pub(super) fn initialise_schema(connection: &mut Connection) -> Result<(), TripStoreError> {
    let transaction = connection
        .transaction()
        .map_err(|source| TripStoreError::Schema {
            step: "begin schema transaction",
            source,
        })?;

    create_spatial_metadata(&transaction)?;
    create_trips_table(&transaction)?;
    for column in PointColumn::ALL {
        add_geometry_column(&transaction, column)?;
        create_spatial_index(&transaction, column)?;
    }

    transaction
        .commit()
        .map_err(|source| TripStoreError::Schema {
            step: "commit schema transaction",
            source,
        })
}

/// Whether the `trips` table and both spatial indexes exist.
pub(super) fn schema_present(connection: &Connection) -> Result<bool, rusqlite::Error> {
    let found: i64 = connection.query_row(
        "SELECT COUNT(*) FROM sqlite_master
            WHERE type = 'table' AND name IN (?1, ?2, ?3)",
        (
            "trips",
            PointColumn::Origin.index_table(),
            PointColumn::Dest.index_table(),
        ),
        |row| row.get(0),
    )?;
    Ok(found == 3)
}

fn create_spatial_metadata(transaction: &Transaction<'_>) -> Result<(), TripStoreError> {
    run_schema_step(
        transaction,
        "create spatial_ref_sys",
        "CREATE TABLE IF NOT EXISTS spatial_ref_sys (
            srid INTEGER NOT NULL PRIMARY KEY,
            auth_name TEXT NOT NULL,
            auth_srid INTEGER NOT NULL,
            ref_sys_name TEXT NOT NULL DEFAULT 'Unknown',
            proj4text TEXT NOT NULL,
            srtext TEXT NOT NULL DEFAULT 'Undefined'
        )",
    )?;
    transaction
        .execute(
            "INSERT OR IGNORE INTO spatial_ref_sys
                (srid, auth_name, auth_srid, ref_sys_name, proj4text, srtext)
                VALUES (?1, 'epsg', ?1, 'WGS 84', '+proj=longlat +datum=WGS84 +no_defs', ?2)",
            (
                POINT_SRID,
                "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563]],\
                 PRIMEM[\"Greenwich\",0],UNIT[\"degree\",0.0174532925199433],\
                 AUTHORITY[\"EPSG\",\"4326\"]]",
            ),
        )
        .map_err(|source| TripStoreError::Schema {
            step: "seed spatial_ref_sys",
            source,
        })?;
    run_schema_step(
        transaction,
        "create geometry_columns",
        "CREATE TABLE IF NOT EXISTS geometry_columns (
            f_table_name TEXT NOT NULL,
            f_geometry_column TEXT NOT NULL,
            geometry_type INTEGER NOT NULL,
            coord_dimension INTEGER NOT NULL,
            srid INTEGER NOT NULL REFERENCES spatial_ref_sys (srid),
            spatial_index_enabled INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (f_table_name, f_geometry_column)
        )",
    )
}

fn create_trips_table(transaction: &Transaction<'_>) -> Result<(), TripStoreError> {
    run_schema_step(
        transaction,
        "create trips",
        "CREATE TABLE IF NOT EXISTS trips (
            id INTEGER NOT NULL PRIMARY KEY,
            region TEXT NOT NULL,
            datetime TEXT NOT NULL,
            datasource TEXT
        )",
    )
}

fn add_geometry_column(
    transaction: &Transaction<'_>,
    column: PointColumn,
) -> Result<(), TripStoreError> {
    let registered = transaction
        .query_row(
            "SELECT 1 FROM geometry_columns
                WHERE f_table_name = 'trips' AND f_geometry_column = ?1",
            [column.as_str()],
            |_| Ok(()),
        )
        .optional()
        .map_err(|source| TripStoreError::Schema {
            step: "read geometry_columns",
            source,
        })?
        .is_some();
    if registered {
        return Ok(());
    }

    let name = column.as_str();
    run_schema_step(
        transaction,
        "add geometry column",
        &format!("ALTER TABLE trips ADD COLUMN {name} BLOB"),
    )?;
    transaction
        .execute(
            "INSERT INTO geometry_columns
                (f_table_name, f_geometry_column, geometry_type, coord_dimension, srid)
                VALUES ('trips', ?1, ?2, 2, ?3)",
            (name, GEOMETRY_TYPE_POINT, POINT_SRID),
        )
        .map_err(|source| TripStoreError::Schema {
            step: "register geometry column",
            source,
        })?;
    run_schema_step(
        transaction,
        "create geometry insert guard",
        &format!(
            "CREATE TRIGGER IF NOT EXISTS ggi_trips_{name} BEFORE INSERT ON trips
            FOR EACH ROW BEGIN
                SELECT RAISE(ABORT, 'trips.{name} violates Geometry constraint [geom-type or SRID not allowed]')
                WHERE GeometryConstraints(NEW.{name}, 'POINT', {POINT_SRID}) = 0;
            END"
        ),
    )?;
    run_schema_step(
        transaction,
        "create geometry update guard",
        &format!(
            "CREATE TRIGGER IF NOT EXISTS ggu_trips_{name} BEFORE UPDATE OF {name} ON trips
            FOR EACH ROW BEGIN
                SELECT RAISE(ABORT, 'trips.{name} violates Geometry constraint [geom-type or SRID not allowed]')
                WHERE GeometryConstraints(NEW.{name}, 'POINT', {POINT_SRID}) = 0;
            END"
        ),
    )
}

fn create_spatial_index(
    transaction: &Transaction<'_>,
    column: PointColumn,
) -> Result<(), TripStoreError> {
    let name = column.as_str();
    let index = column.index_table();
    run_schema_step(
        transaction,
        "create spatial index",
        &format!("CREATE VIRTUAL TABLE IF NOT EXISTS {index} USING rtree(pkid, xmin, xmax, ymin, ymax)"),
    )?;
    run_schema_step(
        transaction,
        "create spatial index insert trigger",
        &format!(
            "CREATE TRIGGER IF NOT EXISTS gii_trips_{name} AFTER INSERT ON trips
            FOR EACH ROW BEGIN
                INSERT INTO {index} (pkid, xmin, xmax, ymin, ymax)
                SELECT NEW.id, MbrMinX(NEW.{name}), MbrMaxX(NEW.{name}),
                       MbrMinY(NEW.{name}), MbrMaxY(NEW.{name})
                WHERE NEW.{name} IS NOT NULL;
            END"
        ),
    )?;
    run_schema_step(
        transaction,
        "create spatial index update trigger",
        &format!(
            "CREATE TRIGGER IF NOT EXISTS giu_trips_{name} AFTER UPDATE OF {name} ON trips
            FOR EACH ROW BEGIN
                DELETE FROM {index} WHERE pkid = OLD.id;
                INSERT INTO {index} (pkid, xmin, xmax, ymin, ymax)
                SELECT NEW.id, MbrMinX(NEW.{name}), MbrMaxX(NEW.{name}),
                       MbrMinY(NEW.{name}), MbrMaxY(NEW.{name})
                WHERE NEW.{name} IS NOT NULL;
            END"
        ),
    )?;
    run_schema_step(
        transaction,
        "create spatial index delete trigger",
        &format!(
            "CREATE TRIGGER IF NOT EXISTS gid_trips_{name} AFTER DELETE ON trips
            FOR EACH ROW BEGIN
                DELETE FROM {index} WHERE pkid = OLD.id;
            END"
        ),
    )?;
    transaction
        .execute(
            "UPDATE geometry_columns SET spatial_index_enabled = 1
                WHERE f_table_name = 'trips' AND f_geometry_column = ?1",
            [name],
        )
        .map(|_| ())
        .map_err(|source| TripStoreError::Schema {
            step: "enable spatial index",
            source,
        })
}

fn run_schema_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), TripStoreError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| TripStoreError::Schema { step, source })
}

//! Geometry SQL functions registered on every store connection.
//!
//! The names and semantics follow the SpatiaLite functions of the same name,
//! so queries and triggers read the same as they would against a SpatiaLite
//! database. NULL arguments yield NULL, except `GeometryConstraints`, which
//! treats NULL as a violation.

use geo::{Coord, Rect};
use rusqlite::{
    Connection, Error as SqliteError,
    functions::{Context, FunctionFlags},
    types::ValueRef,
};

use crate::geometry::{GeometryError, POINT_SRID, Shape, SridGeometry};

/// Register every geometry function on `connection`.
pub(super) fn register_geometry_functions(connection: &Connection) -> Result<(), SqliteError> {
    let flags = FunctionFlags::SQLITE_UTF8
        | FunctionFlags::SQLITE_DETERMINISTIC
        | FunctionFlags::SQLITE_INNOCUOUS;

    connection.create_scalar_function("GeomFromText", 2, flags, geom_from_text)?;
    connection.create_scalar_function("BuildMbr", 4, flags, build_mbr)?;
    connection.create_scalar_function("BuildMbr", 5, flags, build_mbr)?;
    connection.create_scalar_function("MbrContains", 2, flags, mbr_contains)?;
    connection.create_scalar_function("MbrMinX", 1, flags, |ctx| mbr_extent(ctx, Extent::MinX))?;
    connection.create_scalar_function("MbrMaxX", 1, flags, |ctx| mbr_extent(ctx, Extent::MaxX))?;
    connection.create_scalar_function("MbrMinY", 1, flags, |ctx| mbr_extent(ctx, Extent::MinY))?;
    connection.create_scalar_function("MbrMaxY", 1, flags, |ctx| mbr_extent(ctx, Extent::MaxY))?;
    connection.create_scalar_function("ST_X", 1, flags, |ctx| point_ordinate(ctx, Axis::X))?;
    connection.create_scalar_function("ST_Y", 1, flags, |ctx| point_ordinate(ctx, Axis::Y))?;
    connection.create_scalar_function("ST_Srid", 1, flags, st_srid)?;
    connection.create_scalar_function("AsText", 1, flags, as_text)?;
    connection.create_scalar_function("GeometryConstraints", 3, flags, geometry_constraints)?;
    Ok(())
}

#[derive(Clone, Copy)]
enum Extent {
    MinX,
    MaxX,
    MinY,
    MaxY,
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

fn user_error(err: GeometryError) -> SqliteError {
    SqliteError::UserFunctionError(Box::new(err))
}

/// Read a geometry argument; `None` for SQL NULL.
fn geometry_arg(ctx: &Context<'_>, idx: usize) -> Result<Option<SridGeometry>, SqliteError> {
    match ctx.get_raw(idx) {
        ValueRef::Null => Ok(None),
        ValueRef::Blob(bytes) => SridGeometry::decode(bytes).map(Some).map_err(user_error),
        other => Err(SqliteError::InvalidFunctionParameterType(
            idx,
            other.data_type(),
        )),
    }
}

fn geom_from_text(ctx: &Context<'_>) -> Result<Option<Vec<u8>>, SqliteError> {
    let Some(text) = ctx.get::<Option<String>>(0)? else {
        return Ok(None);
    };
    let srid = ctx.get::<i32>(1)?;
    SridGeometry::from_wkt(&text, srid)
        .map(|geometry| Some(geometry.encode()))
        .map_err(user_error)
}

fn build_mbr(ctx: &Context<'_>) -> Result<Option<Vec<u8>>, SqliteError> {
    let mut corners = [0.0_f64; 4];
    for (idx, slot) in corners.iter_mut().enumerate() {
        let Some(value) = ctx.get::<Option<f64>>(idx)? else {
            return Ok(None);
        };
        *slot = value;
    }
    if corners.iter().any(|value| !value.is_finite()) {
        return Err(user_error(GeometryError::NonFinite));
    }
    let srid = if ctx.len() > 4 {
        ctx.get::<i32>(4)?
    } else {
        POINT_SRID
    };
    let [x1, y1, x2, y2] = corners;
    let rect = Rect::new(Coord { x: x1, y: y1 }, Coord { x: x2, y: y2 });
    Ok(Some(SridGeometry::rectangle(rect, srid).encode()))
}

fn mbr_contains(ctx: &Context<'_>) -> Result<Option<bool>, SqliteError> {
    let (Some(outer), Some(inner)) = (geometry_arg(ctx, 0)?, geometry_arg(ctx, 1)?) else {
        return Ok(None);
    };
    let (outer, inner) = (outer.mbr(), inner.mbr());
    Ok(Some(
        outer.min().x <= inner.min().x
            && outer.min().y <= inner.min().y
            && outer.max().x >= inner.max().x
            && outer.max().y >= inner.max().y,
    ))
}

fn mbr_extent(ctx: &Context<'_>, extent: Extent) -> Result<Option<f64>, SqliteError> {
    Ok(geometry_arg(ctx, 0)?.map(|geometry| {
        let mbr = geometry.mbr();
        match extent {
            Extent::MinX => mbr.min().x,
            Extent::MaxX => mbr.max().x,
            Extent::MinY => mbr.min().y,
            Extent::MaxY => mbr.max().y,
        }
    }))
}

fn point_ordinate(ctx: &Context<'_>, axis: Axis) -> Result<Option<f64>, SqliteError> {
    Ok(geometry_arg(ctx, 0)?.and_then(|geometry| match geometry.shape {
        Shape::Point(point) => Some(match axis {
            Axis::X => point.x(),
            Axis::Y => point.y(),
        }),
        Shape::Rectangle(_) => None,
    }))
}

fn st_srid(ctx: &Context<'_>) -> Result<Option<i32>, SqliteError> {
    Ok(geometry_arg(ctx, 0)?.map(|geometry| geometry.srid))
}

fn as_text(ctx: &Context<'_>) -> Result<Option<String>, SqliteError> {
    Ok(geometry_arg(ctx, 0)?.map(|geometry| geometry.to_wkt()))
}

/// 1 when the value is a geometry of the expected type and SRID, else 0.
///
/// Malformed values report 0 rather than an error so the guarding trigger
/// can raise its own message.
fn geometry_constraints(ctx: &Context<'_>) -> Result<bool, SqliteError> {
    let expected_type = ctx.get::<String>(1)?;
    let expected_srid = ctx.get::<i32>(2)?;
    let ValueRef::Blob(bytes) = ctx.get_raw(0) else {
        return Ok(false);
    };
    Ok(SridGeometry::decode(bytes).is_ok_and(|geometry| {
        geometry.srid == expected_srid && geometry.type_name().eq_ignore_ascii_case(&expected_type)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;
    use rstest::{fixture, rstest};

    #[fixture]
    fn connection() -> Connection {
        let connection = Connection::open_in_memory().expect("open in-memory database");
        register_geometry_functions(&connection).expect("register geometry functions");
        connection
    }

    fn query_f64(connection: &Connection, sql: &str) -> Option<f64> {
        connection
            .query_row(sql, [], |row| row.get(0))
            .expect("run query")
    }

    #[rstest]
    fn geom_from_text_builds_point_blob(connection: Connection) {
        let blob: Vec<u8> = connection
            .query_row("SELECT GeomFromText('POINT(14.4 50.1)', 4326)", [], |row| {
                row.get(0)
            })
            .expect("build geometry");
        let decoded = SridGeometry::decode(&blob).expect("decode blob");
        assert_eq!(decoded, SridGeometry::point(Point::new(14.4, 50.1), 4326));
    }

    #[rstest]
    fn geom_from_text_rejects_malformed_text(connection: Connection) {
        let outcome = connection.query_row(
            "SELECT GeomFromText('POINT(nope)', 4326)",
            [],
            |row| row.get::<_, Option<Vec<u8>>>(0),
        );
        assert!(
            matches!(outcome, Err(SqliteError::SqliteFailure(..) | SqliteError::UserFunctionError(_))),
            "expected failure, got {outcome:?}"
        );
    }

    #[rstest]
    fn null_text_yields_null_geometry(connection: Connection) {
        let value: Option<Vec<u8>> = connection
            .query_row("SELECT GeomFromText(NULL, 4326)", [], |row| row.get(0))
            .expect("run query");
        assert!(value.is_none());
    }

    #[rstest]
    #[case("POINT(5 5)", true)]
    #[case("POINT(0 10)", true)]
    #[case("POINT(20 20)", false)]
    #[case("POINT(10.000001 5)", false)]
    fn mbr_contains_is_boundary_inclusive(
        connection: Connection,
        #[case] point: &str,
        #[case] expected: bool,
    ) {
        let contained: bool = connection
            .query_row(
                "SELECT MbrContains(BuildMbr(10, 10, 0, 0, 4326), GeomFromText(?1, 4326))",
                [point],
                |row| row.get(0),
            )
            .expect("run query");
        assert_eq!(contained, expected);
    }

    #[rstest]
    fn extents_and_ordinates_read_geometry(connection: Connection) {
        let point = "GeomFromText('POINT(-3.5 40.25)', 4326)";
        assert_eq!(query_f64(&connection, &format!("SELECT ST_X({point})")), Some(-3.5));
        assert_eq!(query_f64(&connection, &format!("SELECT ST_Y({point})")), Some(40.25));
        let rect = "BuildMbr(1, 2, 3, 4)";
        assert_eq!(query_f64(&connection, &format!("SELECT MbrMinX({rect})")), Some(1.0));
        assert_eq!(query_f64(&connection, &format!("SELECT MbrMaxX({rect})")), Some(3.0));
        assert_eq!(query_f64(&connection, &format!("SELECT MbrMinY({rect})")), Some(2.0));
        assert_eq!(query_f64(&connection, &format!("SELECT MbrMaxY({rect})")), Some(4.0));
        assert_eq!(query_f64(&connection, &format!("SELECT ST_X({rect})")), None);
    }

    #[rstest]
    fn reports_srid_and_text(connection: Connection) {
        let (srid, text): (i32, String) = connection
            .query_row(
                "SELECT ST_Srid(g), AsText(g) FROM (SELECT GeomFromText('POINT(1 2)', 3857) AS g)",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .expect("run query");
        assert_eq!(srid, 3857);
        assert!(text.starts_with("POINT"), "{text}");
    }

    #[rstest]
    #[case("GeomFromText('POINT(1 2)', 4326)", true)]
    #[case("GeomFromText('POINT(1 2)', 3857)", false)]
    #[case("BuildMbr(0, 0, 1, 1, 4326)", false)]
    #[case("'POINT(1 2)'", false)]
    #[case("X'00FF'", false)]
    #[case("NULL", false)]
    fn geometry_constraints_checks_type_and_srid(
        connection: Connection,
        #[case] value: &str,
        #[case] expected: bool,
    ) {
        let ok: bool = connection
            .query_row(
                &format!("SELECT GeometryConstraints({value}, 'POINT', 4326)"),
                [],
                |row| row.get(0),
            )
            .expect("run query");
        assert_eq!(ok, expected);
    }

    #[rstest]
    fn rejects_text_where_geometry_expected(connection: Connection) {
        let outcome = connection.query_row("SELECT ST_X('POINT(1 2)')", [], |row| {
            row.get::<_, Option<f64>>(0)
        });
        assert!(outcome.is_err(), "text argument should be rejected");
    }
}

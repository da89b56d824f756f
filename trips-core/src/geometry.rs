//! Geometry values stored in the trips database.
//!
//! Geometries are persisted as BLOBs in the SpatiaLite internal layout so the
//! store stays readable by SpatiaLite-aware tools:
//!
//! ```text
//! 0x00 | endian | srid:i32 | min_x min_y max_x max_y:f64 | 0x7C | class:i32 | body | 0xFE
//! ```
//!
//! Only two classes are produced: POINT (`1`) for trip endpoints and POLYGON
//! (`3`) for the rectangles built by `BuildMbr`. Blobs are written
//! little-endian; both byte orders are accepted when reading.

use geo::{Coord, Geometry, Point, Rect};
use thiserror::Error;
use wkt::{ToWkt, TryFromWkt};

/// Spatial reference of every stored geometry (WGS84 longitude/latitude).
pub const POINT_SRID: i32 = 4326;

const START: u8 = 0x00;
const MBR_END: u8 = 0x7C;
const END: u8 = 0xFE;
const LITTLE_ENDIAN: u8 = 0x01;
const BIG_ENDIAN: u8 = 0x00;
const CLASS_POINT: i32 = 1;
const CLASS_POLYGON: i32 = 3;
const HEADER_LEN: usize = 43;

/// Shape carried by a [`SridGeometry`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// A single coordinate.
    Point(Point<f64>),
    /// An axis-aligned rectangle, stored as a closed five-vertex polygon.
    Rectangle(Rect<f64>),
}

/// A geometry tagged with its spatial reference identifier.
///
/// # Examples
///
/// ```
/// use geo::Point;
/// use trips_core::{POINT_SRID, SridGeometry};
///
/// let geometry = SridGeometry::from_wkt("POINT (14.4 50.0)", POINT_SRID)?;
/// let blob = geometry.encode();
/// assert_eq!(blob.len(), 60);
/// assert_eq!(SridGeometry::decode(&blob)?, SridGeometry::point(Point::new(14.4, 50.0), POINT_SRID));
/// # Ok::<(), trips_core::GeometryError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SridGeometry {
    /// Spatial reference identifier.
    pub srid: i32,
    /// Coordinates.
    pub shape: Shape,
}

impl SridGeometry {
    /// Wrap a point.
    #[must_use]
    pub const fn point(point: Point<f64>, srid: i32) -> Self {
        Self {
            srid,
            shape: Shape::Point(point),
        }
    }

    /// Wrap a rectangle.
    #[must_use]
    pub const fn rectangle(rect: Rect<f64>, srid: i32) -> Self {
        Self {
            srid,
            shape: Shape::Rectangle(rect),
        }
    }

    /// Parse a well-known-text POINT.
    pub fn from_wkt(text: &str, srid: i32) -> Result<Self, GeometryError> {
        parse_point_wkt(text).map(|point| Self::point(point, srid))
    }

    /// Geometry type name as used by `geometry_columns` constraints.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self.shape {
            Shape::Point(_) => "POINT",
            Shape::Rectangle(_) => "POLYGON",
        }
    }

    /// Minimum bounding rectangle.
    #[must_use]
    pub fn mbr(&self) -> Rect<f64> {
        match self.shape {
            Shape::Point(point) => Rect::new(point.0, point.0),
            Shape::Rectangle(rect) => rect,
        }
    }

    /// Well-known text of the shape, without the SRID.
    #[must_use]
    pub fn to_wkt(&self) -> String {
        match self.shape {
            Shape::Point(point) => point.wkt_string(),
            Shape::Rectangle(rect) => rect.to_polygon().wkt_string(),
        }
    }

    /// Encode as a little-endian geometry BLOB.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mbr = self.mbr();
        let mut blob = Vec::with_capacity(HEADER_LEN + 100);
        blob.push(START);
        blob.push(LITTLE_ENDIAN);
        blob.extend_from_slice(&self.srid.to_le_bytes());
        for value in [mbr.min().x, mbr.min().y, mbr.max().x, mbr.max().y] {
            blob.extend_from_slice(&value.to_le_bytes());
        }
        blob.push(MBR_END);
        match self.shape {
            Shape::Point(point) => {
                blob.extend_from_slice(&CLASS_POINT.to_le_bytes());
                push_coord(&mut blob, point.0);
            }
            Shape::Rectangle(rect) => {
                blob.extend_from_slice(&CLASS_POLYGON.to_le_bytes());
                // One exterior ring, five vertices, no interior rings.
                blob.extend_from_slice(&1_i32.to_le_bytes());
                blob.extend_from_slice(&5_i32.to_le_bytes());
                let (min, max) = (rect.min(), rect.max());
                for coord in [
                    min,
                    Coord { x: max.x, y: min.y },
                    max,
                    Coord { x: min.x, y: max.y },
                    min,
                ] {
                    push_coord(&mut blob, coord);
                }
            }
        }
        blob.push(END);
        blob
    }

    /// Decode a geometry BLOB.
    pub fn decode(bytes: &[u8]) -> Result<Self, GeometryError> {
        let mut reader = BlobReader::new(bytes);
        reader.expect_marker(START)?;
        reader.little_endian = match reader.byte()? {
            LITTLE_ENDIAN => true,
            BIG_ENDIAN => false,
            found => {
                return Err(GeometryError::InvalidMarker { offset: 1, found });
            }
        };
        let srid = reader.i32()?;
        // The stored MBR is derived from the coordinates, so it is skipped.
        for _ in 0..4 {
            reader.f64()?;
        }
        reader.expect_marker(MBR_END)?;
        let shape = match reader.i32()? {
            CLASS_POINT => Shape::Point(Point(reader.coord()?)),
            CLASS_POLYGON => Shape::Rectangle(read_rectangle(&mut reader)?),
            class => return Err(GeometryError::UnsupportedClass { class }),
        };
        reader.expect_marker(END)?;
        if reader.offset != bytes.len() {
            return Err(GeometryError::TrailingBytes {
                offset: reader.offset,
            });
        }
        Ok(Self { srid, shape })
    }
}

/// Parse WKT text that must describe a single finite POINT.
pub fn parse_point_wkt(text: &str) -> Result<Point<f64>, GeometryError> {
    let geometry =
        Geometry::<f64>::try_from_wkt_str(text).map_err(|err| GeometryError::InvalidWkt {
            text: text.to_owned(),
            message: err.to_string(),
        })?;
    let Geometry::Point(point) = geometry else {
        return Err(GeometryError::NotAPoint {
            text: text.to_owned(),
        });
    };
    if !(point.x().is_finite() && point.y().is_finite()) {
        return Err(GeometryError::NonFinite);
    }
    Ok(point)
}

fn push_coord(blob: &mut Vec<u8>, coord: Coord<f64>) {
    blob.extend_from_slice(&coord.x.to_le_bytes());
    blob.extend_from_slice(&coord.y.to_le_bytes());
}

fn read_rectangle(reader: &mut BlobReader<'_>) -> Result<Rect<f64>, GeometryError> {
    let rings = reader.i32()?;
    let vertices = reader.i32()?;
    if rings != 1 || vertices != 5 {
        return Err(GeometryError::NotRectangle);
    }
    let mut coords = [Coord { x: 0.0, y: 0.0 }; 5];
    for slot in &mut coords {
        *slot = reader.coord()?;
    }
    let [first, _, third, ..] = coords;
    let rect = Rect::new(first, third);
    let (min, max) = (rect.min(), rect.max());
    let on_corner = |coord: &Coord<f64>| {
        (coord.x == min.x || coord.x == max.x) && (coord.y == min.y || coord.y == max.y)
    };
    let closed = coords.first() == coords.last();
    if !closed || !coords.iter().all(on_corner) {
        return Err(GeometryError::NotRectangle);
    }
    Ok(rect)
}

struct BlobReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    little_endian: bool,
}

impl<'a> BlobReader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            little_endian: true,
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], GeometryError> {
        let end = self.offset + N;
        let chunk = self
            .bytes
            .get(self.offset..end)
            .and_then(|slice| <[u8; N]>::try_from(slice).ok())
            .ok_or(GeometryError::Truncated {
                offset: self.offset,
            })?;
        self.offset = end;
        Ok(chunk)
    }

    fn byte(&mut self) -> Result<u8, GeometryError> {
        let [value] = self.take::<1>()?;
        Ok(value)
    }

    fn expect_marker(&mut self, marker: u8) -> Result<(), GeometryError> {
        let offset = self.offset;
        match self.byte()? {
            found if found == marker => Ok(()),
            found => Err(GeometryError::InvalidMarker { offset, found }),
        }
    }

    fn i32(&mut self) -> Result<i32, GeometryError> {
        let raw = self.take::<4>()?;
        Ok(if self.little_endian {
            i32::from_le_bytes(raw)
        } else {
            i32::from_be_bytes(raw)
        })
    }

    fn f64(&mut self) -> Result<f64, GeometryError> {
        let raw = self.take::<8>()?;
        Ok(if self.little_endian {
            f64::from_le_bytes(raw)
        } else {
            f64::from_be_bytes(raw)
        })
    }

    fn coord(&mut self) -> Result<Coord<f64>, GeometryError> {
        let coord = Coord {
            x: self.f64()?,
            y: self.f64()?,
        };
        if coord.x.is_finite() && coord.y.is_finite() {
            Ok(coord)
        } else {
            Err(GeometryError::NonFinite)
        }
    }
}

/// Errors raised when parsing WKT or decoding geometry BLOBs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// The text is not valid well-known text.
    #[error("invalid WKT {text:?}: {message}")]
    InvalidWkt {
        /// Rejected text.
        text: String,
        /// Parser message.
        message: String,
    },
    /// The text is valid WKT but not a POINT.
    #[error("WKT {text:?} is not a POINT")]
    NotAPoint {
        /// Rejected text.
        text: String,
    },
    /// A coordinate was NaN or infinite.
    #[error("geometry coordinates must be finite")]
    NonFinite,
    /// The BLOB ended early.
    #[error("geometry BLOB is truncated at byte {offset}")]
    Truncated {
        /// Offset at which more bytes were expected.
        offset: usize,
    },
    /// A structural marker byte had the wrong value.
    #[error("geometry BLOB has unexpected byte 0x{found:02X} at offset {offset}")]
    InvalidMarker {
        /// Offset of the marker.
        offset: usize,
        /// Byte found there.
        found: u8,
    },
    /// The BLOB continues past the end marker.
    #[error("geometry BLOB has trailing bytes after offset {offset}")]
    TrailingBytes {
        /// Offset just past the end marker.
        offset: usize,
    },
    /// The class type is neither POINT nor POLYGON.
    #[error("unsupported geometry class type {class}")]
    UnsupportedClass {
        /// Class type code.
        class: i32,
    },
    /// A polygon that is not a closed axis-aligned rectangle.
    #[error("polygon is not an axis-aligned rectangle")]
    NotRectangle,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("POINT (14.4973794438195 50.00136875782316)", 14.497_379_443_819_5, 50.001_368_757_823_16)]
    #[case("POINT(5 5)", 5.0, 5.0)]
    #[case("POINT (-3.7 40.4)", -3.7, 40.4)]
    fn parses_point_wkt(#[case] text: &str, #[case] x: f64, #[case] y: f64) {
        let point = parse_point_wkt(text).expect("point should parse");
        assert_eq!(point, Point::new(x, y));
    }

    #[rstest]
    fn rejects_non_point_wkt() {
        let err = parse_point_wkt("LINESTRING (0 0, 1 1)").expect_err("linestring rejected");
        assert!(matches!(err, GeometryError::NotAPoint { .. }), "{err:?}");
    }

    #[rstest]
    #[case("")]
    #[case("POINT (5)")]
    #[case("POINT (a b)")]
    #[case("5 5")]
    fn rejects_malformed_wkt(#[case] text: &str) {
        let err = parse_point_wkt(text).expect_err("malformed text rejected");
        assert!(
            matches!(
                err,
                GeometryError::InvalidWkt { .. } | GeometryError::NotAPoint { .. }
            ),
            "{err:?}"
        );
    }

    #[rstest]
    fn point_blob_matches_spatialite_layout() {
        let blob = SridGeometry::point(Point::new(1.5, -2.0), POINT_SRID).encode();
        assert_eq!(blob.len(), 60);
        assert_eq!(blob.first(), Some(&0x00));
        assert_eq!(blob.get(1), Some(&0x01));
        assert_eq!(blob.get(2..6), Some(&4326_i32.to_le_bytes()[..]));
        assert_eq!(blob.get(38), Some(&0x7C));
        assert_eq!(blob.get(39..43), Some(&1_i32.to_le_bytes()[..]));
        assert_eq!(blob.last(), Some(&0xFE));
    }

    #[rstest]
    fn rectangle_survives_encoding() {
        let rect = Rect::new(Coord { x: 10.0, y: 10.0 }, Coord { x: 0.0, y: -5.0 });
        let geometry = SridGeometry::rectangle(rect, POINT_SRID);
        let decoded = SridGeometry::decode(&geometry.encode()).expect("decode rectangle");
        assert_eq!(decoded, geometry);
        assert_eq!(decoded.type_name(), "POLYGON");
    }

    #[rstest]
    fn decodes_big_endian_points() {
        let mut blob = vec![0x00, 0x00];
        blob.extend_from_slice(&4326_i32.to_be_bytes());
        for value in [3.0_f64, 4.0, 3.0, 4.0] {
            blob.extend_from_slice(&value.to_be_bytes());
        }
        blob.push(0x7C);
        blob.extend_from_slice(&1_i32.to_be_bytes());
        blob.extend_from_slice(&3.0_f64.to_be_bytes());
        blob.extend_from_slice(&4.0_f64.to_be_bytes());
        blob.push(0xFE);

        let decoded = SridGeometry::decode(&blob).expect("decode big-endian blob");
        assert_eq!(decoded, SridGeometry::point(Point::new(3.0, 4.0), 4326));
    }

    #[rstest]
    fn rejects_truncated_blob() {
        let blob = SridGeometry::point(Point::new(0.0, 0.0), POINT_SRID).encode();
        let cut = blob.get(..50).expect("prefix");
        let err = SridGeometry::decode(cut).expect_err("truncated blob rejected");
        assert!(matches!(err, GeometryError::Truncated { .. }), "{err:?}");
    }

    #[rstest]
    fn rejects_unknown_class() {
        let mut blob = SridGeometry::point(Point::new(0.0, 0.0), POINT_SRID).encode();
        if let Some(slot) = blob.get_mut(39..43) {
            slot.copy_from_slice(&2_i32.to_le_bytes());
        }
        let err = SridGeometry::decode(&blob).expect_err("linestring class rejected");
        assert_eq!(err, GeometryError::UnsupportedClass { class: 2 });
    }

    #[rstest]
    fn rejects_text_masquerading_as_blob() {
        let err = SridGeometry::decode(b"POINT(1 2)").expect_err("text is not a blob");
        assert!(matches!(err, GeometryError::InvalidMarker { offset: 0, .. }));
    }

    #[rstest]
    fn renders_wkt() {
        let geometry = SridGeometry::point(Point::new(5.0, -2.5), POINT_SRID);
        let text = geometry.to_wkt();
        assert!(text.starts_with("POINT"), "{text}");
        assert_eq!(parse_point_wkt(&text), Ok(Point::new(5.0, -2.5)));
    }
}

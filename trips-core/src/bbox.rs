//! Bounding boxes accepted by the aggregate filter.

use std::{num::ParseFloatError, str::FromStr};

use geo::{Coord, Rect};
use thiserror::Error;

/// Axis-aligned rectangle in WGS84 coordinates.
///
/// Corners are normalised on construction, so `x1,y1,x2,y2` may name any two
/// opposite corners.
///
/// # Examples
///
/// ```
/// use trips_core::BoundingBox;
///
/// let bbox: BoundingBox = "10, 10, 0, 0".parse()?;
/// assert_eq!((bbox.min_x(), bbox.max_y()), (0.0, 10.0));
/// # Ok::<(), trips_core::BoundingBoxParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox(Rect<f64>);

impl BoundingBox {
    /// Build a box from two opposite corners.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self, BoundingBoxParseError> {
        if [x1, y1, x2, y2].iter().any(|value| !value.is_finite()) {
            return Err(BoundingBoxParseError::NonFinite);
        }
        Ok(Self(Rect::new(Coord { x: x1, y: y1 }, Coord { x: x2, y: y2 })))
    }

    /// Smallest x (longitude).
    #[must_use]
    pub fn min_x(&self) -> f64 {
        self.0.min().x
    }

    /// Smallest y (latitude).
    #[must_use]
    pub fn min_y(&self) -> f64 {
        self.0.min().y
    }

    /// Largest x (longitude).
    #[must_use]
    pub fn max_x(&self) -> f64 {
        self.0.max().x
    }

    /// Largest y (latitude).
    #[must_use]
    pub fn max_y(&self) -> f64 {
        self.0.max().y
    }
}

impl FromStr for BoundingBox {
    type Err = BoundingBoxParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        let &[x1, y1, x2, y2] = parts.as_slice() else {
            return Err(BoundingBoxParseError::WrongArity { found: parts.len() });
        };
        let parse = |text: &str| {
            text.parse::<f64>()
                .map_err(|source| BoundingBoxParseError::InvalidNumber {
                    value: text.to_owned(),
                    source,
                })
        };
        Self::new(parse(x1)?, parse(y1)?, parse(x2)?, parse(y2)?)
    }
}

/// Errors raised when a bounding box literal is malformed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BoundingBoxParseError {
    /// The literal did not contain exactly four values.
    #[error("bounding box needs four comma-separated values (x1,y1,x2,y2), found {found}")]
    WrongArity {
        /// Number of values supplied.
        found: usize,
    },
    /// A value was not a number.
    #[error("bounding box value {value:?} is not a number")]
    InvalidNumber {
        /// The rejected value.
        value: String,
        /// Parser error from the standard library.
        #[source]
        source: ParseFloatError,
    },
    /// A value was NaN or infinite.
    #[error("bounding box values must be finite")]
    NonFinite,
}

//! SQL builder for the weekly-average aggregate.

use rusqlite::types::Value;

use crate::{AggregateFilter, BoundingBox, POINT_SRID, PointColumn};

/// SQL text plus the values bound to its numbered parameters.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct AggregateSql {
    pub(super) sql: String,
    pub(super) params: Vec<Value>,
}

/// Build the grouped query for `filter`.
///
/// Values are always bound. Only the column and index names chosen by
/// [`PointColumn`] are written into the SQL text.
pub(super) fn build_weekly_average(filter: &AggregateFilter) -> AggregateSql {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(region) = &filter.region {
        params.push(Value::Text(region.clone()));
        conditions.push(format!("region = ?{}", params.len()));
    }
    if let Some(bbox) = &filter.bbox {
        conditions.push(bbox_condition(filter.column, bbox, &mut params));
    }

    let mut sql = String::from(
        "SELECT region, COUNT(*) / COUNT(DISTINCT strftime('%Y-%W', datetime)) \
         AS avg_trips_per_week FROM trips",
    );
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" GROUP BY region ORDER BY region");
    AggregateSql { sql, params }
}

/// The R*Tree stores single-precision bounds, so the index lookup is only a
/// prefilter and `MbrContains` makes the exact decision.
fn bbox_condition(column: PointColumn, bbox: &BoundingBox, params: &mut Vec<Value>) -> String {
    let first = params.len() + 1;
    params.extend(
        [bbox.min_x(), bbox.max_x(), bbox.min_y(), bbox.max_y()]
            .into_iter()
            .map(Value::Real),
    );
    let [min_x, max_x, min_y, max_y] = [first, first + 1, first + 2, first + 3];
    let name = column.as_str();
    let index = column.index_table();
    format!(
        "id IN (SELECT pkid FROM {index} \
         WHERE xmax >= ?{min_x} AND xmin <= ?{max_x} AND ymax >= ?{min_y} AND ymin <= ?{max_y}) \
         AND MbrContains(BuildMbr(?{min_x}, ?{min_y}, ?{max_x}, ?{max_y}, {POINT_SRID}), {name}) = 1"
    )
}

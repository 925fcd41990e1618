//! Timestamp columns hold Unix nanoseconds so `ORDER BY` follows time order.

use sqlx::{sqlite::SqliteRow, Row};
use time::OffsetDateTime;

/// Column value for `value`. Saturates outside the years 1677 to 2262.
pub fn to_column(value: OffsetDateTime) -> i64 {
    value
        .unix_timestamp_nanos()
        .clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Read a timestamp column written by [`to_column`].
pub fn from_row(row: &SqliteRow, column: &str) -> sqlx::Result<OffsetDateTime> {
    let nanos: i64 = row.try_get(column)?;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos)).map_err(|e| {
        sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn column_values_keep_nanosecond_order() {
        let earlier = datetime!(2024-05-01 10:00:00.000000001 UTC);
        let later = datetime!(2024-05-01 10:00:00.000000002 UTC);
        assert!(to_column(earlier) < to_column(later));
        assert_eq!(to_column(datetime!(1970-01-01 00:00:00 UTC)), 0);
    }

    #[test]
    fn out_of_range_values_saturate() {
        assert_eq!(to_column(datetime!(9999-01-01 00:00:00 UTC)), i64::MAX);
        assert_eq!(to_column(datetime!(1000-01-01 00:00:00 UTC)), i64::MIN);
    }
}

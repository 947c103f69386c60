//! Driver value decoding

use chrono::NaiveDate;
use mysql_async::binlog::value::BinlogValue;
use mysql_async::Value;

use chsync_core::{Result, SqlValue, SyncError};

/// Convert a driver row value into the pipeline's dynamic value type.
///
/// Text-protocol results and binlog row images both surface through
/// `mysql_async::Value`; decimals arrive as their textual form and land in
/// `Text`, which ClickHouse coerces into `Decimal` columns.
pub(crate) fn from_mysql(value: Value) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => SqlValue::Text(text),
            Err(err) => SqlValue::Bytes(err.into_bytes()),
        },
        Value::Int(v) => SqlValue::Int(v),
        Value::UInt(v) => SqlValue::UInt(v),
        Value::Float(v) => SqlValue::Float(v as f64),
        Value::Double(v) => SqlValue::Float(v),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            match NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32) {
                Some(date) if (hour, minute, second, micros) == (0, 0, 0, 0) => {
                    SqlValue::Date(date)
                }
                Some(date) => date
                    .and_hms_micro_opt(hour as u32, minute as u32, second as u32, micros)
                    .map(SqlValue::DateTime)
                    .unwrap_or(SqlValue::Null),
                // Zero dates ('0000-00-00') have no calendar representation.
                None => SqlValue::Null,
            }
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            SqlValue::Text(format_time(negative, days, hours, minutes, seconds, micros))
        }
    }
}

/// TIME columns map to `String` on the target; render the driver's
/// duration representation in MySQL's own `[-]HH:MM:SS[.ffffff]` form.
fn format_time(negative: bool, days: u32, hours: u8, minutes: u8, seconds: u8, micros: u32) -> String {
    let total_hours = days * 24 + hours as u32;
    let sign = if negative { "-" } else { "" };

    if micros > 0 {
        format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}.{micros:06}")
    } else {
        format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}")
    }
}

/// Convert one binlog row value. JSON columns carry their binary JSONB
/// representation and are rendered back to JSON text; partial JSON diffs
/// (MySQL 8 `binlog_row_value_options=PARTIAL_JSON`) are not supported.
pub(crate) fn from_binlog(value: &BinlogValue<'_>) -> Result<SqlValue> {
    match value {
        BinlogValue::Value(v) => Ok(from_mysql(v.clone())),
        BinlogValue::Jsonb(jsonb) => {
            let json = serde_json::Value::try_from(jsonb.clone())
                .map_err(|e| SyncError::Decode(format!("JSONB column: {e}")))?;
            Ok(SqlValue::Text(json.to_string()))
        }
        BinlogValue::JsonDiff(_) => Err(SyncError::Decode(
            "partial JSON updates are not supported; disable binlog_row_value_options on the source"
                .to_string(),
        )),
    }
}

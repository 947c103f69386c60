//! ClickHouse SQL literal rendering
//!
//! Insert batches are rendered as one `INSERT ... VALUES` statement.
//! Identifiers must be validated by the caller; values are escaped here,
//! so no payload can break out of its literal.

use chsync_core::{RowTuple, SqlValue};

/// Append one value as a ClickHouse literal.
pub(crate) fn write_literal(buf: &mut String, value: &SqlValue) {
    match value {
        SqlValue::Null => buf.push_str("NULL"),
        SqlValue::Int(v) => buf.push_str(&v.to_string()),
        SqlValue::UInt(v) => buf.push_str(&v.to_string()),
        SqlValue::Float(v) => {
            if v.is_nan() {
                buf.push_str("nan");
            } else if v.is_infinite() {
                buf.push_str(if *v < 0.0 { "-inf" } else { "inf" });
            } else {
                buf.push_str(&v.to_string());
            }
        }
        SqlValue::Text(text) => write_quoted(buf, text.as_bytes()),
        SqlValue::Bytes(bytes) => write_quoted(buf, bytes),
        SqlValue::Date(date) => {
            buf.push('\'');
            buf.push_str(&date.format("%Y-%m-%d").to_string());
            buf.push('\'');
        }
        SqlValue::DateTime(datetime) => {
            buf.push('\'');
            buf.push_str(&datetime.format("%Y-%m-%d %H:%M:%S").to_string());
            buf.push('\'');
        }
    }
}

/// Quoted string literal with byte-exact escaping: quotes and backslashes
/// are escaped, control and non-ASCII bytes use `\xHH` so binary payloads
/// survive the round trip.
fn write_quoted(buf: &mut String, bytes: &[u8]) {
    buf.push('\'');
    for &byte in bytes {
        match byte {
            b'\'' => buf.push_str("\\'"),
            b'\\' => buf.push_str("\\\\"),
            b'\n' => buf.push_str("\\n"),
            b'\r' => buf.push_str("\\r"),
            b'\t' => buf.push_str("\\t"),
            0x20..=0x7e => buf.push(byte as char),
            _ => {
                buf.push_str(&format!("\\x{:02X}", byte));
            }
        }
    }
    buf.push('\'');
}

/// Render a whole insert statement for pre-validated identifiers.
pub(crate) fn build_insert(
    database: &str,
    table: &str,
    columns: &[String],
    rows: &[RowTuple],
) -> String {
    let column_list = columns
        .iter()
        .map(|col| format!("`{}`", col))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "INSERT INTO `{}`.`{}` ({}) VALUES ",
        database, table, column_list
    );

    for (row_index, row) in rows.iter().enumerate() {
        if row_index > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for (value_index, value) in row.iter().enumerate() {
            if value_index > 0 {
                sql.push_str(", ");
            }
            write_literal(&mut sql, value);
        }
        sql.push(')');
    }

    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn render(value: &SqlValue) -> String {
        let mut buf = String::new();
        write_literal(&mut buf, value);
        buf
    }

    #[test]
    fn test_scalars() {
        assert_eq!(render(&SqlValue::Null), "NULL");
        assert_eq!(render(&SqlValue::Int(-7)), "-7");
        assert_eq!(render(&SqlValue::UInt(42)), "42");
        assert_eq!(render(&SqlValue::Float(1.5)), "1.5");
        assert_eq!(render(&SqlValue::Float(f64::NAN)), "nan");
        assert_eq!(render(&SqlValue::Float(f64::NEG_INFINITY)), "-inf");
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(render(&SqlValue::Text("plain".into())), "'plain'");
        assert_eq!(render(&SqlValue::Text("O'Brien".into())), "'O\\'Brien'");
        assert_eq!(render(&SqlValue::Text("a\\b".into())), "'a\\\\b'");
        assert_eq!(render(&SqlValue::Text("line\nbreak".into())), "'line\\nbreak'");
    }

    #[test]
    fn test_injection_stays_inside_the_literal() {
        let rendered = render(&SqlValue::Text("'); DROP TABLE users;--".into()));
        assert_eq!(rendered, "'\\'); DROP TABLE users;--'");
    }

    #[test]
    fn test_binary_bytes_hex_escaped() {
        assert_eq!(render(&SqlValue::Bytes(vec![0x00, 0x41, 0xff])), "'\\x00A\\xFF'");
    }

    #[test]
    fn test_temporal_rendering() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(render(&SqlValue::Date(date)), "'2024-03-15'");

        let datetime = date.and_hms_opt(10, 30, 5).unwrap();
        assert_eq!(render(&SqlValue::DateTime(datetime)), "'2024-03-15 10:30:05'");
    }

    #[test]
    fn test_build_insert() {
        let rows = vec![
            vec![SqlValue::Int(1), SqlValue::Text("alice".into())],
            vec![SqlValue::Int(2), SqlValue::Null],
        ];
        let columns = vec!["id".to_string(), "name".to_string()];

        let sql = build_insert("analytics", "users", &columns, &rows);
        assert_eq!(
            sql,
            "INSERT INTO `analytics`.`users` (`id`, `name`) VALUES (1, 'alice'), (2, NULL)"
        );
    }
}

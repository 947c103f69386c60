//! MySQL to ClickHouse type mapping

use crate::schema::ColumnInfo;

/// Map a lowercased MySQL data type to its ClickHouse base type.
///
/// Exotic, spatial and vendor-specific types deliberately fall through to
/// `String`, which ClickHouse can always ingest.
fn base_type(data_type: &str) -> &'static str {
    match data_type {
        "tinyint" => "Int8",
        "smallint" => "Int16",
        "mediumint" | "int" | "integer" => "Int32",
        "bigint" => "Int64",
        "float" => "Float32",
        "double" => "Float64",
        "bit" => "UInt64",
        "bool" | "boolean" => "Bool",
        "date" => "Date",
        "datetime" | "timestamp" => "DateTime",
        "time" => "String",
        "year" => "UInt16",
        "char" | "varchar" | "binary" | "varbinary" => "String",
        "tinyblob" | "blob" | "mediumblob" | "longblob" => "String",
        "tinytext" | "text" | "mediumtext" | "longtext" => "String",
        "enum" | "set" | "json" => "String",
        _ => "String",
    }
}

/// Produce the ClickHouse column type for a source column, including
/// decimal precision/scale and `Nullable(...)` wrapping.
pub fn clickhouse_type(column: &ColumnInfo) -> String {
    let ch_type = if matches!(column.data_type.as_str(), "decimal" | "numeric") {
        let precision = column.numeric_precision.unwrap_or(10);
        let scale = column.numeric_scale.unwrap_or(0);
        format!("Decimal({}, {})", precision, scale)
    } else {
        base_type(&column.data_type).to_string()
    };

    if column.is_nullable {
        format!("Nullable({})", ch_type)
    } else {
        ch_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnInfo;

    #[test]
    fn test_integer_types() {
        assert_eq!(clickhouse_type(&ColumnInfo::new("a", "tinyint")), "Int8");
        assert_eq!(clickhouse_type(&ColumnInfo::new("a", "smallint")), "Int16");
        assert_eq!(clickhouse_type(&ColumnInfo::new("a", "int")), "Int32");
        assert_eq!(clickhouse_type(&ColumnInfo::new("a", "integer")), "Int32");
        assert_eq!(clickhouse_type(&ColumnInfo::new("a", "bigint")), "Int64");
    }

    #[test]
    fn test_nullable_decimal_with_precision() {
        let col = ColumnInfo::new("price", "decimal").nullable(true).decimal(18, 4);
        assert_eq!(clickhouse_type(&col), "Nullable(Decimal(18, 4))");
    }

    #[test]
    fn test_decimal_defaults() {
        let col = ColumnInfo::new("amount", "numeric");
        assert_eq!(clickhouse_type(&col), "Decimal(10, 0)");
    }

    #[test]
    fn test_temporal_types() {
        assert_eq!(clickhouse_type(&ColumnInfo::new("a", "date")), "Date");
        assert_eq!(clickhouse_type(&ColumnInfo::new("a", "datetime")), "DateTime");
        assert_eq!(clickhouse_type(&ColumnInfo::new("a", "timestamp")), "DateTime");
        assert_eq!(clickhouse_type(&ColumnInfo::new("a", "time")), "String");
        assert_eq!(clickhouse_type(&ColumnInfo::new("a", "year")), "UInt16");
    }

    #[test]
    fn test_text_and_blob_types() {
        for ty in ["char", "varchar", "text", "longtext", "blob", "varbinary", "enum", "set", "json"] {
            assert_eq!(clickhouse_type(&ColumnInfo::new("a", ty)), "String", "{ty}");
        }
    }

    #[test]
    fn test_unknown_type_falls_back_to_string() {
        assert_eq!(clickhouse_type(&ColumnInfo::new("a", "geometry")), "String");
        let nullable = ColumnInfo::new("a", "polygon").nullable(true);
        assert_eq!(clickhouse_type(&nullable), "Nullable(String)");
    }

    #[test]
    fn test_nullable_wrapping() {
        let col = ColumnInfo::new("name", "varchar").nullable(true);
        assert_eq!(clickhouse_type(&col), "Nullable(String)");
        let col = ColumnInfo::new("age", "int").nullable(true);
        assert_eq!(clickhouse_type(&col), "Nullable(Int32)");
    }
}

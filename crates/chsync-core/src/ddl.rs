//! ClickHouse DDL generation
//!
//! All generators are deterministic and side-effect-free. Identifiers are
//! backtick-quoted; callers are expected to have validated them (see
//! [`crate::ident`]).

use crate::cdc::{DELETED_COLUMN, VERSION_COLUMN};
use crate::convert::clickhouse_type;
use crate::schema::TableSchema;

/// `ORDER BY` expression: primary-key tuple if present, else the first
/// column, else `tuple()` for the degenerate empty schema.
fn order_by(schema: &TableSchema) -> String {
    if !schema.primary_keys.is_empty() {
        schema
            .primary_keys
            .iter()
            .map(|pk| format!("`{}`", pk))
            .collect::<Vec<_>>()
            .join(", ")
    } else if let Some(first) = schema.columns.first() {
        format!("`{}`", first.name)
    } else {
        "tuple()".to_string()
    }
}

fn column_definitions(schema: &TableSchema) -> Vec<String> {
    schema
        .columns
        .iter()
        .map(|col| format!("    `{}` {}", col.name, clickhouse_type(col)))
        .collect()
}

/// `CREATE TABLE` for a plain snapshot target (`MergeTree`).
pub fn create_table(schema: &TableSchema, database: &str) -> String {
    let columns_sql = column_definitions(schema).join(",\n");

    format!(
        "CREATE TABLE IF NOT EXISTS `{}`.`{}`\n(\n{}\n)\nENGINE = MergeTree()\nORDER BY ({})",
        database,
        schema.name,
        columns_sql,
        order_by(schema),
    )
}

/// `DROP TABLE IF EXISTS` for a target table.
pub fn drop_table(table: &str, database: &str) -> String {
    format!("DROP TABLE IF EXISTS `{}`.`{}`", database, table)
}

/// `CREATE TABLE` for a CDC target: the source columns plus trailing
/// `_version UInt64` and `_deleted UInt8`, collapsed by
/// `ReplacingMergeTree(_version)`.
pub fn create_cdc_table(schema: &TableSchema, database: &str) -> String {
    let mut columns_def = column_definitions(schema);
    columns_def.push(format!("    `{}` UInt64", VERSION_COLUMN));
    columns_def.push(format!("    `{}` UInt8", DELETED_COLUMN));

    format!(
        "CREATE TABLE IF NOT EXISTS `{}`.`{}`\n(\n{}\n)\nENGINE = ReplacingMergeTree({})\nORDER BY ({})",
        database,
        schema.name,
        columns_def.join(",\n"),
        VERSION_COLUMN,
        order_by(schema),
    )
}

/// View over a CDC table exposing only live rows: user columns projected
/// from `FINAL`-collapsed data with deleted rows filtered out.
pub fn create_cdc_view(table: &str, database: &str, schema: &TableSchema) -> String {
    let columns = schema
        .columns
        .iter()
        .map(|col| format!("`{}`", col.name))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "CREATE OR REPLACE VIEW `{}`.`{}_live` AS\nSELECT {}\nFROM `{}`.`{}` FINAL\nWHERE {} = 0",
        database, table, columns, database, table, DELETED_COLUMN,
    )
}

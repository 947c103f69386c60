//! In-memory description of a source table

use serde::{Deserialize, Serialize};

/// Role of a column in the table's keys, decoded from the information
/// schema's `COLUMN_KEY` (`PRI` / `UNI` / `MUL` / empty).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyRole {
    Primary,
    Unique,
    Indexed,
    None,
}

impl KeyRole {
    pub fn from_column_key(key: &str) -> Self {
        match key {
            "PRI" => KeyRole::Primary,
            "UNI" => KeyRole::Unique,
            "MUL" => KeyRole::Indexed,
            _ => KeyRole::None,
        }
    }
}

/// A single column as read from the source's information schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Source data type, lowercased (`int`, `varchar`, `decimal`, ...).
    pub data_type: String,
    pub is_nullable: bool,
    pub key: KeyRole,
    pub extra: String,
    pub max_char_length: Option<u64>,
    pub numeric_precision: Option<u64>,
    pub numeric_scale: Option<u64>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into().to_lowercase(),
            is_nullable: false,
            key: KeyRole::None,
            extra: String::new(),
            max_char_length: None,
            numeric_precision: None,
            numeric_scale: None,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    pub fn key(mut self, key: KeyRole) -> Self {
        self.key = key;
        self
    }

    pub fn decimal(mut self, precision: u64, scale: u64) -> Self {
        self.numeric_precision = Some(precision);
        self.numeric_scale = Some(scale);
        self
    }
}

/// Ordered column list plus primary keys for one source table.
///
/// The column order is the physical order reported by the information
/// schema; every row tuple in the pipeline is projected in this order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    /// Primary-key column names in declaration order. Always a subset of
    /// `columns` since it is derived from them.
    pub primary_keys: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        let primary_keys = columns
            .iter()
            .filter(|col| col.key == KeyRole::Primary)
            .map(|col| col.name.clone())
            .collect();

        Self {
            name: name.into(),
            columns,
            primary_keys,
        }
    }

    /// Column names in physical order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|col| col.name.clone()).collect()
    }
}

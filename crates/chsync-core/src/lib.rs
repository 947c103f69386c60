//! Core types for chsync: the schema model, dynamic SQL values, type
//! mapping, DDL generation, binlog positions and the adapter seams shared
//! by the snapshot and CDC replicators.

pub mod adapter;
pub mod cdc;
pub mod convert;
pub mod ddl;
pub mod error;
pub mod event;
pub mod ident;
pub mod position;
pub mod schema;
pub mod value;

pub use adapter::{BatchStream, ChangeStream, SinkAdapter, SourceAdapter};
pub use error::{Result, SyncError};
pub use event::{ChangeEvent, ChangeKind};
pub use ident::validate_identifier;
pub use position::{BinlogPosition, PositionStore};
pub use schema::{ColumnInfo, KeyRole, TableSchema};
pub use value::{RowBatch, RowTuple, SqlValue};

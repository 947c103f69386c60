//! Binlog event stream decoding
//!
//! Wraps the driver's replication stream and turns raw binlog events into
//! [`ChangeEvent`]s: row images are projected into positional tuples via
//! the table map, rotate events move the tracked position to the next log
//! file, and everything outside the configured schema and table set is
//! dropped.

use std::collections::HashSet;

use futures::StreamExt;
use mysql_async::binlog::events::{Event, EventData, RowsEventData};
use mysql_async::binlog::row::BinlogRow;
use mysql_async::BinlogStream;

use chsync_core::adapter::ChangeStream;
use chsync_core::{BinlogPosition, ChangeEvent, ChangeKind, Result, RowTuple, SyncError};

use crate::mysql_err;
use crate::value::from_binlog;

pub(crate) struct EventStream {
    inner: BinlogStream,
    schema: String,
    tables: HashSet<String>,
    file: String,
    position: u64,
}

impl EventStream {
    pub(crate) fn new(
        inner: BinlogStream,
        schema: String,
        tables: &[String],
        start: &BinlogPosition,
    ) -> Self {
        Self {
            inner,
            schema,
            tables: tables.iter().cloned().collect(),
            file: start.file.clone(),
            position: start.position,
        }
    }

    pub(crate) fn into_change_stream(self) -> ChangeStream {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next_event().await.map(|item| (item, stream))
        })
        .boxed()
    }

    /// Pull raw events until one decodes to a row change for a replicated
    /// table. Returns `None` when the underlying stream ends.
    async fn next_event(&mut self) -> Option<Result<ChangeEvent>> {
        loop {
            let event = match self.inner.next().await? {
                Ok(event) => event,
                Err(error) => return Some(Err(mysql_err(error))),
            };

            match self.decode(&event) {
                Ok(Some(change)) => return Some(Ok(change)),
                Ok(None) => continue,
                Err(error) => return Some(Err(error)),
            }
        }
    }

    fn decode(&mut self, event: &Event) -> Result<Option<ChangeEvent>> {
        let end_position = event.header().log_pos() as u64;

        let data = event
            .read_data()
            .map_err(|e| SyncError::Decode(e.to_string()))?;

        match data {
            Some(EventData::RotateEvent(rotate)) => {
                self.file = rotate.name().to_string();
                self.position = rotate.position();
                Ok(None)
            }
            Some(EventData::RowsEvent(rows_event)) => {
                // Stamp the post-event position so a checkpoint taken after
                // this event resumes past it.
                self.advance(end_position);
                self.decode_rows(&rows_event)
            }
            _ => {
                self.advance(end_position);
                Ok(None)
            }
        }
    }

    fn decode_rows(&self, rows_event: &RowsEventData<'_>) -> Result<Option<ChangeEvent>> {
        let kind = match rows_event {
            RowsEventData::WriteRowsEvent(_) | RowsEventData::WriteRowsEventV1(_) => {
                ChangeKind::Insert
            }
            RowsEventData::UpdateRowsEvent(_)
            | RowsEventData::UpdateRowsEventV1(_)
            | RowsEventData::PartialUpdateRowsEvent(_) => ChangeKind::Update,
            RowsEventData::DeleteRowsEvent(_) | RowsEventData::DeleteRowsEventV1(_) => {
                ChangeKind::Delete
            }
            _ => return Ok(None),
        };

        let tme = self
            .inner
            .get_tme(rows_event.table_id())
            .ok_or_else(|| SyncError::Decode("rows event without a table map".to_string()))?;

        if tme.database_name() != self.schema.as_str() {
            return Ok(None);
        }
        let table = tme.table_name().to_string();
        if !self.tables.contains(&table) {
            return Ok(None);
        }

        let mut rows = Vec::new();
        for row in rows_event.rows(tme) {
            let (before, after) = row.map_err(|e| SyncError::Decode(e.to_string()))?;

            // Deletes only carry the before-image; updates replicate the
            // after-image and drop the before-image (the old key, if the
            // primary key changed, is a documented limitation).
            let image = match kind {
                ChangeKind::Delete => before,
                _ => after,
            };

            match image {
                Some(row) => rows.push(row_to_tuple(&row)?),
                None => {
                    return Err(SyncError::Decode(format!(
                        "{} event for `{}` without a row image",
                        kind.as_str(),
                        table
                    )))
                }
            }
        }

        Ok(Some(ChangeEvent {
            table,
            kind,
            rows,
            position: BinlogPosition::new(self.file.clone(), self.position),
        }))
    }

    fn advance(&mut self, end_position: u64) {
        // Artificial events carry a zero end position; keep the last real one.
        if end_position > 0 {
            self.position = end_position;
        }
    }
}

fn row_to_tuple(row: &BinlogRow) -> Result<RowTuple> {
    let mut tuple = Vec::with_capacity(row.len());

    for index in 0..row.len() {
        let value = row.as_ref(index).ok_or_else(|| {
            SyncError::Decode(
                "row image is missing columns; the source must use binlog_row_image=FULL"
                    .to_string(),
            )
        })?;
        tuple.push(from_binlog(value)?);
    }

    Ok(tuple)
}

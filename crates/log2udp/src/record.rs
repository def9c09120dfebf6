// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Record assembly: one delimited, bounded-length log line per request.
//!
//! The wire shape is `name 0x02 value` groups joined by `0x01` bytes. No
//! escaping is performed on values; a value that itself contains one of the
//! separator bytes corrupts the record. That is an accepted limitation of
//! the collector contract, not a feature.

use tracing::error;

use crate::errors::RecordError;
use crate::fields::{FieldRegistry, RequestSnapshot};

/// Hard cap on one serialized record, separators included.
pub const MAX_RECORD_BYTES: usize = 4096;

/// Joins `name`/`value` groups within one record.
pub const GROUP_SEPARATOR: u8 = 0x01;

/// Separates a field name from its value within one group.
pub const VALUE_SEPARATOR: u8 = 0x02;

/// Rendered in place of a value the host does not know.
pub const PLACEHOLDER: &str = "-";

/// One serialized record: a growable buffer capped at [`MAX_RECORD_BYTES`].
/// Write-once, read-once; dropped after delivery.
#[derive(Debug, Default)]
pub struct Record {
    buf: Vec<u8>,
}

impl Record {
    pub fn new() -> Record {
        Record { buf: Vec::new() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append one group, inserting the group separator unless the record is
    /// still empty. The append is refused when the resulting length would
    /// meet or exceed the cap: the buffer is left unchanged, the drop is
    /// logged with the attempted chunk and the current content, and the
    /// caller continues with the remaining fields.
    pub fn join(&mut self, chunk: &[u8]) -> Result<(), RecordError> {
        let sep = usize::from(!self.buf.is_empty());
        if self.buf.len() + sep + chunk.len() >= MAX_RECORD_BYTES {
            error!(
                "record cap ({} bytes) overflowed combining ({}) and ({})",
                MAX_RECORD_BYTES,
                String::from_utf8_lossy(&self.buf),
                String::from_utf8_lossy(chunk)
            );
            return Err(RecordError::Overflow {
                cap: MAX_RECORD_BYTES,
            });
        }
        if sep == 1 {
            self.buf.push(GROUP_SEPARATOR);
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }
}

fn group(name: &str, value: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(name.len() + 1 + value.len());
    chunk.extend_from_slice(name.as_bytes());
    chunk.push(VALUE_SEPARATOR);
    chunk.extend_from_slice(value);
    chunk
}

/// Serialize one request snapshot into a single delimited record.
///
/// Fields are emitted in registry order, reading each value through its
/// resolved handle and substituting [`PLACEHOLDER`] when the handle is
/// unresolved or the variable is absent for this request. Two derived
/// groups follow in fixed order: `status` and `time_iso8601`. A field whose
/// group would overflow the cap is dropped (and logged by [`Record::join`]);
/// assembly continues with whatever fields still fit. Byte-identical output
/// for identical inputs.
pub fn assemble(registry: &FieldRegistry, snapshot: &RequestSnapshot<'_>) -> Record {
    let mut record = Record::new();

    for spec in registry.specs() {
        let value = spec
            .handle
            .and_then(|handle| snapshot.vars.get(handle))
            .unwrap_or(std::borrow::Cow::Borrowed(PLACEHOLDER));
        let _ = record.join(&group(&spec.name, value.as_bytes()));
    }

    let _ = record.join(&group("status", snapshot.status.render().as_bytes()));
    let _ = record.join(&group("time_iso8601", snapshot.time_iso8601.as_bytes()));

    record
}

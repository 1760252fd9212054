//! JSONL serialization for label rows.
//!
//! One [`Label`] per line. Used by [`MemoryDb`](super::MemoryDb) to load
//! and flush its snapshot file.

use std::collections::BTreeMap;

use crate::error::DbError;
use crate::labels::{Label, Target};

/// Storage key of a row. Ordering by target first keeps each target's
/// labels adjacent in exported files.
pub(super) type RowKey = (Target, String);

/// Parse JSONL content into a row map, skipping empty lines.
/// Duplicate rows (same key+target) are accepted but logged as warnings.
pub(super) fn parse_jsonl_rows(content: &str) -> Result<BTreeMap<RowKey, String>, DbError> {
    content
        .lines()
        .enumerate()
        .try_fold(BTreeMap::new(), |mut map, (line_num, line)| {
            let line = line.trim();
            if line.is_empty() {
                return Ok(map);
            }

            let label: Label = serde_json::from_str(line).map_err(|e| DbError::Parse {
                line: line_num + 1,
                message: e.to_string(),
            })?;
            if label.value.is_empty() {
                return Err(DbError::Parse {
                    line: line_num + 1,
                    message: format!("label `{}` has an empty value", label.key),
                });
            }

            let row_key = (label.target, label.key);
            if map.contains_key(&row_key) {
                tracing::warn!(
                    line = line_num + 1,
                    target = %row_key.0,
                    key = %row_key.1,
                    "duplicate JSONL row overwrites previous value"
                );
            }
            map.insert(row_key, label.value);
            Ok(map)
        })
}

/// Export a row map to JSONL in `(target, key)` order.
pub(super) fn export_rows_to_jsonl(rows: &BTreeMap<RowKey, String>) -> Result<String, DbError> {
    rows.iter()
        .map(|((target, key), value)| {
            let label = Label::new(key.as_str(), value.as_str(), *target);
            serde_json::to_string(&label)
                .map(|line| format!("{line}\n"))
                .map_err(|e| DbError::Backend(format!("encode label row: {e}")))
        })
        .collect()
}

//! Storage abstraction for the `labels` relation.
//!
//! Defines the [`LabelDb`] trait and provides an in-memory implementation
//! ([`MemoryDb`], optionally persisted as JSONL) plus a PostgreSQL one
//! (`PgLabelDb`, behind the `postgres` feature).
//!
//! Rows are conceptually `(key, value, tgt_service_id, tgt_user_id)` with
//! exactly one target column set. [`Target`] encodes that invariant, so
//! implementations never see a row without a target or with two.

mod jsonl;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemoryDb;
#[cfg(feature = "postgres")]
pub use postgres::PgLabelDb;

use async_trait::async_trait;

use crate::error::DbError;
use crate::labels::{Target, TargetKind};

/// Minimal statement set the label store issues against its backend.
///
/// Every method is one statement. Implementations must make
/// [`upsert`](LabelDb::upsert) a single atomic conditional write: concurrent
/// upserts of the same `(key, target)` leave exactly one row behind.
#[async_trait]
pub trait LabelDb: Send + Sync {
    /// Insert `(key, value, target)`, or overwrite `value` if the
    /// `(key, target)` row already exists.
    async fn upsert(&self, key: &str, value: &str, target: &Target) -> Result<(), DbError>;

    /// Delete the `(key, target)` row. Returns the number of rows removed;
    /// zero is not an error.
    async fn delete(&self, key: &str, target: &Target) -> Result<u64, DbError>;

    /// All `(key, value)` pairs stored for `target`, in no particular order.
    async fn select_by_target(&self, target: &Target) -> Result<Vec<(String, String)>, DbError>;

    /// Distinct keys across every row.
    async fn select_distinct_keys(&self) -> Result<Vec<String>, DbError>;

    /// Distinct keys across rows whose target is of `kind`.
    async fn select_distinct_keys_for(&self, kind: TargetKind) -> Result<Vec<String>, DbError>;

    /// Distinct values stored under `key`, optionally restricted to one
    /// target kind.
    async fn select_distinct_values(
        &self,
        key: &str,
        kind: Option<TargetKind>,
    ) -> Result<Vec<String>, DbError>;
}

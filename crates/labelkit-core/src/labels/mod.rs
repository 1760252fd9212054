//! Key/value labels attached to services and users.
//!
//! Provides the label record and target types, normalization, and the
//! authorization-gated [`LabelStore`] façade over a [`LabelDb`](crate::db::LabelDb).

mod store;
mod types;

pub use store::LabelStore;
pub use types::{Label, LabelError, Target, TargetKind, TargetRef};

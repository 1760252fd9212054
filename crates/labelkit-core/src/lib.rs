pub mod auth;
pub mod db;
pub mod error;
pub mod labels;
#[cfg(test)]
mod test_util;
pub mod validate;

pub use auth::{Capability, RequestContext};
pub use error::DbError;
pub use labels::{Label, LabelError, LabelStore, Target, TargetKind};

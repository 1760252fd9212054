//! `LabelStore`: authorization-gated access to labels.
//!
//! Every operation follows the same shape: check capabilities, validate
//! input, issue exactly one statement against the [`LabelDb`], and wrap any
//! backend failure with the name of the operation. The store keeps no state
//! of its own between calls.

use std::future::Future;
use std::sync::Arc;

use crate::auth::{AuthorizationChecker, Capability, ContextPermissions, RequestContext};
use crate::db::LabelDb;
use crate::error::DbError;
use crate::validate;

use super::types::{Label, LabelError, Target, TargetKind};

/// Capabilities accepted by every label operation.
const LABEL_CAPABILITIES: &[Capability] = &[Capability::System, Capability::User];

#[derive(Clone)]
pub struct LabelStore {
    db: Arc<dyn LabelDb>,
    authz: Arc<dyn AuthorizationChecker>,
}

impl LabelStore {
    /// A store that authorizes against the capabilities carried on each
    /// [`RequestContext`].
    pub fn new(db: Arc<dyn LabelDb>) -> Self {
        Self::with_checker(db, Arc::new(ContextPermissions))
    }

    pub fn with_checker(db: Arc<dyn LabelDb>, authz: Arc<dyn AuthorizationChecker>) -> Self {
        Self { db, authz }
    }

    /// Run the capability check every operation performs. Exposed so callers
    /// can reject a request before decoding its payload.
    pub fn authorize(&self, ctx: &RequestContext) -> Result<(), LabelError> {
        self.authz.check_any(ctx, LABEL_CAPABILITIES)?;
        Ok(())
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Set, update or delete a label.
    ///
    /// A non-empty value is upserted on `(key, target)`. An empty value
    /// deletes the row instead; deleting a label that does not exist
    /// succeeds.
    pub async fn set(&self, ctx: &RequestContext, label: &Label) -> Result<(), LabelError> {
        self.authorize(ctx)?;
        let n = label.normalize()?;

        if n.is_tombstone() {
            let op = match n.target {
                Target::Service(_) => "delete service label",
                Target::User(_) => "delete user label",
            };
            let removed = self.run(ctx, op, self.db.delete(&n.key, &n.target)).await?;
            tracing::debug!(key = %n.key, target = %n.target, removed, "deleted label");
            return Ok(());
        }

        let op = match n.target {
            Target::Service(_) => "set service label",
            Target::User(_) => "set user label",
        };
        self.run(ctx, op, self.db.upsert(&n.key, &n.value, &n.target))
            .await?;
        tracing::debug!(key = %n.key, target = %n.target, "set label");
        Ok(())
    }

    // ========================================================================
    // Query
    // ========================================================================

    /// All labels attached to a service. Unknown services yield an empty list.
    pub async fn find_all_by_service(
        &self,
        ctx: &RequestContext,
        service_id: &str,
    ) -> Result<Vec<Label>, LabelError> {
        self.authorize(ctx)?;
        let id = validate::parse_uuid("ServiceID", service_id)?;
        self.find_all_by_target(ctx, Target::Service(id), "find all labels by service")
            .await
    }

    /// All labels attached to a user. Unknown users yield an empty list.
    pub async fn find_all_by_user(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> Result<Vec<Label>, LabelError> {
        self.authorize(ctx)?;
        let id = validate::parse_uuid("UserID", user_id)?;
        self.find_all_by_target(ctx, Target::User(id), "find all labels by user")
            .await
    }

    /// Every distinct key in use, across all targets. Order is unspecified.
    pub async fn unique_keys(&self, ctx: &RequestContext) -> Result<Vec<String>, LabelError> {
        self.authorize(ctx)?;
        let keys = self
            .run(ctx, "get unique label keys", self.db.select_distinct_keys())
            .await;
        or_empty(keys)
    }

    /// Distinct keys in use on targets of one kind.
    pub async fn unique_keys_for(
        &self,
        ctx: &RequestContext,
        kind: TargetKind,
    ) -> Result<Vec<String>, LabelError> {
        self.authorize(ctx)?;
        let op = match kind {
            TargetKind::Service => "get unique service label keys",
            TargetKind::User => "get unique user label keys",
        };
        let keys = self
            .run(ctx, op, self.db.select_distinct_keys_for(kind))
            .await;
        or_empty(keys)
    }

    /// Distinct values stored under `key`, optionally limited to one target
    /// kind.
    pub async fn unique_values(
        &self,
        ctx: &RequestContext,
        key: &str,
        kind: Option<TargetKind>,
    ) -> Result<Vec<String>, LabelError> {
        self.authorize(ctx)?;
        let key = key.trim();
        validate::label_key("Key", key)?;
        let values = self
            .run(
                ctx,
                "get unique label values",
                self.db.select_distinct_values(key, kind),
            )
            .await;
        or_empty(values)
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    async fn find_all_by_target(
        &self,
        ctx: &RequestContext,
        target: Target,
        op: &'static str,
    ) -> Result<Vec<Label>, LabelError> {
        let rows = or_empty(self.run(ctx, op, self.db.select_by_target(&target)).await)?;
        Ok(rows
            .into_iter()
            .map(|(key, value)| Label { key, value, target })
            .collect())
    }

    /// Drive one data store call, abandoning it as soon as the request is
    /// cancelled.
    async fn run<T>(
        &self,
        ctx: &RequestContext,
        op: &'static str,
        call: impl Future<Output = Result<T, DbError>>,
    ) -> Result<T, LabelError> {
        if ctx.is_cancelled() {
            tracing::debug!(op, "label operation cancelled before it started");
            return Err(LabelError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => {
                tracing::debug!(op, "label operation cancelled");
                Err(LabelError::Cancelled)
            }
            result = call => result.map_err(LabelError::store(op)),
        }
    }
}

/// Collapse a "no rows" failure into an empty result.
fn or_empty<T>(result: Result<Vec<T>, LabelError>) -> Result<Vec<T>, LabelError> {
    match result {
        Err(LabelError::Store {
            source: DbError::NoRows,
            ..
        }) => Ok(Vec::new()),
        other => other,
    }
}

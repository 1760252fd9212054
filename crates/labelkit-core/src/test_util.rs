//! Shared test doubles for `labelkit-core` unit tests.
//!
//! Consolidates the fake [`LabelDb`] backends and authorization checkers so
//! tests across modules build failure scenarios the same way.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::auth::{AuthError, AuthorizationChecker, Capability, RequestContext};
use crate::db::{LabelDb, MemoryDb};
use crate::error::DbError;
use crate::labels::{Target, TargetKind};

// ==============================================================================
// Authorization
// ==============================================================================

/// Rejects every caller regardless of context.
pub struct DenyAll;

impl AuthorizationChecker for DenyAll {
    fn check_any(&self, _ctx: &RequestContext, required: &[Capability]) -> Result<(), AuthError> {
        Err(AuthError::Missing {
            required: required.to_vec(),
        })
    }
}

// ==============================================================================
// Backends
// ==============================================================================

/// A [`MemoryDb`] that counts how many statements reached it.
#[derive(Default)]
pub struct RecordingDb {
    inner: MemoryDb,
    calls: AtomicUsize,
}

impl RecordingDb {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LabelDb for RecordingDb {
    async fn upsert(&self, key: &str, value: &str, target: &Target) -> Result<(), DbError> {
        self.record();
        self.inner.upsert(key, value, target).await
    }

    async fn delete(&self, key: &str, target: &Target) -> Result<u64, DbError> {
        self.record();
        self.inner.delete(key, target).await
    }

    async fn select_by_target(&self, target: &Target) -> Result<Vec<(String, String)>, DbError> {
        self.record();
        self.inner.select_by_target(target).await
    }

    async fn select_distinct_keys(&self) -> Result<Vec<String>, DbError> {
        self.record();
        self.inner.select_distinct_keys().await
    }

    async fn select_distinct_keys_for(&self, kind: TargetKind) -> Result<Vec<String>, DbError> {
        self.record();
        self.inner.select_distinct_keys_for(kind).await
    }

    async fn select_distinct_values(
        &self,
        key: &str,
        kind: Option<TargetKind>,
    ) -> Result<Vec<String>, DbError> {
        self.record();
        self.inner.select_distinct_values(key, kind).await
    }
}

/// Fails every statement with a freshly built error.
pub struct FailingDb {
    make_err: fn() -> DbError,
}

impl FailingDb {
    pub fn new(make_err: fn() -> DbError) -> Self {
        Self { make_err }
    }
}

#[async_trait]
impl LabelDb for FailingDb {
    async fn upsert(&self, _key: &str, _value: &str, _target: &Target) -> Result<(), DbError> {
        Err((self.make_err)())
    }

    async fn delete(&self, _key: &str, _target: &Target) -> Result<u64, DbError> {
        Err((self.make_err)())
    }

    async fn select_by_target(&self, _target: &Target) -> Result<Vec<(String, String)>, DbError> {
        Err((self.make_err)())
    }

    async fn select_distinct_keys(&self) -> Result<Vec<String>, DbError> {
        Err((self.make_err)())
    }

    async fn select_distinct_keys_for(&self, _kind: TargetKind) -> Result<Vec<String>, DbError> {
        Err((self.make_err)())
    }

    async fn select_distinct_values(
        &self,
        _key: &str,
        _kind: Option<TargetKind>,
    ) -> Result<Vec<String>, DbError> {
        Err((self.make_err)())
    }
}

/// Never completes a statement. Used to exercise cancellation.
pub struct StallingDb;

#[async_trait]
impl LabelDb for StallingDb {
    async fn upsert(&self, _key: &str, _value: &str, _target: &Target) -> Result<(), DbError> {
        std::future::pending().await
    }

    async fn delete(&self, _key: &str, _target: &Target) -> Result<u64, DbError> {
        std::future::pending().await
    }

    async fn select_by_target(&self, _target: &Target) -> Result<Vec<(String, String)>, DbError> {
        std::future::pending().await
    }

    async fn select_distinct_keys(&self) -> Result<Vec<String>, DbError> {
        std::future::pending().await
    }

    async fn select_distinct_keys_for(&self, _kind: TargetKind) -> Result<Vec<String>, DbError> {
        std::future::pending().await
    }

    async fn select_distinct_values(
        &self,
        _key: &str,
        _kind: Option<TargetKind>,
    ) -> Result<Vec<String>, DbError> {
        std::future::pending().await
    }
}

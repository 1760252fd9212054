//! In-memory `labels` relation with optional JSONL persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DbError;
use crate::labels::{Target, TargetKind};

use super::jsonl::{export_rows_to_jsonl, parse_jsonl_rows, RowKey};
use super::LabelDb;

type Rows = BTreeMap<RowKey, String>;

/// In-memory `labels` relation.
///
/// Every write runs under a single write guard, so an upsert is atomic with
/// respect to concurrent upserts and deletes of the same row. When created
/// with [`MemoryDb::with_persistence`] a mutation is applied to a copy of the
/// rows, the copy is flushed to a JSONL file, and only then does it replace
/// the live rows. A failed flush, or a caller that drops the future while the
/// flush is in flight, leaves the live rows untouched.
pub struct MemoryDb {
    rows: RwLock<Rows>,
    snapshot: Option<Arc<SnapshotFile>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            snapshot: None,
        }
    }

    /// Load rows from `path` (if it exists) and flush every mutation back
    /// to it.
    pub fn with_persistence(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref().to_path_buf();
        let rows = if path.is_file() {
            let content = std::fs::read_to_string(&path)?;
            parse_jsonl_rows(&content)?
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), rows = rows.len(), "loaded label rows");
        Ok(Self {
            rows: RwLock::new(rows),
            snapshot: Some(Arc::new(SnapshotFile::new(path))),
        })
    }

    /// Number of stored rows.
    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Apply `mutate` to the rows held by `live`. With persistence the
    /// mutated copy must reach disk before it becomes visible.
    async fn commit(
        &self,
        live: &mut Rows,
        mutate: impl FnOnce(&mut Rows),
    ) -> Result<(), DbError> {
        let Some(snapshot) = &self.snapshot else {
            mutate(live);
            return Ok(());
        };

        let mut next = live.clone();
        mutate(&mut next);
        save_snapshot(snapshot, &next).await?;
        *live = next;
        Ok(())
    }
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

// ==============================================================================
// Snapshot file
// ==============================================================================

/// JSONL file mirroring the committed rows.
struct SnapshotFile {
    path: PathBuf,
    next_generation: AtomicU64,
    /// Generation of the snapshot currently on disk.
    written: Mutex<u64>,
}

impl SnapshotFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            next_generation: AtomicU64::new(1),
            written: Mutex::new(0),
        }
    }

    /// Write `content` as snapshot `generation`. A write abandoned by its
    /// caller may still run on the blocking pool; it is skipped once a newer
    /// snapshot has landed.
    fn write(&self, generation: u64, content: &str) -> Result<(), DbError> {
        let mut written = self
            .written
            .lock()
            .map_err(|_| DbError::Backend("label snapshot lock poisoned".to_string()))?;
        if generation <= *written {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename so readers never observe a half-written file.
        let tmp = self.path.with_extension(format!("jsonl.{generation}.tmp"));
        if let Err(err) =
            std::fs::write(&tmp, content).and_then(|()| std::fs::rename(&tmp, &self.path))
        {
            if let Err(cleanup) = std::fs::remove_file(&tmp) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %tmp.display(),
                        error = %cleanup,
                        "failed to remove temporary label snapshot"
                    );
                }
            }
            return Err(err.into());
        }

        *written = generation;
        Ok(())
    }
}

async fn save_snapshot(snapshot: &Arc<SnapshotFile>, rows: &Rows) -> Result<(), DbError> {
    let content = export_rows_to_jsonl(rows)?;
    let generation = snapshot.next_generation.fetch_add(1, Ordering::Relaxed);
    let file = Arc::clone(snapshot);
    tokio::task::spawn_blocking(move || file.write(generation, &content))
        .await
        .map_err(|err| DbError::Backend(format!("label snapshot task failed: {err}")))?
}

#[async_trait]
impl LabelDb for MemoryDb {
    async fn upsert(&self, key: &str, value: &str, target: &Target) -> Result<(), DbError> {
        if value.is_empty() {
            return Err(DbError::Constraint(
                "labels.value must not be empty".to_string(),
            ));
        }

        let mut rows = self.rows.write().await;
        let row_key = (*target, key.to_string());
        self.commit(&mut rows, |rows| {
            rows.insert(row_key, value.to_string());
        })
        .await
    }

    async fn delete(&self, key: &str, target: &Target) -> Result<u64, DbError> {
        let mut rows = self.rows.write().await;
        let row_key = (*target, key.to_string());
        if !rows.contains_key(&row_key) {
            return Ok(0);
        }

        self.commit(&mut rows, |rows| {
            rows.remove(&row_key);
        })
        .await?;
        Ok(1)
    }

    async fn select_by_target(&self, target: &Target) -> Result<Vec<(String, String)>, DbError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|((t, _), _)| t == target)
            .map(|((_, key), value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn select_distinct_keys(&self) -> Result<Vec<String>, DbError> {
        let rows = self.rows.read().await;
        let keys: BTreeSet<&String> = rows.keys().map(|(_, key)| key).collect();
        Ok(keys.into_iter().cloned().collect())
    }

    async fn select_distinct_keys_for(&self, kind: TargetKind) -> Result<Vec<String>, DbError> {
        let rows = self.rows.read().await;
        let keys: BTreeSet<&String> = rows
            .keys()
            .filter(|(target, _)| target.kind() == kind)
            .map(|(_, key)| key)
            .collect();
        Ok(keys.into_iter().cloned().collect())
    }

    async fn select_distinct_values(
        &self,
        key: &str,
        kind: Option<TargetKind>,
    ) -> Result<Vec<String>, DbError> {
        let rows = self.rows.read().await;
        let values: BTreeSet<&String> = rows
            .iter()
            .filter(|((target, k), _)| k == key && kind.is_none_or(|kind| target.kind() == kind))
            .map(|(_, value)| value)
            .collect();
        Ok(values.into_iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn unique_path(tag: &str) -> PathBuf {
        let unique = format!(
            "{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("system time before unix epoch")
                .as_nanos()
        );
        std::env::temp_dir()
            .join("labelkit-tests")
            .join(unique)
            .join("labels.jsonl")
    }

    #[tokio::test]
    async fn upsert_overwrites_in_place() {
        let db = MemoryDb::new();
        let target = Target::Service(Uuid::new_v4());
        db.upsert("team/department", "engineering", &target)
            .await
            .expect("insert");
        db.upsert("team/department", "devops", &target)
            .await
            .expect("update");

        assert_eq!(db.row_count().await, 1);
        let rows = db.select_by_target(&target).await.expect("select");
        assert_eq!(
            rows,
            vec![("team/department".to_string(), "devops".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_value_violates_constraint() {
        let db = MemoryDb::new();
        let target = Target::User(Uuid::new_v4());
        let err = db.upsert("org/team", "", &target).await.unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
        assert_eq!(db.row_count().await, 0);
    }

    #[tokio::test]
    async fn delete_reports_rows_affected() {
        let db = MemoryDb::new();
        let target = Target::User(Uuid::new_v4());
        assert_eq!(db.delete("org/team", &target).await.expect("delete"), 0);
        db.upsert("org/team", "backend", &target)
            .await
            .expect("insert");
        assert_eq!(db.delete("org/team", &target).await.expect("delete"), 1);
        assert_eq!(db.row_count().await, 0);
    }

    #[tokio::test]
    async fn distinct_queries_dedupe_and_filter_by_kind() {
        let db = MemoryDb::new();
        let svc_a = Target::Service(Uuid::new_v4());
        let svc_b = Target::Service(Uuid::new_v4());
        let usr = Target::User(Uuid::new_v4());
        db.upsert("org/team", "backend", &svc_a).await.unwrap();
        db.upsert("org/team", "backend", &svc_b).await.unwrap();
        db.upsert("org/team", "frontend", &usr).await.unwrap();
        db.upsert("env/tier", "prod", &svc_a).await.unwrap();
        db.upsert("team/department", "devops", &usr).await.unwrap();

        assert_eq!(
            db.select_distinct_keys().await.unwrap(),
            vec!["env/tier", "org/team", "team/department"]
        );
        assert_eq!(
            db.select_distinct_keys_for(TargetKind::Service)
                .await
                .unwrap(),
            vec!["env/tier", "org/team"]
        );
        assert_eq!(
            db.select_distinct_values("org/team", None).await.unwrap(),
            vec!["backend", "frontend"]
        );
        assert_eq!(
            db.select_distinct_values("org/team", Some(TargetKind::User))
                .await
                .unwrap(),
            vec!["frontend"]
        );
    }

    #[tokio::test]
    async fn persistence_survives_reload() {
        let path = unique_path("persist");
        let target = Target::User(Uuid::new_v4());
        {
            let db = MemoryDb::with_persistence(&path).expect("open new file");
            db.upsert("team/department", "engineering", &target)
                .await
                .expect("insert");
            db.upsert("org/team", "backend", &target)
                .await
                .expect("insert");
            db.delete("team/department", &target)
                .await
                .expect("delete");
        }

        let reopened = MemoryDb::with_persistence(&path).expect("reopen");
        let rows = reopened.select_by_target(&target).await.expect("select");
        assert_eq!(rows, vec![("org/team".to_string(), "backend".to_string())]);

        let dir = path.parent().expect("test file has a parent");
        std::fs::remove_dir_all(dir).expect("cleanup test dir");
    }

    #[tokio::test]
    async fn corrupt_file_fails_to_load() {
        let path = unique_path("corrupt");
        let dir = path.parent().expect("test file has a parent");
        std::fs::create_dir_all(dir).expect("create test dir");
        std::fs::write(&path, "{\"key\":1}\n").expect("write corrupt file");

        assert!(matches!(
            MemoryDb::with_persistence(&path),
            Err(DbError::Parse { line: 1, .. })
        ));

        std::fs::remove_dir_all(dir).expect("cleanup test dir");
    }

    /// A persisted store whose snapshot directory is blocked by a regular
    /// file, so every flush fails.
    fn unwritable(tag: &str, rows: Rows) -> (MemoryDb, PathBuf) {
        let root = unique_path(tag)
            .parent()
            .expect("test file has a parent")
            .to_path_buf();
        std::fs::create_dir_all(&root).expect("create test dir");
        let blocker = root.join("blocker");
        std::fs::write(&blocker, "").expect("write blocker file");

        let db = MemoryDb {
            rows: RwLock::new(rows),
            snapshot: Some(Arc::new(SnapshotFile::new(blocker.join("labels.jsonl")))),
        };
        (db, root)
    }

    #[tokio::test]
    async fn failed_flush_rolls_back_insert() {
        let target = Target::Service(Uuid::new_v4());
        let (db, root) = unwritable("flush-insert", BTreeMap::new());

        let err = db
            .upsert("env/tier", "prod", &target)
            .await
            .expect_err("flush into a regular file must fail");
        assert!(matches!(err, DbError::Io(_)));
        assert_eq!(db.row_count().await, 0);
        assert!(db.select_by_target(&target).await.unwrap().is_empty());

        std::fs::remove_dir_all(root).expect("cleanup test dir");
    }

    #[tokio::test]
    async fn failed_flush_rolls_back_update_and_delete() {
        let target = Target::User(Uuid::new_v4());
        let existing = BTreeMap::from([(
            (target, "org/team".to_string()),
            "backend".to_string(),
        )]);
        let (db, root) = unwritable("flush-delete", existing);
        let before = vec![("org/team".to_string(), "backend".to_string())];

        let err = db.upsert("org/team", "frontend", &target).await.unwrap_err();
        assert!(matches!(err, DbError::Io(_)));
        assert_eq!(db.select_by_target(&target).await.unwrap(), before);

        let err = db.delete("org/team", &target).await.unwrap_err();
        assert!(matches!(err, DbError::Io(_)));
        assert_eq!(db.row_count().await, 1);
        assert_eq!(db.select_by_target(&target).await.unwrap(), before);

        std::fs::remove_dir_all(root).expect("cleanup test dir");
    }

    #[tokio::test]
    async fn failed_rename_removes_temp_file() {
        let path = unique_path("rename");
        // A directory in place of the snapshot makes the rename fail after
        // the temp file was written.
        std::fs::create_dir_all(path.join("occupied")).expect("create blocking dir");
        let db = MemoryDb::with_persistence(&path).expect("open");
        let target = Target::User(Uuid::new_v4());

        let err = db.upsert("org/team", "backend", &target).await.unwrap_err();
        assert!(matches!(err, DbError::Io(_)));
        assert_eq!(db.row_count().await, 0);

        let dir = path.parent().expect("test file has a parent");
        let leftovers: Vec<_> = std::fs::read_dir(dir)
            .expect("list test dir")
            .map(|entry| entry.expect("dir entry").file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("labels.jsonl")]);

        std::fs::remove_dir_all(dir).expect("cleanup test dir");
    }

    #[tokio::test]
    async fn dropped_mutation_leaves_rows_untouched() {
        let path = unique_path("dropped");
        let db = MemoryDb::with_persistence(&path).expect("open new file");
        let target = Target::Service(Uuid::new_v4());

        // Poll once: the flush is handed to the blocking pool and the call
        // is then abandoned mid-flight.
        let mut upsert = db.upsert("env/tier", "prod", &target);
        let finished = tokio::select! {
            biased;
            _ = &mut upsert => true,
            _ = std::future::ready(()) => false,
        };
        assert!(!finished, "flush should still be in flight");
        drop(upsert);

        assert_eq!(db.row_count().await, 0);
        assert!(db.select_by_target(&target).await.unwrap().is_empty());

        // The next committed write is what lands on disk.
        db.upsert("org/team", "backend", &target)
            .await
            .expect("insert");
        let reopened = MemoryDb::with_persistence(&path).expect("reopen");
        assert_eq!(
            reopened.select_by_target(&target).await.unwrap(),
            vec![("org/team".to_string(), "backend".to_string())]
        );

        let dir = path.parent().expect("test file has a parent");
        std::fs::remove_dir_all(dir).expect("cleanup test dir");
    }
}

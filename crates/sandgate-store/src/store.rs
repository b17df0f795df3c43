//! Line-oriented append-only record store

use sandgate_core::{Result, ValidationRecord};
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Append-only JSONL store for `ValidationRecord`s
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Append one record. Called exactly once per pipeline run.
    pub async fn append(&self, record: &ValidationRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        use tokio::io::AsyncWriteExt;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;

        debug!("Stored run {} to {:?}", record.run_id, self.path);
        Ok(())
    }

    /// Load a single run by its identifier
    pub async fn load(&self, run_id: &Uuid) -> Result<Option<ValidationRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).await?;

        for line in content.lines() {
            if line.is_empty() {
                continue;
            }

            // Same tolerance as load_all: a corrupt line must not hide the
            // records appended after it
            match serde_json::from_str::<ValidationRecord>(line) {
                Ok(record) if &record.run_id == run_id => return Ok(Some(record)),
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to parse history line: {}", e);
                }
            }
        }

        Ok(None)
    }

    /// Load every record, oldest first, skipping unparsable lines
    pub async fn load_all(&self) -> Result<Vec<ValidationRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        let mut records = Vec::new();

        for line in content.lines() {
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<ValidationRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!("Failed to parse history line: {}", e);
                }
            }
        }

        Ok(records)
    }

    /// The most recent `n` records, newest first
    pub async fn recent(&self, n: usize) -> Result<Vec<ValidationRecord>> {
        let mut records = self.load_all().await?;
        records.reverse();
        records.truncate(n);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandgate_core::Decision;
    use tempfile::tempdir;

    fn record(decision: Decision) -> ValidationRecord {
        ValidationRecord::aborted(
            Uuid::new_v4(),
            "sandbox-validate-20250101-abc123",
            decision,
            Vec::new(),
            2.5,
        )
    }

    #[tokio::test]
    async fn test_append_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = ResultStore::new(dir.path().join(".sandgate/history.jsonl"));

        let original = record(Decision::Merge);
        store.append(&original).await.unwrap();

        let loaded = store.load(&original.run_id).await.unwrap().unwrap();
        assert_eq!(loaded.run_id, original.run_id);
        assert_eq!(loaded.decision, original.decision);
        assert_eq!(loaded.workspace, original.workspace);
        assert_eq!(loaded.timestamp, original.timestamp);
        assert!((loaded.duration_secs - original.duration_secs).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_load_all_preserves_order() {
        let dir = tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("history.jsonl"));

        let first = record(Decision::Revert);
        let second = record(Decision::Review);
        store.append(&first).await.unwrap();
        store.append(&second).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].run_id, first.run_id);
        assert_eq!(all[1].run_id, second.run_id);
    }

    #[tokio::test]
    async fn test_unparsable_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let store = ResultStore::new(&path);

        store.append(&record(Decision::Merge)).await.unwrap();
        tokio::fs::write(
            &path,
            format!(
                "{}\nnot json at all\n",
                tokio::fs::read_to_string(&path).await.unwrap().trim_end()
            ),
        )
        .await
        .unwrap();
        store.append(&record(Decision::Review)).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_load_finds_records_past_a_corrupt_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let store = ResultStore::new(&path);

        tokio::fs::write(&path, "not json at all\n").await.unwrap();
        let wanted = record(Decision::Review);
        store.append(&wanted).await.unwrap();

        let loaded = store.load(&wanted.run_id).await.unwrap().unwrap();
        assert_eq!(loaded.run_id, wanted.run_id);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("nope.jsonl"));

        assert!(store.load_all().await.unwrap().is_empty());
        assert!(store.load(&Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_is_newest_first() {
        let dir = tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("history.jsonl"));

        let first = record(Decision::Revert);
        let second = record(Decision::Merge);
        store.append(&first).await.unwrap();
        store.append(&second).await.unwrap();

        let recent = store.recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].run_id, second.run_id);
    }
}

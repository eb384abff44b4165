//! Commit ledger storage
//!
//! Each entry is a file named `<repo>.<stage>.<params>.<checksum>.commit`
//! whose content is the raw commit id. Writes go through a temp file in the
//! same directory and are renamed into place, so concurrent readers never
//! observe a partial commit id.

use crate::error::{StrataError, StrataResult};
use crate::names::file_safe;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

const EXTENSION: &str = "commit";

/// Key of one ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    /// Stage name
    pub stage: String,
    /// Repository identity
    pub repository: String,
    /// Repository parameter hash
    pub params_hash: String,
    /// Dependencies checksum of the stage
    pub dependencies_checksum: String,
}

impl LedgerKey {
    /// Create a key, normalizing every field to be file-safe
    pub fn new(
        stage: &str,
        repository: &str,
        params_hash: &str,
        dependencies_checksum: &str,
    ) -> Self {
        Self {
            stage: file_safe(stage),
            repository: file_safe(repository),
            params_hash: file_safe(params_hash),
            dependencies_checksum: file_safe(dependencies_checksum),
        }
    }

    /// File name for this key
    pub fn file_name(&self) -> String {
        format!(
            "{}.{}.{}.{}.{}",
            self.repository, self.stage, self.params_hash, self.dependencies_checksum, EXTENSION
        )
    }

    /// Parse a ledger file name back into a key
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(&format!(".{}", EXTENSION))?;
        let fields: Vec<&str> = stem.split('.').collect();
        match fields.as_slice() {
            [repository, stage, params_hash, checksum]
                if fields.iter().all(|f| !f.is_empty()) =>
            {
                Some(Self {
                    stage: stage.to_string(),
                    repository: repository.to_string(),
                    params_hash: params_hash.to_string(),
                    dependencies_checksum: checksum.to_string(),
                })
            }
            _ => None,
        }
    }
}

/// A ledger entry found on disk
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub key: LedgerKey,
    pub commit: String,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Commit ledger rooted in a build directory
#[derive(Debug, Clone)]
pub struct CommitLedger {
    dir: PathBuf,
}

impl CommitLedger {
    /// Create a ledger rooted at `dir` (created lazily on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the ledger files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`
    pub fn path(&self, key: &LedgerKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Read the commit recorded for `key`.
    ///
    /// A missing, unreadable or empty file means no prior commit is known.
    pub fn read(&self, key: &LedgerKey) -> Option<String> {
        let path = self.path(key);
        match fs::read_to_string(&path) {
            Ok(content) => {
                let commit = content.trim();
                if commit.is_empty() {
                    debug!("Ignoring empty ledger entry {}", path.display());
                    None
                } else {
                    Some(commit.to_string())
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                debug!("Ignoring unreadable ledger entry {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Record `commit` for `key`, replacing any previous value
    pub fn write(&self, key: &LedgerKey, commit: &str) -> StrataResult<PathBuf> {
        let path = self.path(key);
        let fail = |reason: String| StrataError::LedgerWrite {
            path: path.clone(),
            reason,
        };

        fs::create_dir_all(&self.dir).map_err(|e| fail(e.to_string()))?;

        let mut temp = tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| fail(e.to_string()))?;
        temp.write_all(commit.as_bytes())
            .map_err(|e| fail(e.to_string()))?;
        temp.persist(&path).map_err(|e| fail(e.error.to_string()))?;

        debug!("Recorded {} in {}", commit, path.display());
        Ok(path)
    }

    /// List all entries, sorted by repository then stage
    pub fn list(&self) -> StrataResult<Vec<LedgerEntry>> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }

        let read_dir = fs::read_dir(&self.dir)
            .map_err(|e| StrataError::io(format!("reading ledger {}", self.dir.display()), e))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| StrataError::io("reading ledger entry", e))?;
            let name = entry.file_name();
            let Some(key) = name.to_str().and_then(LedgerKey::from_file_name) else {
                continue;
            };
            let Some(commit) = self.read(&key) else {
                continue;
            };
            let modified_at = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from);

            entries.push(LedgerEntry {
                key,
                commit,
                modified_at,
            });
        }

        entries.sort_by(|a, b| {
            (&a.key.repository, &a.key.stage).cmp(&(&b.key.repository, &b.key.stage))
        });
        Ok(entries)
    }

    /// Remove all entries, returning how many were removed
    pub fn clear(&self) -> StrataResult<usize> {
        let entries = self.list()?;
        for entry in &entries {
            let path = self.path(&entry.key);
            fs::remove_file(&path)
                .map_err(|e| StrataError::io(format!("removing {}", path.display()), e))?;
        }
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key() -> LedgerKey {
        LedgerKey::new("source_archive", "app", "p1", "c1")
    }

    #[test]
    fn file_name_layout() {
        assert_eq!(key().file_name(), "app.source_archive.p1.c1.commit");
    }

    #[test]
    fn key_fields_are_normalized() {
        let key = LedgerKey::new("stage", "my.repo", "p", "c");
        assert_eq!(key.file_name(), "my_repo.stage.p.c.commit");
    }

    #[test]
    fn file_name_parses_back() {
        let parsed = LedgerKey::from_file_name(&key().file_name()).unwrap();
        assert_eq!(parsed, key());
        assert!(LedgerKey::from_file_name("app.stage.commit").is_none());
        assert!(LedgerKey::from_file_name("app.a.b.c.txt").is_none());
    }

    #[test]
    fn missing_entry_reads_none() {
        let dir = TempDir::new().unwrap();
        let ledger = CommitLedger::new(dir.path());
        assert!(ledger.read(&key()).is_none());
    }

    #[test]
    fn write_then_read_trims() {
        let dir = TempDir::new().unwrap();
        let ledger = CommitLedger::new(dir.path().join("build"));

        ledger.write(&key(), "a1b2").unwrap();
        assert_eq!(ledger.read(&key()).as_deref(), Some("a1b2"));

        fs::write(ledger.path(&key()), "c3d4\n").unwrap();
        assert_eq!(ledger.read(&key()).as_deref(), Some("c3d4"));
    }

    #[test]
    fn write_overwrites_whole_value() {
        let dir = TempDir::new().unwrap();
        let ledger = CommitLedger::new(dir.path());

        ledger.write(&key(), "a-much-longer-commit-id").unwrap();
        ledger.write(&key(), "short").unwrap();

        assert_eq!(ledger.read(&key()).as_deref(), Some("short"));
    }

    #[test]
    fn write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let ledger = CommitLedger::new(dir.path());
        ledger.write(&key(), "a1b2").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![key().file_name()]);
    }

    #[test]
    fn different_checksum_is_a_different_entry() {
        let dir = TempDir::new().unwrap();
        let ledger = CommitLedger::new(dir.path());
        ledger.write(&key(), "a1b2").unwrap();

        let other = LedgerKey::new("source_archive", "app", "p1", "c2");
        assert!(ledger.read(&other).is_none());
    }

    #[test]
    fn empty_file_reads_none() {
        let dir = TempDir::new().unwrap();
        let ledger = CommitLedger::new(dir.path());
        fs::write(ledger.path(&key()), "  \n").unwrap();
        assert!(ledger.read(&key()).is_none());
    }

    #[test]
    fn list_and_clear() {
        let dir = TempDir::new().unwrap();
        let ledger = CommitLedger::new(dir.path());
        ledger.write(&LedgerKey::new("s2", "b", "p", "c"), "2").unwrap();
        ledger.write(&LedgerKey::new("s1", "a", "p", "c"), "1").unwrap();
        fs::write(dir.path().join("unrelated.txt"), "x").unwrap();

        let entries = ledger.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key.repository, "a");
        assert_eq!(entries[0].commit, "1");
        assert!(entries[0].modified_at.is_some());

        assert_eq!(ledger.clear().unwrap(), 2);
        assert!(ledger.list().unwrap().is_empty());
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn list_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = CommitLedger::new(dir.path().join("nope"));
        assert!(ledger.list().unwrap().is_empty());
    }
}

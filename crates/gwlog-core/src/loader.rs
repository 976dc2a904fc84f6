//! Reading staged files back as records.

use gwlog_common::{Error, RawLogRecord, Result};
use gwlog_config::ingest::loaded_dir;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Discovers pending staged files.
#[derive(Debug, Clone)]
pub struct StagedRecordLoader {
    dir: PathBuf,
}

impl StagedRecordLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Snapshot the pending `*.json` files and prepare the loaded area.
    ///
    /// Only the top level of the staging directory is considered, so files
    /// already moved to `loaded/` are never picked up again.
    pub fn scan(&self) -> Result<StagedRecords> {
        let loaded = loaded_dir(&self.dir);
        fs::create_dir_all(&loaded).map_err(|e| Error::staging_io(&loaded, e))?;

        let mut pending = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|e| Error::staging_io(&self.dir, e))? {
            let entry = entry.map_err(|e| Error::staging_io(&self.dir, e))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                pending.push(path);
            }
        }
        pending.sort();

        debug!(dir = %self.dir.display(), files = pending.len(), "scanned staging directory");
        Ok(StagedRecords {
            total: pending.len(),
            pending: pending.into(),
            current: None,
            loaded_dir: loaded,
            loaded: 0,
            failed: false,
        })
    }
}

/// Records of every pending file, in file order then array order.
///
/// A file is moved to the loaded area when the consumer asks for the record
/// after its last one. The first error ends iteration.
#[derive(Debug)]
pub struct StagedRecords {
    pending: VecDeque<PathBuf>,
    current: Option<(PathBuf, std::vec::IntoIter<RawLogRecord>)>,
    loaded_dir: PathBuf,
    total: usize,
    loaded: usize,
    failed: bool,
}

impl StagedRecords {
    /// Files discovered by the scan.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Files moved to the loaded area so far.
    pub fn loaded(&self) -> usize {
        self.loaded
    }

    fn finish(&mut self, path: &Path) -> Result<()> {
        let Some(name) = path.file_name() else {
            return Ok(());
        };
        let target = self.loaded_dir.join(name);
        fs::rename(path, &target).map_err(|e| Error::staging_io(path, e))?;
        self.loaded += 1;
        info!(
            loaded = self.loaded,
            total = self.total,
            "{}/{} files loaded",
            self.loaded,
            self.total
        );
        Ok(())
    }

    fn fail(&mut self, err: Error) -> Option<Result<RawLogRecord>> {
        self.failed = true;
        Some(Err(err))
    }
}

impl Iterator for StagedRecords {
    type Item = Result<RawLogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if let Some((_, records)) = self.current.as_mut() {
                if let Some(record) = records.next() {
                    return Some(Ok(record));
                }
            }
            if let Some((path, _)) = self.current.take() {
                if let Err(err) = self.finish(&path) {
                    return self.fail(err);
                }
                continue;
            }

            let path = self.pending.pop_front()?;
            match read_staged_file(&path) {
                Ok(records) => {
                    debug!(path = %path.display(), records = records.len(), "reading staged file");
                    self.current = Some((path, records.into_iter()));
                }
                Err(err) => return self.fail(err),
            }
        }
    }
}

/// Parse one staged file as an array of records.
pub fn read_staged_file(path: &Path) -> Result<Vec<RawLogRecord>> {
    let bytes = fs::read(path).map_err(|e| Error::staging_io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pending_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.is_file())
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_moves_file_after_last_record() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.json"), r#"[{"n":1},{"n":2}]"#).unwrap();

        let mut records = StagedRecordLoader::new(tmp.path()).scan().unwrap();
        assert_eq!(records.total(), 1);
        assert!(records.next().unwrap().is_ok());
        assert!(records.next().unwrap().is_ok());
        assert!(tmp.path().join("a.json").exists());

        assert!(records.next().is_none());
        assert!(!tmp.path().join("a.json").exists());
        assert!(tmp.path().join("loaded").join("a.json").exists());
        assert_eq!(records.loaded(), 1);
    }

    #[test]
    fn test_files_in_name_order() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.json"), r#"[{"n":2}]"#).unwrap();
        fs::write(tmp.path().join("a.json"), r#"[{"n":1}]"#).unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let values: Vec<i64> = StagedRecordLoader::new(tmp.path())
            .scan()
            .unwrap()
            .map(|r| r.unwrap().get("n").unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(values, vec![1, 2]);
        assert_eq!(pending_names(tmp.path()), vec!["notes.txt"]);
    }

    #[test]
    fn test_empty_array_file_is_moved() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.json"), "[]").unwrap();
        let count = StagedRecordLoader::new(tmp.path()).scan().unwrap().count();
        assert_eq!(count, 0);
        assert!(tmp.path().join("loaded").join("a.json").exists());
    }

    #[test]
    fn test_parse_error_ends_iteration_and_keeps_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.json"), "[{\"n\":1},").unwrap();
        fs::write(tmp.path().join("b.json"), r#"[{"n":2}]"#).unwrap();

        let results: Vec<_> = StagedRecordLoader::new(tmp.path()).scan().unwrap().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(Error::Parse { .. })));
        assert_eq!(pending_names(tmp.path()), vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_loaded_files_are_not_rescanned() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.json"), r#"[{"n":1}]"#).unwrap();
        assert_eq!(StagedRecordLoader::new(tmp.path()).scan().unwrap().count(), 1);
        assert_eq!(StagedRecordLoader::new(tmp.path()).scan().unwrap().total(), 0);
    }
}

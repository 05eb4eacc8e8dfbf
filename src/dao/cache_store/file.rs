use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use super::RecordStore;
use crate::dao::{
    models::CacheRecord,
    storage::{StorageError, StorageResult},
};

/// Record store keeping one JSON document per namespace inside a directory.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    root: PathBuf,
}

impl FileRecordStore {
    /// Use `root` as the cache directory; it is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect::<String>();
        self.root.join(format!("{file_name}.json"))
    }
}

impl RecordStore for FileRecordStore {
    fn read(&self, key: &str) -> StorageResult<Option<CacheRecord>> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(StorageError::unavailable(
                    format!("read `{}`", path.display()),
                    err,
                ));
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| StorageError::Corrupted {
                key: key.to_owned(),
                source,
            })
    }

    fn write(&self, key: &str, record: &CacheRecord) -> StorageResult<()> {
        fs::create_dir_all(&self.root).map_err(|err| {
            StorageError::unavailable(format!("create `{}`", self.root.display()), err)
        })?;

        let payload = serde_json::to_vec(record).map_err(|source| StorageError::Corrupted {
            key: key.to_owned(),
            source,
        })?;

        // Write then rename so a crash never leaves a half-written record behind.
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, payload).map_err(|err| {
            StorageError::unavailable(format!("write `{}`", staging.display()), err)
        })?;
        fs::rename(&staging, &path)
            .map_err(|err| StorageError::unavailable(format!("replace `{}`", path.display()), err))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::unavailable(
                format!("remove `{}`", path.display()),
                err,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_record_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(dir.path());
        assert!(store.read("userData_u1").unwrap().is_none());
    }

    #[test]
    fn written_record_survives_a_new_handle() {
        let dir = tempfile::tempdir().unwrap();
        let record = CacheRecord {
            profile_id: Some("p1".into()),
            onboarding_completed: true,
            ..CacheRecord::default()
        };

        FileRecordStore::new(dir.path())
            .write("userData_u1", &record)
            .unwrap();

        let reopened = FileRecordStore::new(dir.path());
        assert_eq!(reopened.read("userData_u1").unwrap(), Some(record));
    }

    #[test]
    fn corrupted_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(dir.path());
        fs::write(dir.path().join("userData_u1.json"), "{not json").unwrap();

        let err = store.read("userData_u1").unwrap_err();
        assert!(matches!(err, StorageError::Corrupted { .. }));
    }

    #[test]
    fn removing_twice_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(dir.path());
        store.write("userData_u1", &CacheRecord::default()).unwrap();

        store.remove("userData_u1").unwrap();
        store.remove("userData_u1").unwrap();
        assert!(store.read("userData_u1").unwrap().is_none());
    }
}

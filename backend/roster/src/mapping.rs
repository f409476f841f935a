//! # Roster Mapping
//!
//! Compiled lookup table from identity key to [`Descriptor`].
//!
//! ## Persistence
//! - One JSON object per file, keys sorted, so compiling the same roster twice
//!   produces the same bytes.
//! - Written to `<path>.tmp` and renamed over `<path>`. Readers only ever see a
//!   complete old file or a complete new file.
//! - Compilations hold an exclusive OS lock on `<path>.lock`, so two writers
//!   never race on the same artifact. The OS drops the lock with the process,
//!   so a killed compile leaves nothing to clean up.
use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use fs2::{FileExt, lock_contended_error};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    descriptor::Descriptor,
    error::{Result, RosterError},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RosterMapping {
    entries: BTreeMap<String, Descriptor>,
}

impl RosterMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the descriptor previously stored under `key`, if any.
    pub fn insert(&mut self, key: impl Into<String>, descriptor: Descriptor) -> Option<Descriptor> {
        self.entries.insert(key.into(), descriptor)
    }

    pub fn get(&self, key: &str) -> Option<&Descriptor> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Descriptor)> {
        self.entries.iter()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');

        Ok(bytes)
    }
}

impl FromIterator<(String, Descriptor)> for RosterMapping {
    fn from_iter<I: IntoIterator<Item = (String, Descriptor)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);

    PathBuf::from(name)
}

pub fn read_mapping(path: impl AsRef<Path>) -> Result<RosterMapping> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(RosterError::persistence(path))?;

    Ok(serde_json::from_slice(&data)?)
}

pub fn write_mapping(path: impl AsRef<Path>, mapping: &RosterMapping) -> Result<()> {
    let path = path.as_ref();
    let bytes = mapping.to_bytes()?;
    let tmp = sibling(path, "tmp");

    let written = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp, path));

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(RosterError::persistence(path)(e));
    }

    info!("Wrote {} roster keys to {}", mapping.len(), path.display());

    Ok(())
}

/// Exclusive claim on a mapping path for the duration of one compilation.
/// Released when dropped or when the holding process exits.
#[derive(Debug)]
pub struct CompileLock {
    path: PathBuf,
    file: File,
}

impl CompileLock {
    pub fn acquire(mapping_path: impl AsRef<Path>) -> Result<Self> {
        let path = sibling(mapping_path.as_ref(), "lock");

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(RosterError::persistence(&path))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                debug!("Locked {}", path.display());
                Ok(Self { path, file })
            }
            Err(e) if e.raw_os_error() == lock_contended_error().raw_os_error() => {
                Err(RosterError::Busy(path))
            }
            Err(e) => Err(RosterError::persistence(path)(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CompileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::descriptor::{Grade, House, Role};

    fn sample() -> RosterMapping {
        [
            (
                "jane.doe@example.org".to_string(),
                Descriptor::new(Grade::Twelve, Role::Student, House::Lambert),
            ),
            (
                "Jones".to_string(),
                Descriptor::new(Grade::Faculty, Role::HouseLeader, House::Ettl),
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.json");

        write_mapping(&path, &sample()).unwrap();

        assert_eq!(read_mapping(&path).unwrap(), sample());
        assert!(!sibling(&path, "tmp").exists());
    }

    #[test]
    fn test_write_replaces_previous() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.json");

        write_mapping(&path, &sample()).unwrap();
        write_mapping(&path, &RosterMapping::new()).unwrap();

        assert!(read_mapping(&path).unwrap().is_empty());
    }

    #[test]
    fn test_bytes_are_sorted_and_stable() {
        let first = sample().to_bytes().unwrap();
        let text = String::from_utf8(first.clone()).unwrap();

        assert_eq!(first, sample().to_bytes().unwrap());
        assert!(text.find("Jones").unwrap() < text.find("jane.doe").unwrap());
    }

    #[test]
    fn test_reads_legacy_strings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("myMap.json");
        fs::write(&path, r#"{"jane.doe@example.org":"12 Student Lambert"}"#).unwrap();

        assert_eq!(
            read_mapping(&path).unwrap().get("jane.doe@example.org"),
            Some(&Descriptor::new(Grade::Twelve, Role::Student, House::Lambert))
        );
    }

    #[test]
    fn test_missing_and_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.json");

        assert!(matches!(read_mapping(&path), Err(RosterError::Persistence { .. })));

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_mapping(&path), Err(RosterError::Encoding(_))));
    }

    #[test]
    fn test_lock_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.json");

        let lock = CompileLock::acquire(&path).unwrap();
        assert!(matches!(CompileLock::acquire(&path), Err(RosterError::Busy(_))));

        drop(lock);
        assert!(CompileLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_leftover_lock_file_does_not_block() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.json");
        fs::write(sibling(&path, "lock"), "").unwrap();

        let lock = CompileLock::acquire(&path).unwrap();

        assert_eq!(lock.path(), sibling(&path, "lock"));
    }
}

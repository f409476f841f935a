//! # Identity Resolver
//!
//! Classifies a person from a display name and email. First match wins:
//!
//! 1. Override table, for accounts that must resolve regardless of roster.
//! 2. Mapping by exact email (students).
//! 3. Mapping by name tokens from the [`NamingStrategy`] (faculty).
//! 4. [`Descriptor::default`]: grade 9, `Student`, no house.
//!
//! A [`Resolver`] is an immutable snapshot. [`SharedResolver`] publishes
//! snapshots through an `ArcSwap`, so a reload never disturbs in-flight
//! lookups.
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    descriptor::Descriptor,
    error::{Result, RosterError},
    mapping::{RosterMapping, read_mapping},
    naming::NamingStrategy,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Overrides {
    entries: HashMap<String, Descriptor>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(RosterError::persistence(path))?;

        Ok(serde_json::from_slice(&data)?)
    }

    pub fn with(mut self, email: impl Into<String>, descriptor: Descriptor) -> Self {
        self.entries.insert(email.into(), descriptor);
        self
    }

    pub fn get(&self, email: &str) -> Option<&Descriptor> {
        self.entries.get(email)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone)]
pub struct Resolver {
    overrides: Arc<Overrides>,
    mapping: Arc<RosterMapping>,
    naming: Arc<dyn NamingStrategy>,
}

impl Resolver {
    pub fn new(
        overrides: Arc<Overrides>,
        mapping: Arc<RosterMapping>,
        naming: Arc<dyn NamingStrategy>,
    ) -> Self {
        Self {
            overrides,
            mapping,
            naming,
        }
    }

    pub fn mapping(&self) -> &RosterMapping {
        &self.mapping
    }

    /// Same overrides and naming, different mapping.
    pub fn with_mapping(&self, mapping: RosterMapping) -> Self {
        Self {
            overrides: self.overrides.clone(),
            mapping: Arc::new(mapping),
            naming: self.naming.clone(),
        }
    }

    pub fn resolve(&self, display_name: &str, email: &str) -> Descriptor {
        if let Some(descriptor) = self.overrides.get(email) {
            return *descriptor;
        }

        if let Some(descriptor) = self.mapping.get(email) {
            return *descriptor;
        }

        self.naming
            .lookup_tokens(display_name)
            .iter()
            .find_map(|token| self.mapping.get(token))
            .copied()
            .unwrap_or_default()
    }
}

pub struct SharedResolver {
    path: PathBuf,
    current: ArcSwap<Resolver>,
}

impl SharedResolver {
    /// Loads the mapping at `path`. A missing or malformed mapping is an error:
    /// a resolver without one cannot classify anybody.
    pub fn open(
        path: impl Into<PathBuf>,
        overrides: Overrides,
        naming: Arc<dyn NamingStrategy>,
    ) -> Result<Self> {
        let path = path.into();
        let mapping = read_mapping(&path)?;

        info!(
            "Loaded {} roster keys and {} overrides from {}",
            mapping.len(),
            overrides.len(),
            path.display()
        );

        let resolver = Resolver::new(Arc::new(overrides), Arc::new(mapping), naming);

        Ok(Self {
            path,
            current: ArcSwap::from_pointee(resolver),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Arc<Resolver> {
        self.current.load_full()
    }

    pub fn resolve(&self, display_name: &str, email: &str) -> Descriptor {
        self.current.load().resolve(display_name, email)
    }

    /// Swaps in the mapping currently on disk. On failure the previous
    /// snapshot stays published.
    pub fn reload(&self) -> Result<usize> {
        let mapping = read_mapping(&self.path)?;
        let keys = mapping.len();

        let next = self.current.load().with_mapping(mapping);
        self.current.store(Arc::new(next));

        info!("Reloaded {keys} roster keys from {}", self.path.display());

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        descriptor::{Grade, House, Role},
        mapping::write_mapping,
        naming::PositionalNaming,
    };

    fn naming() -> Arc<dyn NamingStrategy> {
        Arc::new(PositionalNaming::new("example.org"))
    }

    fn resolver(overrides: Overrides, mapping: RosterMapping) -> Resolver {
        Resolver::new(Arc::new(overrides), Arc::new(mapping), naming())
    }

    fn mapping() -> RosterMapping {
        [
            (
                "kenneth.jones@example.org".to_string(),
                Descriptor::new(Grade::Eleven, Role::Student, House::Albemarle),
            ),
            (
                "Jones".to_string(),
                Descriptor::new(Grade::Faculty, Role::HouseLeader, House::Hobler),
            ),
            (
                "Madonna".to_string(),
                Descriptor::new(Grade::Faculty, Role::Faculty, House::Ettl),
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_default_fallback() {
        let resolver = resolver(Overrides::new(), RosterMapping::new());

        assert_eq!(
            resolver.resolve("Nobody Unknown", "nobody@nowhere.test"),
            Descriptor::new(Grade::Nine, Role::Student, House::None)
        );
    }

    #[test]
    fn test_email_beats_surname() {
        let resolver = resolver(Overrides::new(), mapping());

        assert_eq!(
            resolver.resolve("Kenneth Jones", "kenneth.jones@example.org").role,
            Role::Student
        );
        assert_eq!(
            resolver.resolve("Kenneth Jones", "kjones@other.test").role,
            Role::HouseLeader
        );
    }

    #[test]
    fn test_first_name_fallback() {
        let resolver = resolver(Overrides::new(), mapping());

        assert_eq!(resolver.resolve("Madonna", "m@other.test").house, House::Ettl);
        assert_eq!(resolver.resolve("Madonna Ciccone", "m@other.test").house, House::Ettl);
    }

    #[test]
    fn test_override_beats_mapping() {
        let admin = Descriptor::new(Grade::Admin, Role::Admin, House::Albemarle);
        let overrides = Overrides::new().with("kenneth.jones@example.org", admin);

        assert_eq!(
            resolver(overrides, mapping()).resolve("Kenneth Jones", "kenneth.jones@example.org"),
            admin
        );
    }

    #[test]
    fn test_overrides_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("overrides.json");
        fs::write(&path, r#"{"root@example.org":"Admin Admin None"}"#).unwrap();

        let overrides = Overrides::load(&path).unwrap();

        assert_eq!(
            overrides.get("root@example.org"),
            Some(&Descriptor::new(Grade::Admin, Role::Admin, House::None))
        );
    }

    #[test]
    fn test_open_requires_mapping() {
        let dir = TempDir::new().unwrap();
        let result = SharedResolver::open(dir.path().join("roster.json"), Overrides::new(), naming());

        assert!(matches!(result, Err(RosterError::Persistence { .. })));
    }

    #[test]
    fn test_reload_swaps_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.json");
        write_mapping(&path, &RosterMapping::new()).unwrap();

        let shared = SharedResolver::open(&path, Overrides::new(), naming()).unwrap();
        let before = shared.snapshot();
        assert_eq!(shared.resolve("Madonna", "m@other.test").house, House::None);

        write_mapping(&path, &mapping()).unwrap();
        assert_eq!(shared.reload().unwrap(), 3);

        assert_eq!(shared.resolve("Madonna", "m@other.test").house, House::Ettl);
        assert!(before.mapping().is_empty());
    }

    #[test]
    fn test_failed_reload_keeps_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.json");
        write_mapping(&path, &mapping()).unwrap();

        let shared = SharedResolver::open(&path, Overrides::new(), naming()).unwrap();
        fs::write(&path, "garbage").unwrap();

        assert!(shared.reload().is_err());
        assert_eq!(shared.resolve("Madonna", "m@other.test").house, House::Ettl);
    }
}

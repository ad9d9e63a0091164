//! Ordered collection of [`ProviderInstance`]s with a name index.
//!
//! Construction goes through a registered factory keyed by backend type,
//! rather than a hardcoded value-enum dispatch, so a binary can ship any
//! number of backend implementations without this crate knowing their names
//! in advance.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::backend::{BackendError, ProviderBackend};
use crate::domain::{Matcher, MatcherError, PatternSyntax};
use crate::instance::{InstanceError, OperationalMode, ProviderInstance};
use crate::types::{RecordType, SrvTuple};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("instance name `{0}` is already registered")]
    DuplicateName(String),
    #[error("unknown backend type `{0}`")]
    UnknownBackendType(String),
    #[error("invalid instance configuration: {0}")]
    Instance(#[from] InstanceError),
    #[error("invalid domain pattern: {0}")]
    Matcher(#[from] MatcherError),
    #[error("exactly one of glob or regex domain patterns must be non-empty")]
    NoDomainPatterns,
    #[error("backend construction failed: {0}")]
    BackendInit(#[from] BackendError),
}

/// A backend constructor, registered under a type name (e.g. `"memory"`).
pub type BackendFactory = Box<dyn Fn(&InstanceConfig) -> Result<Arc<dyn ProviderBackend>, BackendError> + Send + Sync>;

/// Everything [`InstanceRegistry::create_instance`] needs to build one
/// [`ProviderInstance`]: a unique name, target/record-type consistency, a
/// TTL of at least 1, and exactly one of glob or regex domain lists
/// non-empty.
#[derive(Clone)]
pub struct InstanceConfig {
    pub name: String,
    pub backend_type: String,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub pattern_syntax: PatternSyntax,
    pub default_record_type: RecordType,
    pub default_target: String,
    pub default_srv: Option<SrvTuple>,
    pub ttl: u32,
    pub mode: OperationalMode,
    /// Backend-specific file path, used only by file-backed backends
    /// (e.g. `hosts-file`). Ignored by backends that don't need one.
    pub backend_path: Option<std::path::PathBuf>,
}

/// Summary of one registered instance, for health/status surfaces.
#[derive(Debug, Clone)]
pub struct InstanceStatus {
    pub name: String,
    pub kind: String,
    pub available: bool,
    pub last_error: Option<String>,
}

struct Inner {
    instances: Vec<Arc<ProviderInstance>>,
    by_name: HashMap<String, usize>,
}

/// Thread-safe ordered set of provider instances plus a name index.
pub struct InstanceRegistry {
    factories: HashMap<String, BackendFactory>,
    inner: RwLock<Inner>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        InstanceRegistry {
            factories: HashMap::new(),
            inner: RwLock::new(Inner {
                instances: Vec::new(),
                by_name: HashMap::new(),
            }),
        }
    }

    /// Registers a backend constructor under `backend_type`. Call before any
    /// `create_instance` that needs it.
    pub fn register_factory(&mut self, backend_type: impl Into<String>, factory: BackendFactory) {
        self.factories.insert(backend_type.into(), factory);
    }

    /// Validates `config`, compiles its matcher, constructs its backend via
    /// the registered factory, and appends it to the registry.
    pub fn create_instance(&self, config: InstanceConfig) -> Result<(), RegistryError> {
        if config.includes.is_empty() && config.excludes.is_empty() {
            return Err(RegistryError::NoDomainPatterns);
        }
        let factory = self
            .factories
            .get(&config.backend_type)
            .ok_or_else(|| RegistryError::UnknownBackendType(config.backend_type.clone()))?;
        let matcher = Matcher::new(&config.includes, &config.excludes, config.pattern_syntax)?;
        let backend = factory(&config)?;
        let instance = ProviderInstance::new(
            config.name.clone(),
            matcher,
            config.default_record_type,
            config.default_target.clone(),
            config.default_srv,
            config.ttl,
            config.mode,
            backend,
        )?;

        let mut inner = self.inner.write();
        if inner.by_name.contains_key(&config.name) {
            return Err(RegistryError::DuplicateName(config.name));
        }
        let idx = inner.instances.len();
        inner.by_name.insert(config.name, idx);
        inner.instances.push(Arc::new(instance));
        Ok(())
    }

    /// All instances whose matcher accepts `hostname`, in registration order.
    pub fn matching_providers(&self, hostname: &str) -> Vec<Arc<ProviderInstance>> {
        self.inner
            .read()
            .instances
            .iter()
            .filter(|i| i.matcher().matches(hostname))
            .cloned()
            .collect()
    }

    /// The first instance whose matcher accepts `hostname`, if any.
    pub fn first_matching_provider(&self, hostname: &str) -> Option<Arc<ProviderInstance>> {
        self.inner
            .read()
            .instances
            .iter()
            .find(|i| i.matcher().matches(hostname))
            .cloned()
    }

    /// All registered instances, in registration order.
    pub fn all(&self) -> Vec<Arc<ProviderInstance>> {
        self.inner.read().instances.clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ProviderInstance>> {
        let inner = self.inner.read();
        inner.by_name.get(name).map(|&idx| inner.instances[idx].clone())
    }

    pub fn count(&self) -> usize {
        self.inner.read().instances.len()
    }

    /// Removes the instance named `name`, if present, reindexing the rest.
    pub fn remove(&self, name: &str) -> bool {
        let mut inner = self.inner.write();
        let Some(&idx) = inner.by_name.get(name) else {
            return false;
        };
        inner.instances.remove(idx);
        inner.by_name = inner
            .instances
            .iter()
            .enumerate()
            .map(|(i, inst)| (inst.name().to_string(), i))
            .collect();
        true
    }

    /// Pings every instance and returns each one's reachability.
    pub async fn ping_all(&self) -> Vec<InstanceStatus> {
        let instances = self.all();
        let mut statuses = Vec::with_capacity(instances.len());
        for instance in instances {
            let result = instance.backend().ping().await;
            statuses.push(InstanceStatus {
                name: instance.name().to_string(),
                kind: instance.backend().kind().to_string(),
                available: result.is_ok(),
                last_error: result.err().map(|e| e.to_string()),
            });
        }
        statuses
    }

    /// Drops all instances. There is no per-backend teardown in this crate's
    /// reference backends; concrete backends with connections to close would
    /// override this by draining `all()` themselves before calling it.
    pub fn close(&self) {
        let mut inner = self.inner.write();
        inner.instances.clear();
        inner.by_name.clear();
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;

    fn config(name: &str, includes: &[&str]) -> InstanceConfig {
        InstanceConfig {
            name: name.to_string(),
            backend_type: "memory".to_string(),
            includes: includes.iter().map(|s| s.to_string()).collect(),
            excludes: vec![],
            pattern_syntax: PatternSyntax::Glob,
            default_record_type: RecordType::A,
            default_target: "10.0.0.1".to_string(),
            default_srv: None,
            ttl: 300,
            mode: OperationalMode::Managed,
            backend_path: None,
        }
    }

    fn registry_with_memory_factory() -> InstanceRegistry {
        let mut registry = InstanceRegistry::new();
        registry.register_factory(
            "memory",
            Box::new(|config: &InstanceConfig| Ok(Arc::new(MemoryBackend::new(config.name.clone())) as Arc<dyn ProviderBackend>)),
        );
        registry
    }

    #[test]
    fn create_instance_rejects_duplicate_name() {
        let registry = registry_with_memory_factory();
        registry.create_instance(config("primary", &["*.example.com"])).unwrap();
        let err = registry.create_instance(config("primary", &["*.example.org"])).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(_)));
    }

    #[test]
    fn create_instance_rejects_unknown_backend_type() {
        let registry = InstanceRegistry::new();
        let mut cfg = config("primary", &["*.example.com"]);
        cfg.backend_type = "bogus".to_string();
        let err = registry.create_instance(cfg).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownBackendType(_)));
    }

    #[test]
    fn create_instance_rejects_empty_domain_patterns() {
        let registry = registry_with_memory_factory();
        let mut cfg = config("primary", &[]);
        cfg.excludes = vec![];
        let err = registry.create_instance(cfg).unwrap_err();
        assert!(matches!(err, RegistryError::NoDomainPatterns));
    }

    #[test]
    fn matching_providers_respects_registration_order() {
        let registry = registry_with_memory_factory();
        registry.create_instance(config("first", &["*.example.com"])).unwrap();
        registry.create_instance(config("second", &["*.example.com"])).unwrap();
        let matches = registry.matching_providers("app.example.com");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].name(), "first");
        assert_eq!(matches[1].name(), "second");
        assert_eq!(registry.first_matching_provider("app.example.com").unwrap().name(), "first");
    }

    #[test]
    fn remove_reindexes_remaining_instances() {
        let registry = registry_with_memory_factory();
        registry.create_instance(config("first", &["*.example.com"])).unwrap();
        registry.create_instance(config("second", &["*.example.com"])).unwrap();
        assert!(registry.remove("first"));
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get("second").unwrap().name(), "second");
    }

    #[tokio::test]
    async fn ping_all_reports_each_instance() {
        let registry = registry_with_memory_factory();
        registry.create_instance(config("primary", &["*.example.com"])).unwrap();
        let statuses = registry.ping_all().await;
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].available);
    }
}

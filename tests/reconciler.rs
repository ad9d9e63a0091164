//! End-to-end reconciliation scenarios against the in-memory reference
//! backend, exercising the full registry → cache → diff → action path
//! rather than any one module in isolation.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use dnsweaver::backend::memory::MemoryBackend;
use dnsweaver::backend::{BackendError, Capabilities, ProviderBackend};
use dnsweaver::domain::PatternSyntax;
use dnsweaver::instance::{DesiredHostname, OperationalMode};
use dnsweaver::manager::ProviderManager;
use dnsweaver::reconciler::{Reconciler, ReconcilerConfig};
use dnsweaver::registry::{InstanceConfig, InstanceRegistry};
use dnsweaver::source::{Source, SourceError};
use dnsweaver::types::{Record, RecordTarget, RecordType};

/// Wraps [`MemoryBackend`] but advertises native update support, counting
/// calls to `update` separately from `delete`/`create` so a test can assert
/// the native path was actually taken.
struct NativeUpdateBackend {
    inner: MemoryBackend,
    update_calls: AtomicUsize,
}

impl NativeUpdateBackend {
    fn new(name: impl Into<String>) -> Self {
        NativeUpdateBackend {
            inner: MemoryBackend::new(name),
            update_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProviderBackend for NativeUpdateBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> &str {
        "native-update-test"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            native_update_supported: true,
            ..self.inner.capabilities()
        }
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.inner.ping().await
    }

    async fn list(&self) -> Result<Vec<Record>, BackendError> {
        self.inner.list().await
    }

    async fn create(&self, record: &Record) -> Result<(), BackendError> {
        self.inner.create(record).await
    }

    async fn delete(&self, record: &Record) -> Result<(), BackendError> {
        self.inner.delete(record).await
    }

    async fn update(&self, existing: &Record, desired: &Record) -> Result<(), BackendError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(existing).await?;
        self.inner.create(desired).await
    }
}

struct StaticSource(Vec<&'static str>);

#[async_trait]
impl Source for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn extract(&self) -> Result<Vec<DesiredHostname>, SourceError> {
        Ok(self
            .0
            .iter()
            .map(|h| DesiredHostname {
                name: (*h).into(),
                source_tag: "static".to_string(),
                hints: None,
            })
            .collect())
    }
}

fn sources(hostnames: &'static [&'static str]) -> Vec<Box<dyn Source>> {
    vec![Box::new(StaticSource(hostnames.to_vec()))]
}

fn config(name: &str, mode: OperationalMode, ttl: u32) -> InstanceConfig {
    InstanceConfig {
        name: name.to_string(),
        backend_type: "memory".to_string(),
        includes: vec!["*.example.com".to_string()],
        excludes: vec![],
        pattern_syntax: PatternSyntax::Glob,
        default_record_type: RecordType::A,
        default_target: "10.0.0.1".to_string(),
        default_srv: None,
        ttl,
        mode,
        backend_path: None,
    }
}

async fn registry_with(mode: OperationalMode, ttl: u32) -> Arc<InstanceRegistry> {
    let mut registry = InstanceRegistry::new();
    registry.register_factory("memory", Box::new(|c| Ok(Arc::new(MemoryBackend::new(c.name.clone())) as Arc<_>)));
    let registry = Arc::new(registry);
    let manager = ProviderManager::new(registry.clone());
    manager.initialize_provider(config("primary", mode, ttl)).await.unwrap();
    registry
}

#[tokio::test]
async fn fresh_hostname_is_created_with_ownership_marker() {
    let registry = registry_with(OperationalMode::Managed, 300).await;
    let reconciler = Reconciler::new(registry.clone(), ReconcilerConfig::default());

    let result = reconciler.run_once(&sources(&["app.example.com"])).await;

    assert_eq!(result.created_count(), 2); // A record + TXT ownership marker
    let backend = registry.get("primary").unwrap().backend().clone();
    let records = backend.list().await.unwrap();
    assert!(records.iter().any(|r| r.hostname.lower() == "app.example.com"));
    assert!(records.iter().any(|r| r.is_ownership_marker()));
}

#[tokio::test]
async fn ttl_change_produces_a_single_update_per_record() {
    let registry = registry_with(OperationalMode::Managed, 300).await;
    let reconciler = Reconciler::new(registry.clone(), ReconcilerConfig { ownership_tracking: false, ..ReconcilerConfig::default() });
    reconciler.run_once(&sources(&["app.example.com"])).await;

    let backend = registry.get("primary").unwrap().backend().clone();
    let mut bumped = InstanceRegistry::new();
    bumped.register_factory("memory", Box::new(move |_: &InstanceConfig| Ok(backend.clone())));
    let bumped = Arc::new(bumped);
    bumped
        .create_instance(config("primary", OperationalMode::Managed, 600))
        .unwrap();
    let reconciler2 = Reconciler::new(bumped, ReconcilerConfig { ownership_tracking: false, ..ReconcilerConfig::default() });

    let result = reconciler2.run_once(&sources(&["app.example.com"])).await;
    assert_eq!(result.updated_count(), 1);
    assert_eq!(result.created_count(), 0);
}

#[tokio::test]
async fn target_change_deletes_and_recreates() {
    let registry = registry_with(OperationalMode::Managed, 300).await;
    let backend = registry.get("primary").unwrap().backend().clone();
    backend
        .create(&Record::new("app.example.com", RecordTarget::A(Ipv4Addr::new(10, 0, 0, 9)), 300))
        .await
        .unwrap();

    let reconciler = Reconciler::new(registry.clone(), ReconcilerConfig { ownership_tracking: false, ..ReconcilerConfig::default() });
    let result = reconciler.run_once(&sources(&["app.example.com"])).await;

    // The memory backend has no native update, so `update_record` falls
    // back to delete-then-create underneath, but the reconciler reports it
    // as a single `Update` action, not a separate delete and create.
    assert_eq!(result.updated_count(), 1);
    assert_eq!(result.deleted_count(), 0);
    assert_eq!(result.created_count(), 0);
    let records = backend.list().await.unwrap();
    assert_eq!(
        records.iter().find(|r| r.hostname.lower() == "app.example.com").unwrap().target.value(),
        "10.0.0.1"
    );
}

#[tokio::test]
async fn target_change_uses_native_update_when_backend_supports_it() {
    let backend = Arc::new(NativeUpdateBackend::new("primary"));
    backend
        .create(&Record::new("app.example.com", RecordTarget::A(Ipv4Addr::new(10, 0, 0, 9)), 300))
        .await
        .unwrap();

    let mut registry = InstanceRegistry::new();
    let backend_for_factory = backend.clone();
    registry.register_factory("memory", Box::new(move |_: &InstanceConfig| Ok(backend_for_factory.clone() as Arc<_>)));
    let registry = Arc::new(registry);
    registry
        .create_instance(config("primary", OperationalMode::Managed, 300))
        .unwrap();

    let reconciler = Reconciler::new(registry, ReconcilerConfig { ownership_tracking: false, ..ReconcilerConfig::default() });
    let result = reconciler.run_once(&sources(&["app.example.com"])).await;

    assert_eq!(result.updated_count(), 1);
    assert_eq!(result.deleted_count(), 0);
    assert_eq!(result.created_count(), 0);
    assert_eq!(backend.update_calls.load(Ordering::SeqCst), 1);
    let records = backend.list().await.unwrap();
    assert_eq!(
        records.iter().find(|r| r.hostname.lower() == "app.example.com").unwrap().target.value(),
        "10.0.0.1"
    );
}

#[tokio::test]
async fn orphan_with_ownership_marker_is_removed_in_managed_mode() {
    let registry = registry_with(OperationalMode::Managed, 300).await;
    let reconciler = Reconciler::new(registry.clone(), ReconcilerConfig::default());
    reconciler.run_once(&sources(&["gone.example.com"])).await;

    let result = reconciler.run_once(&sources(&[])).await;

    assert_eq!(result.deleted_count(), 2); // A record + TXT ownership marker
    let backend = registry.get("primary").unwrap().backend().clone();
    assert!(backend.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn foreign_record_without_ownership_marker_is_never_adopted() {
    // A record with no `_dnsweaver` marker predates this crate managing the
    // zone. Startup adoption only recognizes markers, so it never enters
    // `known_hostnames` and cleanup leaves it alone even once the desired
    // set is empty.
    let registry = registry_with(OperationalMode::Managed, 300).await;
    let backend = registry.get("primary").unwrap().backend().clone();
    backend
        .create(&Record::new("untracked.example.com", RecordTarget::A(Ipv4Addr::new(10, 0, 0, 5)), 300))
        .await
        .unwrap();

    let reconciler = Reconciler::new(registry.clone(), ReconcilerConfig::default());
    let result = reconciler.run_once(&sources(&[])).await;

    assert_eq!(result.deleted_count(), 0);
    assert!(reconciler.known_hostnames().is_empty());
    assert_eq!(backend.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn manager_queues_an_unreachable_provider_instead_of_failing_startup() {
    let mut registry = InstanceRegistry::new();
    registry.register_factory(
        "memory",
        Box::new(|c: &InstanceConfig| {
            let backend = MemoryBackend::new(c.name.clone());
            backend.set_unavailable("simulated outage");
            Ok(Arc::new(backend) as Arc<_>)
        }),
    );
    let registry = Arc::new(registry);
    let manager = ProviderManager::new(registry.clone());

    manager.initialize_provider(config("primary", OperationalMode::Managed, 300)).await.unwrap();

    assert!(registry.get("primary").is_none());
    let statuses = manager.all_provider_statuses().await;
    assert_eq!(statuses.len(), 1);
    assert!(!statuses[0].available);
}

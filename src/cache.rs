//! A per-cycle snapshot of every provider's records.
//!
//! Built once at the start of a reconciliation cycle by calling `list` on
//! every registered instance. A provider whose `list` fails is recorded as
//! unavailable so accessors can return `None` and let callers abstain,
//! rather than mistaking a failed fetch for an empty provider.

use std::collections::HashMap;
use std::sync::Arc;

use log::warn;

use crate::instance::ProviderInstance;
use crate::types::{Hostname, Record, RecordType};

type HostnameMap = HashMap<String, Vec<Record>>;

pub struct RecordCache {
    snapshots: HashMap<String, Option<HostnameMap>>,
}

impl RecordCache {
    /// Lists every instance's records and groups them by lowercased
    /// hostname. Instances are queried sequentially; each is a single `list`
    /// call, so this is safe to call even while other instances are slow.
    pub async fn build(instances: &[Arc<ProviderInstance>]) -> Self {
        let mut snapshots = HashMap::with_capacity(instances.len());
        for instance in instances {
            let snapshot = match instance.backend().list().await {
                Ok(records) => {
                    let mut by_hostname: HostnameMap = HashMap::new();
                    for record in records {
                        by_hostname
                            .entry(record.hostname.lower().to_string())
                            .or_default()
                            .push(record);
                    }
                    Some(by_hostname)
                }
                Err(e) => {
                    warn!("{}: list failed, marking unavailable for this cycle: {e}", instance.name());
                    None
                }
            };
            snapshots.insert(instance.name().to_string(), snapshot);
        }
        RecordCache { snapshots }
    }

    /// Data records (A/AAAA/CNAME/SRV) at `hostname` for `provider`. `None`
    /// if `provider`'s snapshot failed or `provider` is unknown.
    pub fn get_existing_records(&self, provider: &str, hostname: &Hostname) -> Option<Vec<Record>> {
        let by_hostname = self.snapshots.get(provider)?.as_ref()?;
        Some(
            by_hostname
                .get(hostname.lower())
                .into_iter()
                .flatten()
                .filter(|r| r.record_type() != RecordType::Txt)
                .cloned()
                .collect(),
        )
    }

    /// Same as [`Self::get_existing_records`] — named separately to match
    /// the two call sites that read it: per-hostname ensure, and whole-provider
    /// orphan sweep.
    pub fn get_all_records_for_hostname(&self, provider: &str, hostname: &Hostname) -> Option<Vec<Record>> {
        self.get_existing_records(provider, hostname)
    }

    /// Whether `provider` holds a valid ownership marker for `hostname`.
    pub fn has_ownership_record(&self, provider: &str, hostname: &Hostname) -> Option<bool> {
        let by_hostname = self.snapshots.get(provider)?.as_ref()?;
        let marker_name = hostname.ownership_marker_name();
        Some(
            by_hostname
                .get(marker_name.lower())
                .into_iter()
                .flatten()
                .any(|r| r.is_ownership_marker()),
        )
    }

    /// All hostnames with any record in `provider`'s snapshot. `None` if
    /// `provider`'s snapshot failed or is unknown.
    pub fn hostnames_for_provider(&self, provider: &str) -> Option<Vec<Hostname>> {
        let by_hostname = self.snapshots.get(provider)?.as_ref()?;
        Some(by_hostname.keys().map(Hostname::new).collect())
    }

    pub fn is_available(&self, provider: &str) -> bool {
        matches!(self.snapshots.get(provider), Some(Some(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::ProviderBackend;
    use crate::domain::{Matcher, PatternSyntax};
    use crate::instance::OperationalMode;
    use crate::types::{RecordTarget, RecordType};
    use std::net::Ipv4Addr;

    fn instance(backend: Arc<MemoryBackend>) -> Arc<ProviderInstance> {
        let matcher = Matcher::new(&["*.example.com".to_string()], &[], PatternSyntax::Glob).unwrap();
        Arc::new(
            ProviderInstance::new(
                backend.name().to_string(),
                matcher,
                RecordType::A,
                "10.0.0.1",
                None,
                300,
                OperationalMode::Managed,
                backend,
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn build_groups_records_by_hostname() {
        let backend = Arc::new(MemoryBackend::with_records(
            "primary",
            vec![Record::new("app.example.com", RecordTarget::A(Ipv4Addr::new(10, 0, 0, 1)), 300)],
        ));
        let cache = RecordCache::build(&[instance(backend)]).await;
        let host = Hostname::new("App.Example.com");
        assert_eq!(cache.get_existing_records("primary", &host).unwrap().len(), 1);
        assert!(cache.is_available("primary"));
    }

    #[tokio::test]
    async fn unavailable_provider_returns_none() {
        let backend = Arc::new(MemoryBackend::new("primary"));
        backend.set_unavailable("down");
        let cache = RecordCache::build(&[instance(backend)]).await;
        assert!(cache.get_existing_records("primary", &Hostname::new("app.example.com")).is_none());
        assert!(!cache.is_available("primary"));
    }

    #[tokio::test]
    async fn has_ownership_record_checks_marker_value() {
        let backend = Arc::new(MemoryBackend::with_records(
            "primary",
            vec![Record::ownership_marker_for(&Hostname::new("app.example.com"), 300, "primary")],
        ));
        let cache = RecordCache::build(&[instance(backend)]).await;
        let host = Hostname::new("app.example.com");
        assert_eq!(cache.has_ownership_record("primary", &host), Some(true));
        assert_eq!(cache.has_ownership_record("primary", &Hostname::new("other.example.com")), Some(false));
    }
}

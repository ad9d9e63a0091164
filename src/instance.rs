//! Wraps one backend with its matcher, default record shape, TTL, and
//! operational mode.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Instant;

use log::debug;
use thiserror::Error;

use crate::backend::{BackendError, ProviderBackend};
use crate::domain::Matcher;
use crate::metrics;
use crate::types::{Hostname, Record, RecordTarget, RecordType, SrvTuple, OWNERSHIP_PREFIX};

/// Governs what an instance may delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationalMode {
    /// May delete only records accompanied by a valid ownership marker.
    Managed,
    /// May delete any in-scope record, ignoring ownership.
    Authoritative,
    /// Never deletes; only creates/updates.
    Additive,
}

/// Per-hostname overrides of an instance's default record shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordHints {
    pub record_type: Option<RecordType>,
    pub target: Option<String>,
    pub ttl: Option<u32>,
    pub srv: Option<SrvTuple>,
}

/// A hostname discovered by a source, with optional per-record overrides.
#[derive(Debug, Clone)]
pub struct DesiredHostname {
    pub name: Hostname,
    pub source_tag: String,
    pub hints: Option<RecordHints>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InstanceError {
    #[error("record_type {record_type} is inconsistent with target `{target}`")]
    InconsistentTarget {
        record_type: RecordType,
        target: String,
    },
    #[error("SRV record type requires an srv tuple")]
    MissingSrvTuple,
    #[error("ttl must be a positive integer")]
    InvalidTtl,
}

/// Binds one backend to a matcher, default record shape, TTL and mode.
pub struct ProviderInstance {
    name: String,
    matcher: Matcher,
    default_record_type: RecordType,
    default_target: String,
    default_srv: Option<SrvTuple>,
    ttl: u32,
    mode: OperationalMode,
    backend: Arc<dyn ProviderBackend>,
}

impl std::fmt::Debug for ProviderInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderInstance")
            .field("name", &self.name)
            .field("default_record_type", &self.default_record_type)
            .field("default_target", &self.default_target)
            .field("ttl", &self.ttl)
            .field("mode", &self.mode)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl ProviderInstance {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        matcher: Matcher,
        default_record_type: RecordType,
        default_target: impl Into<String>,
        default_srv: Option<SrvTuple>,
        ttl: u32,
        mode: OperationalMode,
        backend: Arc<dyn ProviderBackend>,
    ) -> Result<Self, InstanceError> {
        if ttl == 0 {
            return Err(InstanceError::InvalidTtl);
        }
        let default_target = default_target.into();
        validate_target_consistency(default_record_type, &default_target, default_srv)?;
        Ok(ProviderInstance {
            name: name.into(),
            matcher,
            default_record_type,
            default_target,
            default_srv,
            ttl,
            mode,
            backend,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn mode(&self) -> OperationalMode {
        self.mode
    }

    pub fn backend(&self) -> &Arc<dyn ProviderBackend> {
        &self.backend
    }

    pub fn default_record_type(&self) -> RecordType {
        self.default_record_type
    }

    /// Builds the record that should exist at `hostname`, applying `hints`
    /// over this instance's defaults.
    pub fn effective_record(
        &self,
        hostname: &Hostname,
        hints: Option<&RecordHints>,
    ) -> Result<Record, InstanceError> {
        let record_type = hints
            .and_then(|h| h.record_type)
            .unwrap_or(self.default_record_type);
        let target_str = hints
            .and_then(|h| h.target.clone())
            .unwrap_or_else(|| self.default_target.clone());
        let ttl = hints.and_then(|h| h.ttl).unwrap_or(self.ttl);
        let srv = hints.and_then(|h| h.srv).or(self.default_srv);
        let target = build_target(record_type, &target_str, srv)?;
        Ok(Record {
            hostname: hostname.clone(),
            target,
            ttl,
            provider_id: self.name.clone(),
        })
    }

    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T, BackendError>
    where
        F: std::future::Future<Output = Result<T, BackendError>>,
    {
        let start = Instant::now();
        let result = fut.await;
        metrics::observe_api_call(&self.name, op, result.is_ok(), start.elapsed());
        match &result {
            Ok(_) => metrics::set_provider_healthy(&self.name, true),
            Err(BackendError::Unauthorized { .. }) => metrics::set_provider_healthy(&self.name, false),
            Err(_) => {}
        }
        result
    }

    /// Creates `record`. A `Conflict` (already present) is treated as
    /// success.
    pub async fn create_record(&self, record: &Record) -> Result<(), BackendError> {
        if !self.backend.capabilities().supports(record.record_type()) {
            debug!(
                "{}: skipping create of unsupported record type {} at {}",
                self.name,
                record.record_type(),
                record.hostname
            );
            return Ok(());
        }
        match self.timed("create", self.backend.create(record)).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_conflict() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Updates `existing` to `desired`. Uses the backend's native update if
    /// supported; otherwise deletes then creates. A `NotFound` on the delete
    /// half is tolerated (already gone).
    pub async fn update_record(&self, existing: &Record, desired: &Record) -> Result<(), BackendError> {
        if self.backend.capabilities().native_update_supported {
            return self.timed("update", self.backend.update(existing, desired)).await;
        }
        match self.timed("delete", self.backend.delete(existing)).await {
            Ok(()) | Err(BackendError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        self.create_record(desired).await
    }

    /// Deletes `record`. A `NotFound` is treated as success.
    pub async fn delete_record(&self, record: &Record) -> Result<(), BackendError> {
        match self.timed("delete", self.backend.delete(record)).await {
            Ok(()) | Err(BackendError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Deletes whatever record currently sits at `hostname` with the given
    /// target, regardless of its TTL (targets are identity; TTL is not).
    pub async fn delete_record_by_target(
        &self,
        hostname: &Hostname,
        target: &RecordTarget,
    ) -> Result<(), BackendError> {
        let record = Record::new(hostname.clone(), target.clone(), 1);
        self.delete_record(&record).await
    }

    /// Deletes a specific SRV record by its full identity tuple.
    pub async fn delete_srv_record(
        &self,
        hostname: &Hostname,
        target: &str,
        srv: SrvTuple,
    ) -> Result<(), BackendError> {
        let record = Record::new(
            hostname.clone(),
            RecordTarget::Srv {
                target: target.to_string(),
                srv,
            },
            1,
        );
        self.delete_record(&record).await
    }

    /// Creates the ownership marker for `hostname`. A no-op when the backend
    /// doesn't support TXT; a `Conflict` is treated as success.
    pub async fn create_ownership_record(&self, hostname: &Hostname) -> Result<(), BackendError> {
        if !self.backend.capabilities().ownership_txt_supported {
            return Ok(());
        }
        let marker = Record::ownership_marker_for(hostname, self.ttl, &self.name);
        self.create_record(&marker).await
    }

    /// Deletes the ownership marker for `hostname`. A no-op when the backend
    /// doesn't support TXT.
    pub async fn delete_ownership_record(&self, hostname: &Hostname) -> Result<(), BackendError> {
        if !self.backend.capabilities().ownership_txt_supported {
            return Ok(());
        }
        let marker = Record::ownership_marker_for(hostname, self.ttl, &self.name);
        self.delete_record(&marker).await
    }

    /// Live check (bypassing any cache) for whether `hostname`'s ownership
    /// marker is present with the exact expected value.
    pub async fn has_ownership_record(&self, hostname: &Hostname) -> Result<bool, BackendError> {
        if !self.backend.capabilities().ownership_txt_supported {
            return Ok(false);
        }
        let marker_name = hostname.ownership_marker_name();
        let records = self.timed("list", self.backend.list()).await?;
        Ok(records
            .iter()
            .any(|r| r.hostname == marker_name && r.is_ownership_marker()))
    }

    /// Scans the backend for ownership markers and returns the hostnames
    /// they claim, used once at startup to repopulate the reconciler's
    /// known-hostname set.
    pub async fn recover_owned_hostnames(&self) -> Result<Vec<Hostname>, BackendError> {
        if !self.backend.capabilities().ownership_txt_supported {
            return Ok(Vec::new());
        }
        let records = self.timed("list", self.backend.list()).await?;
        let prefix = format!("{OWNERSHIP_PREFIX}.");
        Ok(records
            .iter()
            .filter(|r| r.is_ownership_marker())
            .filter_map(|r| r.hostname.lower().strip_prefix(&prefix).map(Hostname::new))
            .collect())
    }

    /// A fresh List filtered to data records (A/AAAA/CNAME/SRV) at `hostname`.
    pub async fn get_existing_records(&self, hostname: &Hostname) -> Result<Vec<Record>, BackendError> {
        let records = self.timed("list", self.backend.list()).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.hostname == *hostname && r.record_type() != RecordType::Txt)
            .collect())
    }
}

fn validate_target_consistency(
    record_type: RecordType,
    target: &str,
    srv: Option<SrvTuple>,
) -> Result<(), InstanceError> {
    build_target(record_type, target, srv).map(|_| ())
}

fn build_target(
    record_type: RecordType,
    target: &str,
    srv: Option<SrvTuple>,
) -> Result<RecordTarget, InstanceError> {
    match record_type {
        RecordType::A => target
            .parse::<Ipv4Addr>()
            .map(RecordTarget::A)
            .map_err(|_| InstanceError::InconsistentTarget {
                record_type,
                target: target.to_string(),
            }),
        RecordType::Aaaa => target
            .parse::<Ipv6Addr>()
            .map(RecordTarget::Aaaa)
            .map_err(|_| InstanceError::InconsistentTarget {
                record_type,
                target: target.to_string(),
            }),
        RecordType::Cname => {
            if target.parse::<Ipv4Addr>().is_ok() || target.parse::<Ipv6Addr>().is_ok() {
                return Err(InstanceError::InconsistentTarget {
                    record_type,
                    target: target.to_string(),
                });
            }
            Ok(RecordTarget::Cname(target.to_string()))
        }
        RecordType::Srv => {
            let srv = srv.ok_or(InstanceError::MissingSrvTuple)?;
            Ok(RecordTarget::Srv {
                target: target.to_string(),
                srv,
            })
        }
        RecordType::Txt => Ok(RecordTarget::Txt(target.to_string())),
    }
}

//! An in-process, map-backed [`ProviderBackend`]. The direct analogue of the
//! teacher repo's reliance on mocked providers in tests, except implemented
//! as a real backend so the reconciler can be exercised end to end without a
//! network or filesystem dependency.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{BackendError, Capabilities, ProviderBackend};
use crate::types::{Record, RecordType};

const SUPPORTED_TYPES: &[RecordType] = &[
    RecordType::A,
    RecordType::Aaaa,
    RecordType::Cname,
    RecordType::Srv,
    RecordType::Txt,
];

/// Reference backend that keeps records in memory. Useful for tests and for
/// running the engine without any real DNS infrastructure.
pub struct MemoryBackend {
    name: String,
    records: Mutex<Vec<Record>>,
    /// When set, every call returns this error instead of touching `records`
    /// — used to simulate an unreachable backend in manager/reconciler tests.
    unavailable: Mutex<Option<String>>,
    /// When set, every call returns `Unauthorized` instead of touching
    /// `records` — used to exercise the `provider_healthy` gauge.
    unauthorized: Mutex<bool>,
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryBackend {
            name: name.into(),
            records: Mutex::new(Vec::new()),
            unavailable: Mutex::new(None),
            unauthorized: Mutex::new(false),
        }
    }

    pub fn with_records(name: impl Into<String>, records: Vec<Record>) -> Self {
        MemoryBackend {
            name: name.into(),
            records: Mutex::new(records),
            unavailable: Mutex::new(None),
            unauthorized: Mutex::new(false),
        }
    }

    /// Makes every subsequent call fail with `Unavailable` until
    /// [`MemoryBackend::set_available`] is called. For manager retry tests.
    pub fn set_unavailable(&self, reason: impl Into<String>) {
        *self.unavailable.lock() = Some(reason.into());
    }

    pub fn set_available(&self) {
        *self.unavailable.lock() = None;
    }

    /// Makes every subsequent call fail with `Unauthorized` until
    /// [`MemoryBackend::set_authorized`] is called. For `provider_healthy` tests.
    pub fn set_unauthorized(&self) {
        *self.unauthorized.lock() = true;
    }

    pub fn set_authorized(&self) {
        *self.unauthorized.lock() = false;
    }

    pub fn snapshot(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    fn check_available(&self, op: &'static str) -> Result<(), BackendError> {
        if let Some(reason) = self.unavailable.lock().clone() {
            return Err(BackendError::Unavailable {
                provider: self.name.clone(),
                op,
                reason,
            });
        }
        if *self.unauthorized.lock() {
            return Err(BackendError::Unauthorized {
                provider: self.name.clone(),
                op,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "memory"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            ownership_txt_supported: true,
            native_update_supported: false,
            supported_types: SUPPORTED_TYPES,
        }
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.check_available("ping")
    }

    async fn list(&self) -> Result<Vec<Record>, BackendError> {
        self.check_available("list")?;
        Ok(self.records.lock().clone())
    }

    async fn create(&self, record: &Record) -> Result<(), BackendError> {
        self.check_available("create")?;
        let mut records = self.records.lock();
        if records.iter().any(|r| r.identity() == record.identity()) {
            return Err(BackendError::Conflict {
                provider: self.name.clone(),
                op: "create",
            });
        }
        records.push(record.clone());
        Ok(())
    }

    async fn delete(&self, record: &Record) -> Result<(), BackendError> {
        self.check_available("delete")?;
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|r| r.identity() != record.identity());
        if records.len() == before {
            return Err(BackendError::NotFound {
                provider: self.name.clone(),
                op: "delete",
            });
        }
        Ok(())
    }
}

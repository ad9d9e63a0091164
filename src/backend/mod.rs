//! The uniform, capability-typed contract a DNS backend must implement.
//!
//! Every concrete backend (Cloudflare, Technitium, Pi-hole, dnsmasq,
//! RFC2136, a webhook target, ...) implements once against [`ProviderBackend`].
//! Only the interface is specified here; this crate ships two reference
//! implementations ([`memory`] and [`hosts_file`]) to exercise it end to end.

pub mod hosts_file;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Record, RecordType};

/// What a backend can and cannot do. The core never writes a record type
/// outside `supported_types`, and silently skips ownership-TXT management
/// for backends that don't support it.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub ownership_txt_supported: bool,
    pub native_update_supported: bool,
    pub supported_types: &'static [RecordType],
}

impl Capabilities {
    pub fn supports(&self, rt: RecordType) -> bool {
        self.supported_types.contains(&rt)
    }
}

/// Error kinds surfaced by backends. Each wraps the provider name and the
/// operation that failed.
#[derive(Debug, Error, Clone)]
pub enum BackendError {
    #[error("{provider}: {op}: not found")]
    NotFound { provider: String, op: &'static str },
    #[error("{provider}: {op}: conflict")]
    Conflict { provider: String, op: &'static str },
    #[error("{provider}: {op}: record type conflict")]
    TypeConflict { provider: String, op: &'static str },
    #[error("{provider}: {op}: unauthorized")]
    Unauthorized { provider: String, op: &'static str },
    #[error("{provider}: {op}: unavailable: {reason}")]
    Unavailable {
        provider: String,
        op: &'static str,
        reason: String,
    },
    #[error("{provider}: {op}: invalid configuration: {reason}")]
    ConfigInvalid {
        provider: String,
        op: &'static str,
        reason: String,
    },
}

impl BackendError {
    pub fn provider(&self) -> &str {
        match self {
            BackendError::NotFound { provider, .. }
            | BackendError::Conflict { provider, .. }
            | BackendError::TypeConflict { provider, .. }
            | BackendError::Unauthorized { provider, .. }
            | BackendError::Unavailable { provider, .. }
            | BackendError::ConfigInvalid { provider, .. } => provider,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, BackendError::Conflict { .. })
    }
}

/// A DNS provider backend: authoritative servers, public DNS APIs, or
/// file-backed local resolvers all implement this once.
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    /// Unique-enough-for-logging name of this backend instance.
    fn name(&self) -> &str;
    /// The backend kind, e.g. `"cloudflare"`, `"memory"`, `"hosts-file"`.
    fn kind(&self) -> &str;
    fn capabilities(&self) -> Capabilities;

    async fn ping(&self) -> Result<(), BackendError>;
    async fn list(&self) -> Result<Vec<Record>, BackendError>;
    async fn create(&self, record: &Record) -> Result<(), BackendError>;
    async fn delete(&self, record: &Record) -> Result<(), BackendError>;

    /// Native in-place update. Backends that advertise
    /// `native_update_supported` must override this; the default always
    /// reports unavailability so [`crate::instance::ProviderInstance`] falls
    /// back to delete-then-create.
    async fn update(&self, _existing: &Record, _desired: &Record) -> Result<(), BackendError> {
        Err(BackendError::Unavailable {
            provider: self.name().to_string(),
            op: "update",
            reason: "native update not supported".to_string(),
        })
    }
}

//! Initializes provider instances and retries the ones that failed at
//! startup.
//!
//! The backoff schedule is modeled on `firestoned-bindy`'s
//! `reconcilers::retry::ExponentialBackoff`, stripped of jitter and HTTP
//! status interpretation (this crate's retries are "can we `Ping` this
//! backend", not "was this one HTTP call retryable").

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

use crate::metrics;
use crate::registry::{InstanceConfig, InstanceRegistry, InstanceStatus, RegistryError};

const INIT_PING_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_MULTIPLIER: f64 = 2.0;
const RETRY_TICK: Duration = Duration::from_secs(1);

/// Exponential backoff with no jitter and no elapsed-time cap: pending
/// providers retry forever until they succeed or are removed.
pub struct ExponentialBackoff {
    current_interval: Duration,
    max_interval: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    pub fn new(initial_interval: Duration, max_interval: Duration, multiplier: f64) -> Self {
        ExponentialBackoff {
            current_interval: initial_interval,
            max_interval,
            multiplier,
        }
    }

    /// Returns the interval to wait before the next attempt, then advances
    /// it for the attempt after that.
    pub fn next_backoff(&mut self) -> Duration {
        let interval = self.current_interval;
        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);
        interval
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        ExponentialBackoff::new(DEFAULT_INITIAL_INTERVAL, DEFAULT_MAX_INTERVAL, DEFAULT_MULTIPLIER)
    }
}

/// Outcome of attempting to stand up one provider.
enum InitFailure {
    /// Configuration is invalid; retrying would never help.
    Hard(RegistryError),
    /// Backend is unreachable right now; worth retrying later.
    Soft(String),
}

struct PendingProvider {
    config: InstanceConfig,
    backoff: ExponentialBackoff,
    next_retry_at: Instant,
    attempt_count: u32,
    last_error: String,
}

/// Wraps an [`InstanceRegistry`], turning failed provider initialization
/// into a background retry instead of a fatal startup error.
pub struct ProviderManager {
    registry: Arc<InstanceRegistry>,
    pending: Mutex<Vec<PendingProvider>>,
    loop_handle: Mutex<Option<(oneshot::Sender<()>, JoinHandle<()>)>>,
}

impl ProviderManager {
    pub fn new(registry: Arc<InstanceRegistry>) -> Self {
        ProviderManager {
            registry,
            pending: Mutex::new(Vec::new()),
            loop_handle: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    /// Validates and creates one provider instance. An invalid configuration
    /// is the only hard error — an unreachable backend is queued for retry
    /// and this returns `Ok`.
    pub async fn initialize_provider(&self, config: InstanceConfig) -> Result<(), RegistryError> {
        let name = config.name.clone();
        match self.try_create_and_ping(config.clone()).await {
            Ok(()) => Ok(()),
            Err(InitFailure::Hard(e)) => Err(e),
            Err(InitFailure::Soft(reason)) => {
                warn!("{name}: {reason}");
                self.enqueue_pending(config, reason);
                Ok(())
            }
        }
    }

    /// Creates the instance and pings it once. Distinguishes a hard
    /// configuration error (never worth retrying) from a soft one (backend
    /// unreachable right now, worth queuing).
    async fn try_create_and_ping(&self, config: InstanceConfig) -> Result<(), InitFailure> {
        let name = config.name.clone();
        let kind = config.backend_type.clone();

        match self.registry.create_instance(config) {
            Ok(()) => {}
            Err(e @ RegistryError::DuplicateName(_))
            | Err(e @ RegistryError::UnknownBackendType(_))
            | Err(e @ RegistryError::NoDomainPatterns)
            | Err(e @ RegistryError::Instance(_))
            | Err(e @ RegistryError::Matcher(_)) => return Err(InitFailure::Hard(e)),
            Err(RegistryError::BackendInit(be)) => {
                metrics::set_provider_available(&name, &kind, false);
                return Err(InitFailure::Soft(format!("backend construction failed: {be}")));
            }
        }

        let instance = self.registry.get(&name).expect("just created");
        let ping_result = timeout(INIT_PING_TIMEOUT, instance.backend().ping()).await;
        match ping_result {
            Ok(Ok(())) => {
                metrics::set_provider_available(&name, &kind, true);
                Ok(())
            }
            Ok(Err(e)) => {
                self.registry.remove(&name);
                metrics::set_provider_available(&name, &kind, false);
                Err(InitFailure::Soft(format!("ping failed: {e}")))
            }
            Err(_) => {
                self.registry.remove(&name);
                metrics::set_provider_available(&name, &kind, false);
                Err(InitFailure::Soft(format!("ping timed out after {INIT_PING_TIMEOUT:?}")))
            }
        }
    }

    /// Queues a never-before-seen pending provider with a fresh backoff.
    fn enqueue_pending(&self, config: InstanceConfig, last_error: String) {
        let name = config.name.clone();
        let mut backoff = ExponentialBackoff::default();
        let next_retry_at = Instant::now() + backoff.next_backoff();
        self.pending.lock().push(PendingProvider {
            config,
            backoff,
            next_retry_at,
            attempt_count: 1,
            last_error,
        });
        metrics::inc_init_retry(&name, false);
    }

    fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Runs one pass over pending providers, retrying every one whose
    /// `next_retry_at` has elapsed. A provider that fails again keeps its own
    /// backoff and advances it; only a successful retry drops it
    /// from the pending set. Exposed separately from [`Self::start`] so tests
    /// can drive it without a ticker.
    pub async fn retry_pending_once(&self) {
        let now = Instant::now();
        let due: Vec<PendingProvider> = {
            let mut pending = self.pending.lock();
            let mut due = Vec::new();
            let mut i = 0;
            while i < pending.len() {
                if pending[i].next_retry_at <= now {
                    due.push(pending.remove(i));
                } else {
                    i += 1;
                }
            }
            due
        };

        for mut entry in due {
            let name = entry.config.name.clone();
            match self.try_create_and_ping(entry.config.clone()).await {
                Ok(()) => {
                    info!("{name}: became available after retry");
                    metrics::inc_init_retry(&name, true);
                }
                Err(InitFailure::Hard(e)) => {
                    warn!("{name}: dropping from retry queue, config is invalid: {e}");
                }
                Err(InitFailure::Soft(reason)) => {
                    entry.attempt_count += 1;
                    entry.last_error = reason;
                    entry.next_retry_at = Instant::now() + entry.backoff.next_backoff();
                    self.pending.lock().push(entry);
                }
            }
        }

        let ready = self.registry.count();
        let pending = self.pending_count();
        metrics::set_providers_ready_pending(ready, pending);
    }

    /// Launches the one-second retry ticker as a background task.
    pub fn start(self: &Arc<Self>) {
        let mut guard = self.loop_handle.lock();
        if guard.is_some() {
            return;
        }
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RETRY_TICK);
            loop {
                tokio::select! {
                    _ = ticker.tick() => manager.retry_pending_once().await,
                    _ = &mut stop_rx => break,
                }
            }
        });
        *guard = Some((stop_tx, handle));
    }

    /// Signals the retry loop to stop and awaits its completion.
    pub async fn stop(&self) {
        let handle = self.loop_handle.lock().take();
        if let Some((stop_tx, handle)) = handle {
            let _ = stop_tx.send(());
            let _ = handle.await;
        }
    }

    /// `{name, type, available, last_error?}` for every known provider,
    /// ready or pending.
    pub async fn all_provider_statuses(&self) -> Vec<InstanceStatus> {
        let mut statuses = self.registry.ping_all().await;
        statuses.extend(self.pending.lock().iter().map(|p| InstanceStatus {
            name: p.config.name.clone(),
            kind: p.config.backend_type.clone(),
            available: false,
            last_error: Some(format!("{} (attempt {})", p.last_error, p.attempt_count)),
        }));
        statuses
    }
}

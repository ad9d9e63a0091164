//! The only way hostnames enter the core.
//!
//! Concrete sources (container orchestrator label scans, static lists, ...)
//! implement [`Source`] once; the reconciler only ever calls
//! [`extract_all`] across the ordered set it was configured with.

use async_trait::async_trait;
use log::warn;
use thiserror::Error;

use crate::instance::DesiredHostname;

#[derive(Debug, Error, Clone)]
pub enum SourceError {
    #[error("{source_name}: {reason}")]
    Unavailable { source_name: String, reason: String },
}

/// Discovers hostnames that should currently resolve.
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;
    async fn extract(&self) -> Result<Vec<DesiredHostname>, SourceError>;
}

/// Queries every source in order and returns a deduplicated union, keyed by
/// lowercased hostname. A source that fails is logged and skipped — one
/// source's outage never blocks discovery from the others.
pub async fn extract_all(sources: &[Box<dyn Source>]) -> Vec<DesiredHostname> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for source in sources {
        match source.extract().await {
            Ok(hostnames) => {
                for hostname in hostnames {
                    if seen.insert(hostname.name.lower().to_string()) {
                        out.push(hostname);
                    }
                }
            }
            Err(e) => warn!("{}: extraction failed, skipping this cycle: {e}", source.name()),
        }
    }
    out
}

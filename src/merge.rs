use crate::catalog::{Catalog, WineryId, WineryRecord};
use crate::error::StatusError;
use crate::status::{StatusFlags, StatusMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Catalog record joined with the current user's status
#[derive(Clone, Debug, PartialEq)]
pub struct EnrichedWinery {
    pub record: WineryRecord,
    pub status: StatusFlags,
}

impl EnrichedWinery {
    pub fn id(&self) -> &WineryId {
        &self.record.id
    }
}

/// Outcome of the latest status fetch as far as the merge cares
#[derive(Clone, Debug)]
pub enum StatusSnapshot {
    Loaded(Arc<StatusMap>),
    /// Backend unreachable, user signed out, or fetch timed out
    Unavailable,
}

impl StatusSnapshot {
    pub fn from_fetch(result: Result<StatusMap, StatusError>) -> Self {
        match result {
            Ok(map) => StatusSnapshot::Loaded(Arc::new(map)),
            Err(e) => {
                warn!("status unavailable, defaulting flags: {e}");
                StatusSnapshot::Unavailable
            }
        }
    }

    fn map(&self) -> Option<&StatusMap> {
        match self {
            StatusSnapshot::Loaded(map) => Some(map),
            StatusSnapshot::Unavailable => None,
        }
    }
}

/// One output record per catalog record, in catalog order. Missing or
/// unavailable status defaults every flag to false.
pub fn merge_statuses(catalog: &[WineryRecord], status: Option<&StatusMap>) -> Vec<EnrichedWinery> {
    catalog
        .iter()
        .map(|record| EnrichedWinery {
            record: record.clone(),
            status: status
                .and_then(|map| map.get(&record.id))
                .cloned()
                .unwrap_or_default(),
        })
        .collect()
}

/// Memoizing wrapper around [`merge_statuses`].
/// Recomputes only when the catalog or status `Arc` is a different
/// allocation than last time.
#[derive(Default)]
pub struct StatusMerge {
    cached: Option<Cached>,
}

struct Cached {
    catalog: Arc<Catalog>,
    status: Option<Arc<StatusMap>>,
    output: Arc<[EnrichedWinery]>,
}

impl Cached {
    fn matches(&self, catalog: &Arc<Catalog>, status: &StatusSnapshot) -> bool {
        if !Arc::ptr_eq(&self.catalog, catalog) {
            return false;
        }
        match (&self.status, status) {
            (Some(a), StatusSnapshot::Loaded(b)) => Arc::ptr_eq(a, b),
            (None, StatusSnapshot::Unavailable) => true,
            _ => false,
        }
    }
}

impl StatusMerge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, catalog: &Arc<Catalog>, status: &StatusSnapshot) -> Arc<[EnrichedWinery]> {
        if let Some(cached) = &self.cached {
            if cached.matches(catalog, status) {
                return cached.output.clone();
            }
        }

        let output: Arc<[EnrichedWinery]> = merge_statuses(catalog.records(), status.map()).into();
        debug!(wineries = output.len(), "status merged");

        self.cached = Some(Cached {
            catalog: catalog.clone(),
            status: match status {
                StatusSnapshot::Loaded(map) => Some(map.clone()),
                StatusSnapshot::Unavailable => None,
            },
            output: output.clone(),
        });
        output
    }
}

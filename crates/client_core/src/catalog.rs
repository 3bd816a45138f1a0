use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering as AtomicOrdering},
        Arc,
    },
};

use shared::domain::{Artifact, ArtifactId};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::{ClientError, ClientResult},
    gateway::RequestGateway,
    session::SessionScoped,
};

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load artifacts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Name,
    FileSize,
    UploadTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortState {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            field: SortField::UploadTime,
            direction: SortDirection::Descending,
        }
    }
}

impl SortState {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Selecting the active field flips the direction; a new field starts ascending.
    pub fn select(self, field: SortField) -> Self {
        if field == self.field {
            Self::new(field, self.direction.toggled())
        } else {
            Self::new(field, SortDirection::Ascending)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
    pub search_term: String,
    pub sort: SortState,
}

impl ViewQuery {
    pub fn select_sort(&mut self, field: SortField) {
        self.sort = self.sort.select(field);
    }
}

/// Filters and orders `artifacts`.
///
/// The search term matches case-insensitively against the name or the
/// description. Equal sort keys fall back to ascending id so the result does
/// not depend on input order.
pub fn derive_view<'a>(
    artifacts: impl IntoIterator<Item = &'a Artifact>,
    search_term: &str,
    sort: SortState,
) -> Vec<Artifact> {
    let needle = search_term.to_lowercase();
    let mut view: Vec<Artifact> = artifacts
        .into_iter()
        .filter(|artifact| matches_search(artifact, &needle))
        .cloned()
        .collect();

    view.sort_by(|a, b| {
        let by_field = compare_field(a, b, sort.field);
        let by_field = match sort.direction {
            SortDirection::Ascending => by_field,
            SortDirection::Descending => by_field.reverse(),
        };
        by_field.then_with(|| a.id.cmp(&b.id))
    });
    view
}

fn matches_search(artifact: &Artifact, needle: &str) -> bool {
    needle.is_empty()
        || artifact.name.to_lowercase().contains(needle)
        || artifact.description.to_lowercase().contains(needle)
}

fn compare_field(a: &Artifact, b: &Artifact, field: SortField) -> Ordering {
    match field {
        SortField::Name => a.name.cmp(&b.name),
        SortField::FileSize => a.file_size.cmp(&b.file_size),
        SortField::UploadTime => a.upload_time.cmp(&b.upload_time),
    }
}

/// Human readable size in binary units, e.g. `1536 -> "1.5 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{value:.2}");
    let formatted = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{formatted} {}", UNITS[unit])
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub artifacts: Arc<HashMap<ArtifactId, Artifact>>,
    pub loading: bool,
    pub error: Option<String>,
    /// Set when the last detail lookup named an artifact the backend does not have.
    pub not_found: Option<ArtifactId>,
}

impl CatalogSnapshot {
    pub fn view(&self, query: &ViewQuery) -> Vec<Artifact> {
        derive_view(self.artifacts.values(), &query.search_term, query.sort)
    }
}

pub struct ArtifactCatalog {
    gateway: Arc<RequestGateway>,
    state: watch::Sender<CatalogSnapshot>,
    refresh_generation: AtomicU64,
}

impl ArtifactCatalog {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        let (state, _) = watch::channel(CatalogSnapshot::default());
        Self {
            gateway,
            state,
            refresh_generation: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CatalogSnapshot> {
        self.state.subscribe()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &ArtifactId) -> Option<Artifact> {
        self.state.borrow().artifacts.get(id).cloned()
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.state.borrow().artifacts.contains_key(id)
    }

    pub fn view(&self, query: &ViewQuery) -> Vec<Artifact> {
        self.state.borrow().view(query)
    }

    /// Replaces the whole set with the backend's list. Failures are recorded
    /// in the snapshot; the previous set stays visible.
    pub async fn refresh(&self) {
        let generation = self.refresh_generation.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        self.replace_state(|snapshot| {
            snapshot.loading = true;
            snapshot.error = None;
        });

        let result = self.gateway.list_artifacts().await;
        if self.refresh_generation.load(AtomicOrdering::SeqCst) != generation {
            debug!("discarding superseded artifact list");
            return;
        }

        match result {
            Ok(artifacts) => {
                let count = artifacts.len();
                let set: HashMap<ArtifactId, Artifact> = artifacts
                    .into_iter()
                    .map(|artifact| (artifact.id.clone(), artifact))
                    .collect();
                self.state.send_replace(CatalogSnapshot {
                    artifacts: Arc::new(set),
                    loading: false,
                    error: None,
                    not_found: None,
                });
                info!(count, "artifact catalog refreshed");
            }
            Err(err) => {
                warn!(error = %err, "artifact catalog refresh failed");
                self.replace_state(|snapshot| {
                    snapshot.loading = false;
                    snapshot.error = Some(LOAD_FAILED_MESSAGE.to_string());
                });
            }
        }
    }

    /// Fetches one artifact and stores it in the set.
    pub async fn load_detail(&self, id: &ArtifactId) -> ClientResult<Artifact> {
        match self.gateway.get_artifact(id).await {
            Ok(artifact) => {
                self.upsert(artifact.clone());
                Ok(artifact)
            }
            Err(err @ ClientError::NotFound { .. }) => {
                self.replace_state(|snapshot| {
                    if snapshot.artifacts.contains_key(id) {
                        let mut set = (*snapshot.artifacts).clone();
                        set.remove(id);
                        snapshot.artifacts = Arc::new(set);
                    }
                    snapshot.not_found = Some(id.clone());
                });
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Deletes on the backend first; the local entry goes away only once the
    /// backend confirms (or reports the artifact as already gone).
    pub async fn remove(&self, id: &ArtifactId) -> ClientResult<()> {
        match self.gateway.delete_artifact(id).await {
            Ok(()) => {
                self.drop_entry(id, None);
                info!(artifact_id = %id, "artifact deleted");
                Ok(())
            }
            Err(err @ ClientError::NotFound { .. }) => {
                self.drop_entry(id, Some(id.clone()));
                Err(err)
            }
            Err(err) => {
                warn!(artifact_id = %id, error = %err, "artifact delete failed");
                self.replace_state(|snapshot| {
                    snapshot.error = Some(format!("Failed to delete artifact: {err}"));
                });
                Err(err)
            }
        }
    }

    /// Forgets every artifact and discards any refresh still in flight.
    pub fn clear(&self) {
        self.refresh_generation.fetch_add(1, AtomicOrdering::SeqCst);
        self.state.send_replace(CatalogSnapshot::default());
    }

    pub(crate) fn upsert(&self, artifact: Artifact) {
        self.replace_state(|snapshot| {
            let mut set = (*snapshot.artifacts).clone();
            if snapshot.not_found.as_ref() == Some(&artifact.id) {
                snapshot.not_found = None;
            }
            set.insert(artifact.id.clone(), artifact);
            snapshot.artifacts = Arc::new(set);
        });
    }

    fn drop_entry(&self, id: &ArtifactId, not_found: Option<ArtifactId>) {
        self.replace_state(|snapshot| {
            let mut set = (*snapshot.artifacts).clone();
            set.remove(id);
            snapshot.artifacts = Arc::new(set);
            snapshot.not_found = not_found;
        });
    }

    /// Builds the next snapshot from a copy of the current one and publishes
    /// it in a single replacement.
    fn replace_state(&self, update: impl FnOnce(&mut CatalogSnapshot)) {
        let mut next = self.snapshot();
        update(&mut next);
        self.state.send_replace(next);
    }
}

impl SessionScoped for ArtifactCatalog {
    fn session_cleared(&self) {
        debug!("clearing artifact catalog after sign-out");
        self.clear();
    }
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;

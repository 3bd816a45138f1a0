use std::{path::Path, sync::Arc};

use anyhow::{anyhow, Context};
use shared::domain::Artifact;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    catalog::ArtifactCatalog,
    error::{ClientError, ClientResult},
    gateway::{ProgressCallback, RequestGateway, UploadRequest},
};

pub const MISSING_FILE_MESSAGE: &str = "Please select a file to upload";
pub const MISSING_NAME_MESSAGE: &str = "Please provide a name for the artifact";
pub const UPLOAD_FAILED_MESSAGE: &str = "Failed to upload artifact. Please try again.";

/// In-flight progress never reaches 100; that value is reserved for the
/// backend's acknowledgement.
const MAX_IN_FLIGHT_PERCENT: u8 = 99;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub mime_type: Option<String>,
    pub contents: Arc<Vec<u8>>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, contents: Vec<u8>) -> Self {
        let filename = filename.into();
        let mime_type = mime_guess::from_path(&filename)
            .first()
            .map(|mime| mime.essence_str().to_string());
        Self {
            filename,
            mime_type,
            contents: Arc::new(contents),
        }
    }

    pub async fn from_path(path: &Path) -> anyhow::Result<Self> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("'{}' does not name a file", path.display()))?;
        let contents = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        Ok(Self::new(filename, contents))
    }

    pub fn size(&self) -> u64 {
        self.contents.len() as u64
    }

    /// File name with its last extension removed, used to pre-fill the artifact name.
    pub fn default_artifact_name(&self) -> String {
        match self.filename.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => self.filename.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Idle,
    Validating,
    InFlight,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSnapshot {
    pub status: UploadStatus,
    pub progress_percent: u8,
    pub error: Option<String>,
    pub artifact: Option<Artifact>,
}

impl Default for UploadSnapshot {
    fn default() -> Self {
        Self {
            status: UploadStatus::Idle,
            progress_percent: 0,
            error: None,
            artifact: None,
        }
    }
}

/// One upload form submission. Owned by the view that created it.
pub struct UploadFlow {
    gateway: Arc<RequestGateway>,
    catalog: Arc<ArtifactCatalog>,
    file: Option<UploadFile>,
    name: String,
    description: String,
    state: Arc<watch::Sender<UploadSnapshot>>,
}

impl UploadFlow {
    pub fn new(gateway: Arc<RequestGateway>, catalog: Arc<ArtifactCatalog>) -> Self {
        let (state, _) = watch::channel(UploadSnapshot::default());
        Self {
            gateway,
            catalog,
            file: None,
            name: String::new(),
            description: String::new(),
            state: Arc::new(state),
        }
    }

    pub fn select_file(&mut self, file: UploadFile) {
        if self.name.is_empty() {
            self.name = file.default_artifact_name();
        }
        self.file = Some(file);
    }

    pub fn clear_file(&mut self) {
        self.file = None;
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn file(&self) -> Option<&UploadFile> {
        self.file.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn snapshot(&self) -> UploadSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadSnapshot> {
        self.state.subscribe()
    }

    pub fn status(&self) -> UploadStatus {
        self.state.borrow().status
    }

    /// Validates the form, uploads it and refreshes the catalog before
    /// reporting success. A failed job may be submitted again as is.
    pub async fn submit(&mut self) -> ClientResult<Artifact> {
        let status = self.status();
        if !matches!(status, UploadStatus::Idle | UploadStatus::Failed) {
            return Err(ClientError::validation(format!(
                "upload cannot be submitted while {status:?}"
            )));
        }

        self.publish(UploadStatus::Validating, 0, None, None);
        let request = match self.validated_request() {
            Ok(request) => request,
            Err(message) => {
                self.publish(UploadStatus::Idle, 0, Some(message.to_string()), None);
                return Err(ClientError::validation(message));
            }
        };

        // Every submission starts from zero.
        self.publish(UploadStatus::InFlight, 0, None, None);
        info!(
            name = %request.name,
            bytes = request.file.size(),
            "artifact upload started"
        );

        let result = self
            .gateway
            .upload_artifact(&request, Some(self.progress_callback()))
            .await;

        match result {
            Ok(artifact) => {
                self.publish(UploadStatus::InFlight, 100, None, None);
                self.catalog.refresh().await;
                if !self.catalog.contains(&artifact.id) {
                    self.catalog.upsert(artifact.clone());
                }
                info!(artifact_id = %artifact.id, "artifact upload completed");
                self.publish(UploadStatus::Succeeded, 100, None, Some(artifact.clone()));
                Ok(artifact)
            }
            Err(err) => {
                warn!(error = %err, "artifact upload failed");
                let progress = self.state.borrow().progress_percent;
                self.publish(
                    UploadStatus::Failed,
                    progress,
                    Some(UPLOAD_FAILED_MESSAGE.to_string()),
                    None,
                );
                Err(err)
            }
        }
    }

    fn validated_request(&self) -> Result<UploadRequest, &'static str> {
        let file = self.file.clone().ok_or(MISSING_FILE_MESSAGE)?;
        if self.name.trim().is_empty() {
            return Err(MISSING_NAME_MESSAGE);
        }
        Ok(UploadRequest {
            file,
            name: self.name.clone(),
            description: self.description.clone(),
        })
    }

    fn progress_callback(&self) -> ProgressCallback {
        let state = Arc::clone(&self.state);
        Arc::new(move |sent, total| {
            let percent = in_flight_percent(sent, total);
            state.send_if_modified(|snapshot| {
                if snapshot.status == UploadStatus::InFlight && percent > snapshot.progress_percent
                {
                    snapshot.progress_percent = percent;
                    true
                } else {
                    false
                }
            });
        })
    }

    fn publish(
        &self,
        status: UploadStatus,
        progress_percent: u8,
        error: Option<String>,
        artifact: Option<Artifact>,
    ) {
        self.state.send_replace(UploadSnapshot {
            status,
            progress_percent,
            error,
            artifact,
        });
    }
}

fn in_flight_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = u128::from(sent) * 100 / u128::from(total);
    percent.min(u128::from(MAX_IN_FLIGHT_PERCENT)) as u8
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;

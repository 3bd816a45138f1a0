//! Client core for the artifact catalog: session lifecycle, authorized
//! requests, the catalog view-model and the upload state machine.

use std::sync::{Arc, Weak};

use anyhow::Result;
use shared::domain::ArtifactId;
use storage::Storage;
use tracing::info;

pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod navigation;
pub mod session;
pub mod token_store;
pub mod upload;

pub use catalog::{
    derive_view, format_file_size, ArtifactCatalog, CatalogSnapshot, SortDirection, SortField,
    SortState, ViewQuery,
};
pub use config::{load_settings, ClientSettings};
pub use error::{ClientError, ClientResult, ErrorKind};
pub use gateway::{AuthorizationLost, AuthorizationObserver, RequestGateway, UploadRequest};
pub use navigation::{MemoryNavigator, Navigator, NullNavigator, View};
pub use session::{SessionManager, SessionPhase, SessionScoped, SessionSnapshot};
pub use token_store::{DurableTokenStore, MemoryTokenStore, TokenStore};
pub use upload::{UploadFile, UploadFlow, UploadSnapshot, UploadStatus};

/// Owns the process-wide session and catalog and the gateway they share.
pub struct ArtifactClient {
    gateway: Arc<RequestGateway>,
    session: Arc<SessionManager>,
    catalog: Arc<ArtifactCatalog>,
}

impl ArtifactClient {
    pub fn new(
        gateway: RequestGateway,
        token_store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let gateway = Arc::new(gateway);
        let session = SessionManager::new(Arc::clone(&gateway), token_store, navigator);
        let catalog = Arc::new(ArtifactCatalog::new(Arc::clone(&gateway)));
        let scoped: Weak<dyn SessionScoped> = Arc::downgrade(&catalog) as Weak<dyn SessionScoped>;
        session.set_scoped(scoped);
        Self {
            gateway,
            session,
            catalog,
        }
    }

    /// Opens durable client state and wires the client against the configured backend.
    pub async fn open(settings: &ClientSettings, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let gateway = RequestGateway::from_settings(settings)?;
        let storage = Storage::new(&settings.database_url).await?;
        info!(
            api_base_url = %gateway.base_url(),
            database_url = %settings.database_url,
            "artifact client opened"
        );
        Ok(Self::new(
            gateway,
            Arc::new(DurableTokenStore::new(storage)),
            navigator,
        ))
    }

    pub fn gateway(&self) -> &Arc<RequestGateway> {
        &self.gateway
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn catalog(&self) -> &Arc<ArtifactCatalog> {
        &self.catalog
    }

    pub fn upload_flow(&self) -> UploadFlow {
        UploadFlow::new(Arc::clone(&self.gateway), Arc::clone(&self.catalog))
    }

    pub fn download_url(&self, id: &ArtifactId) -> String {
        self.gateway.download_url(id)
    }
}

#[cfg(test)]
#[path = "tests/mock_backend.rs"]
pub(crate) mod mock_backend;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

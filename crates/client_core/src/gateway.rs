//! Outbound calls to the artifact backend.
//!
//! Every request reads the credential at issue time and carries it as a bearer
//! token. A 401 response clears that credential before the caller sees the
//! error and notifies the registered [`AuthorizationObserver`] exactly once.

use std::sync::{Arc, OnceLock, Weak};

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{
    multipart::{Form, Part},
    Body, Client, RequestBuilder, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Artifact, ArtifactId, User},
    error::{ApiError, ErrorCode},
    protocol::{routes, upload_fields, LoginRequest, LoginResponse},
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    config::{normalize_base_url, ClientSettings},
    error::{ClientError, ClientResult},
    upload::UploadFile,
};

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Context handed to the observer when a response reports an authorization failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationLost {
    /// Credential the failing request was sent with.
    pub token: Option<String>,
    pub resource: String,
}

#[async_trait]
pub trait AuthorizationObserver: Send + Sync {
    async fn on_authorization_lost(&self, lost: AuthorizationLost);
}

/// Called with `(bytes_sent, total_bytes)` as the upload body is consumed.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: UploadFile,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
enum Credential {
    Current,
    Explicit(Option<String>),
}

pub struct RequestGateway {
    http: Client,
    base_url: String,
    credential: watch::Sender<Option<String>>,
    observer: OnceLock<Weak<dyn AuthorizationObserver>>,
}

impl RequestGateway {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn from_settings(settings: &ClientSettings) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .context("failed to build HTTP client")?;
        Self::with_client(http, &settings.api_base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> anyhow::Result<Self> {
        let (credential, _) = watch::channel(None);
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            credential,
            observer: OnceLock::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Registers the observer notified on authorization failures. Only the
    /// first registration takes effect.
    pub fn set_observer(&self, observer: Weak<dyn AuthorizationObserver>) -> bool {
        self.observer.set(observer).is_ok()
    }

    pub fn attach_token(&self, token: impl Into<String>) {
        self.credential.send_replace(Some(token.into()));
    }

    pub fn detach_token(&self) {
        self.credential.send_replace(None);
    }

    pub fn token(&self) -> Option<String> {
        self.credential.borrow().clone()
    }

    /// Pure URL construction; performs no request.
    pub fn download_url(&self, id: &ArtifactId) -> String {
        self.url(&routes::artifact_download(id))
    }

    pub async fn login(&self, request: &LoginRequest) -> ClientResult<LoginResponse> {
        let builder = self.http.post(self.url(routes::LOGIN)).json(request);
        let response = self
            .execute(builder, routes::LOGIN, Credential::Current)
            .await?;
        decode_json(response).await
    }

    pub async fn current_user(&self) -> ClientResult<User> {
        let builder = self.http.get(self.url(routes::CURRENT_USER));
        let response = self
            .execute(builder, routes::CURRENT_USER, Credential::Current)
            .await?;
        decode_json(response).await
    }

    /// Notifies the backend that `token` is no longer in use. The token is
    /// passed explicitly because the local session is cleared before the
    /// notification is sent.
    pub async fn logout(&self, token: Option<String>) -> ClientResult<()> {
        let builder = self.http.post(self.url(routes::LOGOUT));
        self.execute(builder, routes::LOGOUT, Credential::Explicit(token))
            .await?;
        Ok(())
    }

    pub async fn list_artifacts(&self) -> ClientResult<Vec<Artifact>> {
        let builder = self.http.get(self.url(routes::ARTIFACTS));
        let response = self
            .execute(builder, routes::ARTIFACTS, Credential::Current)
            .await?;
        decode_json(response).await
    }

    pub async fn get_artifact(&self, id: &ArtifactId) -> ClientResult<Artifact> {
        let path = routes::artifact(id);
        let builder = self.http.get(self.url(&path));
        let response = self.execute(builder, &path, Credential::Current).await?;
        decode_json(response).await
    }

    pub async fn upload_artifact(
        &self,
        upload: &UploadRequest,
        progress: Option<ProgressCallback>,
    ) -> ClientResult<Artifact> {
        let total = upload.file.size();
        let mut part = Part::stream_with_length(
            progress_body(&upload.file.contents, progress),
            total,
        )
        .file_name(upload.file.filename.clone());
        if let Some(mime_type) = &upload.file.mime_type {
            part = part.mime_str(mime_type)?;
        }

        let form = Form::new()
            .part(upload_fields::FILE, part)
            .text(upload_fields::NAME, upload.name.clone())
            .text(upload_fields::DESCRIPTION, upload.description.clone());

        let builder = self.http.post(self.url(routes::ARTIFACTS)).multipart(form);
        let response = self
            .execute(builder, routes::ARTIFACTS, Credential::Current)
            .await?;
        decode_json(response).await
    }

    pub async fn delete_artifact(&self, id: &ArtifactId) -> ClientResult<()> {
        let path = routes::artifact(id);
        let builder = self.http.delete(self.url(&path));
        self.execute(builder, &path, Credential::Current).await?;
        Ok(())
    }

    pub async fn download_artifact(&self, id: &ArtifactId) -> ClientResult<Vec<u8>> {
        let path = routes::artifact_download(id);
        let builder = self.http.get(self.url(&path));
        let response = self.execute(builder, &path, Credential::Current).await?;
        Ok(response.bytes().await?.to_vec())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn execute(
        &self,
        builder: RequestBuilder,
        resource: &str,
        credential: Credential,
    ) -> ClientResult<Response> {
        let token = match credential {
            Credential::Current => self.token(),
            Credential::Explicit(token) => token,
        };
        let builder = match &token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = error_message(response, status).await;
        match status {
            StatusCode::UNAUTHORIZED => {
                self.handle_unauthorized(token, resource).await;
                Err(ClientError::Unauthorized { message })
            }
            StatusCode::NOT_FOUND => Err(ClientError::NotFound {
                resource: resource.to_string(),
            }),
            _ => {
                let code = ErrorCode::from_status(status.as_u16());
                debug!(%status, ?code, resource, "request failed");
                Err(ClientError::Request { status, message })
            }
        }
    }

    async fn handle_unauthorized(&self, token: Option<String>, resource: &str) {
        // Only the credential the request was sent with is invalidated; a
        // token attached by a newer login stays in place.
        let cleared = self.credential.send_if_modified(|current| {
            if current.is_some() && *current == token {
                *current = None;
                true
            } else {
                false
            }
        });
        warn!(resource, cleared, "authorization rejected by backend");

        let observer = self.observer.get().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            observer
                .on_authorization_lost(AuthorizationLost {
                    token,
                    resource: resource.to_string(),
                })
                .await;
        }
    }
}

fn progress_body(contents: &Arc<Vec<u8>>, progress: Option<ProgressCallback>) -> Body {
    let total = contents.len() as u64;
    let chunks: Vec<Vec<u8>> = contents
        .chunks(UPLOAD_CHUNK_SIZE)
        .map(<[u8]>::to_vec)
        .collect();
    let mut sent = 0u64;
    let stream = futures::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        if let Some(progress) = &progress {
            progress(sent, total);
        }
        Ok::<_, std::io::Error>(chunk)
    });
    Body::wrap_stream(stream)
}

async fn error_message(response: Response, status: StatusCode) -> String {
    let body = response.text().await.unwrap_or_default();
    ApiError::message_from_body(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    })
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    Ok(response.json::<T>().await?)
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;

use serde::{Deserialize, Serialize};

use crate::domain::{ArtifactId, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Multipart field names accepted by `POST /api/artifacts`.
pub mod upload_fields {
    pub const FILE: &str = "file";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
}

/// Relative paths of the artifact backend's REST surface.
pub mod routes {
    use super::ArtifactId;

    pub const LOGIN: &str = "/api/auth/login";
    pub const LOGOUT: &str = "/api/auth/logout";
    pub const CURRENT_USER: &str = "/api/auth/me";
    pub const ARTIFACTS: &str = "/api/artifacts";

    pub fn artifact(id: &ArtifactId) -> String {
        format!("{ARTIFACTS}/{}", id.0)
    }

    pub fn artifact_download(id: &ArtifactId) -> String {
        format!("{ARTIFACTS}/{}/download", id.0)
    }
}

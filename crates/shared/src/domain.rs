use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ArtifactId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

/// Metadata for one uploaded artifact, as returned by the catalog endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: ArtifactId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub upload_time: DateTime<Utc>,
    #[serde(rename = "uploaderId", alias = "ownerId")]
    pub owner_id: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_parses_backend_json() {
        let raw = r#"{
            "id": "a1",
            "name": "scan-report",
            "description": "nightly",
            "fileSize": 2048,
            "sha256": "abc123",
            "uploadTime": "2024-03-01T12:00:00Z",
            "uploaderId": "u7"
        }"#;
        let artifact: Artifact = serde_json::from_str(raw).expect("artifact");
        assert_eq!(artifact.id, ArtifactId::from("a1"));
        assert_eq!(artifact.file_size, 2048);
        assert_eq!(artifact.owner_id, UserId::from("u7"));
        assert_eq!(artifact.sha256.as_deref(), Some("abc123"));
    }

    #[test]
    fn artifact_accepts_owner_id_alias_and_missing_description() {
        let raw = r#"{
            "id": "a2",
            "name": "firmware",
            "fileSize": 0,
            "uploadTime": "2024-03-01T12:00:00Z",
            "ownerId": "u1"
        }"#;
        let artifact: Artifact = serde_json::from_str(raw).expect("artifact");
        assert_eq!(artifact.owner_id.as_str(), "u1");
        assert!(artifact.description.is_empty());
        assert!(artifact.sha256.is_none());
    }

    #[test]
    fn unknown_roles_do_not_fail_user_parsing() {
        let user: User =
            serde_json::from_str(r#"{"id":"u1","username":"alice","role":"auditor"}"#)
                .expect("user");
        assert_eq!(user.role, Role::Other);
        let admin: User =
            serde_json::from_str(r#"{"id":"u2","username":"root","role":"admin"}"#).expect("user");
        assert_eq!(admin.role, Role::Admin);
    }
}

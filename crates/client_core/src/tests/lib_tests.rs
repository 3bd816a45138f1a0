use super::*;

use tempfile::TempDir;

use crate::mock_backend::{artifact, MockBackend};

fn settings_for(backend: &MockBackend, dir: &TempDir) -> ClientSettings {
    ClientSettings {
        api_base_url: backend.url.clone(),
        database_url: format!("sqlite://{}", dir.path().join("client.db").display()),
        request_timeout_secs: 5,
    }
}

#[tokio::test]
async fn session_survives_reopening_the_client() {
    let backend = MockBackend::spawn().await;
    let dir = TempDir::new().expect("tempdir");
    let settings = settings_for(&backend, &dir);

    let first = ArtifactClient::open(&settings, Arc::new(NullNavigator))
        .await
        .expect("open");
    first
        .session()
        .login("alice", "secret")
        .await
        .expect("login");
    let token = first.session().snapshot().token.expect("token");
    drop(first);

    let second = ArtifactClient::open(&settings, Arc::new(NullNavigator))
        .await
        .expect("reopen");
    let snapshot = second.session().initialize().await;
    assert!(snapshot.is_authenticated());
    assert_eq!(snapshot.token.as_deref(), Some(token.as_str()));

    second.session().logout().await;
    let third = ArtifactClient::open(&settings, Arc::new(NullNavigator))
        .await
        .expect("reopen after logout");
    assert_eq!(third.session().initialize().await.phase, SessionPhase::Unauthenticated);
}

#[tokio::test]
async fn facade_wires_catalog_uploads_and_downloads_to_one_gateway() {
    let backend = MockBackend::spawn().await;
    backend.seed_artifact(artifact("a1", "firmware", "router", 8, 0)).await;
    let client = ArtifactClient::new(
        RequestGateway::new(&backend.url).expect("gateway"),
        Arc::new(MemoryTokenStore::default()),
        Arc::new(MemoryNavigator::new(View::Dashboard)),
    );
    client
        .session()
        .login("bob", "hunter2")
        .await
        .expect("login");

    client.catalog().refresh().await;
    assert_eq!(client.catalog().len(), 1);

    let mut upload = client.upload_flow();
    upload.select_file(UploadFile::new("notes.md", b"# notes".to_vec()));
    let created = upload.submit().await.expect("upload");
    assert!(client.catalog().contains(&created.id));

    let id = ArtifactId::from("a1");
    assert_eq!(
        client.download_url(&id),
        format!("{}/api/artifacts/a1/download", backend.url)
    );
    let bytes = client
        .gateway()
        .download_artifact(&id)
        .await
        .expect("download");
    assert_eq!(bytes, b"firmware");
}

//! Config and credential store tests

use serde_json::json;
use tempfile::TempDir;

use nexus_gateway::errors::GatewayError;
use nexus_gateway::filesys::file::File;
use nexus_gateway::inventory;
use nexus_gateway::models::config::CONFIG_VERSION;
use nexus_gateway::models::device::{DevicePort, DeviceRecord, DeviceType};
use nexus_gateway::storage::config::ConfigStore;
use nexus_gateway::storage::credentials::{CredentialStore, CredentialsPatch, EnvCredentials};

fn config_file(dir: &TempDir) -> File {
    File::new(dir.path().join("config.json"))
}

fn credentials_file(dir: &TempDir) -> File {
    File::new(dir.path().join(".credentials.json"))
}

#[tokio::test]
async fn test_missing_config_is_seeded() {
    let dir = TempDir::new().unwrap();
    let file = config_file(&dir);

    let store = ConfigStore::open(file.clone()).await;
    assert!(file.exists().await);

    let on_disk: serde_json::Value = file.read_json().await.unwrap();
    assert_eq!(on_disk["_version"], json!(CONFIG_VERSION));
    assert_eq!(store.snapshot().await.shelly.len(), 0);
}

#[tokio::test]
async fn test_legacy_config_is_migrated_once() {
    let dir = TempDir::new().unwrap();
    let file = config_file(&dir);
    file.write_json(&json!({
        "shelly": [{ "ip": "10.0.0.2", "name": "Lamp", "room": "Den" }],
        "settings": { "theme": "light" }
    }))
    .await
    .unwrap();

    let store = ConfigStore::open(file.clone()).await;
    let config = store.snapshot().await;
    assert_eq!(config.version, CONFIG_VERSION);
    assert_eq!(config.shelly[0].name.as_deref(), Some("Lamp"));
    assert_eq!(config.settings.theme, "light");
    assert_eq!(config.settings.ring_snapshot_interval, 30);

    let migrated = file.read_string().await.unwrap();
    let reopened = ConfigStore::open(file.clone()).await;
    assert_eq!(reopened.snapshot().await, config);
    assert_eq!(file.read_string().await.unwrap(), migrated);
}

#[tokio::test]
async fn test_malformed_config_is_left_alone() {
    let dir = TempDir::new().unwrap();
    let file = config_file(&dir);
    file.write_atomic(b"{ not json").await.unwrap();

    let store = ConfigStore::open(file.clone()).await;
    assert!(store.snapshot().await.needs_setup());
    assert_eq!(file.read_string().await.unwrap(), "{ not json");
}

#[tokio::test]
async fn test_records_from_older_releases_survive_edits() {
    let dir = TempDir::new().unwrap();
    let file = config_file(&dir);
    file.write_json(&json!({
        "shelly": [{ "id": "shelly1-a", "ip": "10.0.0.2", "name": "Porch", "gen": 1, "mac": 12345 }],
        "piaware": [{
            "ip": "localhost",
            "port": "file",
            "type": "piaware-local",
            "path": "/run/dump1090-fa/aircraft.json"
        }]
    }))
    .await
    .unwrap();

    let store = ConfigStore::open(file.clone()).await;
    let config = store.snapshot().await;
    assert_eq!(config.shelly.len(), 1);
    assert_eq!(config.piaware[0].port, Some(DevicePort::Text("file".to_string())));

    // The document read back can be saved again unchanged
    store
        .save_value(serde_json::to_value(&config).unwrap())
        .await
        .unwrap();

    store
        .update(|config| {
            config.settings.theme = "light".to_string();
            Ok(())
        })
        .await
        .unwrap();

    let on_disk: serde_json::Value = file.read_json().await.unwrap();
    assert_eq!(on_disk["shelly"][0]["name"], json!("Porch"));
    assert_eq!(on_disk["shelly"][0]["mac"], json!(12345));
    assert_eq!(on_disk["piaware"][0]["port"], json!("file"));
    assert_eq!(on_disk["piaware"][0]["path"], json!("/run/dump1090-fa/aircraft.json"));
    assert!(!dir.path().join("config.json.bak").exists());
}

#[tokio::test]
async fn test_unreadable_config_is_backed_up_before_write() {
    let dir = TempDir::new().unwrap();
    let file = config_file(&dir);
    file.write_atomic(b"{ not json").await.unwrap();

    let store = ConfigStore::open(file.clone()).await;
    store
        .update(|config| {
            config.settings.theme = "light".to_string();
            Ok(())
        })
        .await
        .unwrap();

    let backup = std::fs::read_to_string(dir.path().join("config.json.bak")).unwrap();
    assert_eq!(backup, "{ not json");
    let on_disk: serde_json::Value = file.read_json().await.unwrap();
    assert_eq!(on_disk["settings"]["theme"], json!("light"));
}

#[tokio::test]
async fn test_unusable_entries_are_backed_up_before_write() {
    let dir = TempDir::new().unwrap();
    let file = config_file(&dir);
    let original = json!({
        "_version": CONFIG_VERSION,
        "shelly": [{ "ip": "10.0.0.2" }, "10.0.0.3"]
    });
    file.write_json(&original).await.unwrap();

    let store = ConfigStore::open(file.clone()).await;
    assert_eq!(store.snapshot().await.shelly.len(), 1);
    store.update(|_| Ok(())).await.unwrap();

    let backup: serde_json::Value =
        File::new(dir.path().join("config.json.bak")).read_json().await.unwrap();
    assert_eq!(backup, original);
}

#[tokio::test]
async fn test_updates_persist() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::open(config_file(&dir)).await;

    let device: DeviceRecord = serde_json::from_value(json!({ "id": "shelly-1", "ip": "10.0.0.7" })).unwrap();
    store
        .update(|config| inventory::add(config.devices_mut(DeviceType::Shelly), device))
        .await
        .unwrap();

    let reopened = ConfigStore::open(config_file(&dir)).await;
    assert_eq!(reopened.snapshot().await.shelly.len(), 1);
}

#[tokio::test]
async fn test_failed_mutation_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::open(config_file(&dir)).await;

    let result: Result<(), GatewayError> = store
        .update(|config| {
            config.settings.theme = "neon".to_string();
            Err(GatewayError::ValidationError("rejected".to_string()))
        })
        .await;
    assert!(result.is_err());
    assert_eq!(store.snapshot().await.settings.theme, "dark");
}

#[tokio::test]
async fn test_save_value_rejects_bad_shape() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::open(config_file(&dir)).await;

    let result = store.save_value(json!({ "shelly": "not a list" })).await;
    assert!(matches!(result, Err(GatewayError::ValidationError(_))));
}

#[tokio::test]
async fn test_credentials_are_private_and_patched() {
    let dir = TempDir::new().unwrap();
    let file = credentials_file(&dir);
    let store = CredentialStore::open(file.clone(), EnvCredentials::default()).await;

    let patch: CredentialsPatch = serde_json::from_value(json!({
        "honeywellEmail": "me@example.com",
        "honeywellPassword": "hunter2"
    }))
    .unwrap();
    let mut invalidated = false;
    store.update(patch, |_| invalidated = true).await.unwrap();
    assert!(invalidated);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let status = store.status().await;
    assert!(status.honeywell.configured);
    assert_eq!(status.honeywell.email, "me@example.com");
    assert!(!serde_json::to_string(&status).unwrap().contains("hunter2"));

    // A patch without the password keeps it
    let patch: CredentialsPatch =
        serde_json::from_value(json!({ "ringToken": "refresh" })).unwrap();
    store.update(patch, |_| {}).await.unwrap();
    assert!(store.honeywell().await.is_some());
    assert!(store.status().await.ring);

    // An empty string clears
    let patch: CredentialsPatch =
        serde_json::from_value(json!({ "ringToken": "" })).unwrap();
    store.update(patch, |_| {}).await.unwrap();
    assert!(store.ring_token().await.is_none());

    let reopened = CredentialStore::open(file, EnvCredentials::default()).await;
    assert_eq!(
        reopened.honeywell().await.map(|c| c.username),
        Some("me@example.com".to_string())
    );
}

#[tokio::test]
async fn test_environment_fallback() {
    let dir = TempDir::new().unwrap();
    let env = EnvCredentials {
        honeywell_email: Some("env@example.com".to_string()),
        honeywell_password: Some("from-env".to_string()),
        ring_token: Some("env-token".to_string()),
        shelly_auth: None,
    };
    let store = CredentialStore::open(credentials_file(&dir), env).await;

    let status = store.status().await;
    assert!(status.honeywell.configured);
    assert!(status.ring);
    assert!(!status.shelly);

    let patch: CredentialsPatch =
        serde_json::from_value(json!({ "honeywellEmail": "file@example.com" })).unwrap();
    store.update(patch, |_| {}).await.unwrap();
    assert_eq!(
        store.honeywell().await.map(|c| c.username),
        Some("file@example.com".to_string())
    );
}

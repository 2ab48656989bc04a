//! Clients talking to a live directory over HTTP.

use std::sync::Arc;
use std::time::Duration;

use murmur_core::directory::{HttpKeyDirectory, KeyDirectory};
use murmur_core::storage::MemoryStore;
use murmur_core::{DirectoryClientConfig, E2eService, Error, KeyStore, OsKeyPairProvider};
use murmur_directory::{router, AppState, DirectoryStore, TokenRegistry};

async fn spawn_directory() -> String {
    spawn_directory_over(DirectoryStore::new(None)).await
}

async fn spawn_directory_over(store: DirectoryStore) -> String {
    let tokens = TokenRegistry::new();
    tokens.insert("tok-alice", "1", "alice");
    tokens.insert("tok-bob", "2", "bob");
    tokens.insert("tok-carol", "3", "carol");
    serve(router(AppState::new(store, tokens))).await
}

async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn directory_client(base_url: &str, token: &str) -> HttpKeyDirectory {
    HttpKeyDirectory::new(&DirectoryClientConfig {
        base_url: base_url.to_string(),
        token: Some(token.to_string()),
        request_timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn service(base_url: &str, token: &str) -> E2eService {
    let keystore = Arc::new(KeyStore::new(Arc::new(MemoryStore::new())));
    E2eService::new(
        keystore,
        Arc::new(OsKeyPairProvider),
        Arc::new(directory_client(base_url, token)),
    )
}

#[tokio::test]
async fn test_message_survives_recipient_rotation() {
    let base_url = spawn_directory().await;
    let alice = service(&base_url, "tok-alice");
    let bob = service(&base_url, "tok-bob");

    let alice_key = alice.rotate_keys().await.unwrap();
    bob.rotate_keys().await.unwrap();

    let sealed = alice.encrypt_for_user("2", "hello bob").await.unwrap();
    assert_eq!(
        bob.decrypt(&sealed.recipient, &alice_key.to_encoded()).unwrap(),
        "hello bob"
    );
    assert_eq!(alice.decrypt_own(&sealed.owner_copy).unwrap(), "hello bob");

    // Bob's old key moves to history and still opens the earlier message.
    let bob_new = bob.rotate_keys().await.unwrap();
    assert_eq!(
        bob.decrypt(&sealed.recipient, &alice_key.to_encoded()).unwrap(),
        "hello bob"
    );

    let record = directory_client(&base_url, "tok-alice").fetch_one("2").await.unwrap();
    assert_eq!(record.public_key, bob_new);
    assert_eq!(record.username, "bob");
}

#[tokio::test]
async fn test_lookup_errors() {
    let base_url = spawn_directory().await;
    let carol = directory_client(&base_url, "tok-carol");
    let alice = directory_client(&base_url, "tok-alice");

    // Carol becomes known to the directory by authenticating, without a key.
    assert!(matches!(carol.fetch_one("404").await, Err(Error::UserNotFound(_))));
    assert!(matches!(alice.fetch_one("3").await, Err(Error::NoPublicKeySet(_))));

    let stranger = directory_client(&base_url, "tok-unknown");
    assert!(matches!(stranger.fetch_one("1").await, Err(Error::ProtocolError(_))));
}

#[tokio::test]
async fn test_user_ids_are_escaped_in_lookups() {
    let base_url = spawn_directory().await;
    let alice = service(&base_url, "tok-alice");
    alice.rotate_keys().await.unwrap();

    let bob = directory_client(&base_url, "tok-bob");
    for id in ["1?x", "1#frag", "a/b", "1/", "%31"] {
        assert!(
            matches!(bob.fetch_one(id).await, Err(Error::UserNotFound(_))),
            "lookup of {:?} should not resolve",
            id
        );
    }
    assert_eq!(bob.fetch_one("1").await.unwrap().user_id, "1");
}

#[tokio::test]
async fn test_lookup_answer_for_other_user_is_rejected() {
    use axum::routing::get;
    use axum::Json;

    let app = axum::Router::new().route(
        "/api/encryption/public-key/:user_id",
        get(|| async {
            Json(serde_json::json!({
                "success": true,
                "data": {
                    "userId": "someone-else",
                    "username": "mallory",
                    "publicKey": "AQIDBAUGBwgJCgsMDQ4PEBESExQVFhcYGRobHB0eHyA="
                }
            }))
        }),
    );
    let base_url = serve(app).await;

    let client = directory_client(&base_url, "tok-alice");
    assert!(matches!(client.fetch_one("2").await, Err(Error::ProtocolError(_))));
}

#[tokio::test]
async fn test_batch_lookup_skips_undecodable_keys() {
    let store = DirectoryStore::new(None);
    let base_url = spawn_directory_over(store.clone()).await;

    let alice = service(&base_url, "tok-alice");
    let alice_key = alice.rotate_keys().await.unwrap();
    store.set_public_key("2", "bob", "not-a-curve25519-key".into());

    let carol = directory_client(&base_url, "tok-carol");
    let found = carol
        .fetch_batch(&["1".to_string(), "2".to_string()])
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found["1"].public_key, alice_key);
}

#[tokio::test]
async fn test_batch_lookup_omits_keyless_users() {
    let base_url = spawn_directory().await;
    let alice = service(&base_url, "tok-alice");
    let bob = service(&base_url, "tok-bob");
    let carol = directory_client(&base_url, "tok-carol");

    let alice_key = alice.rotate_keys().await.unwrap();
    assert!(matches!(carol.fetch_one("3").await, Err(Error::NoPublicKeySet(_))));

    let ids = vec!["1".to_string(), "3".to_string(), "1".to_string(), "99".to_string()];
    let found = bob.fetch_public_keys(&ids).await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found["1"].public_key, alice_key);

    let too_many: Vec<String> = (0..51).map(|i| i.to_string()).collect();
    assert!(matches!(
        bob.fetch_public_keys(&too_many).await,
        Err(Error::TooManyUsers { .. })
    ));
}

#[tokio::test]
async fn test_restored_backup_opens_old_messages() {
    let base_url = spawn_directory().await;
    let alice = service(&base_url, "tok-alice");
    let bob = service(&base_url, "tok-bob");

    let alice_key = alice.rotate_keys().await.unwrap();
    bob.rotate_keys().await.unwrap();
    let backup = bob.export_backup("correct horse").await.unwrap();

    let sealed = alice.encrypt_for_user("2", "before restore").await.unwrap();

    // A fresh device restores Bob's keys from the backup.
    let bob_device = service(&base_url, "tok-bob");
    let restored = bob_device.restore_backup(&backup, "correct horse").await.unwrap();
    assert_eq!(
        bob_device.decrypt(&sealed.recipient, &alice_key.to_encoded()).unwrap(),
        "before restore"
    );
    // Restoring republished the key, so there is nothing left to publish.
    assert!(!bob_device.ensure_published().await.unwrap());
    let record = directory_client(&base_url, "tok-alice").fetch_one("2").await.unwrap();
    assert_eq!(record.public_key, restored);
}

#[tokio::test]
async fn test_raw_http_contract() {
    let base_url = spawn_directory().await;
    let http = reqwest::Client::new();

    let health: serde_json::Value = http
        .get(format!("{}/health", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let response = http
        .put(format!("{}/api/encryption/public-key", base_url))
        .json(&serde_json::json!({ "publicKey": "AAAA" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["type"], "UNAUTHORIZED");

    let response = http
        .put(format!("{}/api/encryption/public-key", base_url))
        .bearer_auth("tok-alice")
        .json(&serde_json::json!({ "publicKey": "AAAA" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "INVALID_PUBLIC_KEY");
}

#[tokio::test]
async fn test_server_side_batch_limit_reports_request_size() {
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Json;

    let app = axum::Router::new().route(
        "/api/encryption/public-keys",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "success": false,
                    "error": { "type": "TOO_MANY_USERS", "message": "limit is 2" }
                })),
            )
        }),
    );
    let base_url = serve(app).await;

    let client = directory_client(&base_url, "tok-alice");
    let ids: Vec<String> = (0..3).map(|i| i.to_string()).collect();
    assert!(matches!(
        client.fetch_batch(&ids).await,
        Err(Error::TooManyUsers { requested: 3, max: 50 })
    ));
}

#[tokio::test]
async fn test_transport_and_body_failures() {
    use axum::routing::get;

    let app = axum::Router::new().route(
        "/api/encryption/public-key/:user_id",
        get(|| async { "not json" }),
    );
    let base_url = serve(app).await;
    let client = directory_client(&base_url, "tok-alice");
    assert!(matches!(client.fetch_one("1").await, Err(Error::ProtocolError(_))));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = directory_client(&closed, "tok-alice");
    let result = client.fetch_one("1").await;
    assert!(matches!(result, Err(Error::NetworkError(_))));
    assert!(result.unwrap_err().is_recoverable());
}

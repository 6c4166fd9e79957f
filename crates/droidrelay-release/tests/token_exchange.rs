//! Integration tests for the auth and release endpoints against a mock server.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use droidrelay_core::fakes::MemorySecrets;
use droidrelay_release::{
    ArtifactType, HttpReleaseBackend, ReleaseBackend, ReleaseConfig, ReleaseError,
    RsaTokenService, TokenError, TokenProvider, UploadRequest,
};
use mockito::Matcher;
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use serde_json::json;

fn private_key_base64() -> String {
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
    STANDARD.encode(key.to_pkcs8_der().unwrap().as_bytes())
}

fn service(server: &mockito::Server, secrets: MemorySecrets) -> RsaTokenService {
    let config = ReleaseConfig::for_backend(&server.url()).with_key_id("test-key");
    let http = config.http_client().unwrap();
    RsaTokenService::new(&config, Arc::new(secrets), http)
}

/// Test: successful exchange returns the nested token
#[tokio::test]
async fn test_token_exchange_ok() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/public/auth")
        .match_header("content-type", "application/json")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({"keyId": "test-key"})),
            Matcher::Regex(r#""signature":"[A-Za-z0-9+/=]{100,}""#.to_string()),
            Matcher::Regex(r#""timestamp":"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}[+-]\d{2}:\d{2}""#.to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "code": "OK",
                "message": null,
                "body": {"jwe": "eyJ.jwe.token", "ttl": 900},
                "timestamp": "2024-05-01T09:08:07.123+03:00"
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let secrets = MemorySecrets::new().with("RUSTORE_PRIVATE_KEY", private_key_base64());
    let token = service(&server, secrets).acquire_access_token().await.unwrap();

    assert_eq!(token.value, "eyJ.jwe.token");
    assert_eq!(token.ttl_seconds, 900);
    mock.assert_async().await;
}

/// Test: a non-OK code is a hard failure
#[tokio::test]
async fn test_token_exchange_rejected() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/public/auth")
        .with_status(200)
        .with_body(r#"{"code":"ERROR","message":"Invalid signature","body":null}"#)
        .create_async()
        .await;

    let secrets = MemorySecrets::new().with("RUSTORE_PRIVATE_KEY", private_key_base64());
    let err = service(&server, secrets)
        .acquire_access_token()
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TokenError::AuthExchange("code ERROR: Invalid signature".to_string())
    );
}

/// Test: non-JSON bodies and missing keys map to their error kinds
#[tokio::test]
async fn test_token_exchange_bad_body_and_missing_key() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/public/auth")
        .with_status(502)
        .with_body("<html>Bad Gateway</html>")
        .create_async()
        .await;

    let secrets = MemorySecrets::new().with("RUSTORE_PRIVATE_KEY", private_key_base64());
    let err = service(&server, secrets)
        .acquire_access_token()
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::AuthExchange(ref m) if m.contains("502")), "{err}");

    let err = service(&server, MemorySecrets::new())
        .acquire_access_token()
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::Credential(_)));
}

/// Test: upload sends a multipart file with the bearer token
#[tokio::test]
async fn test_upload_multipart() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/public/v1/application/com.example.app/upload/apk")
        .match_header("authorization", "Bearer jwe-123")
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data; boundary=".to_string()),
        )
        .match_body(Matcher::Regex(r#"name="file"; filename="app-release-signed.apk""#.to_string()))
        .with_status(200)
        .with_body(r#"{"code":"OK"}"#)
        .create_async()
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("app-release-signed.apk");
    std::fs::write(&path, b"PK\x03\x04").unwrap();

    let config = ReleaseConfig::for_backend(&server.url());
    let backend = HttpReleaseBackend::new(&config, config.http_client().unwrap());
    let body = backend
        .upload(&UploadRequest {
            package_name: "com.example.app".to_string(),
            artifact_type: ArtifactType::Apk,
            path,
            token: "jwe-123".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(body, r#"{"code":"OK"}"#);
    mock.assert_async().await;
}

/// Test: version draft body carries only the given fields; errors keep status
#[tokio::test]
async fn test_version_draft() {
    let mut server = mockito::Server::new_async().await;
    let ok = server
        .mock("POST", "/public/v1/application/com.example.app/version")
        .match_header("authorization", "Bearer jwe-123")
        .match_body(Matcher::Json(json!({"whatsNew": "Fixes"})))
        .with_status(200)
        .with_body(r#"{"code":"OK","body":42}"#)
        .create_async()
        .await;
    let denied = server
        .mock("POST", "/public/v1/application/com.other/version")
        .with_status(403)
        .with_body("forbidden")
        .create_async()
        .await;

    let config = ReleaseConfig::for_backend(&server.url());
    let backend = HttpReleaseBackend::new(&config, config.http_client().unwrap());
    let fields = json!({"whatsNew": "Fixes"}).as_object().cloned().unwrap();

    let body = backend
        .create_version_draft("com.example.app", "jwe-123", &fields)
        .await
        .unwrap();
    assert!(body.contains("42"));

    let err = backend
        .create_version_draft("com.other", "jwe-123", &fields)
        .await
        .unwrap_err();
    assert!(matches!(err, ReleaseError::Backend { status: 403, .. }));

    ok.assert_async().await;
    denied.assert_async().await;
}

//! Firestore REST client against a mock server

use inrooms_sync::{
    DocumentStore, FieldValue, Fields, FirestoreClient, FirestoreConfig, SyncError, UserDocument,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOC_PATH: &str = "/v1/projects/demo-project/databases/(default)/documents/users/fb-42";

fn client(server: &MockServer) -> FirestoreClient {
    FirestoreClient::new(
        FirestoreConfig::new("demo-project", "test-token").with_base_url(server.uri()),
    )
    .unwrap()
}

fn fields() -> Fields {
    Fields::from([(
        "subscription".to_string(),
        FieldValue::map(Fields::from([(
            "status".to_string(),
            FieldValue::string("active"),
        )])),
    )])
}

#[tokio::test]
async fn test_patch_with_mask_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(DOC_PATH))
        .and(header("authorization", "Bearer test-token"))
        .and(query_param("updateMask.fieldPaths", "subscription"))
        .and(body_partial_json(json!({
            "fields": {
                "subscription": {
                    "mapValue": {"fields": {"status": {"stringValue": "active"}}}
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "doc"})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .merge_document("users", "fb-42", &fields(), UserDocument::FIELD_MASK)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let err = client(&server)
        .merge_document("users", "fb-42", &fields(), &["subscription"])
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Firestore { status: 503, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_permission_denied_is_final() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client(&server)
        .merge_document("users", "fb-42", &fields(), &["subscription"])
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
}

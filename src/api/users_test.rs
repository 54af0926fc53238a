use super::*;
use crate::net::client::AuthFailurePolicy;
use crate::session::model::Role;
use crate::session::store::SessionStore;
use crate::test_support::{StubBackend, StubState};
use serde_json::json;

async fn signed_in() -> (StubBackend, ApiClient) {
    let stub = StubBackend::start(StubState::accepting(&["A"])).await.unwrap();
    let store = SessionStore::in_memory();
    store.set_auth(User::new(1, Some("dealer@lithovolt.test"), Some(Role::Wholesaler)), "A", Some("R".into()));
    let client = stub.client(store, AuthFailurePolicy::Refresh).unwrap();
    (stub, client)
}

#[tokio::test]
async fn me_replaces_stored_user() {
    let (_stub, client) = signed_in().await;

    let user = client.users().me().await.unwrap();

    assert_eq!(user.field("first_name"), Some(&json!("Fresh")));
    assert_eq!(client.session().user(), Some(user));
    assert_eq!(client.session().access_token().as_deref(), Some("A"));
}

#[tokio::test]
async fn update_profile_stores_returned_user() {
    let (_stub, client) = signed_in().await;
    let mut changes = Map::new();
    changes.insert("first_name".into(), json!("Renamed"));

    let user = client.users().update_profile(&changes).await.unwrap();

    assert_eq!(user.field("first_name"), Some(&json!("Renamed")));
    let stored = client.session().user().unwrap();
    assert_eq!(stored.field("first_name"), Some(&json!("Renamed")));
    assert_eq!(stored.role, Some(Role::Wholesaler));
}

#[tokio::test]
async fn update_profile_empty_patch_is_validation() {
    let (stub, client) = signed_in().await;

    let err = client.users().update_profile(&Map::new()).await.unwrap_err();

    assert!(matches!(err, ApiError::Validation { field: "profile", .. }));
    assert!(stub.state.seen_auth().is_empty());
}

#[tokio::test]
async fn me_unauthorized_without_session() {
    let stub = StubBackend::start(StubState::default()).await.unwrap();
    let client = stub.client(SessionStore::in_memory(), AuthFailurePolicy::Logout).unwrap();

    let err = client.users().me().await.unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized));
    assert!(client.session().user().is_none());
}

#[tokio::test]
async fn list_passes_filters() {
    let (_stub, client) = signed_in().await;

    let echoed = client.users().list(&[("role", "WHOLESALER")]).await.unwrap();

    assert_eq!(echoed["path"], "/api/users/");
    assert_eq!(echoed["query"], "role=WHOLESALER");
}

#[tokio::test]
async fn toggle_active_posts_to_user() {
    let (_stub, client) = signed_in().await;

    let echoed = client.users().toggle_active(42).await.unwrap();

    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["path"], "/api/users/42/toggle_active/");
}

fn route(echoed: &Value) -> (&str, &str) {
    (echoed["method"].as_str().unwrap_or_default(), echoed["path"].as_str().unwrap_or_default())
}

#[tokio::test]
async fn user_admin_routes() {
    let (_stub, client) = signed_in().await;
    let users = client.users();

    let created = users.create(json!({ "email": "new@lithovolt.test", "role": "CONSUMER" })).await.unwrap();
    assert_eq!(route(&created), ("POST", "/api/users/"));
    assert_eq!(created["body"]["role"], "CONSUMER");

    let updated = users.update(9, json!({ "is_active": false })).await.unwrap();
    assert_eq!(route(&updated), ("PATCH", "/api/users/9/"));
    assert_eq!(updated["body"]["is_active"], false);

    users.delete(9).await.unwrap();
}

#[tokio::test]
async fn wholesaler_application_routes() {
    let (_stub, client) = signed_in().await;
    let users = client.users();

    let listed = users.wholesaler_applications(&[("status", "PENDING")]).await.unwrap();
    assert_eq!(route(&listed), ("GET", "/api/users/wholesaler-applications/"));
    assert_eq!(listed["query"], "status=PENDING");

    let one = users.wholesaler_application(1).await.unwrap();
    assert_eq!(route(&one), ("GET", "/api/users/wholesaler-applications/1/"));

    let approved = users.approve_wholesaler_application(1, Some("Approved")).await.unwrap();
    assert_eq!(route(&approved), ("POST", "/api/users/wholesaler-applications/1/approve/"));
    assert_eq!(approved["body"], json!({ "notes": "Approved" }));

    let rejected = users.reject_wholesaler_application(2, None).await.unwrap();
    assert_eq!(route(&rejected), ("POST", "/api/users/wholesaler-applications/2/reject/"));
    assert_eq!(rejected["body"], json!({}));
}

#[tokio::test]
async fn application_submits_as_multipart() {
    let (_stub, client) = signed_in().await;
    let mut fields = Map::new();
    fields.insert("business_name".into(), json!("Volt Traders"));
    fields.insert("pincode".into(), json!(560001));
    fields.insert("contact_email".into(), json!(""));
    fields.insert("contact_phone".into(), Value::Null);
    let document = Document { file_name: "gst.pdf".into(), bytes: b"%PDF-1.4 gst".to_vec() };

    let submitted = client.users().submit_wholesaler_application(&fields, Some(document)).await.unwrap();

    assert!(submitted["content_type"].as_str().unwrap().starts_with("multipart/form-data"));
    assert_eq!(submitted["fields"], json!({ "business_name": "Volt Traders", "pincode": "560001" }));
    assert_eq!(submitted["files"], json!([{ "name": "document", "file_name": "gst.pdf", "size": 12 }]));
}

#[tokio::test]
async fn empty_application_is_validation() {
    let (stub, client) = signed_in().await;
    let mut fields = Map::new();
    fields.insert("business_name".into(), json!(""));

    let err = client.users().submit_wholesaler_application(&fields, None).await.unwrap_err();

    assert!(matches!(err, ApiError::Validation { field: "application", .. }));
    assert!(stub.state.seen_auth().is_empty());
}

use crate::net::client::{ApiClient, AuthFailurePolicy};
use crate::session::model::{Role, User};
use crate::session::store::SessionStore;
use crate::test_support::{StubBackend, StubState};
use crate::ApiError;
use serde_json::json;

async fn signed_in() -> (StubBackend, ApiClient) {
    let stub = StubBackend::start(StubState::accepting(&["A"])).await.unwrap();
    let store = SessionStore::in_memory();
    store.set_auth(User::new(7, None, Some(Role::Admin)), "A", Some("R".into()));
    let client = stub.client(store, AuthFailurePolicy::Refresh).unwrap();
    (stub, client)
}

fn route(echoed: &serde_json::Value) -> (String, String) {
    (
        echoed["method"].as_str().unwrap_or_default().to_owned(),
        echoed["path"].as_str().unwrap_or_default().to_owned(),
    )
}

fn expect(method: &str, path: &str) -> (String, String) {
    (method.to_owned(), path.to_owned())
}

// =============================================================================
// Inventory
// =============================================================================

#[tokio::test]
async fn inventory_routes() {
    let (_stub, client) = signed_in().await;
    let inventory = client.inventory();

    let listed = inventory.battery_models(&[("is_active", "true")]).await.unwrap();
    assert_eq!(route(&listed), expect("GET", "/api/inventory/models/"));
    assert_eq!(listed["query"], "is_active=true");

    let created = inventory.create_battery_model(json!({ "sku": "LV-12V" })).await.unwrap();
    assert_eq!(route(&created), expect("POST", "/api/inventory/models/"));
    assert_eq!(created["body"]["sku"], "LV-12V");

    let updated = inventory.update_battery_model(3, json!({ "price": 99 })).await.unwrap();
    assert_eq!(route(&updated), expect("PATCH", "/api/inventory/models/3/"));

    inventory.delete_battery_model(3).await.unwrap();

    let serials = inventory.serials(&[]).await.unwrap();
    assert_eq!(route(&serials), expect("GET", "/api/inventory/serials/"));

    let generated = inventory.generate_serials(json!({ "battery_model": 3, "quantity": 10 })).await.unwrap();
    assert_eq!(route(&generated), expect("POST", "/api/inventory/serials/generate/"));

    let allocations = inventory.allocations(&[]).await.unwrap();
    assert_eq!(route(&allocations), expect("GET", "/api/inventory/allocations/"));

    let allocated = inventory.allocate_stock(json!({ "wholesaler": 2, "quantity": 5 })).await.unwrap();
    assert_eq!(route(&allocated), expect("POST", "/api/inventory/allocations/"));
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
async fn order_routes() {
    let (_stub, client) = signed_in().await;
    let orders = client.orders();

    let listed = orders.list(&[("status", "PENDING")]).await.unwrap();
    assert_eq!(route(&listed), expect("GET", "/api/orders/"));
    assert_eq!(listed["query"], "status=PENDING");

    assert_eq!(route(&orders.get(5).await.unwrap()), expect("GET", "/api/orders/5/"));
    assert_eq!(route(&orders.create(json!({ "items": [] })).await.unwrap()), expect("POST", "/api/orders/"));
    assert_eq!(
        route(&orders.update(5, json!({ "notes": "rush" })).await.unwrap()),
        expect("PATCH", "/api/orders/5/")
    );
    assert_eq!(route(&orders.reject(5).await.unwrap()), expect("POST", "/api/orders/5/reject/"));
    assert_eq!(route(&orders.fulfill(5).await.unwrap()), expect("POST", "/api/orders/5/fulfill/"));
}

#[tokio::test]
async fn order_accept_business_error() {
    let (_stub, client) = signed_in().await;

    let err = client.orders().accept(9).await.unwrap_err();

    assert!(matches!(err, ApiError::Api { status: 400, .. }));
    assert_eq!(err.user_message(), "Order 9 is not pending");
}

#[tokio::test]
async fn order_invoice_bytes() {
    let (_stub, client) = signed_in().await;

    assert_eq!(client.orders().invoice(4).await.unwrap(), b"%PDF-1.4 invoice 4");
}

// =============================================================================
// Warranty
// =============================================================================

#[tokio::test]
async fn warranty_routes() {
    let (_stub, client) = signed_in().await;
    let warranty = client.warranty();

    assert_eq!(route(&warranty.list(&[]).await.unwrap()), expect("GET", "/api/warranty/"));
    assert_eq!(
        route(&warranty.claim(json!({ "serial_number": "LV-0001" })).await.unwrap()),
        expect("POST", "/api/warranty/claim/")
    );
    assert_eq!(
        route(&warranty.issue(json!({ "serial_number": "LV-0001" })).await.unwrap()),
        expect("POST", "/api/warranty/issue/")
    );
    assert_eq!(
        route(&warranty.activate(json!({ "serial_number": "LV-0001" })).await.unwrap()),
        expect("POST", "/api/warranty/activate/")
    );
    assert_eq!(route(&warranty.claims(&[]).await.unwrap()), expect("GET", "/api/warranty/claims/"));
    assert_eq!(
        route(&warranty.create_claim(json!({ "warranty": 1 })).await.unwrap()),
        expect("POST", "/api/warranty/claims/")
    );
}

#[tokio::test]
async fn warranty_verify_is_public() {
    let stub = StubBackend::start(StubState::default()).await.unwrap();
    let client = stub.client(SessionStore::in_memory(), AuthFailurePolicy::Logout).unwrap();

    let found = client.warranty().verify("LV-0001").await.unwrap();
    assert_eq!(found["status"], "ACTIVE");

    let err = client.warranty().verify("LV-9999").await.unwrap_err();
    assert_eq!(err.user_message(), "Serial number not found");
    assert!(stub.state.seen_auth().is_empty());
}

#[tokio::test]
async fn warranty_verify_rejects_blank_serial() {
    let (_stub, client) = signed_in().await;

    let err = client.warranty().verify(" ").await.unwrap_err();

    assert!(matches!(err, ApiError::Validation { field: "serial_number", .. }));
}

#[tokio::test]
async fn warranty_certificate_bytes() {
    let (_stub, client) = signed_in().await;

    assert_eq!(client.warranty().certificate(8).await.unwrap(), b"%PDF-1.4 certificate 8");
}

// =============================================================================
// Admin
// =============================================================================

#[tokio::test]
async fn admin_metrics_route() {
    let (_stub, client) = signed_in().await;

    assert_eq!(route(&client.admin().metrics().await.unwrap()), expect("GET", "/api/admin/metrics/"));
}

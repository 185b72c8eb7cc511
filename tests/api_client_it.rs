use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Url;
use serde_json::{json, Value};
use std::sync::Arc;

use passiify_admin::api::routing::RouteClass;
use passiify_admin::api::{ApiClient, SettlementService};
use passiify_admin::credentials::{CredentialStore, MemoryCredentialStore};
use passiify_admin::error::ApiError;
use passiify_admin::model::{PayoutTarget, Role};
use passiify_admin::view::{AutoConfirm, FetchOutcome, MarkPaidOutcome, SettlementView};

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn overview(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if bearer(&headers).as_deref() != Some("Bearer admin-1") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Not authorized" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "summary": {
                "totalGross": 5000,
                "totalPlatformFee": 500,
                "totalRazorpayFee": 100,
                "totalNetPayable": 4400
            },
            "gyms": [
                { "gymId": "g1", "gymName": "Iron Gym", "city": "Mumbai", "netPayable": 2400 },
                { "gymId": "g2", "gymName": "Core Studio", "city": "Pune", "netPayable": 0 }
            ],
            "events": [
                { "eventId": "e1", "eventName": "Sunrise Yoga", "eventDate": "2025-03-09", "netPayable": 2000 }
            ]
        })),
    )
}

async fn mark_paid(
    headers: HeaderMap,
    Path((target, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if bearer(&headers).as_deref() != Some("Bearer admin-1") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Not authorized" })));
    }
    match id.as_str() {
        "missing" => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "Gym not found" })),
        ),
        "settled" => (
            StatusCode::OK,
            Json(json!({ "success": false, "message": "Nothing pending for this cycle" })),
        ),
        _ => {
            let note = body.get("note").and_then(Value::as_str).unwrap_or_default();
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": format!("{} {} settled [{}]", target, id, note)
                })),
            )
        }
    }
}

async fn echo_auth(headers: HeaderMap) -> Json<Value> {
    Json(json!({ "authorization": bearer(&headers) }))
}

async fn spawn_backend() -> Url {
    let app = Router::new()
        .route("/api/admin/settlements/overview", get(overview))
        .route("/api/admin/settlements/mark-paid/{target}/{id}", post(mark_paid))
        .route("/api/gyms/me/passes", get(echo_auth))
        .route("/api/classes", get(echo_auth));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{}/api/", addr)).unwrap()
}

fn client(base: Url, store: Arc<MemoryCredentialStore>) -> ApiClient {
    ApiClient::new(base, store).unwrap()
}

#[tokio::test]
async fn overview_round_trip_with_admin_token() {
    let base = spawn_backend().await;
    let store = Arc::new(MemoryCredentialStore::with_tokens(vec![
        (Role::Admin, "admin-1"),
        (Role::User, "user-1"),
    ]));
    let api = Arc::new(client(base, store.clone()));

    let overview = api.fetch_overview().await.unwrap();
    assert_eq!(overview.gyms.len(), 2);
    assert_eq!(overview.summary.total_net_payable, 4400.0);

    let view = SettlementView::new(api, store);
    assert_eq!(view.fetch_overview().await, FetchOutcome::Loaded);
    let gyms = view.gym_page().unwrap();
    // The zero-payable gym is hidden by the default threshold.
    assert_eq!(gyms.total_rows, 1);
    assert_eq!(gyms.rows[0].gym_name, "Iron Gym");
}

#[tokio::test]
async fn user_token_never_reaches_admin_routes() {
    let base = spawn_backend().await;
    let store = Arc::new(MemoryCredentialStore::with_tokens(vec![
        (Role::User, "admin-1"),
        (Role::Partner, "admin-1"),
    ]));
    let api = client(base, store);

    let err = api.fetch_overview().await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Unauthorized {
            class: RouteClass::Admin
        }
    ));
}

#[tokio::test]
async fn expired_admin_session_clears_admin_token() {
    let base = spawn_backend().await;
    let store = Arc::new(MemoryCredentialStore::with_tokens(vec![
        (Role::Admin, "stale"),
        (Role::Partner, "partner-1"),
    ]));
    let view = SettlementView::new(Arc::new(client(base, store.clone())), store.clone());

    assert_eq!(
        view.fetch_overview().await,
        FetchOutcome::LoginRequired(Role::Admin)
    );
    assert!(store.get(Role::Admin).await.unwrap().is_none());
    assert_eq!(
        store.get(Role::Partner).await.unwrap().as_deref(),
        Some("partner-1")
    );
}

#[tokio::test]
async fn mark_paid_sends_note_and_surfaces_messages() {
    let base = spawn_backend().await;
    let store = Arc::new(MemoryCredentialStore::with_tokens(vec![(Role::Admin, "admin-1")]));
    let api = Arc::new(client(base, store.clone()));

    let envelope = api
        .mark_paid(PayoutTarget::Event, "e1", "UTR 42")
        .await
        .unwrap();
    assert_eq!(envelope.message.as_deref(), Some("event e1 settled [UTR 42]"));

    match api.mark_paid(PayoutTarget::Gym, "missing", "").await {
        Err(ApiError::Status { status, message }) => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(message.as_deref(), Some("Gym not found"));
        }
        other => panic!("expected status error, got {:?}", other),
    }

    let view = SettlementView::new(api, store);
    let outcome = view
        .mark_as_paid(PayoutTarget::Gym, "settled", "Core Studio", 10.0, &AutoConfirm::default())
        .await;
    assert_eq!(
        outcome,
        MarkPaidOutcome::Failed("Nothing pending for this cycle".into())
    );

    let outcome = view
        .mark_as_paid(PayoutTarget::Gym, "g1", "Iron Gym", 2400.0, &AutoConfirm::default())
        .await;
    assert_eq!(
        outcome,
        MarkPaidOutcome::Paid {
            message: Some("gym g1 settled []".into()),
            refresh: FetchOutcome::Loaded,
        }
    );
}

#[tokio::test]
async fn partner_routes_fall_back_to_user_token_on_the_wire() {
    let base = spawn_backend().await;
    let store = Arc::new(MemoryCredentialStore::with_tokens(vec![
        (Role::User, "user-1"),
        (Role::Admin, "admin-1"),
    ]));
    let api = client(base, store.clone());

    let echoed: Value = api.get("/gyms/me/passes").await.unwrap();
    assert_eq!(echoed["authorization"], "Bearer user-1");

    store.set(Role::Partner, "partner-1").await.unwrap();
    let echoed: Value = api.get("gyms/me/passes").await.unwrap();
    assert_eq!(echoed["authorization"], "Bearer partner-1");

    store.clear(Role::User).await.unwrap();
    let echoed: Value = api.get("/classes").await.unwrap();
    assert_eq!(echoed["authorization"], Value::Null);
}

use std::sync::Arc;

use adforge::config::Config;
use adforge::db::Store;
use adforge::reference::PaymentReference;
use adforge::state::SharedState;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn spawn_app() -> (Router, Arc<SharedState>) {
    spawn_app_with(|_| {}).await
}

async fn spawn_app_with(tweak: impl FnOnce(&mut Config)) -> (Router, Arc<SharedState>) {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.security.jwt_secret = "integration-test-secret".to_string();
    tweak(&mut config);

    // A single connection keeps every query on the same in-memory database.
    let store = Store::with_pool_options(&config.general.database_path, 1, 1)
        .await
        .expect("Failed to connect in-memory store");

    let shared = Arc::new(SharedState::with_store(config, store).expect("Failed to wire state"));
    let state = adforge::api::create_app_state(shared.clone(), None);

    (adforge::api::router(state).await, shared)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Signs up and verifies an account directly through the store, then signs
/// in. Returns (account_id, access_token).
async fn signed_in_account(app: &Router, shared: &Arc<SharedState>, email: &str) -> (i32, String) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            serde_json::json!({ "email": email, "password": "Sup3rSecret" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let account_id = i32::try_from(body["data"]["id"].as_i64().unwrap()).unwrap();

    shared.store.set_account_verified(account_id).await.unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/signin",
            serde_json::json!({ "email": email, "password": "Sup3rSecret" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let access_token = body["data"]["access_token"].as_str().unwrap().to_string();

    (account_id, access_token)
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let (app, _shared) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/account/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/account/me")
                .header("Authorization", "Bearer not-a-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_grants_allowance_and_rejects_duplicates() {
    let (app, _shared) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            serde_json::json!({ "email": "new@example.com", "password": "Sup3rSecret" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], "new@example.com");
    assert_eq!(body["data"]["nickname"], "new");
    assert_eq!(body["data"]["verified"], false);
    assert_eq!(body["data"]["token_balance"], 100);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            serde_json::json!({ "email": "new@example.com", "password": "0therSecret" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn signin_requires_verification_first() {
    let (app, _shared) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            serde_json::json!({ "email": "pending@example.com", "password": "Sup3rSecret" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/signin",
            serde_json::json!({ "email": "pending@example.com", "password": "Sup3rSecret" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signed_in_account_can_read_its_profile_and_balance() {
    let (app, shared) = spawn_app().await;
    let (account_id, token) = signed_in_account(&app, &shared, "reader@example.com").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/account/me")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["id"], account_id);
    assert_eq!(body["data"]["verified"], true);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/account/balance")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["balance"], 100);
}

#[tokio::test]
async fn withdrawal_is_atomic_and_never_overdraws() {
    let (app, shared) = spawn_app().await;
    let (_account_id, token) = signed_in_account(&app, &shared, "spender@example.com").await;

    let mut request = json_request(
        "POST",
        "/api/account/balance/withdraw",
        serde_json::json!({ "amount": 30 }),
    );
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {token}").parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["balance"], 70);

    let mut request = json_request(
        "POST",
        "/api/account/balance/withdraw",
        serde_json::json!({ "amount": 1000 }),
    );
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {token}").parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn generation_is_refused_before_any_provider_call_when_balance_is_short() {
    let (app, shared) = spawn_app().await;
    let (account_id, token) = signed_in_account(&app, &shared, "broke@example.com").await;

    // Leave less than the 10-token price on the account.
    shared.store.debit_account(account_id, 95).await.unwrap();

    let mut request = json_request(
        "POST",
        "/api/generation/text",
        serde_json::json!({
            "country": "US",
            "language": "English",
            "vertical": "fitness apps",
            "variations": 2
        }),
    );
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {token}").parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The failed attempt charged nothing.
    let balance = shared.store.account_balance(account_id).await.unwrap();
    assert_eq!(balance, Some(5));
}

#[tokio::test]
async fn topup_webhook_credits_exactly_once() {
    let (app, shared) = spawn_app().await;

    let account = shared
        .store
        .create_local_account("payer@example.com", "payer", "x".to_string(), 100)
        .await
        .unwrap();

    let reference = PaymentReference::top_up(account.id, Utc::now().timestamp_millis(), 200);
    let event = serde_json::json!({ "reference": reference, "status": "success" });

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/payments/webhook", event.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], "applied");

    // Retried delivery of the same reference is acknowledged, not re-applied.
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/payments/webhook", event))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], "duplicate");

    let balance = shared.store.account_balance(account.id).await.unwrap();
    assert_eq!(balance, Some(300));
}

#[tokio::test]
async fn webhook_acknowledges_malformed_and_pending_deliveries() {
    let (app, _shared) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/payments/webhook",
            serde_json::json!({ "reference": "REFUND_1_2_tokens_3", "status": "success" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], "malformed");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/payments/webhook",
            serde_json::json!({ "reference": "TOPUP_1_2_tokens_50", "status": "processing" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], "ignored");
}

#[tokio::test]
async fn subscription_webhook_activates_plan_and_credits_bonus() {
    let (app, shared) = spawn_app().await;

    let account = shared
        .store
        .create_local_account("subscriber@example.com", "subscriber", "x".to_string(), 100)
        .await
        .unwrap();

    let reference =
        PaymentReference::subscription(account.id, Utc::now().timestamp_millis(), "pro");
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/payments/webhook",
            serde_json::json!({ "reference": reference, "status": "success" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], "applied");

    let subscription = shared
        .store
        .get_subscription(account.id)
        .await
        .unwrap()
        .expect("subscription row");
    assert_eq!(subscription.tier, "pro");
    assert_eq!(subscription.status, "active");
    assert!(subscription.ends_at > Utc::now());

    // Default bonus is 500 tokens on every successful subscription payment.
    let balance = shared.store.account_balance(account.id).await.unwrap();
    assert_eq!(balance, Some(600));
}

#[tokio::test]
async fn expiry_sweep_closes_overdue_subscriptions_once() {
    let (_app, shared) = spawn_app().await;

    let account = shared
        .store
        .create_local_account("lapsed@example.com", "lapsed", "x".to_string(), 100)
        .await
        .unwrap();

    // Paid two months ago, so the one-month term lapsed a month ago.
    shared
        .store
        .create_or_renew_subscription(account.id, "pro", Utc::now() - Duration::days(60))
        .await
        .unwrap();

    let expired = shared.subscriptions.expire_due().await.unwrap();
    assert_eq!(expired, 1);

    let subscription = shared
        .store
        .get_subscription(account.id)
        .await
        .unwrap()
        .expect("subscription row");
    assert_eq!(subscription.status, "expired");

    // The sweep is idempotent.
    let expired = shared.subscriptions.expire_due().await.unwrap();
    assert_eq!(expired, 0);
}

#[tokio::test]
async fn refresh_issues_a_new_access_token() {
    let (app, shared) = spawn_app().await;
    let (_account_id, _token) = signed_in_account(&app, &shared, "refresher@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/signin",
            serde_json::json!({ "email": "refresher@example.com", "password": "Sup3rSecret" }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let refresh_token = body["data"]["refresh_token"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/refresh",
            serde_json::json!({ "refresh_token": refresh_token }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let access_token = body["data"]["access_token"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/account/me")
                .header("Authorization", format!("Bearer {access_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A refresh token is not accepted as an access token.
    let refresh_again = body_json(
        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/signin",
                serde_json::json!({ "email": "refresher@example.com", "password": "Sup3rSecret" }),
            ))
            .await
            .unwrap(),
    )
    .await;
    let refresh_token = refresh_again["data"]["refresh_token"].as_str().unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/account/me")
                .header("Authorization", format!("Bearer {refresh_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn creatives_round_trip_and_reject_invalid_blocks() {
    let (app, shared) = spawn_app().await;
    let (_account_id, token) = signed_in_account(&app, &shared, "writer@example.com").await;

    let mut request = json_request(
        "POST",
        "/api/creatives",
        serde_json::json!({
            "blocks": [
                { "kind": "text", "content": "Try the new fitness plan" },
                { "kind": "image", "key": "creatives/1/a.png", "url": "http://cdn/a.png" }
            ]
        }),
    );
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {token}").parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["total_blocks"], 2);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/creatives")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["blocks"].as_array().unwrap().len(), 2);

    let mut request = json_request(
        "POST",
        "/api/creatives",
        serde_json::json!({ "blocks": [ { "kind": "text", "content": "" } ] }),
    );
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {token}").parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_endpoint_round_trips_the_database() {
    let (app, _shared) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn renewal_extends_future_terms_and_restarts_lapsed_ones() {
    let (_app, shared) = spawn_app().await;
    let now = Utc::now();

    // Paying again mid-term stacks a month on the current end date.
    let early = shared
        .store
        .create_local_account("early@example.com", "early", "x".to_string(), 100)
        .await
        .unwrap();
    let first = shared
        .store
        .create_or_renew_subscription(early.id, "pro", now)
        .await
        .unwrap();
    assert!(first.ends_at > now + Duration::days(27));
    assert!(first.ends_at < now + Duration::days(32));

    let second = shared
        .store
        .create_or_renew_subscription(early.id, "pro", now)
        .await
        .unwrap();
    assert!(second.ends_at > first.ends_at + Duration::days(27));
    assert!(second.ends_at < first.ends_at + Duration::days(32));

    // Paying after a lapse restarts the term from now, not from the old end.
    let lapsed = shared
        .store
        .create_local_account("restart@example.com", "restart", "x".to_string(), 100)
        .await
        .unwrap();
    shared
        .store
        .create_or_renew_subscription(lapsed.id, "pro", now - Duration::days(90))
        .await
        .unwrap();
    let renewed = shared
        .store
        .create_or_renew_subscription(lapsed.id, "pro", now)
        .await
        .unwrap();
    assert!(renewed.ends_at > now + Duration::days(27));
    assert!(renewed.ends_at < now + Duration::days(32));
    assert_eq!(renewed.status, "active");
}

#[tokio::test]
async fn concurrent_debits_capture_at_most_the_available_balance() {
    let (_app, shared) = spawn_app().await;

    let account = shared
        .store
        .create_local_account("racer@example.com", "racer", "x".to_string(), 100)
        .await
        .unwrap();

    // Only one of these 60-token debits fits into the 100-token balance.
    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = shared.store.clone();
        let id = account.id;
        handles.push(tokio::spawn(
            async move { store.debit_account(id, 60).await },
        ));
    }

    let mut successes = 0;
    for handle in handles {
        successes += handle.await.unwrap().unwrap();
    }
    assert_eq!(successes, 1);

    let balance = shared.store.account_balance(account.id).await.unwrap();
    assert_eq!(balance, Some(40));
}

#[tokio::test]
async fn failed_provider_call_refunds_the_generation_charge() {
    // Nothing listens on the discard port, so the provider call fails
    // immediately after the charge lands.
    let (app, shared) = spawn_app_with(|config| {
        config.generation.provider_url = "http://127.0.0.1:9".to_string();
    })
    .await;
    let (account_id, token) = signed_in_account(&app, &shared, "refunded@example.com").await;

    let mut request = json_request(
        "POST",
        "/api/generation/text",
        serde_json::json!({
            "country": "US",
            "language": "English",
            "vertical": "fitness apps",
            "variations": 2
        }),
    );
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {token}").parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    // The debited price came back.
    let balance = shared.store.account_balance(account_id).await.unwrap();
    assert_eq!(balance, Some(100));
}

#[tokio::test]
async fn subscription_webhook_for_vanished_account_leaves_nothing_behind() {
    let (app, shared) = spawn_app().await;

    let reference = PaymentReference::subscription(4242, Utc::now().timestamp_millis(), "pro");
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/payments/webhook",
            serde_json::json!({ "reference": reference, "status": "success" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], "ignored");

    assert!(shared.store.get_subscription(4242).await.unwrap().is_none());
}

#[tokio::test]
async fn deleted_account_loses_access() {
    let (app, shared) = spawn_app().await;
    let (account_id, token) = signed_in_account(&app, &shared, "leaver@example.com").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/account")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(shared.store.get_account(account_id).await.unwrap().is_none());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/account/me")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

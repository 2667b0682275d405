mod helpers;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use helpers::*;
use recruit_registrations::api::{PRINCIPAL_ID_HEADER, PRINCIPAL_ROLE_HEADER};
use recruit_registrations::models::Principal;
use recruit_registrations::{router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn app(h: &TestHarness) -> Router {
    router(AppState::new(h.service.clone()))
}

fn request(method: &str, uri: &str, principal: Option<&Principal>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(p) = principal {
        builder = builder
            .header(PRINCIPAL_ID_HEADER, p.id.to_string())
            .header(PRINCIPAL_ROLE_HEADER, p.role.as_str());
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let h = TestHarness::new();

    let (status, body) = send(app(&h), request("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_principal_is_unauthenticated() {
    let h = TestHarness::new();
    let event = h.create_open_combine(3).await;

    let (status, body) = send(
        app(&h),
        request("POST", &format!("/events/{}/registrations", event.id), None, None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_unknown_role_is_unauthenticated() {
    let h = TestHarness::new();
    let req = Request::builder()
        .method("GET")
        .uri(format!("/events/{}", Uuid::new_v4()))
        .header(PRINCIPAL_ID_HEADER, Uuid::new_v4().to_string())
        .header(PRINCIPAL_ROLE_HEADER, "scout")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(app(&h), req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_create_event_and_register_over_http() {
    let h = TestHarness::new();
    let request_body = serde_json::to_value(combine_request(1)).unwrap();

    let (status, event) = send(
        app(&h),
        request("POST", "/events", Some(&h.coach), Some(request_body)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(event["kind"], "COMBINE");
    assert_eq!(event["registered_spots"], 0);
    let event_id = event["id"].as_str().unwrap().to_string();

    let player = Principal::player(Uuid::new_v4());
    let (status, receipt) = send(
        app(&h),
        request(
            "POST",
            &format!("/events/{}/registrations", event_id),
            Some(&player),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["registration"]["status"], "PENDING");
    assert_eq!(receipt["registration"]["qualified"], false);
    assert_eq!(receipt["event"]["registered_spots"], 1);

    let late = Principal::player(Uuid::new_v4());
    let (status, body) = send(
        app(&h),
        request(
            "POST",
            &format!("/events/{}/registrations", event_id),
            Some(&late),
            Some(json!({ "player_id": late.id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CAPACITY_EXCEEDED");
}

#[tokio::test]
async fn test_duplicate_registration_over_http() {
    let h = TestHarness::new();
    let event = h.create_open_combine(3).await;
    let (player, _) = h.register_new_player(event.id).await;

    let (status, body) = send(
        app(&h),
        request(
            "POST",
            &format!("/events/{}/registrations", event.id),
            Some(&player),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_cancel_over_http() {
    let h = TestHarness::new();
    let event = h.create_open_combine(3).await;
    let (player, receipt) = h.register_new_player(event.id).await;
    let uri = format!("/registrations/{}/cancel", receipt.registration.id);

    let (status, body) = send(app(&h), request("POST", &uri, Some(&player), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    let (status, body) = send(app(&h), request("POST", &uri, Some(&player), None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INVALID_STATE");

    assert_eq!(h.registered_spots(event.id).await, 0);
}

#[tokio::test]
async fn test_admin_routes() {
    let h = TestHarness::new();
    let event = h.create_open_combine(3).await;
    let (player, receipt) = h.register_new_player(event.id).await;
    let registration_uri = format!("/registrations/{}", receipt.registration.id);

    let update = json!({ "status": "CONFIRMED", "qualified": true });
    let (status, body) = send(
        app(&h),
        request("PATCH", &registration_uri, Some(&player), Some(update.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, body) = send(
        app(&h),
        request("PATCH", &registration_uri, Some(&h.admin), Some(update)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CONFIRMED");
    assert_eq!(body["qualified"], true);

    let (status, body) = send(
        app(&h),
        request(
            "GET",
            &format!("/events/{}/registrations", event.id),
            Some(&h.coach),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(
        app(&h),
        request("DELETE", &registration_uri, Some(&h.admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released_seat"], true);
    assert_eq!(body["registered_spots"], 0);

    let (status, _) = send(
        app(&h),
        request("DELETE", &format!("/events/{}", event.id), Some(&h.admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(
        app(&h),
        request("GET", &format!("/events/{}", event.id), Some(&h.admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_capacity_and_reconcile_routes() {
    let h = TestHarness::new();
    let event = h.create_open_combine(3).await;
    h.register_new_player(event.id).await;
    h.register_new_player(event.id).await;

    let (status, body) = send(
        app(&h),
        request(
            "PATCH",
            &format!("/events/{}/capacity", event.id),
            Some(&h.coach),
            Some(json!({ "max_spots": 1 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INVALID_STATE");

    let (status, body) = send(
        app(&h),
        request(
            "PATCH",
            &format!("/events/{}/status", event.id),
            Some(&h.coach),
            Some(json!({ "status": "REGISTRATION_CLOSED" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "REGISTRATION_CLOSED");

    h.repo.force_registered_spots(event.id, 0).await.unwrap();
    let (status, body) = send(
        app(&h),
        request(
            "POST",
            &format!("/events/{}/reconcile", event.id),
            Some(&h.admin),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["previous"], 0);
    assert_eq!(body["recomputed"], 2);
}

#[tokio::test]
async fn test_create_event_validation_over_http() {
    let h = TestHarness::new();
    let mut body = serde_json::to_value(combine_request(3)).unwrap();
    body["max_spots"] = json!(0);

    let (status, body) = send(app(&h), request("POST", "/events", Some(&h.coach), Some(body))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");
}

#[tokio::test]
async fn test_malformed_requests_render_validation_errors() {
    let h = TestHarness::new();
    let event = h.create_open_combine(3).await;
    let (_, receipt) = h.register_new_player(event.id).await;
    let registration_uri = format!("/registrations/{}", receipt.registration.id);

    // Unknown enum value
    let (status, body) = send(
        app(&h),
        request("PATCH", &registration_uri, Some(&h.admin), Some(json!({ "status": "BOGUS" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");

    // Body that is not JSON at all
    let malformed = Request::builder()
        .method("PATCH")
        .uri(&registration_uri)
        .header(PRINCIPAL_ID_HEADER, h.admin.id.to_string())
        .header(PRINCIPAL_ROLE_HEADER, h.admin.role.as_str())
        .header("content-type", "application/json")
        .body(Body::from("{"))
        .unwrap();
    let (status, body) = send(app(&h), malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");

    // Path id that is not a UUID
    let (status, body) = send(
        app(&h),
        request("DELETE", "/registrations/not-a-uuid", Some(&h.admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");

    // Nothing was touched
    assert_eq!(h.registered_spots(event.id).await, 1);
}

#[tokio::test]
async fn test_register_with_malformed_body_is_rejected() {
    let h = TestHarness::new();
    let event = h.create_open_combine(3).await;
    let player = Principal::player(Uuid::new_v4());

    let malformed = Request::builder()
        .method("POST")
        .uri(format!("/events/{}/registrations", event.id))
        .header(PRINCIPAL_ID_HEADER, player.id.to_string())
        .header(PRINCIPAL_ROLE_HEADER, player.role.as_str())
        .header("content-type", "application/json")
        .body(Body::from("{\"player_id\":"))
        .unwrap();
    let (status, body) = send(app(&h), malformed).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");
    assert_eq!(h.registered_spots(event.id).await, 0);
}

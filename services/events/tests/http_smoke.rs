mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{principal, read_json, test_app};
use events::store::ProgressStore;
use http_helpers::{empty_request, json_request};
use questline_bus::Envelope;
use questline_bus::payloads::UserLogin;
use questline_bus::topics;
use questline_trust::Role;
use tower::ServiceExt;

fn campaign_body(name: &str, days: u32) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "description": "log in to collect",
        "condition": {"type": "CONSECUTIVE_LOGIN", "days": days},
        "start_at": (Utc::now() - Duration::days(1)).to_rfc3339(),
        "end_at": (Utc::now() + Duration::days(7)).to_rfc3339(),
    })
}

#[tokio::test]
async fn campaign_catalog_smoke() {
    let app = test_app();
    let (_, operator) = principal(Role::Operator);
    let (_, user) = principal(Role::User);

    let response = app
        .router
        .clone()
        .oneshot(json_request("POST", "/events", Some(&user), campaign_body("spring", 3)))
        .await
        .expect("user create");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .router
        .clone()
        .oneshot(json_request("POST", "/events", None, campaign_body("spring", 3)))
        .await
        .expect("anonymous create");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/events",
            Some(&operator),
            campaign_body("spring", 3),
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::CREATED);
    let campaign = read_json(response).await;
    let campaign_id = campaign["id"].as_str().expect("id").to_string();
    assert_eq!(campaign["condition"]["days"], 3);
    assert_eq!(campaign["is_active"], true);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/events",
            Some(&operator),
            campaign_body("spring", 5),
        ))
        .await
        .expect("overlap");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(response).await["code"], "overlapping_campaign");

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/events/{campaign_id}/rewards"),
            Some(&operator),
            serde_json::json!({"kind": "POINT", "details": {"amount": 500}}),
        ))
        .await
        .expect("reward");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            "GET",
            &format!("/events/{campaign_id}/rewards"),
            Some(&user),
        ))
        .await
        .expect("rewards");
    let rewards = read_json(response).await;
    assert_eq!(rewards["items"].as_array().expect("items").len(), 1);
    assert_eq!(rewards["items"][0]["details"]["amount"], 500);

    let response = app
        .router
        .clone()
        .oneshot(empty_request("GET", "/events?active=true", Some(&user)))
        .await
        .expect("list");
    assert_eq!(read_json(response).await["items"].as_array().map(Vec::len), Some(1));

    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            "POST",
            &format!("/events/{campaign_id}/deactivate"),
            Some(&operator),
        ))
        .await
        .expect("deactivate");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(empty_request("GET", "/events?active=true", Some(&user)))
        .await
        .expect("list active");
    assert_eq!(read_json(response).await["items"].as_array().map(Vec::len), Some(0));

    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            "GET",
            &format!("/events/{}", uuid::Uuid::new_v4()),
            Some(&user),
        ))
        .await
        .expect("missing");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reward_request_lifecycle() {
    let app = test_app();
    let (_, operator) = principal(Role::Operator);
    let (user_id, user) = principal(Role::User);
    let (_, other_user) = principal(Role::User);
    let (_, auditor) = principal(Role::Auditor);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/events",
            Some(&operator),
            campaign_body("streak", 2),
        ))
        .await
        .expect("create");
    let campaign_id = read_json(response).await["id"]
        .as_str()
        .expect("id")
        .to_string();

    let create_uri = format!("/events/{campaign_id}/requests");
    let response = app
        .router
        .clone()
        .oneshot(empty_request("POST", &create_uri, Some(&user)))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let request = read_json(response).await;
    assert_eq!(request["status"], "PENDING");
    let request_id = request["id"].as_str().expect("id").to_string();

    let response = app
        .router
        .clone()
        .oneshot(empty_request("POST", &create_uri, Some(&user)))
        .await
        .expect("duplicate");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(response).await["code"], "already_exists");

    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            "GET",
            &format!("/events/requests/{request_id}"),
            Some(&other_user),
        ))
        .await
        .expect("other user get");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .router
        .clone()
        .oneshot(empty_request("GET", "/events/requests", Some(&other_user)))
        .await
        .expect("other user list");
    assert_eq!(read_json(response).await["items"].as_array().map(Vec::len), Some(0));

    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            "GET",
            &format!("/events/requests?principal_id={user_id}&status=PENDING"),
            Some(&auditor),
        ))
        .await
        .expect("auditor list");
    assert_eq!(read_json(response).await["items"].as_array().map(Vec::len), Some(1));

    // Two logins cross the threshold and approve the pending request.
    for _ in 0..2 {
        let envelope = Envelope::new(
            topics::USER_LOGIN,
            &user_id.to_string(),
            &UserLogin {
                principal_id: user_id,
            },
        )
        .expect("envelope");
        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/internal/bus/user.login",
                None,
                serde_json::to_value(&envelope).expect("json"),
            ))
            .await
            .expect("ingest");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            "GET",
            &format!("/events/requests/{request_id}"),
            Some(&user),
        ))
        .await
        .expect("owner get");
    let approved = read_json(response).await;
    assert_eq!(approved["status"], "APPROVED");
    assert!(approved["processed_at"].is_string());

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/events/requests/{request_id}/decision"),
            Some(&operator),
            serde_json::json!({"decision": "REJECT", "reason": "late"}),
        ))
        .await
        .expect("decide terminal");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(response).await["code"], "already_processed");
}

#[tokio::test]
async fn eligible_principal_is_approved_on_request() {
    let app = test_app();
    let (_, operator) = principal(Role::Admin);
    let (user_id, user) = principal(Role::User);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/events",
            Some(&operator),
            campaign_body("one-shot", 1),
        ))
        .await
        .expect("create");
    let campaign_id = read_json(response).await["id"]
        .as_str()
        .expect("id")
        .to_string();

    app.pipeline.on_login(user_id).await.expect("login");

    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            "POST",
            &format!("/events/{campaign_id}/requests"),
            Some(&user),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(read_json(response).await["status"], "APPROVED");
}

#[tokio::test]
async fn decision_requires_staff() {
    let app = test_app();
    let (_, operator) = principal(Role::Operator);
    let (_, user) = principal(Role::User);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/events",
            Some(&operator),
            campaign_body("manual", 10),
        ))
        .await
        .expect("create");
    let campaign_id = read_json(response).await["id"]
        .as_str()
        .expect("id")
        .to_string();
    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            "POST",
            &format!("/events/{campaign_id}/requests"),
            Some(&user),
        ))
        .await
        .expect("request");
    let request_id = read_json(response).await["id"]
        .as_str()
        .expect("id")
        .to_string();

    let decision_uri = format!("/events/requests/{request_id}/decision");
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &decision_uri,
            Some(&user),
            serde_json::json!({"decision": "APPROVE"}),
        ))
        .await
        .expect("user decision");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &decision_uri,
            Some(&operator),
            serde_json::json!({"decision": "REJECT", "reason": "fraud check"}),
        ))
        .await
        .expect("operator decision");
    assert_eq!(response.status(), StatusCode::OK);
    let decided = read_json(response).await;
    assert_eq!(decided["status"], "REJECTED");
    assert_eq!(decided["reason"], "fraud check");
}

#[tokio::test]
async fn saga_endpoints_soft_delete_and_restore() {
    let app = test_app();
    let (user_id, _) = principal(Role::User);
    let campaign_id = uuid::Uuid::new_v4();
    app.store
        .upsert_login_progress(user_id, campaign_id, 5, Utc::now())
        .await
        .expect("upsert");

    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            "DELETE",
            &format!("/events/internal/users/{user_id}"),
            None,
        ))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(
        app.store
            .get_progress(user_id, campaign_id)
            .await
            .expect("get")
            .is_none()
    );

    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            "POST",
            &format!("/events/internal/users/{user_id}/restore"),
            None,
        ))
        .await
        .expect("restore");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let restored = app
        .store
        .get_progress(user_id, campaign_id)
        .await
        .expect("get")
        .expect("restored");
    assert_eq!(restored.progress, 1);
    assert!(app.bus.published(topics::PROGRESS_DLQ).is_empty());
}

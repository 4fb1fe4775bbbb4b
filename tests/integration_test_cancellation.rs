mod common;

use appointment_backend::domain::models::actor::Actor;
use axum::http::{Method, StatusCode};
use common::{days_ahead, TestApp};
use serde_json::json;

async fn set_policy(app: &TestApp, seed: &common::Seed, policy: serde_json::Value) {
    let owner_token = app.token(&seed.owner_actor());
    let (status, _) = app.call(
        Method::PUT,
        &format!("/api/v1/businesses/{}/cancellation-policy", seed.business.id),
        Some(&owner_token),
        Some(policy),
    ).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn client_cancels_with_enough_notice() {
    let app = TestApp::new().await;
    let seed = app.seed().await;
    let client = seed.client_actor();

    let (status, body) = app.book(&client, &seed, days_ahead(10), "10:00:00", "10:30:00", json!({ "notes": "Primera visita" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["appointment"]["status"], "pending");
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

    let token = app.token(&client);
    let (status, verdict) = app.call(Method::GET, &format!("/api/v1/appointments/{}/can-cancel", appointment_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verdict["allowed"], true);

    let (status, body) = app.call(
        Method::POST,
        &format!("/api/v1/appointments/{}/cancel", appointment_id),
        Some(&token),
        Some(json!({ "reason": "Me ha surgido un viaje" })),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let cancelled = &body["appointment"];
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancelled_by"], seed.client.id.as_str());
    assert!(cancelled["cancelled_at"].is_string());
    assert_eq!(
        cancelled["notes"],
        "Primera visita\n---\nMotivo de cancelación (cliente): Me ha surgido un viaje"
    );
    assert!(cancelled["internal_notes"].is_null());

    // Owner hears about it, and an email fan-out is queued.
    let owner_inbox = app.state.notification_service.list(&seed.owner.id, None).await.unwrap();
    assert!(owner_inbox.iter().any(|n| {
        n.appointment_id.as_deref() == Some(appointment_id.as_str())
            && serde_json::to_value(n.notification_type).unwrap() == "cancelled_by_client"
    }));
    let jobs = app.job_statuses(&appointment_id).await;
    assert!(jobs.contains(&("CANCELLATION".to_string(), "PENDING".to_string())));
    // The reminder queued at booking time is withdrawn.
    assert!(jobs.iter().filter(|(t, _)| t == "REMINDER").all(|(_, s)| s == "CANCELLED"));
}

#[tokio::test]
async fn client_is_held_to_the_notice_window() {
    let app = TestApp::new().await;
    let seed = app.seed().await;
    set_policy(&app, &seed, json!({ "min_hours_notice": 96 })).await;

    let client = seed.client_actor();
    let (_, body) = app.book(&client, &seed, days_ahead(2), "10:00:00", "10:30:00", json!({})).await;
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();
    let token = app.token(&client);

    let (status, verdict) = app.call(Method::GET, &format!("/api/v1/appointments/{}/can-cancel", appointment_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verdict["allowed"], false);
    assert_eq!(verdict["reason"], "Cancellations require at least 96 hours notice");

    let (status, body) = app.call(Method::POST, &format!("/api/v1/appointments/{}/cancel", appointment_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Cancellations require at least 96 hours notice");

    let stored = app.state.appointment_repo.find_by_id(&appointment_id).await.unwrap().unwrap();
    assert_eq!(stored.status.as_str(), "pending");
    assert!(stored.cancelled_by.is_none());
}

#[tokio::test]
async fn business_switch_blocks_client_cancellation_first() {
    let app = TestApp::new().await;
    let seed = app.seed().await;
    set_policy(&app, &seed, json!({ "allow_client_cancellation": false, "min_hours_notice": 0 })).await;

    let client = seed.client_actor();
    let (_, body) = app.book(&client, &seed, days_ahead(10), "12:00:00", "12:45:00", json!({})).await;
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();
    let token = app.token(&client);

    let (status, body) = app.call(Method::POST, &format!("/api/v1/appointments/{}/cancel", appointment_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Cancellation is not permitted by business");

    // The business itself is not bound by the client policy.
    let owner_token = app.token(&seed.owner_actor());
    let (status, body) = app.call(
        Method::POST,
        &format!("/api/v1/appointments/{}/business-cancel", appointment_id),
        Some(&owner_token),
        Some(json!({ "reason": "Cierre por inventario" })),
    ).await;
    assert_eq!(status, StatusCode::OK);
    let cancelled = &body["appointment"];
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancelled_by"], seed.owner.id.as_str());
    assert_eq!(cancelled["internal_notes"], "Motivo de cancelación (negocio): Cierre por inventario");
    assert!(cancelled["notes"].is_null());

    let client_inbox = app.state.notification_service.list(&seed.client.id, None).await.unwrap();
    assert!(client_inbox.iter().any(|n| serde_json::to_value(n.notification_type).unwrap() == "cancelled_by_business"));
}

#[tokio::test]
async fn cancelling_twice_is_rejected() {
    let app = TestApp::new().await;
    let seed = app.seed().await;
    let owner = seed.owner_actor();

    let (_, body) = app.book(&owner, &seed, days_ahead(5), "09:00:00", "09:30:00", json!({ "client_id": seed.client.id })).await;
    assert_eq!(body["appointment"]["status"], "confirmed");
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();
    let owner_token = app.token(&owner);
    let uri = format!("/api/v1/appointments/{}/business-cancel", appointment_id);

    let (status, _) = app.call(Method::POST, &uri, Some(&owner_token), Some(json!({ "reason": "Cerramos por obras" }))).await;
    assert_eq!(status, StatusCode::OK);
    let first = app.state.appointment_repo.find_by_id(&appointment_id).await.unwrap().unwrap();
    assert_eq!(first.cancelled_by.as_deref(), Some(seed.owner.id.as_str()));
    assert!(first.cancelled_at.is_some());

    let (status, body) = app.call(Method::POST, &uri, Some(&owner_token), Some(json!({ "reason": "Otra vez" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Appointment is already cancelled");

    let client_token = app.token(&seed.client_actor());
    let (status, body) = app.call(Method::POST, &format!("/api/v1/appointments/{}/cancel", appointment_id), Some(&client_token), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Appointment is already cancelled");

    let (status, _) = app.call(Method::GET, &format!("/api/v1/appointments/{}/can-cancel", appointment_id), Some(&client_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The rejected attempts left the first cancellation untouched.
    let after = app.state.appointment_repo.find_by_id(&appointment_id).await.unwrap().unwrap();
    assert_eq!(after.status.to_string(), "cancelled");
    assert_eq!(after.cancelled_by, first.cancelled_by);
    assert_eq!(after.cancelled_at, first.cancelled_at);
    assert_eq!(after.internal_notes, first.internal_notes);
    assert_eq!(after.notes, first.notes);

    // Only one cancellation email was ever queued.
    let jobs = app.job_statuses(&appointment_id).await;
    assert_eq!(jobs.iter().filter(|(t, _)| t == "CANCELLATION").count(), 1);
}

#[tokio::test]
async fn strangers_and_anonymous_callers_are_refused() {
    let app = TestApp::new().await;
    let seed = app.seed().await;
    let (_, body) = app.book(&seed.client_actor(), &seed, days_ahead(8), "16:00:00", "16:30:00", json!({})).await;
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/appointments/{}/cancel", appointment_id);

    let (status, _) = app.call(Method::POST, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call(Method::POST, &uri, Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stranger = app.add_client("Otra Persona", Some("otra@correo.test")).await;
    let stranger_token = app.token(&Actor::Client(stranger.id.clone()));
    let (status, _) = app.call(Method::POST, &uri, Some(&stranger_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Owner of a different business.
    let other = app.seed_named("Otro Salón", "otro@salon.test", "x@correo.test").await;
    let other_owner_token = app.token(&other.owner_actor());
    let (status, _) = app.call(Method::POST, &format!("/api/v1/appointments/{}/business-cancel", appointment_id), Some(&other_owner_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A client cannot use the business route.
    let client_token = app.token(&seed.client_actor());
    let (status, _) = app.call(Method::POST, &format!("/api/v1/appointments/{}/business-cancel", appointment_id), Some(&client_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let stored = app.state.appointment_repo.find_by_id(&appointment_id).await.unwrap().unwrap();
    assert_eq!(stored.status.as_str(), "pending");
}

#[tokio::test]
async fn lifecycle_transitions_follow_the_table() {
    let app = TestApp::new().await;
    let seed = app.seed().await;
    let (_, body) = app.book(&seed.client_actor(), &seed, days_ahead(3), "11:00:00", "11:30:00", json!({})).await;
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/appointments/{}/status", appointment_id);
    let owner_token = app.token(&seed.owner_actor());
    let client_token = app.token(&seed.client_actor());

    let (status, _) = app.call(Method::PUT, &uri, Some(&client_token), Some(json!({ "status": "confirmed" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call(Method::PUT, &uri, Some(&owner_token), Some(json!({ "status": "completed" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.call(Method::PUT, &uri, Some(&owner_token), Some(json!({ "status": "confirmed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "confirmed");

    let (status, _) = app.call(Method::PUT, &uri, Some(&owner_token), Some(json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.call(Method::PUT, &uri, Some(&owner_token), Some(json!({ "status": "no_show" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "no_show");

    let (status, _) = app.call(Method::PUT, &uri, Some(&owner_token), Some(json!({ "status": "in_progress" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let jobs = app.job_statuses(&appointment_id).await;
    assert!(jobs.contains(&("NO_SHOW".to_string(), "PENDING".to_string())));

    let client_inbox = app.state.notification_service.list(&seed.client.id, None).await.unwrap();
    assert!(client_inbox.iter().any(|n| serde_json::to_value(n.notification_type).unwrap() == "confirmed"));
}

mod common;

use appointment_backend::background::process_pending_jobs;
use appointment_backend::domain::models::{
    job::{EmailEvent, Job},
    reschedule::RescheduleChanges,
};
use appointment_backend::domain::services::email_dispatch::{DispatchReport, SendStatus};
use axum::http::{Method, StatusCode};
use chrono::{NaiveTime, Utc};
use common::{days_ahead, TestApp};
use serde_json::json;

const OWNER: &str = "owner@barberia.test";
const CLIENT: &str = "cliente@correo.test";

#[tokio::test]
async fn new_booking_emails_both_sides_once() {
    let app = TestApp::new().await;
    let seed = app.seed().await;
    let (_, body) = app.book(&seed.client_actor(), &seed, days_ahead(10), "10:00:00", "10:45:00", json!({})).await;
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

    // Nothing is sent inline; the worker does it.
    assert!(app.mail.sent().is_empty());
    assert_eq!(process_pending_jobs(&app.state).await, 1);

    let to_client = app.mail.sent_to(CLIENT);
    let to_owner = app.mail.sent_to(OWNER);
    assert_eq!(to_client.len(), 1);
    assert_eq!(to_owner.len(), 1);
    assert!(to_client[0].html.contains("Luis Pérez"));
    assert!(to_client[0].html.contains("Barbería Tom"));
    assert!(to_client[0].html.contains("15.00 €"));
    assert!(to_client[0].html.contains(&format!("https://app.test/appointments/{}", appointment_id)));
    assert!(to_owner[0].html.contains(CLIENT));
    assert!(to_owner[0].html.contains("600000002"));

    let jobs = app.job_statuses(&appointment_id).await;
    assert!(jobs.contains(&("NEW_BOOKING".to_string(), "COMPLETED".to_string())));
    // The reminder is still waiting for its time.
    assert!(jobs.contains(&("REMINDER".to_string(), "PENDING".to_string())));

    let logs = app.state.mail_log_repo.list_logs(None).await.unwrap();
    assert_eq!(logs.iter().filter(|l| l.status == "SENT").count(), 2);

    // A second tick has nothing left to do.
    assert_eq!(process_pending_jobs(&app.state).await, 0);
    assert_eq!(app.mail.sent().len(), 2);
}

#[tokio::test]
async fn walk_in_appointments_send_nothing() {
    let app = TestApp::new().await;
    let seed = app.seed().await;
    let (status, body) = app.book(&seed.owner_actor(), &seed, days_ahead(2), "17:00:00", "17:30:00", json!({
        "walk_in": { "full_name": "Pedro Sin Cuenta" }
    })).await;
    assert_eq!(status, StatusCode::CREATED);
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

    let report = app.state.email_dispatcher.dispatch(EmailEvent::NewBooking, &appointment_id, None, None).await;
    assert_eq!(report, DispatchReport { client_email: SendStatus::Skipped, business_email: SendStatus::Skipped });

    process_pending_jobs(&app.state).await;
    assert!(app.mail.sent().is_empty());
    let jobs = app.job_statuses(&appointment_id).await;
    assert!(jobs.iter().all(|(t, _)| t != "REMINDER"));
    assert!(jobs.contains(&("NEW_BOOKING".to_string(), "COMPLETED".to_string())));
}

#[tokio::test]
async fn one_side_failing_does_not_stop_the_other() {
    let app = TestApp::new().await;
    let seed = app.seed().await;
    let (_, body) = app.book(&seed.client_actor(), &seed, days_ahead(10), "10:00:00", "10:30:00", json!({})).await;
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

    app.mail.fail_for(OWNER);
    assert_eq!(process_pending_jobs(&app.state).await, 1);
    assert_eq!(app.mail.sent_to(CLIENT).len(), 1);
    assert!(app.mail.sent_to(OWNER).is_empty());

    // Failed job goes back to the queue with a later execute_at.
    let job = app.state.job_repo.list_for_appointment(&appointment_id).await.unwrap()
        .into_iter()
        .find(|j| j.job_type == "NEW_BOOKING")
        .unwrap();
    assert_eq!(job.status, "PENDING");
    assert_eq!(job.attempts, 1);
    assert!(job.execute_at > Utc::now());
    assert!(job.error_message.unwrap().contains("business=Failed"));

    // Retrying with the relay healthy again only sends what is missing.
    app.mail.heal(OWNER);
    sqlx::query("UPDATE jobs SET execute_at = ? WHERE id = ?")
        .bind(Utc::now() - chrono::Duration::seconds(1))
        .bind(&job.id)
        .execute(&app.pool)
        .await
        .unwrap();
    assert_eq!(process_pending_jobs(&app.state).await, 1);
    assert_eq!(app.mail.sent_to(CLIENT).len(), 1);
    assert_eq!(app.mail.sent_to(OWNER).len(), 1);
    let jobs = app.job_statuses(&appointment_id).await;
    assert!(jobs.contains(&("NEW_BOOKING".to_string(), "COMPLETED".to_string())));
}

#[tokio::test]
async fn exhausted_retries_mark_the_job_failed() {
    let app = TestApp::new().await;
    let seed = app.seed().await;
    let (_, body) = app.book(&seed.client_actor(), &seed, days_ahead(10), "10:00:00", "10:30:00", json!({})).await;
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();
    app.mail.fail_for(CLIENT);

    sqlx::query("UPDATE jobs SET attempts = 2 WHERE job_type = 'NEW_BOOKING'")
        .execute(&app.pool)
        .await
        .unwrap();
    process_pending_jobs(&app.state).await;

    let jobs = app.job_statuses(&appointment_id).await;
    assert!(jobs.contains(&("NEW_BOOKING".to_string(), "FAILED".to_string())));
    assert_eq!(app.mail.sent_to(OWNER).len(), 1);
}

#[tokio::test]
async fn ledger_absorbs_reruns_of_the_same_job_only() {
    let app = TestApp::new().await;
    let seed = app.seed().await;
    let (_, body) = app.book(&seed.client_actor(), &seed, days_ahead(10), "10:00:00", "10:30:00", json!({})).await;
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

    process_pending_jobs(&app.state).await;
    assert_eq!(app.mail.sent().len(), 2);
    let job = app.state.job_repo.list_for_appointment(&appointment_id).await.unwrap()
        .into_iter()
        .find(|j| j.job_type == "NEW_BOOKING")
        .unwrap();

    // Running the same job again reports success without resending.
    let rerun = app.state.email_dispatcher.dispatch(EmailEvent::NewBooking, &appointment_id, None, Some(&job.id)).await;
    assert_eq!(rerun, DispatchReport { client_email: SendStatus::Sent, business_email: SendStatus::Sent });
    assert_eq!(app.mail.sent().len(), 2);

    let logs = app.state.mail_log_repo.list_logs(Some(CLIENT)).await.unwrap();
    assert_eq!(logs.iter().filter(|l| l.status == "SENT").count(), 1);
    assert_eq!(logs.iter().filter(|l| l.status == "SKIPPED_DUPLICATE").count(), 1);

    // A separate event with identical content is still delivered.
    let another = Job::new(EmailEvent::NewBooking, appointment_id.clone(), None, Utc::now());
    app.state.job_repo.create(&another).await.unwrap();
    process_pending_jobs(&app.state).await;
    assert_eq!(app.mail.sent_to(CLIENT).len(), 2);
    assert_eq!(app.mail.sent_to(OWNER).len(), 2);
}

#[tokio::test]
async fn moving_back_and_forth_emails_every_reschedule() {
    let app = TestApp::new().await;
    let seed = app.seed().await;
    let owner = seed.owner_actor();
    let token = app.token(&owner);
    let date = days_ahead(10);
    let (_, body) = app.book(&owner, &seed, date, "10:00:00", "10:30:00", json!({ "client_id": seed.client.id })).await;
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();
    process_pending_jobs(&app.state).await;

    for (start, end) in [("12:00:00", "12:30:00"), ("10:00:00", "10:30:00"), ("12:00:00", "12:30:00")] {
        let (status, _) = app.call(
            Method::PUT,
            &format!("/api/v1/appointments/{}/reschedule", appointment_id),
            Some(&token),
            Some(json!({ "date": date.format("%Y-%m-%d").to_string(), "start_time": start, "end_time": end })),
        ).await;
        assert_eq!(status, StatusCode::OK);
        process_pending_jobs(&app.state).await;
    }

    let reschedule_mails = app.mail.sent_to(CLIENT)
        .into_iter()
        .filter(|m| m.subject.contains("ha cambiado"))
        .count();
    assert_eq!(reschedule_mails, 3);

    let jobs = app.job_statuses(&appointment_id).await;
    let reschedules: Vec<_> = jobs.iter().filter(|(t, _)| t == "RESCHEDULE").collect();
    assert_eq!(reschedules.len(), 3);
    assert!(reschedules.iter().all(|(_, s)| s == "COMPLETED"));
}

#[tokio::test]
async fn reschedule_with_same_employee_shows_old_and_new_times() {
    let app = TestApp::new().await;
    let seed = app.seed().await;
    let owner = seed.owner_actor();
    let date = days_ahead(10);
    let (_, body) = app.book(&owner, &seed, date, "10:00:00", "10:30:00", json!({ "client_id": seed.client.id })).await;
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

    let token = app.token(&owner);
    let (status, _) = app.call(
        Method::PUT,
        &format!("/api/v1/appointments/{}/reschedule", appointment_id),
        Some(&token),
        Some(json!({ "date": date.format("%Y-%m-%d").to_string(), "start_time": "16:00:00", "end_time": "16:30:00" })),
    ).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.call(
        Method::POST,
        &format!("/api/v1/appointments/{}/reschedule-notification", appointment_id),
        Some(&token),
        Some(json!({ "changes": { "oldTime": "10:00:00", "oldEndTime": "10:30:00" } })),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "details": { "clientEmail": "sent", "businessEmail": "sent" } }));

    let to_client = app.mail.sent_to(CLIENT);
    assert_eq!(to_client.len(), 1);
    assert!(to_client[0].html.contains("10:00"));
    assert!(to_client[0].html.contains("16:00"));
    assert!(to_client[0].html.contains("Marta Estilista"));

    // The queued job is its own dispatch; running it twice still sends once.
    process_pending_jobs(&app.state).await;
    process_pending_jobs(&app.state).await;
    let reschedule_mails = app.mail.sent_to(CLIENT)
        .into_iter()
        .filter(|m| m.subject.contains("ha cambiado"))
        .count();
    assert_eq!(reschedule_mails, 2);
}

#[tokio::test]
async fn reschedule_to_another_employee_names_both() {
    let app = TestApp::new().await;
    let seed = app.seed().await;
    let other = app.state.directory_repo
        .create_employee(&appointment_backend::domain::models::directory::Employee::new(seed.business.id.clone(), "Jorge Barbero".into()))
        .await
        .unwrap();
    let (_, body) = app.book(&seed.client_actor(), &seed, days_ahead(10), "10:00:00", "10:30:00", json!({})).await;
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

    let before = app.state.appointment_repo.find_by_id(&appointment_id).await.unwrap().unwrap();
    let moved = app.state.booking_service.reschedule(
        &appointment_id,
        &seed.client_actor(),
        appointment_backend::domain::services::booking::NewSchedule {
            date: before.date,
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            employee_id: Some(other.id.clone()),
        },
    ).await.unwrap();
    assert_eq!(moved.employee_id, other.id);

    let changes = RescheduleChanges::from_previous(&before);
    let report = app.state.email_dispatcher.dispatch(EmailEvent::Reschedule, &appointment_id, Some(&changes), None).await;
    assert!(!report.has_failures());

    let to_owner = app.mail.sent_to(OWNER);
    assert_eq!(to_owner.len(), 1);
    assert!(to_owner[0].html.contains("Marta Estilista"));
    assert!(to_owner[0].html.contains("Jorge Barbero"));

    // The owner is told the client moved it.
    let owner_inbox = app.state.notification_service.list(&seed.owner.id, None).await.unwrap();
    assert!(owner_inbox.iter().any(|n| serde_json::to_value(n.notification_type).unwrap() == "modified_by_client"));
}

#[tokio::test]
async fn reminder_for_a_cancelled_appointment_is_dropped() {
    let app = TestApp::new().await;
    let seed = app.seed().await;
    let (_, body) = app.book(&seed.client_actor(), &seed, days_ahead(10), "10:00:00", "10:30:00", json!({})).await;
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();
    let token = app.token(&seed.owner_actor());
    app.call(Method::POST, &format!("/api/v1/appointments/{}/business-cancel", appointment_id), Some(&token), None).await;

    let report = app.state.email_dispatcher.dispatch(EmailEvent::Reminder, &appointment_id, None, None).await;
    assert_eq!(report, DispatchReport { client_email: SendStatus::Skipped, business_email: SendStatus::Skipped });

    // Cancellation mail still goes out, and says the business cancelled.
    process_pending_jobs(&app.state).await;
    let to_client = app.mail.sent_to(CLIENT);
    assert!(to_client.iter().any(|m| m.subject.contains("cancelada")));
}

#[tokio::test]
async fn missing_appointment_reports_failure_without_panicking() {
    let app = TestApp::new().await;
    let report = app.state.email_dispatcher.dispatch(EmailEvent::NewBooking, "does-not-exist", None, None).await;
    assert!(report.has_failures());
    assert!(app.mail.sent().is_empty());
}

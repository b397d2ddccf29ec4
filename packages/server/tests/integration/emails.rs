use serde_json::json;

use crate::common::{TestApp, routes};

async fn create_template(
    app: &TestApp,
    event_id: i32,
    name: &str,
    trigger: &str,
    extra: serde_json::Value,
) -> i32 {
    let mut body = json!({
        "name": name,
        "content": "<p>Hello <span data-id=\"/participant_email\">email</span>!</p>",
        "trigger": trigger,
    });
    if let Some(extra) = extra.as_object() {
        for (k, v) in extra {
            body[k] = v.clone();
        }
    }
    let res = app.post_with_token(&routes::emails(event_id), &body).await;
    assert_eq!(res.status, 201, "create_template failed: {}", res.text);
    res.id()
}

#[tokio::test]
async fn template_crud_round_trip() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    let email_id = create_template(&app, event_id, "Welcome", "participant_registered", json!({}))
        .await;

    let res = app.get_with_token(&routes::email(event_id, email_id)).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["trigger"], "participant_registered");
    assert_eq!(res.body["content_version"], "tagged");

    let res = app
        .patch_with_token(
            &routes::email(event_id, email_id),
            &json!({ "name": "Welcome aboard" }),
        )
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["name"], "Welcome aboard");

    let res = app
        .delete_with_token(&routes::email(event_id, email_id))
        .await;
    assert_eq!(res.status, 204);
    let res = app.get_with_token(&routes::email(event_id, email_id)).await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn rejects_unknown_triggers_and_versions() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;

    let res = app
        .post_with_token(
            &routes::emails(event_id),
            &json!({ "name": "Bad", "content": "x", "trigger": "moon_phase" }),
        )
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");

    let res = app
        .post_with_token(
            &routes::emails(event_id),
            &json!({
                "name": "Bad",
                "content": "x",
                "trigger": "manual",
                "content_version": "markdown",
            }),
        )
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn registration_trigger_records_a_delivery() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    let email_id = create_template(&app, event_id, "Welcome", "participant_registered", json!({}))
        .await;

    let participant_id = app
        .create_participant(event_id, "ada@example.com", json!([]))
        .await;

    let record = app
        .wait_for_delivery(participant_id, email_id)
        .await
        .expect("no delivery recorded");
    // No SMTP transport in tests, so the record stays pending.
    assert_eq!(record.status, "pending");
    assert_eq!(record.send_by, "system");
}

#[tokio::test]
async fn attribute_change_trigger_matches_attribute_and_value() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    let team = app.create_attribute(event_id, "Team", "text").await;
    // Pinned to one (attribute, value) pair.
    let email_id = create_template(
        &app,
        event_id,
        "Welcome to Red",
        "attribute_changed",
        json!({ "trigger_value": team.to_string(), "trigger_value2": "Red" }),
    )
    .await;

    // A different written value must not match.
    let p1 = app
        .create_participant(
            event_id,
            "p1@example.com",
            json!([{ "attribute_id": team, "value": "Blue" }]),
        )
        .await;
    assert!(app.wait_for_delivery(p1, email_id).await.is_none());

    let p2 = app
        .create_participant(
            event_id,
            "p2@example.com",
            json!([{ "attribute_id": team, "value": "Red" }]),
        )
        .await;
    assert!(app.wait_for_delivery(p2, email_id).await.is_some());
}

#[tokio::test]
async fn form_filled_trigger_fires_on_submission() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    let name = app.create_attribute(event_id, "Full name", "text").await;
    let form_id = app
        .create_form(event_id, "Signup", "signup", true, json!([{ "id": name }]))
        .await;
    let email_id = create_template(
        &app,
        event_id,
        "Thanks",
        "form_filled",
        json!({ "trigger_value": form_id.to_string() }),
    )
    .await;

    let res = app
        .post_without_token(
            &routes::public_submit("event-1", "signup"),
            &json!({ "email": "ada@example.com", name.to_string(): "Ada" }),
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);

    let list = app.get_with_token(&routes::participants(event_id)).await;
    let participant_id = list.body[0]["id"].as_i64().unwrap() as i32;
    assert!(app.wait_for_delivery(participant_id, email_id).await.is_some());
}

#[tokio::test]
async fn manual_send_targets_chosen_participants() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    let email_id = create_template(&app, event_id, "Reminder", "manual", json!({})).await;
    let p1 = app.create_participant(event_id, "p1@example.com", json!([])).await;
    let p2 = app.create_participant(event_id, "p2@example.com", json!([])).await;

    let res = app
        .post_with_token(
            &routes::email_send(event_id, email_id),
            &json!({ "participant_ids": [p1] }),
        )
        .await;
    assert_eq!(res.status, 202, "{}", res.text);

    let record = app
        .wait_for_delivery(p1, email_id)
        .await
        .expect("no delivery recorded");
    // Manual sends carry the organizer id instead of "system".
    assert_eq!(record.send_by, "1");
    assert!(app.wait_for_delivery(p2, email_id).await.is_none());
}

#[tokio::test]
async fn duplicate_copies_the_template() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    let email_id = create_template(&app, event_id, "Original", "manual", json!({})).await;

    let res = app
        .post_with_token(&routes::email_duplicate(event_id, email_id), &json!({}))
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    assert_eq!(res.body["name"], "Original (copy)");
    assert_ne!(res.body["id"].as_i64(), Some(email_id as i64));
}

use serde_json::json;

use crate::common::{TestApp, routes};

#[tokio::test]
async fn organizer_can_create_and_fetch_an_event() {
    let app = TestApp::spawn().await;

    let res = app
        .post_with_token(
            routes::EVENTS,
            &json!({
                "name": "Summer Hackathon",
                "slug": "summer-hackathon",
                "start_date": "2099-07-01T09:00:00Z",
                "end_date": "2099-07-02T18:00:00Z",
                "location": "Main campus",
            }),
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    assert_eq!(res.body["slug"], "summer-hackathon");
    let id = res.id();

    let res = app.get_with_token(&routes::event(id)).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["name"], "Summer Hackathon");
    assert_eq!(res.body["location"], "Main campus");
}

#[tokio::test]
async fn slug_is_derived_from_the_name_when_omitted() {
    let app = TestApp::spawn().await;

    let res = app
        .post_with_token(
            routes::EVENTS,
            &json!({
                "name": "Winter Ball 2099",
                "start_date": "2099-01-01T09:00:00Z",
                "end_date": "2099-01-02T18:00:00Z",
            }),
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    assert_eq!(res.body["slug"], "winter_ball_2099");
}

#[tokio::test]
async fn duplicate_slug_is_a_conflict() {
    let app = TestApp::spawn().await;
    app.create_event("First", "shared-slug").await;

    let res = app
        .post_with_token(
            routes::EVENTS,
            &json!({
                "name": "Second",
                "slug": "shared-slug",
                "start_date": "2099-01-01T09:00:00Z",
                "end_date": "2099-01-02T18:00:00Z",
            }),
        )
        .await;
    assert_eq!(res.status, 409);
    assert_eq!(res.body["code"], "CONFLICT");
}

#[tokio::test]
async fn rejects_end_before_start() {
    let app = TestApp::spawn().await;

    let res = app
        .post_with_token(
            routes::EVENTS,
            &json!({
                "name": "Backwards",
                "start_date": "2099-01-02T00:00:00Z",
                "end_date": "2099-01-01T00:00:00Z",
            }),
        )
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn admin_routes_require_a_token() {
    let app = TestApp::spawn().await;

    let res = app.get_without_token(routes::EVENTS).await;
    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_MISSING");
}

#[tokio::test]
async fn public_lookup_works_by_slug_only() {
    let app = TestApp::spawn().await;
    app.create_event("Open Day", "open-day").await;

    let res = app.get_without_token(&routes::public_event("open-day")).await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["name"], "Open Day");

    let res = app.get_without_token(&routes::public_event("missing")).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn deleting_an_event_removes_its_children() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Doomed", "doomed").await;
    let attribute_id = app.create_attribute(event_id, "Workshop", "block").await;
    app.create_block(event_id, attribute_id, "Room 1", None, Some(5))
        .await;

    let res = app.delete_with_token(&routes::event(event_id)).await;
    assert_eq!(res.status, 204, "{}", res.text);

    let res = app.get_with_token(&routes::event(event_id)).await;
    assert_eq!(res.status, 404);
    let res = app
        .get_with_token(&routes::attribute(event_id, attribute_id))
        .await;
    assert_eq!(res.status, 404);
}

use serde_json::json;

use crate::common::{TestApp, routes};

#[tokio::test]
async fn creating_a_block_attribute_creates_its_root_block() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;

    let res = app
        .post_with_token(
            &routes::attributes(event_id),
            &json!({ "name": "Workshop", "type": "block" }),
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    assert!(res.body["root_block_id"].as_i64().is_some());

    let attribute_id = res.id();
    let tree = app.get_with_token(&routes::blocks(event_id, attribute_id)).await;
    assert_eq!(tree.status, 200, "{}", tree.text);
    assert_eq!(tree.body["name"], "Workshop");
    assert_eq!(tree.body["occupancy"], 0);
    assert!(tree.body["parent_id"].is_null());
}

#[tokio::test]
async fn non_block_attributes_have_no_root_block() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    let attribute_id = app.create_attribute(event_id, "T-Shirt", "select").await;

    let res = app.get_with_token(&routes::blocks(event_id, attribute_id)).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn changing_type_to_block_creates_the_root() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    let attribute_id = app.create_attribute(event_id, "Choice", "select").await;

    let res = app
        .patch_with_token(
            &routes::attribute(event_id, attribute_id),
            &json!({ "type": "block" }),
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert!(res.body["root_block_id"].as_i64().is_some());
}

#[tokio::test]
async fn changing_type_away_from_block_drops_the_tree_and_assignments() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    let attribute_id = app.create_attribute(event_id, "Workshop", "block").await;
    let slot = app
        .create_block(event_id, attribute_id, "Slot", None, Some(5))
        .await;
    let participant_id = app
        .create_participant(
            event_id,
            "ada@example.com",
            json!([{ "attribute_id": attribute_id, "value": slot.to_string() }]),
        )
        .await;

    let res = app
        .patch_with_token(
            &routes::attribute(event_id, attribute_id),
            &json!({ "type": "text" }),
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert!(res.body["root_block_id"].is_null());

    let tree = app.get_with_token(&routes::blocks(event_id, attribute_id)).await;
    assert_eq!(tree.status, 404);

    // The stale block id was cleared from the participant.
    let res = app
        .get_with_token(&routes::participant(event_id, participant_id))
        .await;
    let value = res.body["attributes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["attribute_id"].as_i64() == Some(attribute_id as i64))
        .unwrap()["value"]
        .clone();
    assert!(value.is_null());
}

#[tokio::test]
async fn rejects_unknown_attribute_types() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;

    let res = app
        .post_with_token(
            &routes::attributes(event_id),
            &json!({ "name": "Weird", "type": "hologram" }),
        )
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn rejects_non_array_options() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;

    let res = app
        .post_with_token(
            &routes::attributes(event_id),
            &json!({ "name": "Size", "type": "select", "options": "S,M,L" }),
        )
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn duplicate_slug_in_one_event_is_a_conflict() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    app.create_attribute(event_id, "T-Shirt Size", "select").await;

    let res = app
        .post_with_token(
            &routes::attributes(event_id),
            &json!({ "name": "Other", "slug": "t_shirt_size", "type": "text" }),
        )
        .await;
    assert_eq!(res.status, 409);
    assert_eq!(res.body["code"], "CONFLICT");
}

#[tokio::test]
async fn deleting_an_attribute_cascades() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    let attribute_id = app.create_attribute(event_id, "Workshop", "block").await;
    app.create_block(event_id, attribute_id, "Slot", None, Some(2))
        .await;

    let res = app
        .delete_with_token(&routes::attribute(event_id, attribute_id))
        .await;
    assert_eq!(res.status, 204, "{}", res.text);

    let res = app
        .get_with_token(&routes::attribute(event_id, attribute_id))
        .await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn attribute_is_scoped_to_its_event() {
    let app = TestApp::spawn().await;
    let event_a = app.create_event("A", "event-a").await;
    let event_b = app.create_event("B", "event-b").await;
    let attribute_id = app.create_attribute(event_a, "Food", "select").await;

    let res = app
        .get_with_token(&routes::attribute(event_b, attribute_id))
        .await;
    assert_eq!(res.status, 404);
}

use serde_json::json;

use crate::common::{TestApp, routes};

#[tokio::test]
async fn admin_can_register_a_participant_with_values() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    let name = app.create_attribute(event_id, "Full name", "text").await;

    let res = app
        .post_with_token(
            &routes::participants(event_id),
            &json!({
                "email": "ada@example.com",
                "attributes": [{ "attribute_id": name, "value": "Ada Lovelace" }],
            }),
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    assert_eq!(res.body["email"], "ada@example.com");
    assert!(res.body["slug"].as_str().is_some());

    let values = res.body["attributes"].as_array().unwrap();
    let written = values
        .iter()
        .find(|a| a["attribute_id"].as_i64() == Some(name as i64))
        .unwrap();
    assert_eq!(written["value"], "Ada Lovelace");
}

#[tokio::test]
async fn email_is_unique_per_event_but_not_across_events() {
    let app = TestApp::spawn().await;
    let event_a = app.create_event("A", "event-a").await;
    let event_b = app.create_event("B", "event-b").await;
    app.create_participant(event_a, "ada@example.com", json!([])).await;

    let res = app
        .post_with_token(
            &routes::participants(event_a),
            &json!({ "email": "ada@example.com" }),
        )
        .await;
    assert_eq!(res.status, 409, "{}", res.text);
    assert_eq!(res.body["code"], "CONFLICT");

    // The same address is fine in a different event.
    let res = app
        .post_with_token(
            &routes::participants(event_b),
            &json!({ "email": "ada@example.com" }),
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
}

#[tokio::test]
async fn writes_against_foreign_attributes_are_rejected() {
    let app = TestApp::spawn().await;
    let event_a = app.create_event("A", "event-a").await;
    let event_b = app.create_event("B", "event-b").await;
    let foreign = app.create_attribute(event_b, "Foreign", "text").await;

    let res = app
        .post_with_token(
            &routes::participants(event_a),
            &json!({
                "email": "ada@example.com",
                "attributes": [{ "attribute_id": foreign, "value": "x" }],
            }),
        )
        .await;
    assert_eq!(res.status, 404, "{}", res.text);
    assert_eq!(res.body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn update_normalizes_sentinel_values_to_null() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    let name = app.create_attribute(event_id, "Full name", "text").await;
    let participant_id = app
        .create_participant(
            event_id,
            "ada@example.com",
            json!([{ "attribute_id": name, "value": "Ada" }]),
        )
        .await;

    let res = app
        .patch_with_token(
            &routes::participant(event_id, participant_id),
            &json!({ "attributes": [{ "attribute_id": name, "value": "null" }] }),
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);

    let values = res.body["attributes"].as_array().unwrap();
    let cleared = values
        .iter()
        .find(|a| a["attribute_id"].as_i64() == Some(name as i64))
        .unwrap();
    assert!(cleared["value"].is_null());
}

#[tokio::test]
async fn deleting_a_participant_frees_their_slot() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    let attr = app.create_attribute(event_id, "Workshop", "block").await;
    let slot = app.create_block(event_id, attr, "Slot", None, Some(1)).await;
    let participant_id = app
        .create_participant(
            event_id,
            "ada@example.com",
            json!([{ "attribute_id": attr, "value": slot.to_string() }]),
        )
        .await;
    assert_eq!(app.occupancy(event_id, attr, slot).await, 1);

    let res = app
        .delete_with_token(&routes::participant(event_id, participant_id))
        .await;
    assert_eq!(res.status, 204, "{}", res.text);
    assert_eq!(app.occupancy(event_id, attr, slot).await, 0);
}

#[tokio::test]
async fn bulk_unregister_removes_all_named_participants() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    let p1 = app.create_participant(event_id, "p1@example.com", json!([])).await;
    let p2 = app.create_participant(event_id, "p2@example.com", json!([])).await;
    app.create_participant(event_id, "keep@example.com", json!([])).await;

    let res = app
        .delete_with_token_and_body(
            &routes::participants(event_id),
            &json!({ "participant_ids": [p1, p2] }),
        )
        .await;
    assert_eq!(res.status, 204, "{}", res.text);

    let list = app.get_with_token(&routes::participants(event_id)).await;
    let emails: Vec<_> = list
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["email"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(emails, vec!["keep@example.com"]);
}

#[tokio::test]
async fn public_view_shows_only_listed_attributes() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;

    let public_attr = app
        .post_with_token(
            &routes::attributes(event_id),
            &json!({ "name": "Team", "type": "text", "show_in_list": true }),
        )
        .await
        .id();
    let hidden_attr = app.create_attribute(event_id, "Phone", "tel").await;

    let res = app
        .post_with_token(
            &routes::participants(event_id),
            &json!({
                "email": "ada@example.com",
                "attributes": [
                    { "attribute_id": public_attr, "value": "Crusaders" },
                    { "attribute_id": hidden_attr, "value": "555-1234" },
                ],
            }),
        )
        .await;
    let slug = res.body["slug"].as_str().unwrap().to_string();

    let res = app
        .get_without_token(&routes::public_participant("event-1", &slug))
        .await;
    assert_eq!(res.status, 200, "{}", res.text);

    let values = res.body["attributes"].as_array().unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0]["name"], "Team");
    assert_eq!(values[0]["value"], "Crusaders");
    // The email never appears in the public view.
    assert!(res.body.get("email").is_none());
}

#[tokio::test]
async fn participants_can_unregister_themselves_by_slug() {
    let app = TestApp::spawn().await;
    let event_id = app.create_event("Event", "event-1").await;
    let res = app
        .post_with_token(
            &routes::participants(event_id),
            &json!({ "email": "ada@example.com" }),
        )
        .await;
    let slug = res.body["slug"].as_str().unwrap().to_string();

    let res = app
        .delete_without_token(&routes::public_participant("event-1", &slug))
        .await;
    assert_eq!(res.status, 204, "{}", res.text);

    let list = app.get_with_token(&routes::participants(event_id)).await;
    assert!(list.body.as_array().unwrap().is_empty());
}

mod bulk_attribute_update {
    use super::*;

    #[tokio::test]
    async fn writes_one_value_for_many_participants() {
        let app = TestApp::spawn().await;
        let event_id = app.create_event("Event", "event-1").await;
        let team = app.create_attribute(event_id, "Team", "text").await;
        let p1 = app.create_participant(event_id, "p1@example.com", json!([])).await;
        let p2 = app.create_participant(event_id, "p2@example.com", json!([])).await;

        let res = app
            .put_with_token(
                &routes::attribute_bulk_update(event_id, team),
                &json!({ "participant_ids": [p1, p2], "new_value": "Red" }),
            )
            .await;
        assert_eq!(res.status, 204, "{}", res.text);

        for id in [p1, p2] {
            let res = app.get_with_token(&routes::participant(event_id, id)).await;
            let values = res.body["attributes"].as_array().unwrap();
            let team_value = values
                .iter()
                .find(|a| a["attribute_id"].as_i64() == Some(team as i64))
                .unwrap();
            assert_eq!(team_value["value"], "Red");
        }
    }

    #[tokio::test]
    async fn block_capacity_applies_to_the_whole_batch() {
        let app = TestApp::spawn().await;
        let event_id = app.create_event("Event", "event-1").await;
        let attr = app.create_attribute(event_id, "Workshop", "block").await;
        let slot = app.create_block(event_id, attr, "Slot", None, Some(2)).await;
        let p1 = app.create_participant(event_id, "p1@example.com", json!([])).await;
        let p2 = app.create_participant(event_id, "p2@example.com", json!([])).await;
        let p3 = app.create_participant(event_id, "p3@example.com", json!([])).await;

        // Three into a two-seat block: the whole batch rolls back.
        let res = app
            .put_with_token(
                &routes::attribute_bulk_update(event_id, attr),
                &json!({ "participant_ids": [p1, p2, p3], "new_value": slot.to_string() }),
            )
            .await;
        assert_eq!(res.status, 409, "{}", res.text);
        assert_eq!(res.body["code"], "CAPACITY_EXCEEDED");
        assert_eq!(app.occupancy(event_id, attr, slot).await, 0);

        // Two fit fine.
        let res = app
            .put_with_token(
                &routes::attribute_bulk_update(event_id, attr),
                &json!({ "participant_ids": [p1, p2], "new_value": slot.to_string() }),
            )
            .await;
        assert_eq!(res.status, 204, "{}", res.text);
        assert_eq!(app.occupancy(event_id, attr, slot).await, 2);
    }
}

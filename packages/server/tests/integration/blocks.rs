use serde_json::json;

use crate::common::{TestApp, routes};

/// Event with a block attribute: root (no cap) → A (cap 1), B (cap 2).
async fn workshop_tree(app: &TestApp) -> (i32, i32, i32, i32) {
    let event_id = app.create_event("Workshops", "workshops").await;
    let attribute_id = app.create_attribute(event_id, "Workshop", "block").await;
    let a = app
        .create_block(event_id, attribute_id, "Workshop A", None, Some(1))
        .await;
    let b = app
        .create_block(event_id, attribute_id, "Workshop B", None, Some(2))
        .await;
    (event_id, attribute_id, a, b)
}

async fn assign(
    app: &TestApp,
    event_id: i32,
    participant_id: i32,
    attribute_id: i32,
    value: serde_json::Value,
) -> crate::common::TestResponse {
    app.patch_with_token(
        &routes::participant(event_id, participant_id),
        &json!({ "attributes": [{ "attribute_id": attribute_id, "value": value }] }),
    )
    .await
}

mod capacity {
    use super::*;

    #[tokio::test]
    async fn full_workshop_scenario() {
        let app = TestApp::spawn().await;
        let (event_id, attr, a, b) = workshop_tree(&app).await;

        // P1 takes the last (only) seat in A.
        let p1 = app
            .create_participant(
                event_id,
                "p1@example.com",
                json!([{ "attribute_id": attr, "value": a.to_string() }]),
            )
            .await;
        assert_eq!(app.occupancy(event_id, attr, a).await, 1);

        // A is full now; P2 is rejected there but fits in B.
        let res = app
            .post_with_token(
                &routes::participants(event_id),
                &json!({
                    "email": "p2@example.com",
                    "attributes": [{ "attribute_id": attr, "value": a.to_string() }],
                }),
            )
            .await;
        assert_eq!(res.status, 409, "{}", res.text);
        assert_eq!(res.body["code"], "CAPACITY_EXCEEDED");

        let p2 = app
            .create_participant(
                event_id,
                "p2@example.com",
                json!([{ "attribute_id": attr, "value": b.to_string() }]),
            )
            .await;
        assert_eq!(app.occupancy(event_id, attr, b).await, 1);

        // Moving P1 from A to B frees A and fills B.
        let res = assign(&app, event_id, p1, attr, json!(b.to_string())).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(app.occupancy(event_id, attr, a).await, 0);
        assert_eq!(app.occupancy(event_id, attr, b).await, 2);

        // B is full; P3 bounces.
        let res = app
            .post_with_token(
                &routes::participants(event_id),
                &json!({
                    "email": "p3@example.com",
                    "attributes": [{ "attribute_id": attr, "value": b.to_string() }],
                }),
            )
            .await;
        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CAPACITY_EXCEEDED");

        let _ = p2;
    }

    #[tokio::test]
    async fn reassigning_the_same_slot_is_idempotent() {
        let app = TestApp::spawn().await;
        let (event_id, attr, a, _) = workshop_tree(&app).await;
        let p1 = app
            .create_participant(
                event_id,
                "p1@example.com",
                json!([{ "attribute_id": attr, "value": a.to_string() }]),
            )
            .await;

        // Same slot again: succeeds even though A is "full" with ourselves.
        let res = assign(&app, event_id, p1, attr, json!(a.to_string())).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(app.occupancy(event_id, attr, a).await, 1);
    }

    #[tokio::test]
    async fn clearing_an_assignment_frees_the_slot() {
        let app = TestApp::spawn().await;
        let (event_id, attr, a, _) = workshop_tree(&app).await;
        let p1 = app
            .create_participant(
                event_id,
                "p1@example.com",
                json!([{ "attribute_id": attr, "value": a.to_string() }]),
            )
            .await;

        let res = assign(&app, event_id, p1, attr, json!(null)).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(app.occupancy(event_id, attr, a).await, 0);

        app.create_participant(
            event_id,
            "p2@example.com",
            json!([{ "attribute_id": attr, "value": a.to_string() }]),
        )
        .await;
        assert_eq!(app.occupancy(event_id, attr, a).await, 1);
    }

    #[tokio::test]
    async fn an_ancestor_capacity_bounds_its_whole_subtree() {
        let app = TestApp::spawn().await;
        let event_id = app.create_event("Event", "event-1").await;
        let attr = app.create_attribute(event_id, "Workshop", "block").await;
        // room (cap 1) → seat (no cap): the seat inherits the room's bound.
        let room = app
            .create_block(event_id, attr, "Room", None, Some(1))
            .await;
        let seat = app
            .create_block(event_id, attr, "Seat", Some(room), None)
            .await;

        app.create_participant(
            event_id,
            "p1@example.com",
            json!([{ "attribute_id": attr, "value": seat.to_string() }]),
        )
        .await;
        assert_eq!(app.occupancy(event_id, attr, room).await, 1);

        let res = app
            .post_with_token(
                &routes::participants(event_id),
                &json!({
                    "email": "p2@example.com",
                    "attributes": [{ "attribute_id": attr, "value": seat.to_string() }],
                }),
            )
            .await;
        assert_eq!(res.status, 409, "{}", res.text);
        assert_eq!(res.body["code"], "CAPACITY_EXCEEDED");
    }

    /// Drive the allocator's availability check directly: the exclusion
    /// parameter is what makes keep-your-own-slot reassignment work.
    #[tokio::test]
    async fn can_assign_excludes_the_given_participant() {
        use server::blocks::BlockAllocator;

        let app = TestApp::spawn().await;
        let (event_id, attr, a, _) = workshop_tree(&app).await;

        let allocator = BlockAllocator::new(&app.db);
        assert!(allocator.can_assign(attr, a, None).await.unwrap());

        let p1 = app
            .create_participant(
                event_id,
                "p1@example.com",
                json!([{ "attribute_id": attr, "value": a.to_string() }]),
            )
            .await;

        assert!(!allocator.can_assign(attr, a, None).await.unwrap());
        // The occupant itself still "fits": its own slot is excluded.
        assert!(allocator.can_assign(attr, a, Some(p1)).await.unwrap());
    }

    #[tokio::test]
    async fn a_failed_batch_writes_nothing() {
        let app = TestApp::spawn().await;
        let (event_id, attr, a, _) = workshop_tree(&app).await;
        let note = app.create_attribute(event_id, "Note", "text").await;
        app.create_participant(
            event_id,
            "p1@example.com",
            json!([{ "attribute_id": attr, "value": a.to_string() }]),
        )
        .await;

        // Text write would succeed, block write fails: neither is visible.
        let res = app
            .post_with_token(
                &routes::participants(event_id),
                &json!({
                    "email": "p2@example.com",
                    "attributes": [
                        { "attribute_id": note, "value": "hello" },
                        { "attribute_id": attr, "value": a.to_string() },
                    ],
                }),
            )
            .await;
        assert_eq!(res.status, 409, "{}", res.text);

        let list = app.get_with_token(&routes::participants(event_id)).await;
        let emails: Vec<_> = list.body.as_array().unwrap().iter().map(|p| p["email"].clone()).collect();
        assert!(!emails.contains(&json!("p2@example.com")));
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn block_of_another_attribute_is_an_invalid_reference() {
        let app = TestApp::spawn().await;
        let event_id = app.create_event("Event", "event-1").await;
        let attr_a = app.create_attribute(event_id, "Workshop", "block").await;
        let attr_b = app.create_attribute(event_id, "Dinner", "block").await;
        let slot_b = app
            .create_block(event_id, attr_b, "Table", None, Some(4))
            .await;

        let res = app
            .post_with_token(
                &routes::participants(event_id),
                &json!({
                    "email": "p1@example.com",
                    "attributes": [{ "attribute_id": attr_a, "value": slot_b.to_string() }],
                }),
            )
            .await;
        assert_eq!(res.status, 422, "{}", res.text);
        assert_eq!(res.body["code"], "INVALID_REFERENCE");
    }

    #[tokio::test]
    async fn non_numeric_block_value_is_a_validation_error() {
        let app = TestApp::spawn().await;
        let (event_id, attr, _, _) = workshop_tree(&app).await;

        let res = app
            .post_with_token(
                &routes::participants(event_id),
                &json!({
                    "email": "p1@example.com",
                    "attributes": [{ "attribute_id": attr, "value": "front row" }],
                }),
            )
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn missing_block_is_not_found() {
        let app = TestApp::spawn().await;
        let (event_id, attr, _, _) = workshop_tree(&app).await;

        let res = app
            .post_with_token(
                &routes::participants(event_id),
                &json!({
                    "email": "p1@example.com",
                    "attributes": [{ "attribute_id": attr, "value": "999999" }],
                }),
            )
            .await;
        assert_eq!(res.status, 404, "{}", res.text);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}

mod structure {
    use super::*;

    #[tokio::test]
    async fn deleting_a_parent_requires_cascade() {
        let app = TestApp::spawn().await;
        let event_id = app.create_event("Event", "event-1").await;
        let attr = app.create_attribute(event_id, "Workshop", "block").await;
        let room = app.create_block(event_id, attr, "Room", None, None).await;
        let seat = app
            .create_block(event_id, attr, "Seat", Some(room), Some(1))
            .await;
        app.create_participant(
            event_id,
            "p1@example.com",
            json!([{ "attribute_id": attr, "value": seat.to_string() }]),
        )
        .await;

        let res = app
            .delete_with_token(&routes::block(event_id, attr, room))
            .await;
        assert_eq!(res.status, 409, "{}", res.text);
        assert_eq!(res.body["code"], "CONFLICT");

        let res = app
            .delete_with_token(&format!(
                "{}?cascade=true",
                routes::block(event_id, attr, room)
            ))
            .await;
        assert_eq!(res.status, 204, "{}", res.text);

        // The subtree is gone and the assignment was cleared.
        let tree = app.get_with_token(&routes::blocks(event_id, attr)).await;
        assert_eq!(tree.status, 200);
        assert_eq!(tree.body["occupancy"], 0);
        assert!(tree.body["children"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn the_root_block_cannot_be_deleted() {
        let app = TestApp::spawn().await;
        let event_id = app.create_event("Event", "event-1").await;
        let attr = app.create_attribute(event_id, "Workshop", "block").await;

        let tree = app.get_with_token(&routes::blocks(event_id, attr)).await;
        let root = tree.body["id"].as_i64().unwrap() as i32;

        let res = app
            .delete_with_token(&routes::block(event_id, attr, root))
            .await;
        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn a_block_cannot_move_into_its_own_subtree() {
        let app = TestApp::spawn().await;
        let event_id = app.create_event("Event", "event-1").await;
        let attr = app.create_attribute(event_id, "Workshop", "block").await;
        let room = app.create_block(event_id, attr, "Room", None, None).await;
        let seat = app
            .create_block(event_id, attr, "Seat", Some(room), None)
            .await;

        let res = app
            .patch_with_token(
                &routes::block(event_id, attr, room),
                &json!({ "parent_id": seat }),
            )
            .await;
        assert_eq!(res.status, 409, "{}", res.text);
        assert_eq!(res.body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn capacity_cannot_drop_below_occupancy() {
        let app = TestApp::spawn().await;
        let event_id = app.create_event("Event", "event-1").await;
        let attr = app.create_attribute(event_id, "Workshop", "block").await;
        let slot = app
            .create_block(event_id, attr, "Slot", None, Some(3))
            .await;
        for i in 0..2 {
            app.create_participant(
                event_id,
                &format!("p{i}@example.com"),
                json!([{ "attribute_id": attr, "value": slot.to_string() }]),
            )
            .await;
        }

        let res = app
            .patch_with_token(
                &routes::block(event_id, attr, slot),
                &json!({ "capacity": 1 }),
            )
            .await;
        assert_eq!(res.status, 409, "{}", res.text);

        let res = app
            .patch_with_token(
                &routes::block(event_id, attr, slot),
                &json!({ "capacity": 2 }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
    }

    #[tokio::test]
    async fn moving_an_occupied_subtree_must_fit_the_new_chain() {
        let app = TestApp::spawn().await;
        let event_id = app.create_event("Event", "event-1").await;
        let attr = app.create_attribute(event_id, "Workshop", "block").await;
        let tight = app
            .create_block(event_id, attr, "Tight room", None, Some(1))
            .await;
        let open = app.create_block(event_id, attr, "Open room", None, None).await;
        let seat = app
            .create_block(event_id, attr, "Seat", Some(open), None)
            .await;
        for i in 0..2 {
            app.create_participant(
                event_id,
                &format!("p{i}@example.com"),
                json!([{ "attribute_id": attr, "value": seat.to_string() }]),
            )
            .await;
        }

        let res = app
            .patch_with_token(
                &routes::block(event_id, attr, seat),
                &json!({ "parent_id": tight }),
            )
            .await;
        assert_eq!(res.status, 409, "{}", res.text);
        assert_eq!(res.body["code"], "CAPACITY_EXCEEDED");
    }

    #[tokio::test]
    async fn show_lists_subtree_participants_for_bounded_blocks() {
        let app = TestApp::spawn().await;
        let event_id = app.create_event("Event", "event-1").await;
        let attr = app.create_attribute(event_id, "Workshop", "block").await;
        let room = app
            .create_block(event_id, attr, "Room", None, Some(5))
            .await;
        let seat = app
            .create_block(event_id, attr, "Seat", Some(room), None)
            .await;
        app.create_participant(
            event_id,
            "ada@example.com",
            json!([{ "attribute_id": attr, "value": seat.to_string() }]),
        )
        .await;

        let res = app
            .get_with_token(&routes::block(event_id, attr, room))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["occupancy"], 1);
        let listed = res.body["participants"].as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn public_tree_is_visible_without_a_token() {
        let app = TestApp::spawn().await;
        let event_id = app.create_event("Event", "public-event").await;
        let attr = app.create_attribute(event_id, "Workshop", "block").await;
        app.create_block(event_id, attr, "Slot", None, Some(10)).await;

        let res = app
            .get_without_token(&routes::public_blocks("public-event", attr))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["children"].as_array().unwrap().len(), 1);
    }
}

mod concurrency {
    use super::*;

    /// Concurrent submissions racing for a capacity-1 block: exactly one
    /// wins, everyone else gets CAPACITY_EXCEEDED.
    #[tokio::test]
    async fn one_slot_admits_exactly_one_of_many_racers() {
        let app = TestApp::spawn().await;
        let event_id = app.create_event("Race", "race").await;
        let attr = app.create_attribute(event_id, "Seat", "block").await;
        let slot = app
            .create_block(event_id, attr, "Last seat", None, Some(1))
            .await;
        app.create_form(
            event_id,
            "Signup",
            "signup",
            true,
            json!([{ "id": attr, "is_required": true }]),
        )
        .await;

        let racers = 8;
        let submissions = (0..racers).map(|i| {
            let client = app.client.clone();
            let url = format!(
                "http://{}{}",
                app.addr,
                routes::public_submit("race", "signup")
            );
            let body = json!({
                "email": format!("racer{i}@example.com"),
                attr.to_string(): slot.to_string(),
            });
            async move {
                let res = client.post(url).json(&body).send().await.expect("send failed");
                res.status().as_u16()
            }
        });

        let statuses = futures::future::join_all(submissions).await;
        let admitted = statuses.iter().filter(|&&s| s == 200).count();
        let rejected = statuses.iter().filter(|&&s| s == 409).count();

        assert_eq!(admitted, 1, "statuses: {statuses:?}");
        assert_eq!(rejected, racers - 1, "statuses: {statuses:?}");
        assert_eq!(app.occupancy(event_id, attr, slot).await, 1);
    }
}

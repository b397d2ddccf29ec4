use serde_json::json;

use crate::common::{TestApp, routes};

/// Event with a first form over a required text attribute and an optional
/// select attribute. Returns (event_id, required_attr, optional_attr).
async fn signup_form(app: &TestApp) -> (i32, i32, i32) {
    let event_id = app.create_event("Event", "event-1").await;
    let name = app.create_attribute(event_id, "Full name", "text").await;
    let diet = app.create_attribute(event_id, "Diet", "select").await;
    app.create_form(
        event_id,
        "Signup",
        "signup",
        true,
        json!([
            { "id": name, "is_required": true, "position": 0 },
            { "id": diet, "position": 1 },
        ]),
    )
    .await;
    (event_id, name, diet)
}

mod identity {
    use super::*;

    #[tokio::test]
    async fn a_first_form_requires_an_email() {
        let app = TestApp::spawn().await;
        let (_, name, _) = signup_form(&app).await;

        let res = app
            .post_without_token(
                &routes::public_submit("event-1", "signup"),
                &json!({ name.to_string(): "Ada" }),
            )
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "MISSING_FIELDS");
        assert_eq!(res.body["fields"][0]["name"], "email");
    }

    #[tokio::test]
    async fn a_later_form_requires_the_participant_slug() {
        let app = TestApp::spawn().await;
        let event_id = app.create_event("Event", "event-1").await;
        let diet = app.create_attribute(event_id, "Diet", "select").await;
        app.create_form(event_id, "Extras", "extras", false, json!([{ "id": diet }]))
            .await;

        let res = app
            .post_without_token(
                &routes::public_submit("event-1", "extras"),
                &json!({ diet.to_string(): "vegan" }),
            )
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "MISSING_FIELDS");
        assert_eq!(res.body["fields"][0]["name"], "participant_slug");
    }

    #[tokio::test]
    async fn a_first_form_submission_registers_a_participant() {
        let app = TestApp::spawn().await;
        let (event_id, name, _) = signup_form(&app).await;

        let res = app
            .post_without_token(
                &routes::public_submit("event-1", "signup"),
                &json!({ "email": "ada@example.com", name.to_string(): "Ada Lovelace" }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["created"], true);
        assert!(res.body["participant_slug"].as_str().is_some());
        assert_eq!(res.body["values"][name.to_string()], "Ada Lovelace");

        let list = app.get_with_token(&routes::participants(event_id)).await;
        assert_eq!(list.body.as_array().unwrap().len(), 1);
        assert_eq!(list.body[0]["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let app = TestApp::spawn().await;
        let (_, name, _) = signup_form(&app).await;

        let body = json!({ "email": "ada@example.com", name.to_string(): "Ada" });
        let first = app
            .post_without_token(&routes::public_submit("event-1", "signup"), &body)
            .await;
        assert_eq!(first.status, 200, "{}", first.text);

        let second = app
            .post_without_token(&routes::public_submit("event-1", "signup"), &body)
            .await;
        assert_eq!(second.status, 409);
        assert_eq!(second.body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn a_later_form_updates_the_existing_participant() {
        let app = TestApp::spawn().await;
        let (event_id, name, diet) = signup_form(&app).await;
        app.create_form(event_id, "Extras", "extras", false, json!([{ "id": diet }]))
            .await;

        let res = app
            .post_without_token(
                &routes::public_submit("event-1", "signup"),
                &json!({ "email": "ada@example.com", name.to_string(): "Ada" }),
            )
            .await;
        let slug = res.body["participant_slug"].as_str().unwrap().to_string();

        let res = app
            .post_without_token(
                &routes::public_submit("event-1", "extras"),
                &json!({ "participant_slug": slug, diet.to_string(): "vegan" }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["created"], false);

        let list = app.get_with_token(&routes::participants(event_id)).await;
        assert_eq!(list.body.as_array().unwrap().len(), 1);
        let values = list.body[0]["attributes"].as_array().unwrap();
        let diet_value = values
            .iter()
            .find(|a| a["attribute_id"].as_i64() == Some(diet as i64))
            .unwrap();
        assert_eq!(diet_value["value"], "vegan");
    }
}

mod closure {
    use super::*;

    #[tokio::test]
    async fn a_closed_form_rejects_submissions() {
        let app = TestApp::spawn().await;
        let (event_id, name, _) = signup_form(&app).await;
        let form = app.get_with_token(&routes::forms(event_id)).await;
        let form_id = form.body[0]["id"].as_i64().unwrap() as i32;

        app.patch_with_token(&routes::form(event_id, form_id), &json!({ "is_open": false }))
            .await;

        let res = app
            .post_without_token(
                &routes::public_submit("event-1", "signup"),
                &json!({ "email": "ada@example.com", name.to_string(): "Ada" }),
            )
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "FORM_CLOSED");
    }

    #[tokio::test]
    async fn an_exhausted_submission_counter_closes_the_form() {
        let app = TestApp::spawn().await;
        let (event_id, name, _) = signup_form(&app).await;
        let form = app.get_with_token(&routes::forms(event_id)).await;
        let form_id = form.body[0]["id"].as_i64().unwrap() as i32;

        app.patch_with_token(
            &routes::form(event_id, form_id),
            &json!({ "submissions_left": 0 }),
        )
        .await;

        // Rejected even though every field is valid.
        let res = app
            .post_without_token(
                &routes::public_submit("event-1", "signup"),
                &json!({ "email": "ada@example.com", name.to_string(): "Ada" }),
            )
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "FORM_CLOSED");
    }

    #[tokio::test]
    async fn the_counter_decrements_and_stops_at_zero() {
        let app = TestApp::spawn().await;
        let (event_id, name, _) = signup_form(&app).await;
        let form = app.get_with_token(&routes::forms(event_id)).await;
        let form_id = form.body[0]["id"].as_i64().unwrap() as i32;

        app.patch_with_token(
            &routes::form(event_id, form_id),
            &json!({ "submissions_left": 1 }),
        )
        .await;

        let res = app
            .post_without_token(
                &routes::public_submit("event-1", "signup"),
                &json!({ "email": "first@example.com", name.to_string(): "First" }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let form = app.get_with_token(&routes::form(event_id, form_id)).await;
        assert_eq!(form.body["submissions_left"], 0);

        let res = app
            .post_without_token(
                &routes::public_submit("event-1", "signup"),
                &json!({ "email": "second@example.com", name.to_string(): "Second" }),
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "FORM_CLOSED");
    }

    #[tokio::test]
    async fn a_past_end_date_closes_the_form() {
        let app = TestApp::spawn().await;
        let (event_id, name, _) = signup_form(&app).await;
        let form = app.get_with_token(&routes::forms(event_id)).await;
        let form_id = form.body[0]["id"].as_i64().unwrap() as i32;

        app.patch_with_token(
            &routes::form(event_id, form_id),
            &json!({ "end_date": "2020-01-01T00:00:00Z" }),
        )
        .await;

        let res = app
            .post_without_token(
                &routes::public_submit("event-1", "signup"),
                &json!({ "email": "ada@example.com", name.to_string(): "Ada" }),
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "FORM_CLOSED");
    }
}

mod required_fields {
    use super::*;

    #[tokio::test]
    async fn missing_required_fields_are_reported_as_a_complete_list() {
        let app = TestApp::spawn().await;
        let event_id = app.create_event("Event", "event-1").await;
        let name = app.create_attribute(event_id, "Full name", "text").await;
        let phone = app.create_attribute(event_id, "Phone", "tel").await;
        app.create_form(
            event_id,
            "Signup",
            "signup",
            true,
            json!([
                { "id": name, "is_required": true },
                { "id": phone, "is_required": true },
            ]),
        )
        .await;

        let res = app
            .post_without_token(
                &routes::public_submit("event-1", "signup"),
                &json!({ "email": "ada@example.com" }),
            )
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "MISSING_FIELDS");

        let fields = res.body["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0]["id"], name);
        assert_eq!(fields[1]["id"], phone);
    }

    #[tokio::test]
    async fn null_sentinels_do_not_satisfy_required_fields() {
        let app = TestApp::spawn().await;
        let (_, name, _) = signup_form(&app).await;

        for sentinel in [json!(null), json!(""), json!("null")] {
            let res = app
                .post_without_token(
                    &routes::public_submit("event-1", "signup"),
                    &json!({ "email": "ada@example.com", name.to_string(): sentinel }),
                )
                .await;
            assert_eq!(res.status, 400, "{}", res.text);
            assert_eq!(res.body["code"], "MISSING_FIELDS");
        }
    }

    #[tokio::test]
    async fn a_prior_value_satisfies_an_omitted_required_field() {
        let app = TestApp::spawn().await;
        let (event_id, name, diet) = signup_form(&app).await;
        // The later form requires the name again.
        app.create_form(
            event_id,
            "Extras",
            "extras",
            false,
            json!([
                { "id": name, "is_required": true },
                { "id": diet },
            ]),
        )
        .await;

        let res = app
            .post_without_token(
                &routes::public_submit("event-1", "signup"),
                &json!({ "email": "ada@example.com", name.to_string(): "Ada" }),
            )
            .await;
        let slug = res.body["participant_slug"].as_str().unwrap().to_string();

        // Name omitted, but the participant already has one on file.
        let res = app
            .post_without_token(
                &routes::public_submit("event-1", "extras"),
                &json!({ "participant_slug": slug, diet.to_string(): "vegan" }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
    }

    #[tokio::test]
    async fn required_block_fields_carry_the_choice_message() {
        let app = TestApp::spawn().await;
        let event_id = app.create_event("Event", "event-1").await;
        let workshop = app.create_attribute(event_id, "Workshop", "block").await;
        app.create_block(event_id, workshop, "Slot", None, Some(5)).await;
        app.create_form(
            event_id,
            "Signup",
            "signup",
            true,
            json!([{ "id": workshop, "is_required": true }]),
        )
        .await;

        let res = app
            .post_without_token(
                &routes::public_submit("event-1", "signup"),
                &json!({ "email": "ada@example.com" }),
            )
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        let message = res.body["fields"][0]["message"].as_str().unwrap();
        assert!(message.contains("cannot unregister"), "{message}");
    }
}

mod filtering {
    use super::*;

    #[tokio::test]
    async fn unknown_fields_are_dropped_silently() {
        let app = TestApp::spawn().await;
        let (event_id, name, diet) = signup_form(&app).await;
        let outside = app.create_attribute(event_id, "Internal notes", "text").await;

        let res = app
            .post_without_token(
                &routes::public_submit("event-1", "signup"),
                &json!({
                    "email": "ada@example.com",
                    name.to_string(): "Ada",
                    // Not part of the form: ignored, not an error.
                    outside.to_string(): "should not be written",
                    "999999": "neither should this",
                }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert!(res.body["values"].get(outside.to_string()).is_none());

        let list = app.get_with_token(&routes::participants(event_id)).await;
        let values = list.body[0]["attributes"].as_array().unwrap();
        let outside_value = values
            .iter()
            .find(|a| a["attribute_id"].as_i64() == Some(outside as i64))
            .unwrap();
        assert!(outside_value["value"].is_null());
        let _ = diet;
    }

    #[tokio::test]
    async fn public_form_view_exposes_the_configured_fields_in_order() {
        let app = TestApp::spawn().await;
        let (_, name, diet) = signup_form(&app).await;

        let res = app
            .get_without_token(&routes::public_form("event-1", "signup"))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        let fields = res.body["attributes"].as_array().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0]["id"], name);
        assert_eq!(fields[0]["is_required"], true);
        assert_eq!(fields[1]["id"], diet);
        assert_eq!(fields[1]["is_required"], false);
    }
}

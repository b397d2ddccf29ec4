use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers::{attachment, attribute, block, email, event, form, participant};
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/events", event_routes())
        .nest("/public/{event_slug}", public_routes())
}

fn event_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(event::list_events, event::create_event))
        .routes(routes!(
            event::get_event,
            event::update_event,
            event::delete_event
        ))
        .nest("/{event_id}/attributes", attribute_routes())
        .nest("/{event_id}/participants", participant_routes())
        .nest("/{event_id}/forms", form_routes())
        .nest("/{event_id}/emails", email_routes())
}

fn attribute_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            attribute::list_attributes,
            attribute::create_attribute
        ))
        .routes(routes!(
            attribute::get_attribute,
            attribute::update_attribute,
            attribute::delete_attribute
        ))
        .routes(routes!(participant::bulk_update_attribute_values))
        .nest("/{attribute_id}/blocks", block_routes())
}

fn block_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(block::get_block_tree, block::create_block))
        .routes(routes!(
            block::get_block,
            block::update_block,
            block::delete_block
        ))
}

fn participant_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            participant::list_participants,
            participant::create_participant,
            participant::bulk_unregister
        ))
        .routes(routes!(
            participant::get_participant,
            participant::update_participant,
            participant::delete_participant
        ))
        .routes(routes!(attachment::download_attribute_file))
}

fn form_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(form::list_forms, form::create_form))
        .routes(routes!(form::get_form, form::update_form, form::delete_form))
}

fn email_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(email::list_emails, email::create_email))
        .routes(routes!(
            email::get_email,
            email::update_email,
            email::delete_email
        ))
        .routes(routes!(email::duplicate_email))
        .routes(routes!(email::send_email))
}

fn public_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(event::public_show_event))
        .routes(routes!(block::public_get_block_tree))
        .routes(routes!(form::public_show_form))
        .routes(routes!(form::submit_form))
        .routes(routes!(
            participant::public_show_participant,
            participant::public_unregister
        ))
        .routes(routes!(attachment::public_upload))
}

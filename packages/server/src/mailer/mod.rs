pub mod render;
pub mod trigger;

use std::collections::HashMap;
use std::sync::Arc;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use thiserror::Error;

use crate::config::MailConfig;
use crate::entity::{
    attribute, block, email, event, form, participant, participant_attribute, participant_email,
};
use crate::error::AppError;

use render::{ContentVersion, MergeContext, RenderedEmail};
use trigger::PendingTrigger;

/// Matches committed lifecycle triggers against email templates, renders
/// them, and sends the result.
///
/// Dispatch is fire-and-forget: it runs after the mutating transaction has
/// committed and its failures are logged, never surfaced to the submitter.
pub struct Notifier {
    db: DatabaseConnection,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: String,
    app_domain: String,
}

impl Notifier {
    pub fn new(db: DatabaseConnection, config: &MailConfig) -> anyhow::Result<Self> {
        let transport = match &config.smtp_url {
            Some(url) => Some(AsyncSmtpTransport::<Tokio1Executor>::from_url(url)?.build()),
            None => None,
        };
        Ok(Self {
            db,
            transport,
            from_address: config.from_address.clone(),
            app_domain: config.app_domain.clone(),
        })
    }

    /// Hand a batch of committed triggers to a background task.
    pub fn dispatch_after_commit(
        self: &Arc<Self>,
        event: event::Model,
        participant: participant::Model,
        triggers: Vec<PendingTrigger>,
    ) {
        if triggers.is_empty() {
            return;
        }
        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            for trigger in triggers {
                if let Err(e) = notifier
                    .send_on_trigger(&event, &participant, &trigger)
                    .await
                {
                    tracing::warn!(
                        trigger = trigger.kind.as_str(),
                        participant_id = participant.id,
                        error = %e,
                        "Notification dispatch failed"
                    );
                }
            }
        });
    }

    /// Send the template matching a trigger, if the event has one.
    ///
    /// `trigger_value`/`trigger_value2` refine the match only when the
    /// trigger carries them.
    pub async fn send_on_trigger(
        &self,
        event: &event::Model,
        participant: &participant::Model,
        trigger: &PendingTrigger,
    ) -> Result<(), NotifyError> {
        let mut query = email::Entity::find()
            .filter(email::Column::EventId.eq(event.id))
            .filter(email::Column::Trigger.eq(trigger.kind.as_str()));
        if let Some(value) = &trigger.value {
            query = query.filter(email::Column::TriggerValue.eq(value));
        }
        if let Some(value2) = &trigger.value2 {
            query = query.filter(email::Column::TriggerValue2.eq(value2));
        }

        let Some(template) = query.one(&self.db).await? else {
            return Ok(());
        };

        self.send_to_participant(event, participant, &template, "system")
            .await
    }

    /// Render a template for a participant and send it, tracking delivery
    /// status on the `participant_email` record.
    pub async fn send_to_participant(
        &self,
        event: &event::Model,
        participant: &participant::Model,
        template: &email::Model,
        send_by: &str,
    ) -> Result<(), NotifyError> {
        self.record_delivery(participant.id, template.id, "pending", send_by, None)
            .await?;

        let rendered = self.render_for(event, participant, template).await?;

        let Some(transport) = &self.transport else {
            tracing::debug!(
                template_id = template.id,
                "SMTP transport not configured, leaving delivery pending"
            );
            return Ok(());
        };

        let message = build_message(&self.from_address, event, participant, template, rendered)?;

        match transport.send(message).await {
            Ok(_) => {
                self.record_delivery(
                    participant.id,
                    template.id,
                    "sent",
                    send_by,
                    Some(chrono::Utc::now()),
                )
                .await?;
                tracing::info!(
                    template_id = template.id,
                    participant_id = participant.id,
                    "Email sent"
                );
                Ok(())
            }
            Err(e) => {
                self.record_delivery(participant.id, template.id, "failed", send_by, None)
                    .await?;
                Err(NotifyError::Smtp(e.to_string()))
            }
        }
    }

    /// Render a template without sending it (also used by the manual-send
    /// preview).
    pub async fn render_for(
        &self,
        event: &event::Model,
        participant: &participant::Model,
        template: &email::Model,
    ) -> Result<RenderedEmail, NotifyError> {
        let attributes = attribute::Entity::find()
            .filter(attribute::Column::EventId.eq(event.id))
            .all(&self.db)
            .await?;
        let values: HashMap<i32, Option<String>> = participant_attribute::Entity::find()
            .filter(participant_attribute::Column::ParticipantId.eq(participant.id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| (row.attribute_id, row.value))
            .collect();

        // Resolve block assignments to block names for display.
        let block_ids: Vec<i32> = attributes
            .iter()
            .filter(|a| a.is_block())
            .filter_map(|a| values.get(&a.id).cloned().flatten())
            .filter_map(|v| v.parse::<i32>().ok())
            .collect();
        let block_names: HashMap<i32, String> = if block_ids.is_empty() {
            HashMap::new()
        } else {
            block::Entity::find()
                .filter(block::Column::Id.is_in(block_ids))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|b| (b.id, b.name))
                .collect()
        };

        let attribute_values = attributes
            .iter()
            .map(|attr| {
                let raw = values.get(&attr.id).cloned().flatten();
                let display = if attr.is_block() {
                    raw.as_deref()
                        .and_then(|v| v.parse::<i32>().ok())
                        .and_then(|id| block_names.get(&id).cloned())
                        .unwrap_or_else(|| "N/A".to_string())
                } else {
                    raw.unwrap_or_default()
                };
                (attr.slug.clone(), display)
            })
            .collect();

        let forms = form::Entity::find()
            .filter(form::Column::EventId.eq(event.id))
            .all(&self.db)
            .await?;
        let linked_form = template
            .form_id
            .and_then(|id| forms.iter().find(|f| f.id == id))
            .map(|f| f.slug.clone());

        let ctx = MergeContext {
            event,
            participant,
            attribute_values,
            forms: forms.into_iter().map(|f| (f.slug, f.name)).collect(),
            linked_form,
            app_domain: &self.app_domain,
        };

        let version =
            ContentVersion::parse(&template.content_version).unwrap_or(ContentVersion::Tagged);
        Ok(render::render(version, &template.content, &ctx))
    }

    async fn record_delivery(
        &self,
        participant_id: i32,
        email_id: i32,
        status: &str,
        send_by: &str,
        send_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<(), NotifyError> {
        let existing = participant_email::Entity::find_by_id((participant_id, email_id))
            .one(&self.db)
            .await?;
        match existing {
            Some(record) => {
                let mut active: participant_email::ActiveModel = record.into();
                active.status = Set(status.to_string());
                active.send_by = Set(send_by.to_string());
                active.send_at = Set(send_at);
                active.update(&self.db).await?;
            }
            None => {
                participant_email::ActiveModel {
                    participant_id: Set(participant_id),
                    email_id: Set(email_id),
                    status: Set(status.to_string()),
                    send_by: Set(send_by.to_string()),
                    send_at: Set(send_at),
                    created_at: Set(chrono::Utc::now()),
                }
                .insert(&self.db)
                .await?;
            }
        }
        Ok(())
    }
}

fn build_message(
    from_address: &str,
    event: &event::Model,
    participant: &participant::Model,
    template: &email::Model,
    rendered: RenderedEmail,
) -> Result<Message, NotifyError> {
    let from = Mailbox::new(
        Some(event.name.clone()),
        from_address
            .parse()
            .map_err(|_| NotifyError::Address(from_address.to_string()))?,
    );
    let to: Mailbox = participant
        .email
        .parse()
        .map_err(|_| NotifyError::Address(participant.email.clone()))?;
    let reply_to_address = event.contact_email.as_deref().unwrap_or(from_address);
    let reply_to: Mailbox = reply_to_address
        .parse()
        .map_err(|_| NotifyError::Address(reply_to_address.to_string()))?;

    let mut body = MultiPart::related().singlepart(SinglePart::html(rendered.html));
    for image in rendered.images {
        let content_type = ContentType::parse(&format!("image/{}", image.format))
            .unwrap_or(ContentType::parse("application/octet-stream").expect("static mime"));
        body = body.singlepart(
            Attachment::new_inline(image.cid).body(image.content, content_type),
        );
    }

    Message::builder()
        .from(from)
        .to(to)
        .reply_to(reply_to)
        .subject(&template.name)
        .multipart(body)
        .map_err(|e| NotifyError::Message(e.to_string()))
}

/// Notification failures are logged by the dispatcher, never propagated to
/// the request that produced the trigger.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("invalid mail address: {0}")]
    Address(String),
    #[error("could not build message: {0}")]
    Message(String),
    #[error("smtp error: {0}")]
    Smtp(String),
}

impl From<NotifyError> for AppError {
    fn from(e: NotifyError) -> Self {
        AppError::Internal(e.to_string())
    }
}

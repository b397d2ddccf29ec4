use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::{Captures, Regex};

use crate::entity::{event, participant};

/// Which merge-field syntax a template was authored in.
///
/// Older templates carry bare `/placeholder` tokens; the current editor
/// wraps placeholders in `<span data-id="...">` tags. The strategy is
/// stored on the template row, chosen once at authoring time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentVersion {
    Legacy,
    Tagged,
}

impl ContentVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Tagged => "tagged",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "legacy" => Some(Self::Legacy),
            "tagged" => Some(Self::Tagged),
            _ => None,
        }
    }
}

/// Everything the renderer may substitute into a template.
///
/// Attribute values arrive already resolved for display (block ids
/// replaced by block names), so rendering needs no database access.
pub struct MergeContext<'a> {
    pub event: &'a event::Model,
    pub participant: &'a participant::Model,
    /// (attribute slug, display value) pairs.
    pub attribute_values: Vec<(String, String)>,
    /// (form slug, form name) pairs for `/form_<slug>` links.
    pub forms: Vec<(String, String)>,
    /// Slug of the template's linked form, for the legacy `/form_url`.
    pub linked_form: Option<String>,
    pub app_domain: &'a str,
}

/// An image lifted out of the HTML body, to be attached with a CID.
pub struct InlineImage {
    pub cid: String,
    pub format: String,
    pub content: Vec<u8>,
}

pub struct RenderedEmail {
    pub html: String,
    pub images: Vec<InlineImage>,
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<span[^>]*data-id="([^"]+)"[^>]*>.*?</span>"#).unwrap()
});
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/((?:event|participant|form)_[a-z0-9_]+)").unwrap());
static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data:image/(\w+);base64,([^"]+)"#).unwrap());

/// Render a template body against a merge context.
pub fn render(version: ContentVersion, content: &str, ctx: &MergeContext<'_>) -> RenderedEmail {
    let html = match version {
        ContentVersion::Tagged => render_tagged(content, ctx),
        ContentVersion::Legacy => render_legacy(content, ctx),
    };
    extract_inline_images(&html)
}

/// Current syntax: editor spans carry the token in `data-id`; bare
/// attribute and form tokens are still honored in the surrounding text.
fn render_tagged(content: &str, ctx: &MergeContext<'_>) -> String {
    let content = TAG_RE.replace_all(content, |caps: &Captures| {
        let data_id = &caps[1];
        let token = data_id.strip_prefix('/').unwrap_or(data_id);
        token_value(token, ctx, true).unwrap_or_else(|| data_id.to_string())
    });

    replace_tokens(&content, ctx, true)
}

/// Legacy syntax: bare `/placeholder` tokens only. A template linked to a
/// form substitutes `/form_url` and nothing participant-specific beyond
/// the built-ins.
fn render_legacy(content: &str, ctx: &MergeContext<'_>) -> String {
    replace_tokens(content, ctx, ctx.linked_form.is_none())
}

fn replace_tokens(content: &str, ctx: &MergeContext<'_>, with_attributes: bool) -> String {
    TOKEN_RE
        .replace_all(content, |caps: &Captures| {
            token_value(&caps[1], ctx, with_attributes)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn token_value(token: &str, ctx: &MergeContext<'_>, with_attributes: bool) -> Option<String> {
    const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

    let event = ctx.event;
    let participant = ctx.participant;
    match token {
        "event_name" => Some(event.name.clone()),
        "event_start_date" => Some(event.start_date.format(DATE_FORMAT).to_string()),
        "event_end_date" => Some(event.end_date.format(DATE_FORMAT).to_string()),
        "event_slug" => Some(event.slug.clone()),
        "event_primary_color" => Some(event.primary_color.clone().unwrap_or_default()),
        "event_location" => Some(event.location.clone().unwrap_or_default()),
        "participant_id" => Some(participant.id.to_string()),
        "participant_created_at" => Some(participant.created_at.format(DATE_FORMAT).to_string()),
        "participant_updated_at" => Some(participant.updated_at.format(DATE_FORMAT).to_string()),
        "participant_email" => Some(participant.email.clone()),
        "participant_slug" => Some(participant.slug.clone()),
        "form_url" => {
            let slug = ctx.linked_form.as_deref()?;
            Some(form_url(ctx, slug))
        }
        _ => {
            if let Some(slug) = token.strip_prefix("participant_") {
                if !with_attributes {
                    return None;
                }
                ctx.attribute_values
                    .iter()
                    .find(|(s, _)| s == slug)
                    .map(|(_, display)| display.clone())
            } else if let Some(slug) = token.strip_prefix("form_") {
                if !with_attributes {
                    return None;
                }
                ctx.forms
                    .iter()
                    .find(|(s, _)| s == slug)
                    .map(|(slug, name)| format!(r#"<a href="{}">{name}</a>"#, form_url(ctx, slug)))
            } else {
                None
            }
        }
    }
}

fn form_url(ctx: &MergeContext<'_>, form_slug: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        ctx.app_domain, ctx.event.slug, form_slug, ctx.participant.slug
    )
}

/// Lift `data:image/...;base64,...` payloads out of the body, replacing
/// them with `cid:` references to the returned attachments. Undecodable
/// payloads are left in place.
fn extract_inline_images(html: &str) -> RenderedEmail {
    let mut images = Vec::new();
    let html = IMAGE_RE
        .replace_all(html, |caps: &Captures| {
            let format = caps[1].to_string();
            match BASE64.decode(caps[2].as_bytes()) {
                Ok(content) => {
                    let cid = format!("inline-{}", images.len());
                    images.push(InlineImage {
                        cid: cid.clone(),
                        format,
                        content,
                    });
                    format!("cid:{cid}")
                }
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned();

    RenderedEmail { html, images }
}

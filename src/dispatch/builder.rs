//! Task building for Courier.
//!
//! Turns a send request plus resolved recipients into a render-complete
//! `MailTask`: blacklist filtering, template selection, rendering, and
//! assembly run as sequential stages, each able to fail on its own terms.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::debug;

use crate::template::{BodyKind, Renderer, TemplateRegistry};
use crate::{CourierError, Result};

use super::resolver::ResolvedRecipients;
use super::types::{MailTask, SendRequest};

/// Template context key carrying the first recipient's opt-out token.
pub const UNSUBSCRIBE_TOKEN_KEY: &str = "unsubscribeToken";

/// Build a `MailTask` from a request and its resolved recipients.
///
/// Returns `Ok(None)` when blacklist filtering leaves no recipients: that is
/// a successful no-op outcome, not an error.
pub async fn build_task(
    request: &SendRequest,
    resolved: &ResolvedRecipients,
    registry: &TemplateRegistry,
    renderer: &Renderer,
) -> Result<Option<MailTask>> {
    // Step A: subtract blocked addresses by value
    let blocked: HashSet<&str> = resolved
        .blocked
        .iter()
        .map(|sub| sub.email.as_str())
        .collect();

    let to = filter_addresses(&request.to, &blocked);
    let cc = filter_addresses(&request.cc, &blocked);
    let bcc = filter_addresses(&request.bcc, &blocked);

    if to.is_empty() && cc.is_empty() && bcc.is_empty() {
        debug!("all recipients filtered by blacklist, nothing to send");
        return Ok(None);
    }

    // Step B: pick exactly one body source
    let (kind, source) = match &request.template {
        Some(name) => registry.load(name).await?,
        None => select_inline(request)?,
    };

    // Step C: merged render context, then render subject and body
    let context = render_context(request, &to, resolved);

    let subject = renderer.render(&request.subject, &context).map_err(|e| {
        debug!(source = %request.subject, "subject template failed to render");
        e
    })?;
    let body = renderer.render(&source, &context).map_err(|e| {
        debug!(source = %source, "body template failed to render");
        e
    })?;

    // Step D: assemble
    let mut task = MailTask {
        to: to.join(", "),
        cc: cc.join(", "),
        bcc: bcc.join(", "),
        from: request.from.clone(),
        subject,
        text: None,
        html: None,
        markdown: None,
    };
    task.set_body(kind, body);

    Ok(Some(task))
}

fn filter_addresses(addresses: &[String], blocked: &HashSet<&str>) -> Vec<String> {
    addresses
        .iter()
        .filter(|addr| !blocked.contains(addr.as_str()))
        .cloned()
        .collect()
}

/// Select one inline body source by markdown > html > text precedence.
fn select_inline(request: &SendRequest) -> Result<(BodyKind, String)> {
    if let Some(source) = &request.markdown {
        Ok((BodyKind::Markdown, source.clone()))
    } else if let Some(source) = &request.html {
        Ok((BodyKind::Html, source.clone()))
    } else if let Some(source) = &request.text {
        Ok((BodyKind::Text, source.clone()))
    } else {
        Err(CourierError::EmptyBody)
    }
}

/// Request data plus the first `to` recipient's unsubscribe token.
fn render_context(
    request: &SendRequest,
    filtered_to: &[String],
    resolved: &ResolvedRecipients,
) -> Value {
    let mut context: Map<String, Value> = request.data.clone();

    if let Some(first) = filtered_to.first() {
        if let Some(sub) = resolved.allowed_by_email(first) {
            context.insert(
                UNSUBSCRIBE_TOKEN_KEY.to_string(),
                Value::String(sub.id.clone()),
            );
        }
    }

    Value::Object(context)
}

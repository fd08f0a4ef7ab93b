//! Dispatch pipeline types for Courier.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::template::BodyKind;

/// A logical send request as submitted by a caller.
///
/// Exactly one of `template` or an inline body field must ultimately resolve
/// to renderable content; when several inline sources are present the
/// markdown > html > text precedence picks one.
#[derive(Debug, Clone, Deserialize)]
pub struct SendRequest {
    /// Primary recipients (non-empty).
    pub to: Vec<String>,
    /// Carbon-copy recipients.
    #[serde(default)]
    pub cc: Vec<String>,
    /// Blind-carbon-copy recipients.
    #[serde(default)]
    pub bcc: Vec<String>,
    /// Sender address.
    pub from: String,
    /// Subject template source.
    pub subject: String,
    /// Name of a registered file-based template.
    #[serde(default)]
    pub template: Option<String>,
    /// Inline plain-text body template.
    #[serde(default)]
    pub text: Option<String>,
    /// Inline HTML body template.
    #[serde(default)]
    pub html: Option<String>,
    /// Inline markdown body template.
    #[serde(default)]
    pub markdown: Option<String>,
    /// Open mapping of template values.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl SendRequest {
    /// All recipient addresses in request order (to, cc, bcc).
    pub fn all_recipients(&self) -> impl Iterator<Item = &String> {
        self.to.iter().chain(self.cc.iter()).chain(self.bcc.iter())
    }
}

/// A fully resolved, render-complete unit of work.
///
/// Recipient lists are joined into their wire-ready string form and exactly
/// one body field is populated. Immutable once built; either delivered or
/// queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailTask {
    /// Comma-joined `to` addresses.
    pub to: String,
    /// Comma-joined `cc` addresses.
    pub cc: String,
    /// Comma-joined `bcc` addresses.
    pub bcc: String,
    /// Sender address, copied verbatim from the request.
    pub from: String,
    /// Rendered subject.
    pub subject: String,
    /// Rendered plain-text body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Rendered HTML body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Rendered markdown body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
}

impl MailTask {
    /// The task's single body with its kind.
    pub fn body(&self) -> Option<(BodyKind, &str)> {
        if let Some(body) = &self.markdown {
            Some((BodyKind::Markdown, body))
        } else if let Some(body) = &self.html {
            Some((BodyKind::Html, body))
        } else {
            self.text.as_deref().map(|body| (BodyKind::Text, body))
        }
    }

    /// Place a rendered body under the field matching its kind.
    pub fn set_body(&mut self, kind: BodyKind, body: String) {
        match kind {
            BodyKind::Markdown => self.markdown = Some(body),
            BodyKind::Html => self.html = Some(body),
            BodyKind::Text => self.text = Some(body),
        }
    }
}

/// Terminal outcome of a dispatch operation.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// The task was durably queued for background delivery.
    Queued {
        /// Queue item id.
        id: String,
        /// Rendered subject, surfaced for observability.
        subject: String,
    },
    /// Blacklist filtering removed every recipient; nothing was produced.
    /// This is a successful no-op, not an error.
    NoRecipients,
    /// The task was handed to the transport and delivery succeeded.
    Delivered(crate::transport::DeliveryInfo),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_task() -> MailTask {
        MailTask {
            to: "a@example.com".to_string(),
            cc: String::new(),
            bcc: String::new(),
            from: "b@example.com".to_string(),
            subject: "Hi".to_string(),
            text: None,
            html: None,
            markdown: None,
        }
    }

    #[test]
    fn test_body_prefers_markdown() {
        let mut task = empty_task();
        task.text = Some("t".to_string());
        task.html = Some("h".to_string());
        task.markdown = Some("m".to_string());
        assert_eq!(task.body(), Some((BodyKind::Markdown, "m")));
    }

    #[test]
    fn test_body_html_over_text() {
        let mut task = empty_task();
        task.text = Some("t".to_string());
        task.html = Some("h".to_string());
        assert_eq!(task.body(), Some((BodyKind::Html, "h")));
    }

    #[test]
    fn test_body_none() {
        assert_eq!(empty_task().body(), None);
    }

    #[test]
    fn test_set_body() {
        let mut task = empty_task();
        task.set_body(BodyKind::Text, "hello".to_string());
        assert_eq!(task.body(), Some((BodyKind::Text, "hello")));
        assert!(task.html.is_none());
        assert!(task.markdown.is_none());
    }

    #[test]
    fn test_all_recipients_order() {
        let request = SendRequest {
            to: vec!["t@example.com".to_string()],
            cc: vec!["c@example.com".to_string()],
            bcc: vec!["b@example.com".to_string()],
            from: "f@example.com".to_string(),
            subject: "s".to_string(),
            template: None,
            text: None,
            html: None,
            markdown: None,
            data: Map::new(),
        };
        let all: Vec<_> = request.all_recipients().cloned().collect();
        assert_eq!(all, vec!["t@example.com", "c@example.com", "b@example.com"]);
    }
}

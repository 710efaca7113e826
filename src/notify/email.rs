// src/notify/email.rs
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{permalink, Notifier};
use crate::config::SmtpConfig;
use crate::error::DeliveryError;
use crate::timeline::types::Post;

/// Characters of post text shown in the subject line.
pub const SUBJECT_DIGEST_LIMIT: usize = 140;

const FOOTER: &str = "You are receiving this email because you are subscribed to the latest updates. \
To unsubscribe, reply with \"unsubscribe\"";

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailNotifier {
    pub fn from_config(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let creds = Credentials::new(cfg.username.clone(), cfg.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .with_context(|| format!("invalid SMTP_HOST {}", cfg.host))?
            .port(cfg.port)
            .credentials(creds)
            .build();

        let from = cfg
            .from
            .parse()
            .with_context(|| format!("invalid NOTIFY_EMAIL_FROM {}", cfg.from))?;
        let to = cfg
            .receivers
            .iter()
            .map(|r| {
                r.parse::<Mailbox>()
                    .with_context(|| format!("invalid receiver {r}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        anyhow::ensure!(!to.is_empty(), "no email receivers configured");

        Ok(Self { mailer, from, to })
    }
}

/// Subject and plain-text body for one matched post.
pub fn compose(handle: &str, post: &Post) -> (String, String) {
    let digest = if post.text.chars().count() > SUBJECT_DIGEST_LIMIT {
        let head: String = post.text.chars().take(SUBJECT_DIGEST_LIMIT).collect();
        format!("{head}...")
    } else {
        post.text.clone()
    };
    // Subjects must stay on one line.
    let digest = digest.split_whitespace().collect::<Vec<_>>().join(" ");
    let subject = format!("New tweet from @{handle}: {digest}");

    let created = post
        .created_at
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_default();
    let body = format!(
        "@{handle}: {}\n{}\n{created}\n\n{FOOTER}\n",
        post.text,
        permalink(handle, post)
    );
    (subject, body)
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn deliver(&self, handle: &str, posts: &[Post]) -> Result<(), DeliveryError> {
        let total = self.to.len() * posts.len();
        let mut sent = 0usize;
        for receiver in &self.to {
            for post in posts {
                let (subject, body) = compose(handle, post);
                let msg = Message::builder()
                    .from(self.from.clone())
                    .to(receiver.clone())
                    .subject(subject)
                    .header(header::ContentType::TEXT_PLAIN)
                    .body(body)
                    .map_err(|e| DeliveryError::Compose {
                        handle: handle.to_string(),
                        reason: e.to_string(),
                    })?;

                sent += 1;
                tracing::info!(target: "notify", sent, total, %receiver, "sending email");
                self.mailer
                    .send(msg)
                    .await
                    .map_err(|e| DeliveryError::Send {
                        receiver: receiver.to_string(),
                        reason: e.to_string(),
                    })?;
            }
        }
        tracing::info!(target: "notify", total, handle, "done sending emails");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn post(text: &str) -> Post {
        Post {
            id: "905".into(),
            text: text.to_string(),
            created_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
        }
    }

    #[test]
    fn short_text_is_the_whole_digest() {
        let (subject, body) = compose("alice", &post("Launch day"));
        assert_eq!(subject, "New tweet from @alice: Launch day");
        assert!(body.starts_with("@alice: Launch day\nhttps://twitter.com/alice/status/905\n"));
        assert!(body.contains("2024-03-01T12:00:00+00:00"));
        assert!(body.contains("unsubscribe"));
    }

    #[test]
    fn long_text_is_truncated_in_subject_only() {
        let text = "x".repeat(200);
        let (subject, body) = compose("alice", &post(&text));
        assert!(subject.ends_with(&format!("{}...", "x".repeat(140))));
        assert!(body.contains(&text));
    }

    #[test]
    fn newlines_do_not_leak_into_subject() {
        let (subject, _) = compose("alice", &post("line one\nline two"));
        assert_eq!(subject, "New tweet from @alice: line one line two");
    }
}

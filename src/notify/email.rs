use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{NotificationChannel, NotificationPayload, Notifier};

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

fn env_required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} missing"))
}

impl EmailNotifier {
    /// Reads `SMTP_HOST`, `SMTP_USER`, `SMTP_PASS`, `NOTIFY_EMAIL_FROM`, `NOTIFY_EMAIL_TO`.
    pub fn from_env() -> Result<Self> {
        let host = env_required("SMTP_HOST")?;
        let user = env_required("SMTP_USER")?;
        let pass = env_required("SMTP_PASS")?;
        let from_addr = env_required("NOTIFY_EMAIL_FROM")?;
        let to_addr = env_required("NOTIFY_EMAIL_TO")?;

        let creds = Credentials::new(user, pass);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(creds)
            .build();

        let from = from_addr.parse().context("invalid NOTIFY_EMAIL_FROM")?;
        let to = to_addr.parse().context("invalid NOTIFY_EMAIL_TO")?;

        Ok(Self { mailer, from, to })
    }
}

fn render(channel: &NotificationChannel, payload: &NotificationPayload) -> (String, String) {
    let subject = format!("{}: {}", payload.title, payload.body);
    let body = format!(
        "{}\n\nChannel: {}\nVideo id: {}\nThumbnail: {}\n\n-- {}\n",
        payload.body,
        payload.title,
        payload.deep_link_id,
        payload.thumbnail_ref.as_deref().unwrap_or("-"),
        channel.name,
    );
    (subject, body)
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, channel: &NotificationChannel, payload: &NotificationPayload) -> Result<()> {
        let (subject, body) = render(channel, payload);

        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body)
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Channel;

    #[test]
    fn subject_and_body_name_the_video() {
        let p = NotificationPayload {
            title: "Chan".into(),
            body: "Video".into(),
            thumbnail_ref: None,
            deep_link_id: "abc".into(),
        };
        let (subject, body) = render(&Channel::Update.descriptor(), &p);
        assert_eq!(subject, "Chan: Video");
        assert!(body.contains("Video id: abc"));
        assert!(body.contains("Thumbnail: -"));
    }
}

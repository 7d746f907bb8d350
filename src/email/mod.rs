/**
 * Outbound Transactional Email
 *
 * Thin wrapper around lettre's async SMTP transport. Used for the
 * password-reset and username-reminder flows; everything else in the
 * system notifies in-app.
 *
 * Credentials come from `EMAIL` / `APP_PASSWORD` (and optionally
 * `SMTP_RELAY`, defaulting to Gmail). When they are absent the mailer is
 * `None` and the flows that need it degrade gracefully.
 */

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{ApiError, ApiResult};
use crate::server::config::Config;

const DEFAULT_RELAY: &str = "smtp.gmail.com";

/// Async SMTP mailer
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    /// Build a mailer from configuration, or `None` when credentials are missing
    pub fn from_config(config: &Config) -> Option<Self> {
        let (email, password) = match (&config.email, &config.app_password) {
            (Some(email), Some(password)) => (email.clone(), password.clone()),
            _ => {
                tracing::warn!("EMAIL/APP_PASSWORD not set, outbound email disabled");
                return None;
            }
        };

        let from: Mailbox = match email.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                tracing::error!("EMAIL is not a valid address: {:?}", e);
                return None;
            }
        };

        let relay = config.smtp_relay.as_deref().unwrap_or(DEFAULT_RELAY);
        let transport = match AsyncSmtpTransport::<Tokio1Executor>::relay(relay) {
            Ok(builder) => builder
                .credentials(Credentials::new(email, password))
                .build(),
            Err(e) => {
                tracing::error!("Failed to configure SMTP relay {}: {:?}", relay, e);
                return None;
            }
        };

        Some(Self { transport, from })
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> ApiResult<()> {
        let to: Mailbox = to
            .parse()
            .map_err(|_| ApiError::bad_request("Invalid email address"))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(body)
            .map_err(|e| ApiError::internal(format!("build mail: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| ApiError::internal(format!("send mail: {e}")))?;

        Ok(())
    }

    /// Send a password-reset token to a user's registered address
    pub async fn send_password_reset(&self, to: &str, username: &str, token: &str) -> ApiResult<()> {
        tracing::info!("Sending password reset email to {}", username);
        self.send(
            to,
            "Reset your Threddit password",
            format!(
                "Hi {username},\n\n\
                 Use the token below to reset your password. It expires in one hour.\n\n\
                 {token}\n\n\
                 If you did not request this, you can ignore this email.\n"
            ),
        )
        .await
    }

    /// Remind a user of their username
    pub async fn send_username_reminder(&self, to: &str, username: &str) -> ApiResult<()> {
        tracing::info!("Sending username reminder to {}", username);
        self.send(
            to,
            "Your Threddit username",
            format!("Hi,\n\nThe username registered with this address is: {username}\n"),
        )
        .await
    }
}

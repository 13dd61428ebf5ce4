/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::borrow::Cow;

use crate::{
    email::{Attachment, Email},
    smtp::message::IntoMessage,
    SmtpConfig,
};

/// Sender address used when neither a sender nor a username is available.
pub const DEFAULT_SENDER: &str = "noreply@example.com";

/// Sends e-mail messages through one SMTP server, one connection per message.
#[derive(Debug, Clone)]
pub struct EmailSender {
    config: SmtpConfig,
    sender: Option<String>,
}

impl EmailSender {
    pub fn new(config: SmtpConfig) -> Self {
        EmailSender {
            config,
            sender: None,
        }
    }

    /// Sender used for messages that do not set one.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    /// Sender used for messages that do not set one: the configured sender,
    /// then the username, then [`DEFAULT_SENDER`].
    pub fn default_sender(&self) -> &str {
        self.sender
            .as_deref()
            .or(self.config.username.as_deref())
            .filter(|sender| !sender.trim().is_empty())
            .unwrap_or(DEFAULT_SENDER)
    }

    /// Sends the message, blocking until the server accepts or rejects it.
    ///
    /// Runs the session on a private runtime; must not be called from within
    /// a Tokio runtime, use [`EmailSender::send_async`] there.
    pub fn send(&self, email: &Email) -> crate::Result<()> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(self.send_async(email))
    }

    /// Sends the message over a new connection that is closed on return.
    pub async fn send_async(&self, email: &Email) -> crate::Result<()> {
        let email = if email.sender.trim().is_empty() {
            Cow::Owned(email.clone().from(self.default_sender()))
        } else {
            Cow::Borrowed(email)
        };

        // Fail on bad input before touching the network
        let builder = self.config.client_builder()?;
        let message = email.as_ref().into_message()?;

        let mut client = builder.connect().await?;
        client.send(message).await?;

        // The message is already accepted at this point
        if let Err(err) = client.quit().await {
            log::debug!("Failed to close SMTP session cleanly: {err}");
        }

        Ok(())
    }
}

/// Sends one message through the given SMTP server.
///
/// Blocks until the session ends. With `use_ssl` the connection is TLS from
/// the first byte; with `use_starttls` it is upgraded before authenticating.
/// Credentials are used only when a username is given. An empty `sender`
/// falls back to [`EmailSender::default_sender`].
#[allow(clippy::too_many_arguments)]
pub fn send_email(
    smtp_server: &str,
    smtp_port: u16,
    sender: &str,
    recipients: &[impl AsRef<str>],
    subject: &str,
    body: &str,
    username: Option<&str>,
    password: Option<&str>,
    use_starttls: bool,
    use_ssl: bool,
    attachments: &[Attachment],
) -> crate::Result<()> {
    let mut config = SmtpConfig::new(smtp_server, smtp_port)
        .starttls(use_starttls)
        .ssl(use_ssl);
    config.username = username.map(str::to_string);
    config.password = password.map(str::to_string);

    let email = Email {
        sender: sender.to_string(),
        recipients: recipients
            .iter()
            .map(|rcpt| rcpt.as_ref().to_string())
            .collect(),
        subject: subject.to_string(),
        body: body.to_string(),
        html: false,
        attachments: attachments.to_vec(),
    };

    EmailSender::new(config).send(&email)
}

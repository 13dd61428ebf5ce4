/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::path::Path;

use mail_builder::MessageBuilder;

use crate::{
    smtp::message::{check_address, IntoMessage, Message},
    Error,
};

/// A file attached to an [`Email`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// An e-mail message: sender, recipients, subject, body and attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Email {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub html: bool,
    pub attachments: Vec<Attachment>,
}

impl Attachment {
    /// Creates an attachment, guessing its content type from the filename.
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let filename = filename.into();
        Attachment {
            content_type: mime_guess::from_path(&filename)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
            filename,
            content: content.into(),
        }
    }

    /// Reads an attachment from disk, named after the last path component.
    pub fn from_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|err| Error::Attachment {
            path: path.to_path_buf(),
            err,
        })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Ok(Attachment::new(filename, content))
    }

    /// Overrides the guessed content type.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

impl<T: Into<String>, U: Into<Vec<u8>>> From<(T, U)> for Attachment {
    fn from((filename, content): (T, U)) -> Self {
        Attachment::new(filename, content)
    }
}

impl Email {
    pub fn new() -> Self {
        Email::default()
    }

    /// Set the sender of the message.
    pub fn from(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    /// Add a message recipient.
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.recipients.push(recipient.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.html = false;
        self
    }

    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.html = true;
        self
    }

    pub fn attach(mut self, attachment: impl Into<Attachment>) -> Self {
        self.attachments.push(attachment.into());
        self
    }

    /// Checks that the message has a sender and at least one recipient, and
    /// that no address can inject SMTP commands.
    pub fn validate(&self) -> crate::Result<()> {
        if self.sender.trim().is_empty() {
            Err(Error::MissingMailFrom)
        } else if self.recipients.is_empty()
            || self.recipients.iter().any(|rcpt| rcpt.trim().is_empty())
        {
            Err(Error::MissingRcptTo)
        } else {
            check_address(self.sender.trim())?;
            for rcpt in &self.recipients {
                check_address(rcpt.trim())?;
            }
            Ok(())
        }
    }

    /// Builds the MIME structure of the message.
    pub fn to_builder(&self) -> MessageBuilder<'_> {
        let mut builder = MessageBuilder::new()
            .from(self.sender.trim())
            .to(self
                .recipients
                .iter()
                .map(|rcpt| rcpt.trim())
                .collect::<Vec<_>>())
            .subject(self.subject.as_str());

        builder = if self.html {
            builder.html_body(self.body.as_str())
        } else {
            builder.text_body(self.body.as_str())
        };

        for attachment in &self.attachments {
            builder = builder.attachment(
                attachment.content_type.as_str(),
                attachment.filename.as_str(),
                attachment.content.as_slice(),
            );
        }

        builder
    }

    /// Renders the message in RFC 5322 format.
    pub fn write_to_vec(&self) -> crate::Result<Vec<u8>> {
        self.validate()?;
        Ok(self.to_builder().write_to_vec()?)
    }
}

impl<'x> IntoMessage<'x> for &'x Email {
    fn into_message(self) -> crate::Result<Message<'x>> {
        Message::new(
            self.sender.trim(),
            self.recipients.iter().map(|rcpt| rcpt.trim()),
            self.write_to_vec()?,
        )
        .into_message()
    }
}

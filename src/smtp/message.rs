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

/// SMTP envelope plus the raw RFC 5322 message.
#[derive(Debug, Default, Clone)]
pub struct Message<'x> {
    pub mail_from: Cow<'x, str>,
    pub rcpt_to: Vec<Cow<'x, str>>,
    pub body: Cow<'x, [u8]>,
}

impl<'x> Message<'x> {
    /// Create a new message
    pub fn new<T, U, V>(from: T, to: U, body: V) -> Self
    where
        T: Into<Cow<'x, str>>,
        U: IntoIterator<Item = T>,
        V: Into<Cow<'x, [u8]>>,
    {
        Message {
            mail_from: from.into(),
            rcpt_to: to.into_iter().map(Into::into).collect(),
            body: body.into(),
        }
    }

    /// Create a new empty message.
    pub fn empty() -> Self {
        Message::default()
    }

    /// Set the sender of the message.
    pub fn from(mut self, address: impl Into<Cow<'x, str>>) -> Self {
        self.mail_from = address.into();
        self
    }

    /// Add a message recipient.
    pub fn to(mut self, address: impl Into<Cow<'x, str>>) -> Self {
        self.rcpt_to.push(address.into());
        self
    }
}

pub trait IntoMessage<'x> {
    fn into_message(self) -> crate::Result<Message<'x>>;
}

impl<'x> IntoMessage<'x> for Message<'x> {
    fn into_message(self) -> crate::Result<Message<'x>> {
        if self.mail_from.trim().is_empty() {
            Err(crate::Error::MissingMailFrom)
        } else if self.rcpt_to.is_empty() {
            Err(crate::Error::MissingRcptTo)
        } else {
            check_address(&self.mail_from)?;
            for rcpt in &self.rcpt_to {
                check_address(rcpt)?;
            }
            Ok(self)
        }
    }
}

/// Rejects addresses that would break out of `MAIL FROM:<..>` or `RCPT TO:<..>`.
pub(crate) fn check_address(addr: &str) -> crate::Result<()> {
    if addr.contains(['\r', '\n', '<', '>']) {
        Err(crate::Error::InvalidAddress(addr.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::{smtp::message::IntoMessage, Error, ErrorKind, Message};

    #[test]
    fn envelope_checks() {
        let message = Message::new("a@x.com", ["b@x.com"], &b"Subject: Hi\r\n\r\nTest"[..]);
        assert!(message.clone().into_message().is_ok());

        assert!(matches!(
            Message::empty().to("b@x.com").into_message(),
            Err(Error::MissingMailFrom)
        ));
        assert!(matches!(
            Message::empty().from("a@x.com").into_message(),
            Err(Error::MissingRcptTo)
        ));

        for addr in [
            "b@x.com>\r\nRCPT TO:<evil@x.com",
            "b@x.com\nDATA",
            "<b@x.com>",
        ] {
            let err = message.clone().to(addr).into_message().unwrap_err();
            assert!(matches!(&err, Error::InvalidAddress(a) if a == addr), "{err}");
            assert_eq!(err.kind(), ErrorKind::Input);
        }

        let err = message.from("a@x.com\r\nRSET").into_message().unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)), "{err}");
    }
}

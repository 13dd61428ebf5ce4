/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::{Error, SmtpClient};

use super::{
    message::{check_address, IntoMessage},
    AssertReply,
};

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    /// Sends a MAIL FROM command to the server.
    pub async fn mail_from(&mut self, addr: &str) -> crate::Result<()> {
        check_address(addr)?;
        self.cmd(format!("MAIL FROM:<{addr}>\r\n").as_bytes())
            .await?
            .assert_positive_completion()
            .map_err(|err| err.on_reply(Error::Rejected))
    }

    /// Sends a RCPT TO command to the server.
    pub async fn rcpt_to(&mut self, addr: &str) -> crate::Result<()> {
        check_address(addr)?;
        self.cmd(format!("RCPT TO:<{addr}>\r\n").as_bytes())
            .await?
            .assert_positive_completion()
            .map_err(|err| err.on_reply(Error::Rejected))
    }

    /// Sends a DATA command to the server.
    pub async fn data(&mut self, message: impl AsRef<[u8]>) -> crate::Result<()> {
        self.cmd(b"DATA\r\n")
            .await?
            .assert_code(354)
            .map_err(|err| err.on_reply(Error::Rejected))?;
        tokio::time::timeout(self.timeout, async {
            // Write message
            self.write_message(message.as_ref()).await?;
            self.read().await
        })
        .await
        .map_err(|_| Error::Timeout)??
        .assert_positive_completion()
        .map_err(|err| err.on_reply(Error::Rejected))
    }

    /// Sends a QUIT command to the server.
    pub async fn quit(mut self) -> crate::Result<()> {
        self.cmd(b"QUIT\r\n").await?.assert_positive_completion()
    }

    /// Sends a message to the server: MAIL FROM, one RCPT TO per recipient
    /// and DATA.
    pub async fn send<'x>(&mut self, message: impl IntoMessage<'x>) -> crate::Result<()> {
        let message = message.into_message()?;

        self.mail_from(message.mail_from.as_ref()).await?;
        for rcpt in &message.rcpt_to {
            self.rcpt_to(rcpt.as_ref()).await?;
        }
        self.data(message.body.as_ref()).await?;

        log::debug!(
            "Message from {} accepted for {} recipient(s)",
            message.mail_from,
            message.rcpt_to.len()
        );
        Ok(())
    }

    /// Writes the message applying the transparency procedure (RFC 5321,
    /// section 4.5.2) and the end of data marker.
    pub(crate) async fn write_message(&mut self, message: &[u8]) -> tokio::io::Result<()> {
        #[derive(Debug)]
        enum State {
            Cr,
            CrLf,
            Init,
        }

        let mut state = State::CrLf;
        let mut last_pos = 0;
        for (pos, byte) in message.iter().enumerate() {
            if *byte == b'.' && matches!(state, State::CrLf) {
                if let Some(bytes) = message.get(last_pos..pos) {
                    self.stream.write_all(bytes).await?;
                    self.stream.write_all(b".").await?;
                    last_pos = pos;
                }
                state = State::Init;
            } else if *byte == b'\r' {
                state = State::Cr;
            } else if *byte == b'\n' && matches!(state, State::Cr) {
                state = State::CrLf;
            } else {
                state = State::Init;
            }
        }
        if let Some(bytes) = message.get(last_pos..) {
            self.stream.write_all(bytes).await?;
        }
        if !message.is_empty() && !message.ends_with(b"\r\n") {
            self.stream.write_all(b"\r\n").await?;
        }
        self.stream.write_all(b".\r\n").await?;
        self.stream.flush().await
    }
}

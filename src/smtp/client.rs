/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use smtp_proto::{response::parser::ResponseReceiver, Response};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::SmtpClient;

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    pub(crate) async fn read(&mut self) -> crate::Result<Response<String>> {
        let mut buf = vec![0u8; 1024];
        let mut parser = ResponseReceiver::default();

        loop {
            let br = self.stream.read(&mut buf).await?;

            if br == 0 {
                return Err(crate::Error::UnparseableReply);
            }

            let mut iter = buf[..br].iter();
            match parser.parse(&mut iter) {
                // Commands are never pipelined, data past the reply means the
                // session is out of step
                Ok(_) if !iter.as_slice().is_empty() => {
                    return Err(crate::Error::UnparseableReply);
                }
                Ok(reply) => return Ok(reply),
                Err(smtp_proto::Error::NeedsMoreData { .. }) => (),
                Err(_) => return Err(crate::Error::UnparseableReply),
            }
        }
    }

    /// Sends a command to the SMTP server and waits for a reply.
    pub async fn cmd(&mut self, cmd: impl AsRef<[u8]>) -> crate::Result<Response<String>> {
        tokio::time::timeout(self.timeout, async {
            self.stream.write_all(cmd.as_ref()).await?;
            self.stream.flush().await?;
            self.read().await
        })
        .await
        .map_err(|_| crate::Error::Timeout)?
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use crate::{Error, SmtpClient};

    #[tokio::test]
    async fn read_multiline_reply() {
        let (client_end, mut server_end) = tokio::io::duplex(64);
        let mut client = SmtpClient {
            stream: client_end,
            timeout: Duration::from_secs(5),
        };

        tokio::spawn(async move {
            // Split across writes smaller than the reply
            for chunk in ["250-first line\r\n", "250-second", " line\r\n250 last\r\n"] {
                server_end.write_all(chunk.as_bytes()).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let reply = client.read().await.unwrap();
        assert_eq!(reply.code(), 250);
        assert!(reply.message().contains("second line"));
    }

    #[tokio::test]
    async fn surplus_reply_data() {
        let (client_end, mut server_end) = tokio::io::duplex(64);
        let mut client = SmtpClient {
            stream: client_end,
            timeout: Duration::from_secs(5),
        };

        server_end
            .write_all(b"250 2.1.5 OK\r\n250 2.1.5 OK\r\n")
            .await
            .unwrap();
        assert!(matches!(client.read().await, Err(Error::UnparseableReply)));
    }

    #[tokio::test]
    async fn closed_connection() {
        let (client_end, server_end) = tokio::io::duplex(64);
        drop(server_end);
        let mut client = SmtpClient {
            stream: client_end,
            timeout: Duration::from_secs(5),
        };
        assert!(matches!(
            client.cmd(b"NOOP\r\n").await,
            Err(Error::Io(_)) | Err(Error::UnparseableReply)
        ));
    }

    #[tokio::test]
    async fn reply_timeout() {
        let (client_end, _server_end) = tokio::io::duplex(64);
        let mut client = SmtpClient {
            stream: client_end,
            timeout: Duration::from_millis(50),
        };
        assert!(matches!(
            client.cmd(b"NOOP\r\n").await,
            Err(Error::Timeout)
        ));
    }
}

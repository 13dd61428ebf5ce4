/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::{hash::Hash, time::Duration};

use smtp_proto::EXT_START_TLS;
use tokio::net::TcpStream;

use crate::{config::Security, Error, SmtpClient, SmtpClientBuilder, SmtpStream};

use super::{auth::Credentials, tls::build_tls_connector, AssertReply};

impl<T: AsRef<str> + PartialEq + Eq + Hash> SmtpClientBuilder<T> {
    pub fn new(hostname: T, port: u16) -> Self {
        SmtpClientBuilder {
            addr: format!("{}:{}", hostname.as_ref(), port),
            timeout: Duration::from_secs(10),
            tls_connector: build_tls_connector(false),
            tls_hostname: hostname,
            security: Security::None,
            credentials: None,
            local_host: gethostname::gethostname()
                .to_str()
                .unwrap_or("[127.0.0.1]")
                .to_string(),
        }
    }

    /// Start the connection in clear text, upgrade it with STARTTLS or
    /// start it in TLS.
    pub fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Accept invalid or self-signed server certificates.
    pub fn allow_invalid_certs(mut self) -> Self {
        self.tls_connector = build_tls_connector(true);
        self
    }

    /// Authenticate after the session is established.
    pub fn credentials(mut self, credentials: impl Into<Credentials>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    /// Set the EHLO hostname
    pub fn helo_host(mut self, host: impl Into<String>) -> Self {
        self.local_host = host.into();
        self
    }

    /// Sets the SMTP connection timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Connects to the server, negotiates TLS as configured and
    /// authenticates if credentials were provided.
    pub async fn connect(&self) -> crate::Result<SmtpClient<SmtpStream>> {
        tokio::time::timeout(self.timeout, async {
            log::debug!("Connecting to {} ({:?})", self.addr, self.security);

            let mut client = SmtpClient {
                stream: TcpStream::connect(&self.addr)
                    .await
                    .map_err(Error::Connect)?,
                timeout: self.timeout,
            };

            let (mut client, capabilities) = match self.security {
                Security::Implicit => {
                    let mut client = client
                        .into_tls(&self.tls_connector, self.tls_hostname.as_ref())
                        .await?
                        .into_smtp_stream();
                    // Read greeting
                    client.read().await?.assert_positive_completion()?;
                    let capabilities = client.ehlo(&self.local_host).await?;
                    (client, capabilities)
                }
                Security::StartTls => {
                    // Read greeting
                    client.read().await?.assert_positive_completion()?;

                    if !client
                        .ehlo(&self.local_host)
                        .await?
                        .has_capability(EXT_START_TLS)
                    {
                        return Err(Error::MissingStartTls);
                    }
                    let mut client = client
                        .start_tls(&self.tls_connector, self.tls_hostname.as_ref())
                        .await?
                        .into_smtp_stream();
                    let capabilities = client.ehlo(&self.local_host).await?;
                    (client, capabilities)
                }
                Security::None => {
                    // Read greeting
                    client.read().await?.assert_positive_completion()?;
                    let capabilities = client.ehlo(&self.local_host).await?;
                    (client.into_smtp_stream(), capabilities)
                }
            };
            log::debug!(
                "Session established with {} (tls: {})",
                capabilities.hostname,
                client.stream.is_tls()
            );

            if let Some(credentials) = &self.credentials {
                client.authenticate(credentials, &capabilities).await?;
            }

            Ok(client)
        })
        .await
        .map_err(|_| Error::Timeout)?
    }
}

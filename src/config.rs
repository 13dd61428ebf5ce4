/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::{fmt::Debug, time::Duration};

use crate::{smtp::auth::Credentials, Error, SmtpClientBuilder};

/// How the connection to the SMTP server is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Security {
    /// Clear text for the whole session.
    #[default]
    None,
    /// Clear text until the `STARTTLS` command upgrades the session.
    StartTls,
    /// TLS from the first byte (SMTPS, usually port 465).
    Implicit,
}

/// Connection settings for one SMTP session.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub use_starttls: bool,
    pub use_ssl: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    pub helo_host: Option<String>,
    pub allow_invalid_certs: bool,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        SmtpConfig {
            host: host.into(),
            port,
            use_starttls: false,
            use_ssl: false,
            username: None,
            password: None,
            timeout: Duration::from_secs(10),
            helo_host: None,
            allow_invalid_certs: false,
        }
    }

    /// Upgrade the connection with STARTTLS.
    pub fn starttls(mut self, use_starttls: bool) -> Self {
        self.use_starttls = use_starttls;
        self
    }

    /// Connect over TLS from the start.
    pub fn ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    /// Authenticate with the given username and password.
    pub fn login(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Hostname sent with EHLO, defaults to the local hostname.
    pub fn helo_host(mut self, host: impl Into<String>) -> Self {
        self.helo_host = Some(host.into());
        self
    }

    /// Skip server certificate verification, for relays with self-signed
    /// certificates.
    pub fn allow_invalid_certs(mut self, allow_invalid_certs: bool) -> Self {
        self.allow_invalid_certs = allow_invalid_certs;
        self
    }

    pub fn security(&self) -> crate::Result<Security> {
        match (self.use_ssl, self.use_starttls) {
            (true, true) => Err(Error::ConflictingTls),
            (true, false) => Ok(Security::Implicit),
            (false, true) => Ok(Security::StartTls),
            (false, false) => Ok(Security::None),
        }
    }

    /// Credentials to authenticate with, if a username is set.
    pub fn credentials(&self) -> crate::Result<Option<Credentials>> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                Ok(Some(Credentials::new(username.as_str(), password.as_str())))
            }
            (Some(_), None) => Err(Error::MissingPassword),
            (None, _) => Ok(None),
        }
    }

    /// Checks the settings without touching the network.
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::MissingHost);
        } else if self.port == 0 {
            return Err(Error::InvalidPort);
        } else if self.helo_host.as_ref().is_some_and(|host| {
            host.is_empty() || host.chars().any(|ch| ch.is_whitespace() || ch.is_control())
        }) {
            return Err(Error::InvalidHeloHost);
        }
        self.security()?;
        self.credentials()?;
        Ok(())
    }

    pub fn client_builder(&self) -> crate::Result<SmtpClientBuilder<String>> {
        self.validate()?;

        let mut builder = SmtpClientBuilder::new(self.host.trim().to_string(), self.port)
            .security(self.security()?)
            .timeout(self.timeout);
        if let Some(credentials) = self.credentials()? {
            builder = builder.credentials(credentials);
        }
        if let Some(helo_host) = &self.helo_host {
            builder = builder.helo_host(helo_host.as_str());
        }
        if self.allow_invalid_certs {
            builder = builder.allow_invalid_certs();
        }

        Ok(builder)
    }
}

impl Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_starttls", &self.use_starttls)
            .field("use_ssl", &self.use_ssl)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("helo_host", &self.helo_host)
            .field("allow_invalid_certs", &self.allow_invalid_certs)
            .finish()
    }
}

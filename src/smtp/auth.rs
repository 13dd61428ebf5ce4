/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::fmt::Debug;

use base64::{engine::general_purpose::STANDARD, Engine};
#[cfg(feature = "cram-md5")]
use smtp_proto::AUTH_CRAM_MD5;
use smtp_proto::{EhloResponse, AUTH_LOGIN, AUTH_PLAIN};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{Error, SmtpClient};

/// Mechanisms tried, most secure first.
#[cfg(feature = "cram-md5")]
const MECHANISMS: [u64; 3] = [AUTH_CRAM_MD5, AUTH_PLAIN, AUTH_LOGIN];
#[cfg(not(feature = "cram-md5"))]
const MECHANISMS: [u64; 2] = [AUTH_PLAIN, AUTH_LOGIN];

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    username: String,
    secret: String,
}

impl Credentials {
    /// Creates a new `Credentials` instance.
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Credentials {
        Credentials {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn encode(&self, mechanism: u64, challenge: &str) -> crate::Result<String> {
        Ok(STANDARD.encode(
            match mechanism {
                AUTH_PLAIN => {
                    format!("\u{0}{}\u{0}{}", self.username, self.secret)
                }

                AUTH_LOGIN => {
                    let challenge = STANDARD
                        .decode(challenge)
                        .map_err(|_| Error::InvalidChallenge)?;

                    if challenge
                        .get(0..9)
                        .is_some_and(|c| b"user name".eq_ignore_ascii_case(c))
                        || challenge
                            .get(0..8)
                            .is_some_and(|c| b"username".eq_ignore_ascii_case(c))
                    {
                        self.username.clone()
                    } else if challenge
                        .get(0..8)
                        .is_some_and(|c| b"password".eq_ignore_ascii_case(c))
                    {
                        self.secret.clone()
                    } else {
                        return Err(Error::InvalidChallenge);
                    }
                }

                #[cfg(feature = "cram-md5")]
                AUTH_CRAM_MD5 => {
                    let mut secret_opad: Vec<u8> = vec![0x5c; 64];
                    let mut secret_ipad: Vec<u8> = vec![0x36; 64];
                    let key = if self.secret.len() <= 64 {
                        self.secret.as_bytes().to_vec()
                    } else {
                        md5::compute(self.secret.as_bytes()).to_vec()
                    };

                    for (pos, byte) in key.iter().enumerate() {
                        secret_opad[pos] = *byte ^ 0x5c;
                        secret_ipad[pos] = *byte ^ 0x36;
                    }

                    secret_ipad.extend_from_slice(
                        &STANDARD
                            .decode(challenge)
                            .map_err(|_| Error::InvalidChallenge)?,
                    );
                    secret_opad.extend_from_slice(&md5::compute(&secret_ipad).0);

                    format!("{} {:x}", self.username, md5::compute(&secret_opad))
                }

                _ => return Err(Error::UnsupportedAuthMechanism),
            }
            .as_bytes(),
        ))
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl<T: Into<String>, U: Into<String>> From<(T, U)> for Credentials {
    fn from((username, secret): (T, U)) -> Self {
        Credentials::new(username, secret)
    }
}

fn mechanism_name(mechanism: u64) -> &'static str {
    match mechanism {
        AUTH_PLAIN => "PLAIN",
        AUTH_LOGIN => "LOGIN",
        #[cfg(feature = "cram-md5")]
        AUTH_CRAM_MD5 => "CRAM-MD5",
        _ => "UNKNOWN",
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    /// Authenticates using the most secure mechanism advertised by the server.
    pub async fn authenticate(
        &mut self,
        credentials: &Credentials,
        capabilities: &EhloResponse<String>,
    ) -> crate::Result<&mut Self> {
        let mut last_reply = None;

        for mechanism in MECHANISMS
            .into_iter()
            .filter(|mechanism| (capabilities.auth_mechanisms & mechanism) != 0)
        {
            match self.auth(mechanism, credentials).await {
                Ok(_) => {
                    log::debug!(
                        "Authenticated as {} using {}",
                        credentials.username,
                        mechanism_name(mechanism)
                    );
                    return Ok(self);
                }
                Err(Error::UnexpectedReply(reply)) => {
                    // 535: credentials invalid, other mechanisms will not help
                    let rejected = reply.code() == 535;
                    last_reply = Some(reply);
                    if rejected {
                        break;
                    }
                }
                Err(err) => return Err(err),
            }
        }

        match last_reply {
            Some(reply) => Err(Error::AuthenticationFailed(reply)),
            None => Err(Error::UnsupportedAuthMechanism),
        }
    }

    pub(crate) async fn auth(
        &mut self,
        mechanism: u64,
        credentials: &Credentials,
    ) -> crate::Result<()> {
        let mut reply = if mechanism == AUTH_PLAIN {
            self.cmd(
                format!(
                    "AUTH {} {}\r\n",
                    mechanism_name(mechanism),
                    credentials.encode(mechanism, "")?
                )
                .as_bytes(),
            )
            .await?
        } else {
            self.cmd(format!("AUTH {}\r\n", mechanism_name(mechanism)).as_bytes())
                .await?
        };

        for _ in 0..3 {
            match reply.code() {
                334 => {
                    let response = credentials.encode(mechanism, reply.message())?;
                    reply = self.cmd(format!("{response}\r\n").as_bytes()).await?;
                }
                235 => {
                    return Ok(());
                }
                _ => {
                    return Err(Error::UnexpectedReply(reply));
                }
            }
        }

        Err(Error::UnexpectedReply(reply))
    }
}

#[cfg(test)]
mod test {
    use smtp_proto::{AUTH_LOGIN, AUTH_PLAIN};

    use crate::smtp::auth::Credentials;

    #[test]
    fn auth_encode() {
        // Challenge-Response Authentication Mechanism (CRAM)
        #[cfg(feature = "cram-md5")]
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(
                    smtp_proto::AUTH_CRAM_MD5,
                    "PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+",
                )
                .unwrap(),
            "dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw"
        );

        // Login
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(AUTH_LOGIN, "VXNlciBOYW1lAA==",)
                .unwrap(),
            "dGlt"
        );
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(AUTH_LOGIN, "VXNlcm5hbWU6",)
                .unwrap(),
            "dGlt"
        );
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(AUTH_LOGIN, "UGFzc3dvcmQA",)
                .unwrap(),
            "dGFuc3RhYWZ0YW5zdGFhZg=="
        );
        assert!(Credentials::new("tim", "tanstaaftanstaaf")
            .encode(AUTH_LOGIN, "Tm9wZQ==")
            .is_err());

        // Plain
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(AUTH_PLAIN, "",)
                .unwrap(),
            "AHRpbQB0YW5zdGFhZnRhbnN0YWFm"
        );
    }

    #[test]
    fn debug_hides_secret() {
        let debug = format!("{:?}", Credentials::from(("tim", "tanstaaftanstaaf")));
        assert!(debug.contains("tim"));
        assert!(!debug.contains("tanstaaf"));
    }
}

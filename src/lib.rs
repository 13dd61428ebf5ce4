/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! # send-mail
//!
//! _send-mail_ sends a single e-mail message through a configurable SMTP server:
//!
//! - Custom host and port.
//! - Plain text, SMTP Service Extension for Secure SMTP over **TLS** (_RFC 3207_, `STARTTLS`)
//!   or implicit TLS from the first byte (_RFC 8314_).
//! - SMTP Service Extension for Authentication (_RFC 4954_) with automatic mechanism negotiation:
//!   - CRAM-MD5 (_RFC 2195_)
//!   - PLAIN
//!   - LOGIN
//! - **MIME** messages (_RFC 2045 - 2049_) with plain text or HTML bodies and binary attachments.
//!
//! ## Usage Example
//!
//! ```rust
//!     let config = SmtpConfig::new("smtp.example.com", 587)
//!         .starttls(true)
//!         .login("john", "p4ssw0rd");
//!
//!     let email = Email::new()
//!         .from("john@example.com")
//!         .to("jane@example.com")
//!         .subject("Hi!")
//!         .text_body("Hello, world!")
//!         .attach(Attachment::new("report.pdf", pdf_bytes));
//!
//!     EmailSender::new(config).send(&email).unwrap();
//! ```
//!
//! The same sequence is available as a single call through [`send_email`], and as
//! [`EmailSender::send_async`] for callers already running inside a Tokio runtime.

pub mod config;
pub mod email;
pub mod sender;
pub mod smtp;

#[cfg(test)]
mod mock;

use std::{fmt::Display, hash::Hash, path::PathBuf, time::Duration};

use smtp::auth::Credentials;
use smtp_proto::Response;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;

pub use config::{Security, SmtpConfig};
pub use email::{Attachment, Email};
pub use mail_builder;
pub use sender::{send_email, EmailSender};
pub use smtp::{message::Message, stream::SmtpStream};
pub use smtp_proto;

#[derive(Debug)]
pub enum Error {
    /// TCP connection to the SMTP server could not be established
    Connect(std::io::Error),

    /// I/O error on an established connection
    Io(std::io::Error),

    /// TLS handshake error
    Tls(Box<rustls::Error>),

    /// TLS handshake aborted by an I/O failure
    TlsHandshake(std::io::Error),

    /// Failure parsing SMTP reply
    UnparseableReply,

    /// Unexpected SMTP reply.
    UnexpectedReply(Response<String>),

    /// The server rejected the STARTTLS command.
    StartTlsRejected(Response<String>),

    /// The server does not advertise STARTTLS.
    MissingStartTls,

    /// Invalid TLS name provided.
    InvalidTlsName,

    /// SMTP authentication failure.
    AuthenticationFailed(Response<String>),

    /// The server does no support any of the available authentication methods.
    UnsupportedAuthMechanism,

    /// Malformed SASL challenge received from the server.
    InvalidChallenge,

    /// The server rejected the sender, a recipient or the message.
    Rejected(Response<String>),

    /// Missing message sender.
    MissingMailFrom,

    /// Missing message recipients.
    MissingRcptTo,

    /// Address containing line breaks or angle brackets.
    InvalidAddress(String),

    /// EHLO hostname containing whitespace or line breaks.
    InvalidHeloHost,

    /// Missing SMTP server hostname.
    MissingHost,

    /// SMTP port is zero.
    InvalidPort,

    /// Both implicit TLS and STARTTLS were requested.
    ConflictingTls,

    /// A username was provided without a password.
    MissingPassword,

    /// An attachment could not be read.
    Attachment {
        path: PathBuf,
        err: std::io::Error,
    },

    /// Connection timeout.
    Timeout,
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The server could not be reached or the session broke down.
    Connection,
    /// STARTTLS upgrade or TLS handshake failure.
    Tls,
    /// Credentials were rejected or could not be negotiated.
    Authentication,
    /// The server refused the sender, a recipient or the message.
    Submission,
    /// Invalid arguments, detected before any network I/O.
    Input,
}

pub type Result<T> = std::result::Result<T, Error>;

/// SMTP client over an established connection.
pub struct SmtpClient<T: AsyncRead + AsyncWrite> {
    pub stream: T,
    pub timeout: Duration,
}

/// Connection settings used to open an [`SmtpClient`].
#[derive(Clone)]
pub struct SmtpClientBuilder<T: AsRef<str> + PartialEq + Eq + Hash> {
    pub timeout: Duration,
    pub tls_connector: TlsConnector,
    pub tls_hostname: T,
    pub security: Security,
    pub credentials: Option<Credentials>,
    pub addr: String,
    pub local_host: String,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connect(_)
            | Error::Io(_)
            | Error::UnparseableReply
            | Error::UnexpectedReply(_)
            | Error::Timeout => ErrorKind::Connection,
            Error::Tls(_)
            | Error::TlsHandshake(_)
            | Error::StartTlsRejected(_)
            | Error::MissingStartTls
            | Error::InvalidTlsName => ErrorKind::Tls,
            Error::AuthenticationFailed(_)
            | Error::UnsupportedAuthMechanism
            | Error::InvalidChallenge => ErrorKind::Authentication,
            Error::Rejected(_) => ErrorKind::Submission,
            Error::MissingMailFrom
            | Error::MissingRcptTo
            | Error::InvalidAddress(_)
            | Error::InvalidHeloHost
            | Error::MissingHost
            | Error::InvalidPort
            | Error::ConflictingTls
            | Error::MissingPassword
            | Error::Attachment { .. } => ErrorKind::Input,
        }
    }

    /// Reclassifies an unexpected reply, leaving other errors untouched.
    pub(crate) fn on_reply(self, map: fn(Response<String>) -> Error) -> Error {
        match self {
            Error::UnexpectedReply(reply) => map(reply),
            err => err,
        }
    }
}

struct DisplayReply<'x>(&'x Response<String>);

impl Display for DisplayReply<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.0.code(), self.0.message().trim_end())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Connect(e) => write!(f, "Failed to connect to SMTP server: {e}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Tls(e) => write!(f, "TLS error: {e}"),
            Error::TlsHandshake(e) => write!(f, "TLS handshake failed: {e}"),
            Error::UnparseableReply => write!(f, "Unparseable SMTP reply"),
            Error::UnexpectedReply(e) => write!(f, "Unexpected reply: {}", DisplayReply(e)),
            Error::StartTlsRejected(e) => write!(f, "STARTTLS rejected: {}", DisplayReply(e)),
            Error::MissingStartTls => write!(f, "STARTTLS extension unavailable"),
            Error::InvalidTlsName => write!(f, "Invalid TLS name provided"),
            Error::AuthenticationFailed(e) => {
                write!(f, "Authentication failed: {}", DisplayReply(e))
            }
            Error::UnsupportedAuthMechanism => write!(
                f,
                "The server does no support any of the available authentication methods"
            ),
            Error::InvalidChallenge => write!(f, "Invalid authentication challenge"),
            Error::Rejected(e) => write!(f, "Message rejected: {}", DisplayReply(e)),
            Error::MissingMailFrom => write!(f, "Missing message sender"),
            Error::MissingRcptTo => write!(f, "Missing message recipients"),
            Error::InvalidAddress(addr) => write!(f, "Invalid address {addr:?}"),
            Error::InvalidHeloHost => write!(f, "Invalid EHLO hostname"),
            Error::MissingHost => write!(f, "Missing SMTP server hostname"),
            Error::InvalidPort => write!(f, "Invalid SMTP port"),
            Error::ConflictingTls => {
                write!(f, "Implicit TLS and STARTTLS cannot be enabled together")
            }
            Error::MissingPassword => write!(f, "A password is required when a username is set"),
            Error::Attachment { path, err } => {
                write!(f, "Failed to read attachment {}: {err}", path.display())
            }
            Error::Timeout => write!(f, "Connection timeout"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connect(e) | Error::Io(e) | Error::TlsHandshake(e) => Some(e),
            Error::Attachment { err, .. } => Some(err),
            Error::Tls(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<rustls::Error> for Error {
    fn from(err: rustls::Error) -> Self {
        Error::Tls(Box::new(err))
    }
}

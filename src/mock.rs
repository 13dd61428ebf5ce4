/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! Scripted single-connection SMTP server for tests.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use rustls::ServerConfig;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpListener,
};
use tokio_rustls::TlsAcceptor;

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Advertise STARTTLS. Without `tls` the first byte sent after accepting
    /// it is recorded and the session ends.
    pub starttls: bool,
    /// Accepted username and password; AUTH is advertised when set.
    pub auth: Option<(String, String)>,
    pub auth_mechanisms: &'static str,
    /// Recipient answered with 550.
    pub reject_rcpt: Option<String>,
    /// Record the first byte of the connection without sending a greeting.
    pub probe_tls: bool,
    /// Server certificate used to complete STARTTLS or implicit TLS.
    pub tls: Option<Arc<ServerConfig>>,
    /// Accept TLS from the first byte, requires `tls`.
    pub implicit_tls: bool,
}

#[derive(Debug, Default)]
pub struct Session {
    pub commands: Vec<String>,
    pub messages: Vec<Vec<u8>>,
    pub tls_first_byte: Option<u8>,
    /// A TLS session was established.
    pub secure: bool,
}

pub struct MockServer {
    listener: TcpListener,
    config: MockConfig,
}

impl Default for MockConfig {
    fn default() -> Self {
        MockConfig {
            starttls: false,
            auth: None,
            auth_mechanisms: "PLAIN LOGIN",
            reject_rcpt: None,
            probe_tls: false,
            tls: None,
            implicit_tls: false,
        }
    }
}

/// Server configuration with a freshly generated self-signed certificate.
pub fn tls_config() -> Arc<ServerConfig> {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.serialize_private_key_der()));

    Arc::new(
        ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![CertificateDer::from(cert.serialize_der().unwrap())], key)
            .unwrap(),
    )
}

impl MockServer {
    pub async fn bind(config: MockConfig) -> Self {
        MockServer {
            listener: TcpListener::bind("127.0.0.1:0").await.unwrap(),
            config,
        }
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().unwrap().port()
    }

    /// Serves one connection and returns what the client sent.
    pub async fn run(self) -> Session {
        let (stream, _) = self.listener.accept().await.unwrap();
        let acceptor = self.config.tls.clone().map(TlsAcceptor::from);
        let mut session = Session::default();

        if self.config.probe_tls {
            let mut stream = stream;
            session.tls_first_byte = stream.read_u8().await.ok();
            return session;
        }

        if let (true, Some(acceptor)) = (self.config.implicit_tls, &acceptor) {
            let Ok(stream) = acceptor.accept(stream).await else {
                return session;
            };
            session.secure = true;
            let mut stream = BufReader::new(stream);
            reply(&mut stream, "220 mock.example.org ESMTP\r\n").await;
            self.serve(&mut stream, &mut session).await;
            return session;
        }

        let mut stream = BufReader::new(stream);
        reply(&mut stream, "220 mock.example.org ESMTP\r\n").await;
        if self.serve(&mut stream, &mut session).await {
            match acceptor {
                Some(acceptor) => {
                    let Ok(stream) = acceptor.accept(stream.into_inner()).await else {
                        return session;
                    };
                    session.secure = true;
                    self.serve(&mut BufReader::new(stream), &mut session).await;
                }
                None => {
                    session.tls_first_byte = stream.read_u8().await.ok();
                }
            }
        }

        session
    }

    /// Answers commands until QUIT or EOF. Returns `true` when STARTTLS was
    /// accepted and the connection has to be upgraded.
    async fn serve<S: AsyncRead + AsyncWrite + Unpin>(
        &self,
        stream: &mut BufReader<S>,
        session: &mut Session,
    ) -> bool {
        let offer_starttls = self.config.starttls && !session.secure;

        while let Some(line) = read_line(stream).await {
            session.commands.push(line.clone());
            let upper = line.to_ascii_uppercase();

            if upper.starts_with("EHLO ") {
                let mut response = String::from("250-mock.example.org\r\n");
                if offer_starttls {
                    response.push_str("250-STARTTLS\r\n");
                }
                if self.config.auth.is_some() {
                    response.push_str(&format!("250-AUTH {}\r\n", self.config.auth_mechanisms));
                }
                response.push_str("250 8BITMIME\r\n");
                reply(stream, &response).await;
            } else if upper == "STARTTLS" && offer_starttls {
                reply(stream, "220 2.0.0 Ready to start TLS\r\n").await;
                return true;
            } else if let Some(initial) = upper.strip_prefix("AUTH PLAIN ") {
                let initial = &line[line.len() - initial.len()..];
                let accepted = STANDARD
                    .decode(initial)
                    .ok()
                    .zip(self.config.auth.as_ref())
                    .is_some_and(|(decoded, (user, pass))| {
                        decoded == format!("\0{user}\0{pass}").as_bytes()
                    });
                auth_result(stream, accepted).await;
            } else if upper == "AUTH LOGIN" {
                reply(stream, "334 VXNlcm5hbWU6\r\n").await;
                let user = read_line(stream).await.unwrap_or_default();
                reply(stream, "334 UGFzc3dvcmQ6\r\n").await;
                let pass = read_line(stream).await.unwrap_or_default();
                let accepted = self.config.auth.as_ref().is_some_and(|(u, p)| {
                    STANDARD.decode(&user).ok().as_deref() == Some(u.as_bytes())
                        && STANDARD.decode(&pass).ok().as_deref() == Some(p.as_bytes())
                });
                auth_result(stream, accepted).await;
            } else if upper.starts_with("MAIL FROM:") {
                reply(stream, "250 2.1.0 OK\r\n").await;
            } else if upper.starts_with("RCPT TO:") {
                let rejected = self
                    .config
                    .reject_rcpt
                    .as_ref()
                    .is_some_and(|rcpt| line.contains(&format!("<{rcpt}>")));
                if rejected {
                    reply(stream, "550 5.1.1 No such user\r\n").await;
                } else {
                    reply(stream, "250 2.1.5 OK\r\n").await;
                }
            } else if upper == "DATA" {
                reply(stream, "354 Start mail input\r\n").await;
                let mut message = Vec::new();
                loop {
                    let mut data = Vec::new();
                    if stream.read_until(b'\n', &mut data).await.unwrap_or(0) == 0 {
                        return false;
                    } else if data == b".\r\n" {
                        break;
                    }
                    // Undo dot-stuffing
                    let data = if data.starts_with(b"..") {
                        &data[1..]
                    } else {
                        &data[..]
                    };
                    message.extend_from_slice(data);
                }
                session.messages.push(message);
                reply(stream, "250 2.0.0 Queued\r\n").await;
            } else if upper == "QUIT" {
                reply(stream, "221 2.0.0 Bye\r\n").await;
                break;
            } else {
                reply(stream, "502 5.5.1 Command not implemented\r\n").await;
            }
        }

        false
    }
}

async fn read_line<S: AsyncRead + Unpin>(stream: &mut BufReader<S>) -> Option<String> {
    let mut line = String::new();
    match stream.read_line(&mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

async fn reply<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut BufReader<S>, response: &str) {
    let stream = stream.get_mut();
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.flush().await;
}

async fn auth_result<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut BufReader<S>, accepted: bool) {
    if accepted {
        reply(stream, "235 2.7.0 Authentication successful\r\n").await;
    } else {
        reply(stream, "535 5.7.8 Authentication credentials invalid\r\n").await;
    }
}

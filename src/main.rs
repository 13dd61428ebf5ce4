/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::{ArgAction, Parser};
use log::LevelFilter;
use send_mail::{Attachment, Email, EmailSender, SmtpConfig};

/// Send an email via a custom SMTP server.
#[derive(Debug, Parser)]
#[command(name = "send-mail", version)]
struct Args {
    /// SMTP server hostname or IP
    #[arg(long, value_name = "HOST")]
    smtp_server: String,

    /// SMTP server port
    #[arg(long, default_value_t = 587)]
    smtp_port: u16,

    /// SMTP username
    #[arg(long, env = "SMTP_USERNAME")]
    username: Option<String>,

    /// SMTP password
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// From email address, defaults to the username
    #[arg(long = "from", visible_alias = "sender", value_name = "ADDRESS")]
    sender: Option<String>,

    /// Recipient(s), repeatable or comma separated
    #[arg(long, required = true, value_delimiter = ',', value_name = "ADDRESS")]
    to: Vec<String>,

    /// Email subject
    #[arg(long, default_value = "")]
    subject: String,

    /// Email body
    #[arg(long, default_value = "")]
    body: String,

    /// Send the body as HTML
    #[arg(long)]
    html: bool,

    /// Upgrade the connection with STARTTLS
    #[arg(long)]
    starttls: bool,

    /// Connect over TLS from the start (SMTPS)
    #[arg(long, visible_alias = "use-ssl")]
    ssl: bool,

    /// Accept invalid or self-signed server certificates
    #[arg(long)]
    allow_invalid_certs: bool,

    /// Path to attachment, can be repeated
    #[arg(long, value_name = "PATH")]
    attach: Vec<PathBuf>,

    /// Network timeout in seconds
    #[arg(long, default_value_t = 10, value_name = "SECONDS")]
    timeout: u64,

    /// Increase logging verbosity
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbosity: u8,
}

impl Args {
    fn recipients(&self) -> Vec<String> {
        self.to
            .iter()
            .map(|rcpt| rcpt.trim())
            .filter(|rcpt| !rcpt.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn config(&self) -> SmtpConfig {
        let mut config = SmtpConfig::new(self.smtp_server.as_str(), self.smtp_port)
            .starttls(self.starttls)
            .ssl(self.ssl)
            .allow_invalid_certs(self.allow_invalid_certs)
            .timeout(Duration::from_secs(self.timeout));
        config.username = self.username.clone();
        config.password = self.password.clone();
        config
    }

    fn email(&self) -> send_mail::Result<Email> {
        let mut email = Email::new().subject(self.subject.as_str());
        email = if self.html {
            email.html_body(self.body.as_str())
        } else {
            email.text_body(self.body.as_str())
        };
        if let Some(sender) = &self.sender {
            email = email.from(sender.as_str());
        }
        for rcpt in self.recipients() {
            email = email.to(rcpt);
        }
        for path in &self.attach {
            email = email.attach(Attachment::from_path(path)?);
        }
        Ok(email)
    }
}

fn init_logging(verbosity: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbosity {
        0 => (),
        1 => {
            builder.filter_level(LevelFilter::Info);
        }
        2 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    builder.init();
}

fn run(args: &Args) -> send_mail::Result<()> {
    let email = args.email()?;
    let sender = EmailSender::new(args.config());

    log::info!(
        "Sending \"{}\" to {} recipient(s) via {}:{}",
        email.subject,
        email.recipients.len(),
        args.smtp_server,
        args.smtp_port
    );
    sender.send(&email)?;
    log::info!("Message sent");

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbosity);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

//! Out-of-band delivery of confirmation messages.
//!
//! The flow only needs something that takes an address and a rendered body.
//! `LogSender` is the local dev default and never fails. `SmtpSender` mails the
//! body as plain text. `WebhookSender` hands the message to an HTTP relay (SMS
//! provider, chat bot) as JSON: `{"address": "...", "text": "..."}`.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

use crate::APP_USER_AGENT;

#[async_trait]
pub trait Sender: Send + Sync {
    /// Deliver `body` to `address` or return an error describing why it was not delivered.
    async fn send(&self, address: &str, body: &str) -> Result<()>;
}

#[derive(Clone, Debug, Default)]
pub struct LogSender;

#[async_trait]
impl Sender for LogSender {
    async fn send(&self, address: &str, body: &str) -> Result<()> {
        info!(address, body, "confirmation message send stub");
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    address: &'a str,
    text: &'a str,
}

#[derive(Clone, Debug)]
pub struct WebhookSender {
    client: Client,
    url: Url,
}

impl WebhookSender {
    /// Build a sender posting to `url`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Error creating webhook client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Sender for WebhookSender {
    #[instrument(skip(self, body), fields(url = %self.url))]
    async fn send(&self, address: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&WebhookMessage {
                address,
                text: body,
            })
            .send()
            .await
            .context("webhook request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("webhook responded with {status}");
        }

        Ok(())
    }
}

/// How the SMTP connection is secured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SmtpTls {
    /// Plain text, for local relays only.
    None,
    /// Upgrade with STARTTLS; refuse servers that do not offer it.
    #[default]
    StartTls,
    /// TLS from the first byte (SMTPS).
    Wrapper,
}

impl SmtpTls {
    const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Wrapper => 465,
        }
    }
}

#[derive(Debug)]
pub struct SmtpConfig {
    /// `host` or `host:port`.
    pub server: String,
    pub from: String,
    pub subject: String,
    pub user: Option<String>,
    pub password: Option<SecretString>,
    pub tls: SmtpTls,
}

/// Mails every message from a fixed sender with a fixed subject.
#[derive(Debug)]
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    subject: String,
}

impl SmtpSender {
    /// # Errors
    /// Returns an error if the sender address or server is invalid, or the TLS
    /// parameters cannot be built.
    pub fn new(config: SmtpConfig, timeout: Duration) -> Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .with_context(|| format!("invalid sender address: {}", config.from))?;
        let (host, port) = split_server(&config.server, config.tls.default_port())?;

        let builder = match config.tls {
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&host),
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host)
                .with_context(|| format!("Error creating SMTP client for {host}"))?,
            SmtpTls::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
                .with_context(|| format!("Error creating SMTP client for {host}"))?,
        };
        let mut builder = builder.port(port).timeout(Some(timeout));

        if let Some(user) = config.user {
            let password = config
                .password
                .as_ref()
                .map(|password| password.expose_secret().to_string())
                .unwrap_or_default();
            builder = builder.credentials(Credentials::new(user, password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            subject: config.subject,
        })
    }
}

fn split_server(server: &str, default_port: u16) -> Result<(String, u16)> {
    let server = server.trim();
    let (host, port) = match server.rsplit_once(':') {
        Some((host, port)) => (
            host,
            port.parse::<u16>()
                .with_context(|| format!("invalid SMTP port in {server}"))?,
        ),
        None => (server, default_port),
    };
    if host.is_empty() {
        bail!("missing SMTP host");
    }
    Ok((host.to_string(), port))
}

#[async_trait]
impl Sender for SmtpSender {
    #[instrument(skip(self, body))]
    async fn send(&self, address: &str, body: &str) -> Result<()> {
        let to: Mailbox = address
            .parse()
            .with_context(|| format!("invalid recipient address: {address}"))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(self.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("failed to build email")?;

        let response = self
            .transport
            .send(message)
            .await
            .context("smtp delivery failed")?;
        debug!(code = %response.code(), "email accepted");
        Ok(())
    }
}

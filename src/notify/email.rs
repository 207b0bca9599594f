use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};
use std::time::Duration;

use super::Notifier;
use crate::config::SmtpSettings;
use crate::error::CheckError;

pub const ENV_FROM: &str = "FROM_EMAIL";
pub const ENV_TO: &str = "TO_EMAIL";
pub const ENV_CC: &str = "CC_EMAIL";
pub const ENV_PASSWORD: &str = "APP_PASSWORD";

/// Mail credentials and endpoint, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub from: String,
    pub to: String,
    pub cc: Vec<String>,
    pub password: String,
    pub smtp: SmtpSettings,
}

impl EmailConfig {
    pub fn from_env(smtp: SmtpSettings) -> Result<Self, CheckError> {
        Self::from_lookup(smtp, |k| std::env::var(k).ok())
    }

    /// Empty values count as missing. Every missing variable is named, not just the first.
    pub fn from_lookup<F>(smtp: SmtpSettings, lookup: F) -> Result<Self, CheckError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let from = get(ENV_FROM);
        let to = get(ENV_TO);
        let password = get(ENV_PASSWORD);

        let missing: Vec<&str> = [(ENV_TO, &to), (ENV_FROM, &from), (ENV_PASSWORD, &password)]
            .into_iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k)
            .collect();

        match (from, to, password) {
            (Some(from), Some(to), Some(password)) => Ok(Self {
                from,
                to,
                cc: get(ENV_CC).map(|raw| parse_cc(&raw)).unwrap_or_default(),
                password,
                smtp,
            }),
            _ => Err(CheckError::ConfigurationMissing(missing.join(", "))),
        }
    }
}

/// Split a comma-separated CC list, dropping blanks.
pub fn parse_cc(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

struct Ready {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    cc: Vec<Mailbox>,
    timeout: Duration,
}

/// SMTP notifier. Built even when credentials are absent so that each source
/// reports `ConfigurationMissing` on its own line of the run summary.
pub struct EmailNotifier {
    ready: std::result::Result<Ready, String>,
}

impl EmailNotifier {
    /// Missing credentials are deferred to send time; malformed ones fail here.
    pub fn from_env(smtp: SmtpSettings) -> Result<Self> {
        match EmailConfig::from_env(smtp) {
            Ok(cfg) => Self::new(cfg),
            Err(CheckError::ConfigurationMissing(missing)) => {
                tracing::warn!(missing = %missing, "email credentials not set");
                Ok(Self {
                    ready: Err(missing),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn new(cfg: EmailConfig) -> Result<Self> {
        let from: Mailbox = cfg
            .from
            .parse()
            .with_context(|| format!("invalid {ENV_FROM}"))?;
        let to: Mailbox = cfg.to.parse().with_context(|| format!("invalid {ENV_TO}"))?;
        let cc = cfg
            .cc
            .iter()
            .map(|a| a.parse::<Mailbox>().with_context(|| format!("invalid {ENV_CC} entry {a:?}")))
            .collect::<Result<Vec<_>>>()?;

        let timeout = Duration::from_secs(cfg.smtp.timeout_secs);
        let creds = Credentials::new(cfg.from.clone(), cfg.password.clone());
        // 465 is implicit TLS; anything else negotiates STARTTLS.
        let builder = if cfg.smtp.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp.host)
        }
        .with_context(|| format!("invalid SMTP host {}", cfg.smtp.host))?;
        let mailer = builder
            .port(cfg.smtp.port)
            .credentials(creds)
            .timeout(Some(timeout))
            .build();

        Ok(Self {
            ready: Ok(Ready {
                mailer,
                from,
                to,
                cc,
                timeout,
            }),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.ready.is_ok()
    }
}

fn build_message(
    from: &Mailbox,
    to: &Mailbox,
    cc: &[Mailbox],
    subject: &str,
    body: &str,
) -> std::result::Result<Message, CheckError> {
    let mut builder = Message::builder().from(from.clone()).to(to.clone());
    for c in cc {
        builder = builder.cc(c.clone());
    }
    builder
        .subject(subject)
        .header(header::ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| CheckError::DeliveryFailed(format!("build email: {e}")))
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, subject: &str, body: &str) -> std::result::Result<(), CheckError> {
        let ready = self
            .ready
            .as_ref()
            .map_err(|missing| CheckError::ConfigurationMissing(missing.clone()))?;

        let msg = build_message(&ready.from, &ready.to, &ready.cc, subject, body)?;
        match tokio::time::timeout(ready.timeout, ready.mailer.send(msg)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(CheckError::DeliveryFailed(format!("send email: {e}"))),
            Err(_) => Err(CheckError::DeliveryFailed(format!(
                "send email: timed out after {}s",
                ready.timeout.as_secs()
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "email"
    }
}

//! Mail transport: configuration loading and the SMTP implementation.
//!
//! Settings come from `SMTP_*` environment variables (a `.env` file is
//! honored). A transport is only built when every required setting is
//! present; otherwise calls fail fast with a configuration error instead of
//! attempting a connection. Sending is blocking network I/O and is expected
//! to run on a blocking thread with the configured timeout.

use std::time::Duration;

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, Message, SmtpTransport, Transport};
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;

/// What the mail transport needs to know, possibly incomplete.
#[derive(Debug, Clone, Default)]
pub struct MailSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
    pub from_name: String,
    pub use_ssl: bool,
    pub timeout_seconds: u64,
}

/// Snapshot of the configuration state, served by the health endpoint.
#[derive(Debug, Serialize)]
pub struct MailConfigStatus {
    pub configured: bool,
    pub missing: Vec<&'static str>,
    pub host_set: bool,
    pub port_set: bool,
    pub user_set: bool,
    pub from_set: bool,
    pub use_ssl: bool,
}

/// Read an env var trimmed of surrounding whitespace and quotes. Returns
/// None for unset or blank values.
pub(crate) fn env_clean(name: &str) -> Option<String> {
    let raw = std::env::var(name).ok()?;
    let mut v = raw.trim();
    if (v.starts_with('"') && v.ends_with('"') && v.len() >= 2)
        || (v.starts_with('\'') && v.ends_with('\'') && v.len() >= 2)
    {
        v = v[1..v.len() - 1].trim();
    }
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

impl MailSettings {
    /// Load settings from the environment (and a `.env` file if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let user = env_clean("SMTP_USER");
        let from_address = env_clean("SMTP_FROM").or_else(|| user.clone());
        Self {
            host: env_clean("SMTP_HOST"),
            port: env_clean("SMTP_PORT").and_then(|p| p.parse().ok()),
            user,
            password: env_clean("SMTP_PASS"),
            from_address,
            from_name: env_clean("SMTP_FROM_NAME").unwrap_or_else(|| "School Updates".to_string()),
            use_ssl: env_clean("SMTP_USE_SSL").is_some_and(|v| v.to_lowercase() == "true"),
            timeout_seconds: env_clean("SMTP_TIMEOUT")
                .and_then(|t| t.parse().ok())
                .unwrap_or(15),
        }
    }

    /// Required settings that are absent.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.host.is_none() {
            missing.push("SMTP_HOST");
        }
        if self.port.is_none() {
            missing.push("SMTP_PORT");
        }
        if self.user.is_none() {
            missing.push("SMTP_USER");
        }
        if self.password.is_none() {
            missing.push("SMTP_PASS");
        }
        if self.from_address.is_none() {
            missing.push("SMTP_FROM");
        }
        missing
    }

    pub fn is_configured(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn status(&self) -> MailConfigStatus {
        MailConfigStatus {
            configured: self.is_configured(),
            missing: self.missing(),
            host_set: self.host.is_some(),
            port_set: self.port.is_some(),
            user_set: self.user.is_some(),
            from_set: self.from_address.is_some(),
            use_ssl: self.use_ssl,
        }
    }

    pub fn not_configured_error(&self) -> ApiError {
        ApiError::Configuration(format!(
            "SMTP is not configured (missing {})",
            self.missing().join("/")
        ))
    }
}

/// The external collaborator interface the dispatcher hands mail to.
///
/// `send` blocks on network I/O; callers run it via `spawn_blocking` so the
/// async runtime keeps serving unrelated requests.
pub trait MailTransport: Send + Sync {
    fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<(), ApiError>;

    /// Probe connectivity and credentials without sending anything.
    fn check(&self) -> Result<(), ApiError>;
}

/// SMTP transport over lettre. Implicit TLS when `use_ssl` is set or the
/// port is 465, STARTTLS otherwise.
#[derive(Debug)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_settings(settings: &MailSettings) -> Result<Self, ApiError> {
        if !settings.is_configured() {
            return Err(settings.not_configured_error());
        }
        // All present: is_configured() was checked above
        let (Some(host), Some(port), Some(user), Some(password), Some(from_address)) = (
            settings.host.clone(),
            settings.port,
            settings.user.clone(),
            settings.password.clone(),
            settings.from_address.clone(),
        ) else {
            return Err(settings.not_configured_error());
        };

        let address: Address = from_address
            .parse()
            .map_err(|e| ApiError::Configuration(format!("Invalid SMTP_FROM address: {e}")))?;
        let from = Mailbox::new(Some(settings.from_name.clone()), address);

        let tls_params = TlsParameters::new(host.clone())
            .map_err(|e| ApiError::Configuration(format!("TLS setup failed: {e}")))?;
        let tls = if settings.use_ssl || port == 465 {
            Tls::Wrapper(tls_params)
        } else {
            Tls::Required(tls_params)
        };

        let transport = SmtpTransport::builder_dangerous(host)
            .port(port)
            .tls(tls)
            .credentials(Credentials::new(user, password))
            .timeout(Some(Duration::from_secs(settings.timeout_seconds)))
            .build();

        Ok(Self { transport, from })
    }
}

impl MailTransport for SmtpMailer {
    fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<(), ApiError> {
        // One message per recipient so a rejected subset can be reported
        // instead of failing the whole batch opaquely.
        let mut refused = Vec::new();
        for to in recipients {
            let mailbox: Mailbox = match to.parse() {
                Ok(m) => m,
                Err(e) => {
                    refused.push(format!("{to} ({e})"));
                    continue;
                }
            };
            let message = match Message::builder()
                .from(self.from.clone())
                .to(mailbox)
                .subject(subject)
                .body(body.to_string())
            {
                Ok(m) => m,
                Err(e) => {
                    refused.push(format!("{to} ({e})"));
                    continue;
                }
            };
            match self.transport.send(&message) {
                Ok(_) => debug!(to = %to, "Email accepted by server"),
                Err(e) => refused.push(format!("{to} ({e})")),
            }
        }

        if refused.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Delivery(format!(
                "Some recipients were refused: {}",
                refused.join(", ")
            )))
        }
    }

    fn check(&self) -> Result<(), ApiError> {
        match self.transport.test_connection() {
            Ok(true) => Ok(()),
            Ok(false) => Err(ApiError::Delivery(
                "SMTP server did not respond to NOOP".to_string(),
            )),
            Err(e) => Err(ApiError::Delivery(e.to_string())),
        }
    }
}

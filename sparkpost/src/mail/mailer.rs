//! Mailer trait and SparkPost implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{
    Email, HeaderTranslator, HttpTransport, MailError, RequestHeaders, Transmission,
    TransmissionOptions, Transport, TransportResponse,
};
use crate::config::EnvConfig;

/// Async email sending trait.
///
/// Implement this trait to provide alternative email backends.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    /// Send an email, returning the API response on success.
    async fn send(&self, email: &Email) -> Result<TransportResponse, MailError>;
}

/// Configuration for the SparkPost mailer.
#[derive(Debug, Clone, Deserialize)]
pub struct SparkPostConfig {
    /// API key sent as the `Authorization` header.
    #[serde(default)]
    pub password: Option<String>,

    /// Transmissions endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Version reported in the `User-Agent` header.
    #[serde(default = "default_plugin_version")]
    pub plugin_version: String,

    /// Request timeout in seconds (default: 10).
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Open and click tracking (default: true).
    #[serde(default = "default_true")]
    pub enable_tracking: bool,

    /// Mark transmissions as transactional (default: true).
    #[serde(default = "default_true")]
    pub transactional: bool,

    /// Send from the SparkPost sandbox domain (default: false).
    #[serde(default)]
    pub sandbox: bool,
}

fn default_endpoint() -> String {
    "https://api.sparkpost.com/api/v1/transmissions".to_string()
}

fn default_plugin_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for SparkPostConfig {
    fn default() -> Self {
        Self {
            password: None,
            endpoint: default_endpoint(),
            plugin_version: default_plugin_version(),
            timeout: default_timeout(),
            enable_tracking: true,
            transactional: true,
            sandbox: false,
        }
    }
}

impl SparkPostConfig {
    pub fn transmission_options(&self) -> TransmissionOptions {
        TransmissionOptions {
            open_tracking: self.enable_tracking,
            click_tracking: self.enable_tracking,
            transactional: self.transactional,
            sandbox: self.sandbox,
        }
    }
}

/// Mailer that delivers through the SparkPost transmissions API.
pub struct SparkPostMailer<T = HttpTransport> {
    transport: Arc<T>,
    translator: HeaderTranslator,
    options: TransmissionOptions,
}

impl<T> Clone for SparkPostMailer<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            translator: self.translator.clone(),
            options: self.options.clone(),
        }
    }
}

impl SparkPostMailer {
    /// Create a mailer from `SPARKPOST_*` environment variables, loading `.env`
    /// first if present.
    pub fn from_env() -> Result<Self, MailError> {
        dotenvy::dotenv().ok();

        let config = SparkPostConfig::from_env_with_prefix("SPARKPOST")
            .map_err(|e| MailError::MissingConfig(e.to_string()))?;

        Self::from_config(config)
    }

    /// Create a mailer from explicit configuration.
    pub fn from_config(config: SparkPostConfig) -> Result<Self, MailError> {
        let transport =
            HttpTransport::new(&config.endpoint, Duration::from_secs(config.timeout))?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> SparkPostMailer<T> {
    /// Create a mailer that delivers through `transport`.
    pub fn with_transport(config: SparkPostConfig, transport: T) -> Self {
        let translator = HeaderTranslator::new(&config.plugin_version, config.password.clone());
        if !translator.has_password() {
            tracing::warn!("no SparkPost API key configured, Authorization will be empty");
        }

        Self {
            translator,
            options: config.transmission_options(),
            transport: Arc::new(transport),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Request headers, optionally with the API key masked for display.
    pub fn request_headers(&self, obfuscate: bool) -> RequestHeaders {
        self.translator.request_headers(obfuscate)
    }

    /// Assemble the request body for `email` without sending it.
    pub fn transmission(&self, email: &Email) -> Result<Transmission, MailError> {
        Transmission::assemble(email, &self.options)
    }
}

#[async_trait]
impl<T: Transport> Mailer for SparkPostMailer<T> {
    async fn send(&self, email: &Email) -> Result<TransportResponse, MailError> {
        let transmission = self.transmission(email)?;

        tracing::debug!(
            headers = ?self.translator.request_headers(true),
            recipients = transmission.recipients.len(),
            attachments = transmission.attachments.len(),
            "sending transmission"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(body = %transmission.redacted()?, "transmission body");
        }

        let response = self
            .transport
            .post(&self.translator.request_headers(false), &transmission)
            .await?;

        if !response.is_success() {
            tracing::warn!(status = response.status, body = %response.body, "transmission rejected");
            return Err(MailError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        if let Some(results) = response.results() {
            tracing::debug!(
                id = ?results.id,
                accepted = results.total_accepted_recipients,
                rejected = results.total_rejected_recipients,
                "transmission accepted"
            );
        }

        Ok(response)
    }
}

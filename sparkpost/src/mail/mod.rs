//! Email delivery through the SparkPost transmissions API.
//!
//! This module translates a composed [`Email`] into the JSON body and request
//! headers the SparkPost HTTP API expects, and hands both to a [`Transport`].
//!
//! # Quick Start
//!
//! ```ignore
//! // 1. Initialize mailer from environment
//! let mailer = SparkPostMailer::from_env()?;
//!
//! // 2. Compose a message
//! let mut email = Email::new();
//! email.set_from("me@example.com", Some("Me"))?;
//! email.add_address("user@example.com", None)?;
//! email.set_subject("Welcome!");
//! email.set_text("Thanks for signing up.");
//!
//! // 3. Send it
//! let response = mailer.send(&email).await?;
//! ```
//!
//! # Environment Variables
//!
//! The [`SparkPostMailer::from_env`] method reads:
//!
//! | Variable | Required | Description |
//! |----------|----------|-------------|
//! | `SPARKPOST_PASSWORD` | No | API key sent as `Authorization` (empty when unset) |
//! | `SPARKPOST_ENDPOINT` | No | Transmissions URL (default: SparkPost US endpoint) |
//! | `SPARKPOST_PLUGIN_VERSION` | No | Version reported in `User-Agent` |
//! | `SPARKPOST_TIMEOUT` | No | Request timeout in seconds (default: 10) |
//! | `SPARKPOST_ENABLE_TRACKING` | No | Open and click tracking (default: true) |
//! | `SPARKPOST_TRANSACTIONAL` | No | Mark transmissions transactional (default: true) |
//! | `SPARKPOST_SANDBOX` | No | Use the sandbox sending domain (default: false) |

mod headers;
mod mailer;
mod message;
mod payload;
mod transport;

pub use headers::{
    preserved_headers, FilteredHeaders, HeaderSource, HeaderTranslator, RequestHeaders,
    USER_AGENT_PRODUCT,
};
pub use mailer::{Mailer, SparkPostConfig, SparkPostMailer};
pub use message::{Address, Email, EmailBody, DEFAULT_MAILER, SPARKPOST_MAILER};
pub use payload::{
    attachments, header_to, recipients, Attachment, Content, Recipient, RecipientAddress,
    Sender, Transmission, TransmissionOptions,
};
pub use transport::{ApiError, HttpTransport, TransmissionResults, Transport, TransportResponse};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("missing required config: {0}")]
    MissingConfig(String),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("failed to read attachment {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode transmission: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("transmission rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

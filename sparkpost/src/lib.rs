//! Send email through the SparkPost transmissions API.
//!
//! A composed [`Email`] is translated into the JSON transmission body and the
//! request headers SparkPost expects, then handed to a [`Transport`].

pub mod config;
pub mod mail;

pub use crate::config::EnvConfig;
pub use mail::{
    Address, Email, HeaderSource, HttpTransport, MailError, Mailer, SparkPostConfig,
    SparkPostMailer, Transmission, Transport, TransportResponse,
};

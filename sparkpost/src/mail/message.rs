//! Email message composition.

use std::fmt;
use std::str::FromStr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use lettre::message::header::{self, HeaderName, HeaderValue, Headers};
use lettre::message::{Mailbox, Mailboxes};
use uuid::Uuid;

use super::headers::HeaderSource;
use super::MailError;

/// Transport selector of a freshly composed message.
pub const DEFAULT_MAILER: &str = "mail";

/// Transport selector identifying SparkPost delivery.
pub const SPARKPOST_MAILER: &str = "sparkpost";

/// An email address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub email: String,
    pub name: Option<String>,
}

impl Address {
    /// Create an address. An empty name is treated as no name.
    pub fn new(email: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            email: email.into(),
            name: name.filter(|n| !n.is_empty()).map(str::to_owned),
        }
    }

    fn mailbox(&self) -> Option<Mailbox> {
        let email = self.email.parse().ok()?;
        Some(Mailbox::new(self.name.clone(), email))
    }
}

/// Parses `email`, `<email>` or `Name <email>` (quoted names included).
impl FromStr for Address {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mailbox: Mailbox = s
            .trim()
            .parse()
            .map_err(|_| MailError::InvalidAddress(s.to_string()))?;
        Ok(Self::new(mailbox.email.to_string(), mailbox.name.as_deref()))
    }
}

/// Renders `name <email>`, or the bare email when there is no name.
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.email),
            None => f.write_str(&self.email),
        }
    }
}

/// The body content of an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailBody {
    /// Plain text only.
    Text(String),
    /// HTML only.
    Html(String),
    /// Both plain text and HTML (multipart/alternative).
    Multipart { text: String, html: String },
}

impl EmailBody {
    pub fn text(&self) -> Option<&str> {
        match self {
            EmailBody::Text(text) | EmailBody::Multipart { text, .. } => Some(text),
            EmailBody::Html(_) => None,
        }
    }

    pub fn html(&self) -> Option<&str> {
        match self {
            EmailBody::Html(html) | EmailBody::Multipart { html, .. } => Some(html),
            EmailBody::Text(_) => None,
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            EmailBody::Text(_) => "text/plain; charset=utf-8",
            EmailBody::Html(_) => "text/html; charset=utf-8",
            EmailBody::Multipart { .. } => "multipart/alternative",
        }
    }
}

/// A message under composition.
///
/// Recipient lists only grow: addresses are appended in call order and never
/// deduplicated. Attachments are kept as paths and read when a transmission is
/// assembled.
///
/// The `Message-ID` and `Date` are fixed when the message is created so that
/// repeated header rendering is stable.
#[derive(Debug, Clone)]
pub struct Email {
    from: Option<Address>,
    to: Vec<Address>,
    cc: Vec<Address>,
    bcc: Vec<Address>,
    reply_to: Vec<Address>,
    subject: String,
    body: Option<EmailBody>,
    attachments: Vec<PathBuf>,
    custom_headers: Vec<HeaderValue>,
    mailer: String,
    message_id: Uuid,
    date: SystemTime,
}

impl Default for Email {
    fn default() -> Self {
        Self::new()
    }
}

impl Email {
    pub fn new() -> Self {
        Self {
            from: None,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: Vec::new(),
            subject: String::new(),
            body: None,
            attachments: Vec::new(),
            custom_headers: Vec::new(),
            mailer: DEFAULT_MAILER.to_string(),
            message_id: Uuid::new_v4(),
            date: SystemTime::now(),
        }
    }

    /// Set the sender address.
    pub fn set_from(&mut self, email: &str, name: Option<&str>) -> Result<&mut Self, MailError> {
        self.from = Some(validated(email, name)?);
        Ok(self)
    }

    /// Add a primary recipient.
    pub fn add_address(&mut self, email: &str, name: Option<&str>) -> Result<&mut Self, MailError> {
        self.to.push(validated(email, name)?);
        Ok(self)
    }

    /// Add a CC recipient.
    pub fn add_cc(&mut self, email: &str, name: Option<&str>) -> Result<&mut Self, MailError> {
        self.cc.push(validated(email, name)?);
        Ok(self)
    }

    /// Add a BCC recipient.
    pub fn add_bcc(&mut self, email: &str, name: Option<&str>) -> Result<&mut Self, MailError> {
        self.bcc.push(validated(email, name)?);
        Ok(self)
    }

    /// Add a reply-to address.
    pub fn add_reply_to(&mut self, email: &str, name: Option<&str>) -> Result<&mut Self, MailError> {
        self.reply_to.push(validated(email, name)?);
        Ok(self)
    }

    /// Register a file to attach. The file is not read until the transmission
    /// is assembled.
    pub fn add_attachment(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.attachments.push(path.as_ref().to_path_buf());
        self
    }

    /// Add a custom header to the composed header block.
    pub fn add_custom_header(&mut self, name: &str, value: &str) -> Result<&mut Self, MailError> {
        let name = HeaderName::new_from_ascii(name.to_string())
            .map_err(|e| MailError::InvalidHeader(format!("{name}: {e}")))?;
        self.custom_headers
            .push(HeaderValue::new(name, value.to_string()));
        Ok(self)
    }

    /// Set the subject line.
    pub fn set_subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.subject = subject.into();
        self
    }

    /// Set plain text body content, keeping any HTML part.
    pub fn set_text(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        self.body = Some(match self.body.take() {
            Some(EmailBody::Html(html)) | Some(EmailBody::Multipart { html, .. }) => {
                EmailBody::Multipart { text, html }
            }
            _ => EmailBody::Text(text),
        });
        self
    }

    /// Set HTML body content, keeping any plain text part.
    pub fn set_html(&mut self, html: impl Into<String>) -> &mut Self {
        let html = html.into();
        self.body = Some(match self.body.take() {
            Some(EmailBody::Text(text)) | Some(EmailBody::Multipart { text, .. }) => {
                EmailBody::Multipart { text, html }
            }
            _ => EmailBody::Html(html),
        });
        self
    }

    /// Select SparkPost as the transport for this message.
    pub fn is_mail(&mut self) -> &mut Self {
        self.mailer = SPARKPOST_MAILER.to_string();
        self
    }

    /// Override the transport selector.
    pub fn set_mailer(&mut self, mailer: impl Into<String>) -> &mut Self {
        self.mailer = mailer.into();
        self
    }

    pub fn mailer(&self) -> &str {
        &self.mailer
    }

    pub fn from_address(&self) -> Option<&Address> {
        self.from.as_ref()
    }

    pub fn to(&self) -> &[Address] {
        &self.to
    }

    pub fn cc(&self) -> &[Address] {
        &self.cc
    }

    pub fn bcc(&self) -> &[Address] {
        &self.bcc
    }

    pub fn reply_to(&self) -> &[Address] {
        &self.reply_to
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> Option<&EmailBody> {
        self.body.as_ref()
    }

    pub fn attachments(&self) -> &[PathBuf] {
        &self.attachments
    }

    /// The `Message-ID` rendered in the header block.
    pub fn message_id(&self) -> String {
        let domain = self
            .from
            .as_ref()
            .and_then(|from| from.email.rsplit_once('@'))
            .map_or("localhost", |(_, domain)| domain);
        format!("<{}@{}>", self.message_id.simple(), domain)
    }
}

impl HeaderSource for Email {
    fn raw_header_block(&self) -> String {
        let mut headers = Headers::new();
        headers.set(header::Date::new(self.date));

        if self.to.is_empty() {
            headers.insert_raw(HeaderValue::new(
                HeaderName::new_from_ascii_str("To"),
                "undisclosed-recipients:;".to_string(),
            ));
        } else {
            headers.set(header::To::from(mailboxes(&self.to)));
        }
        if !self.cc.is_empty() {
            headers.set(header::Cc::from(mailboxes(&self.cc)));
        }
        if let Some(from) = self.from.as_ref().and_then(Address::mailbox) {
            headers.set(header::From::from(Mailboxes::new().with(from)));
        }
        headers.set(header::Subject::from(self.subject.clone()));
        if !self.reply_to.is_empty() {
            headers.set(header::ReplyTo::from(mailboxes(&self.reply_to)));
        }
        headers.set(header::MessageId::from(self.message_id()));
        headers.set(header::MIME_VERSION_1_0);

        let content_type = self
            .body
            .as_ref()
            .map_or("text/plain; charset=utf-8", EmailBody::content_type);
        headers.insert_raw(HeaderValue::new(
            HeaderName::new_from_ascii_str("Content-Type"),
            content_type.to_string(),
        ));
        headers.set(header::ContentTransferEncoding::EightBit);

        for custom in &self.custom_headers {
            headers.insert_raw(custom.clone());
        }

        headers.to_string()
    }
}

fn validated(email: &str, name: Option<&str>) -> Result<Address, MailError> {
    let _: lettre::Address = email
        .parse()
        .map_err(|_| MailError::InvalidAddress(email.to_string()))?;
    Ok(Address::new(email, name))
}

fn mailboxes(addresses: &[Address]) -> Mailboxes {
    addresses
        .iter()
        .filter_map(Address::mailbox)
        .fold(Mailboxes::new(), Mailboxes::with)
}

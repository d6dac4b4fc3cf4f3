//! Transmission request body.
//!
//! The SparkPost API validates the body strictly, so every type here serializes
//! to a fixed shape: optional keys are omitted rather than sent empty.

use std::path::{Path, PathBuf};

use base64::prelude::*;
use serde::Serialize;
use serde_json::Value;

use super::headers::{preserved_headers, FilteredHeaders};
use super::{Address, Email, MailError};

/// The `from` object of a transmission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sender {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Sender {
    pub fn from_address(address: &Address) -> Self {
        Self {
            email: address.email.clone(),
            name: address.name.clone().filter(|name| !name.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    pub address: RecipientAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientAddress {
    pub email: String,
    pub header_to: String,
}

/// The `To` line SparkPost shows to every recipient.
pub fn header_to(to: &[Address]) -> String {
    to.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Flatten all recipient roles into transmission recipients.
///
/// Entries are ordered To, then Bcc, then Cc, each in insertion order. Every
/// entry carries the same `header_to`, derived from the To role only.
pub fn recipients(to: &[Address], cc: &[Address], bcc: &[Address]) -> Vec<Recipient> {
    let header_to = header_to(to);

    to.iter()
        .chain(bcc)
        .chain(cc)
        .map(|address| Recipient {
            address: RecipientAddress {
                email: address.email.clone(),
                header_to: header_to.clone(),
            },
        })
        .collect()
}

/// An inline file attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub content_type: String,
    pub name: String,
    pub data: String,
}

impl Attachment {
    /// Read and encode a file. The MIME type is guessed from the extension and
    /// falls back to `application/octet-stream`.
    pub fn from_path(path: &Path) -> Result<Self, MailError> {
        let bytes = std::fs::read(path).map_err(|source| MailError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            content_type: mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
            name,
            data: BASE64_STANDARD.encode(bytes),
        })
    }
}

/// Encode every registered attachment, in registration order. The first
/// unreadable file aborts the whole list.
pub fn attachments(paths: &[PathBuf]) -> Result<Vec<Attachment>, MailError> {
    paths.iter().map(|path| Attachment::from_path(path)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransmissionOptions {
    pub open_tracking: bool,
    pub click_tracking: bool,
    pub transactional: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub sandbox: bool,
}

impl Default for TransmissionOptions {
    fn default() -> Self {
        Self {
            open_tracking: true,
            click_tracking: true,
            transactional: true,
            sandbox: false,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !value
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Content {
    pub from: Sender,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    pub headers: FilteredHeaders,
}

/// A complete transmission request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transmission {
    pub options: TransmissionOptions,
    pub content: Content,
    pub recipients: Vec<Recipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Transmission {
    /// Assemble the request body for `email`.
    ///
    /// Attachments are read here; a read failure aborts assembly.
    pub fn assemble(email: &Email, options: &TransmissionOptions) -> Result<Self, MailError> {
        let from = email
            .from_address()
            .ok_or_else(|| MailError::Build("from address required".into()))?;

        let reply_to = match email.reply_to() {
            [] => None,
            addresses => Some(
                addresses
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        };

        let body = email.body();
        let content = Content {
            from: Sender::from_address(from),
            subject: email.subject().to_string(),
            reply_to,
            text: body.and_then(|b| b.text()).map(str::to_owned),
            html: body.and_then(|b| b.html()).map(str::to_owned),
            headers: preserved_headers(email, email.cc()),
        };

        Ok(Self {
            options: options.clone(),
            content,
            recipients: recipients(email.to(), email.cc(), email.bcc()),
            attachments: attachments(email.attachments())?,
        })
    }

    pub fn to_json(&self) -> Result<String, MailError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, MailError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The body as JSON with attachment `data` left out, for logging.
    pub fn redacted(&self) -> Result<Value, MailError> {
        let mut body = serde_json::to_value(self)?;
        if let Some(attachments) = body.get_mut("attachments").and_then(Value::as_array_mut) {
            for attachment in attachments.iter_mut().filter_map(Value::as_object_mut) {
                attachment.remove("data");
            }
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    #[test]
    fn sender_with_name() {
        let sender = Sender::from_address(&Address::new("me@hello.com", Some("me")));
        assert_eq!(
            serde_json::to_value(sender).unwrap(),
            json!({ "name": "me", "email": "me@hello.com" })
        );
    }

    #[test]
    fn sender_without_name() {
        let sender = Sender::from_address(&Address::new("me@hello.com", Some("")));
        assert_eq!(
            serde_json::to_value(sender).unwrap(),
            json!({ "email": "me@hello.com" })
        );
    }

    #[test]
    fn recipients_order_to_bcc_cc() {
        let to = [
            Address::new("to@abc.com", None),
            Address::new("to1@abc.com", Some("to1")),
        ];
        let cc = [
            Address::new("cc@abc.com", None),
            Address::new("cc1@abc.com", Some("cc1")),
        ];
        let bcc = [
            Address::new("bcc@abc.com", None),
            Address::new("bcc1@abc.com", Some("bcc1")),
        ];

        let recipients = recipients(&to, &cc, &bcc);

        let header_to = "to@abc.com, to1 <to1@abc.com>";
        let expected: Vec<_> = [
            "to@abc.com",
            "to1@abc.com",
            "bcc@abc.com",
            "bcc1@abc.com",
            "cc@abc.com",
            "cc1@abc.com",
        ]
        .into_iter()
        .map(|email| json!({ "address": { "email": email, "header_to": header_to } }))
        .collect();

        assert_eq!(serde_json::to_value(recipients).unwrap(), json!(expected));
    }

    #[test]
    fn recipients_are_not_deduplicated_across_roles() {
        let to = [Address::new("same@abc.com", None)];
        let cc = [Address::new("same@abc.com", None)];

        let recipients = recipients(&to, &cc, &[]);

        assert_eq!(recipients.len(), 2);
        assert!(recipients
            .iter()
            .all(|r| r.address.email == "same@abc.com" && r.address.header_to == "same@abc.com"));
    }

    #[test]
    fn header_to_without_to_is_empty() {
        let recipients = recipients(&[], &[Address::new("cc@abc.com", None)], &[]);
        assert_eq!(recipients[0].address.header_to, "");
    }

    #[test]
    fn attachment_defaults_to_octet_stream() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"TEST").unwrap();

        let attachments = attachments(&[file.path().to_path_buf()]).unwrap();

        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].content_type, "application/octet-stream");
        assert_eq!(
            attachments[0].name,
            file.path().file_name().unwrap().to_string_lossy()
        );
        assert_eq!(attachments[0].data, BASE64_STANDARD.encode("TEST"));
        assert_eq!(attachments[0].data, "VEVTVA==");
    }

    #[test]
    fn attachment_type_guessed_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let attachment = Attachment::from_path(&path).unwrap();

        assert_eq!(attachment.content_type, "text/plain");
        assert_eq!(attachment.name, "notes.txt");
        assert_eq!(
            serde_json::to_value(&attachment).unwrap(),
            json!({ "type": "text/plain", "name": "notes.txt", "data": "aGVsbG8=" })
        );
    }

    #[test]
    fn unreadable_attachment_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.txt");
        std::fs::write(&good, "ok").unwrap();
        let missing = dir.path().join("missing.bin");

        let err = attachments(&[good, missing.clone()]).unwrap_err();

        assert!(matches!(err, MailError::Io { path, .. } if path == missing));
    }

    #[test]
    fn assemble_requires_from() {
        let mut email = Email::new();
        email.add_address("to@abc.com", None).unwrap();

        let result = Transmission::assemble(&email, &TransmissionOptions::default());
        assert!(matches!(result, Err(MailError::Build(_))));
    }

    #[test]
    fn assemble_full_payload() {
        let mut email = Email::new();
        email.set_from("me@hello.com", Some("me")).unwrap();
        email.add_address("to@abc.com", None).unwrap();
        email.add_cc("cc@abc.com", Some("Cc")).unwrap();
        email.add_reply_to("replyto@hello.com", None).unwrap();
        email.set_subject("Hello").set_text("Body");

        let transmission = Transmission::assemble(&email, &TransmissionOptions::default()).unwrap();
        let json = serde_json::to_value(&transmission).unwrap();

        assert_eq!(json["options"], json!({
            "open_tracking": true,
            "click_tracking": true,
            "transactional": true,
        }));
        assert_eq!(json["content"]["from"], json!({ "email": "me@hello.com", "name": "me" }));
        assert_eq!(json["content"]["subject"], "Hello");
        assert_eq!(json["content"]["text"], "Body");
        assert_eq!(json["content"]["reply_to"], "replyto@hello.com");
        assert!(json["content"].get("html").is_none());
        assert_eq!(json["content"]["headers"]["CC"], "Cc <cc@abc.com>");
        assert_eq!(
            json["content"]["headers"]["Message-ID"],
            email.message_id().as_str()
        );
        assert!(json["content"]["headers"].get("Date").is_some());
        assert_eq!(json["recipients"].as_array().unwrap().len(), 2);
        assert!(json.get("attachments").is_none());
    }

    #[test]
    fn only_date_and_message_id_leave_the_header_block() {
        for n in 40..120 {
            let mut email = Email::new();
            email.set_from("me@hello.com", Some("Me")).unwrap();
            email.add_address("to@abc.com", None).unwrap();
            email.add_reply_to("replyto@hello.com", None).unwrap();
            email.add_custom_header("X-Campaign", "welcome").unwrap();
            email.set_subject(format!("{} Date: spoofed-{n} Message-ID: <spoofed@x>", "x".repeat(n)));

            let transmission =
                Transmission::assemble(&email, &TransmissionOptions::default()).unwrap();
            let headers = &transmission.content.headers;

            let mut keys: Vec<_> = headers.keys().collect();
            keys.sort_unstable();
            assert_eq!(keys, vec!["Date", "Message-ID"], "subject length {n}");
            assert!(!headers.get("Date").unwrap().contains("spoofed"));
            assert_eq!(headers.get("Message-ID"), Some(email.message_id().as_str()));
        }
    }

    #[test]
    fn redacted_body_leaves_out_attachment_data() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"TEST").unwrap();

        let mut email = Email::new();
        email.set_from("me@hello.com", None).unwrap();
        email.add_address("to@abc.com", None).unwrap();
        email.add_attachment(file.path());

        let transmission = Transmission::assemble(&email, &TransmissionOptions::default()).unwrap();
        let redacted = transmission.redacted().unwrap();

        let attachment = &redacted["attachments"][0];
        assert!(attachment.get("data").is_none());
        assert_eq!(attachment["type"], "application/octet-stream");
        assert_eq!(redacted["recipients"], serde_json::to_value(&transmission.recipients).unwrap());
        assert_eq!(transmission.attachments[0].data, "VEVTVA==");
    }

    #[test]
    fn sandbox_option_only_when_enabled() {
        let options = TransmissionOptions {
            sandbox: true,
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&options).unwrap()["sandbox"], true);
        assert!(serde_json::to_value(TransmissionOptions::default())
            .unwrap()
            .get("sandbox")
            .is_none());
    }

    #[test]
    fn assembly_is_deterministic() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"TEST").unwrap();

        let mut email = Email::new();
        email.set_from("me@hello.com", None).unwrap();
        email.add_address("to@abc.com", Some("To")).unwrap();
        email.add_bcc("bcc@abc.com", None).unwrap();
        email.add_cc("cc@abc.com", None).unwrap();
        email.add_attachment(file.path());
        email.set_subject("Hello").set_html("<p>Hi</p>").set_text("Hi");

        let options = TransmissionOptions::default();
        let first = Transmission::assemble(&email, &options).unwrap().to_json().unwrap();
        let second = Transmission::assemble(&email, &options).unwrap().to_json().unwrap();

        assert_eq!(first, second);
    }
}

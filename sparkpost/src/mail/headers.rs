//! Request headers and the preserved subset of message headers.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::Address;

/// Product token reported in the `User-Agent` header.
pub const USER_AGENT_PRODUCT: &str = "wordpress-sparkpost";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Width of an obfuscated key, including the visible prefix.
const MASKED_KEY_WIDTH: usize = 40;
const VISIBLE_KEY_CHARS: usize = 4;

/// Message headers that survive translation, in addition to the synthesized `CC`.
const PRESERVED_HEADERS: [&str; 2] = ["Message-ID", "Date"];

/// Source of a serialized RFC 822 style header block.
pub trait HeaderSource {
    /// Header lines in `Key: Value` form.
    fn raw_header_block(&self) -> String;
}

/// Headers sent with every transmission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestHeaders {
    #[serde(rename = "User-Agent")]
    pub user_agent: String,
    #[serde(rename = "Content-Type")]
    pub content_type: String,
    #[serde(rename = "Authorization")]
    pub authorization: String,
}

impl RequestHeaders {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("User-Agent", self.user_agent.as_str()),
            ("Content-Type", self.content_type.as_str()),
            ("Authorization", self.authorization.as_str()),
        ]
        .into_iter()
    }
}

/// Builds request headers from the configured API key.
///
/// The key is opaque in `Debug` output to prevent leaking it through logs.
#[derive(Clone)]
pub struct HeaderTranslator {
    user_agent: String,
    password: Option<String>,
}

impl fmt::Debug for HeaderTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderTranslator")
            .field("user_agent", &self.user_agent)
            .field("password", &self.password.as_deref().map(obfuscate_key))
            .finish()
    }
}

impl HeaderTranslator {
    /// `version` is reported as `wordpress-sparkpost/<version>`. An empty
    /// password is treated as absent.
    pub fn new(version: &str, password: Option<String>) -> Self {
        Self {
            user_agent: format!("{USER_AGENT_PRODUCT}/{version}"),
            password: password.filter(|p| !p.is_empty()),
        }
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Build the request headers.
    ///
    /// With `obfuscate`, only the first four characters of the key are kept
    /// and the rest is masked out to a fixed width, for diagnostic output.
    pub fn request_headers(&self, obfuscate: bool) -> RequestHeaders {
        let authorization = match &self.password {
            Some(key) if obfuscate => obfuscate_key(key),
            Some(key) => key.clone(),
            None => String::new(),
        };

        RequestHeaders {
            user_agent: self.user_agent.clone(),
            content_type: JSON_CONTENT_TYPE.to_string(),
            authorization,
        }
    }
}

fn obfuscate_key(key: &str) -> String {
    let visible: String = key.chars().take(VISIBLE_KEY_CHARS).collect();
    format!(
        "{visible}{}",
        "*".repeat(MASKED_KEY_WIDTH - VISIBLE_KEY_CHARS)
    )
}

/// Ordered header mapping carried in the transmission content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredHeaders(Vec<(String, String)>);

impl FilteredHeaders {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // A repeated key keeps its first position.
    fn insert(&mut self, name: &str, value: String) {
        match self.0.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((name.to_string(), value)),
        }
    }
}

impl Serialize for FilteredHeaders {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Extract the headers that are forwarded with a transmission.
///
/// Only `Message-ID` and `Date` are taken from the raw block, in the order they
/// appear. Folded continuation lines belong to the header above them. When
/// `cc` is non-empty a `CC` entry is appended. Lines that are not `Key: Value`
/// pairs are ignored.
pub fn preserved_headers(source: &dyn HeaderSource, cc: &[Address]) -> FilteredHeaders {
    let mut headers = FilteredHeaders::default();

    for line in unfold(&source.raw_header_block()) {
        let Some((key, value)) = split_header_line(&line) else {
            continue;
        };
        if let Some(name) = PRESERVED_HEADERS
            .iter()
            .find(|name| name.eq_ignore_ascii_case(key))
        {
            headers.insert(name, value.to_string());
        }
    }

    if !cc.is_empty() {
        let cc = cc
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        headers.insert("CC", cc);
    }

    headers
}

/// Join folded header lines.
///
/// Indentation shared by every line after the first is removed before
/// folding, so a uniformly indented block reads as one header per line.
fn unfold(raw: &str) -> Vec<String> {
    let mut lines = raw.lines();
    let Some(first) = lines.next() else {
        return Vec::new();
    };
    let rest: Vec<&str> = lines.filter(|line| !line.trim().is_empty()).collect();
    let indent = rest
        .iter()
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut headers = vec![first.trim().to_string()];
    for line in rest {
        let line = line.get(indent..).unwrap_or_else(|| line.trim_start());
        match headers.last_mut() {
            Some(previous) if line.starts_with(char::is_whitespace) => {
                previous.push(' ');
                previous.push_str(line.trim());
            }
            _ => headers.push(line.trim_end().to_string()),
        }
    }
    headers
}

fn split_header_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.trim().split_once(':')?;
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key, value.trim()))
}

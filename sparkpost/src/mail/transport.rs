//! HTTP transport for transmission requests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;

use super::{MailError, RequestHeaders, Transmission};

/// Delivers a transmission request body.
///
/// Implement this trait to replace the HTTP client, e.g. in tests.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// POST the transmission and return the raw response.
    ///
    /// Any HTTP response, successful or not, is returned as `Ok`.
    async fn post(
        &self,
        headers: &RequestHeaders,
        transmission: &Transmission,
    ) -> Result<TransportResponse, MailError>;
}

/// Status and body exactly as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// The `results` object of an accepted transmission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransmissionResults {
    #[serde(default)]
    pub total_rejected_recipients: u64,
    #[serde(default)]
    pub total_accepted_recipients: u64,
    pub id: Option<String>,
}

/// An entry of the `errors` array of a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    pub message: String,
    pub description: Option<String>,
    pub code: Option<String>,
}

#[derive(Deserialize)]
struct ResultsEnvelope {
    results: TransmissionResults,
}

#[derive(Deserialize)]
struct ErrorsEnvelope {
    errors: Vec<ApiError>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the `results` object, if the body carries one.
    pub fn results(&self) -> Option<TransmissionResults> {
        serde_json::from_str::<ResultsEnvelope>(&self.body)
            .ok()
            .map(|envelope| envelope.results)
    }

    /// Decode the `errors` array. Empty when the body has none.
    pub fn errors(&self) -> Vec<ApiError> {
        serde_json::from_str::<ErrorsEnvelope>(&self.body)
            .map(|envelope| envelope.errors)
            .unwrap_or_default()
    }
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

fn header_map(headers: &RequestHeaders) -> Result<HeaderMap, MailError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers.iter() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| MailError::InvalidHeader(format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| MailError::InvalidHeader(format!("{name}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        headers: &RequestHeaders,
        transmission: &Transmission,
    ) -> Result<TransportResponse, MailError> {
        let body = serde_json::to_vec(transmission)?;

        let response = self
            .client
            .post(&self.endpoint)
            .headers(header_map(headers)?)
            .body(body)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> TransportResponse {
        TransportResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn decodes_results() {
        let response = response(
            200,
            r#"{"results":{"total_rejected_recipients":0,"total_accepted_recipients":2,"id":"11668787484950529"}}"#,
        );

        assert!(response.is_success());
        assert_eq!(
            response.results(),
            Some(TransmissionResults {
                total_rejected_recipients: 0,
                total_accepted_recipients: 2,
                id: Some("11668787484950529".into()),
            })
        );
        assert!(response.errors().is_empty());
    }

    #[test]
    fn decodes_errors() {
        let response = response(
            401,
            r#"{"errors":[{"message":"Unauthorized.","code":"1000"}]}"#,
        );

        assert!(!response.is_success());
        assert_eq!(response.results(), None);
        assert_eq!(
            response.errors(),
            vec![ApiError {
                message: "Unauthorized.".into(),
                description: None,
                code: Some("1000".into()),
            }]
        );
    }

    #[test]
    fn non_json_body_has_no_results_or_errors() {
        let response = response(502, "Bad Gateway");
        assert_eq!(response.results(), None);
        assert!(response.errors().is_empty());
    }

    #[test]
    fn request_headers_convert_to_header_map() {
        let headers = RequestHeaders {
            user_agent: "wordpress-sparkpost/1.0.0".into(),
            content_type: "application/json".into(),
            authorization: "".into(),
        };

        let map = header_map(&headers).unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map["user-agent"], "wordpress-sparkpost/1.0.0");
        assert_eq!(map["content-type"], "application/json");
        assert_eq!(map["authorization"], "");
    }

    #[test]
    fn rejects_unrepresentable_header_value() {
        let headers = RequestHeaders {
            user_agent: "ua".into(),
            content_type: "application/json".into(),
            authorization: "bad\nkey".into(),
        };

        assert!(matches!(header_map(&headers), Err(MailError::InvalidHeader(_))));
    }
}

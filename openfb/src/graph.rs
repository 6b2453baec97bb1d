use crate::error::{OpenFbError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Fallback message when an error response carries no usable body.
pub const GENERIC_ERROR_MESSAGE: &str = "An error has occurred";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = OpenFbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(OpenFbError::Other(format!("Unsupported HTTP method: {}", other))),
        }
    }
}

/// A graph API call. The access token is appended by the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphRequest {
    pub method: HttpMethod,
    /// Path under the graph base, e.g. `/me` or `/me/friends`.
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl GraphRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            params: Vec::new(),
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            ..Self::get(path)
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Delete,
            ..Self::get(path)
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

/// Error object returned by the graph API (`{"error": {...}}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphError {
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// HTTP status of the response; not part of the provider payload.
    #[serde(skip)]
    pub status: Option<u16>,
}

impl GraphError {
    pub fn generic(status: Option<u16>) -> Self {
        Self {
            message: GENERIC_ERROR_MESSAGE.into(),
            error_type: None,
            code: None,
            status,
        }
    }

    /// Parse an error response body. Missing or unparseable bodies fall back
    /// to [`GENERIC_ERROR_MESSAGE`].
    pub fn from_body(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct Envelope {
            error: GraphError,
        }

        if body.trim().is_empty() {
            return Self::generic(Some(status));
        }
        match serde_json::from_str::<Envelope>(body) {
            Ok(env) => GraphError {
                status: Some(status),
                ..env.error
            },
            Err(_) => Self::generic(Some(status)),
        }
    }

    /// The token itself is no longer valid: code 190 or HTTP 401.
    ///
    /// Other `OAuthException`s (rate limits, missing permissions) leave the
    /// token usable and are not rejections.
    pub fn is_auth_rejection(&self) -> bool {
        self.code == Some(190) || self.status == Some(401)
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.error_type, self.status) {
            (Some(t), _) => write!(f, "{} ({})", self.message, t),
            (None, Some(status)) => write!(f, "{} (HTTP {})", self.message, status),
            (None, None) => f.write_str(&self.message),
        }
    }
}

/// Raw response handed back by a transport.
#[derive(Debug, Clone)]
pub struct GraphResponse {
    pub status: u16,
    pub body: String,
}

impl GraphResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode a successful body as JSON, or turn the response into a [`GraphError`].
    pub fn into_result(self) -> Result<serde_json::Value> {
        if !self.is_success() {
            return Err(OpenFbError::Graph(GraphError::from_body(self.status, &self.body)));
        }
        if self.body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// HTTP capability used for graph calls.
#[async_trait]
pub trait GraphTransport: Send + Sync {
    /// Issue `method url` and return the status and body. Only network-level
    /// failures are errors; non-2xx statuses are returned as responses.
    async fn send(&self, method: HttpMethod, url: &str) -> Result<GraphResponse>;
}

/// Default transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("openfb/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphTransport for ReqwestTransport {
    async fn send(&self, method: HttpMethod, url: &str) -> Result<GraphResponse> {
        let builder = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Delete => self.client.delete(url),
        };
        let resp = builder.header("Accept", "application/json").send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok(GraphResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_is_parsed() {
        let body = r#"{"error":{"message":"Invalid OAuth access token.","type":"OAuthException","code":190}}"#;
        let err = GraphError::from_body(400, body);
        assert_eq!(err.message, "Invalid OAuth access token.");
        assert_eq!(err.error_type.as_deref(), Some("OAuthException"));
        assert_eq!(err.code, Some(190));
        assert_eq!(err.status, Some(400));
        assert!(err.is_auth_rejection());
    }

    #[test]
    fn throttling_and_permission_errors_keep_the_token() {
        for code in [4, 10, 17, 200, 613] {
            let body = format!(
                r#"{{"error":{{"message":"(#{code}) nope","type":"OAuthException","code":{code}}}}}"#
            );
            let err = GraphError::from_body(400, &body);
            assert_eq!(err.code, Some(code));
            assert!(!err.is_auth_rejection(), "code {code}");
        }
    }

    #[test]
    fn missing_or_garbled_body_uses_generic_message() {
        assert_eq!(GraphError::from_body(500, "").message, GENERIC_ERROR_MESSAGE);
        assert_eq!(
            GraphError::from_body(502, "<html>bad gateway</html>").message,
            GENERIC_ERROR_MESSAGE
        );
        assert!(!GraphError::from_body(500, "").is_auth_rejection());
    }

    #[test]
    fn success_body_decodes_json() {
        let resp = GraphResponse {
            status: 200,
            body: r#"{"id":"42","name":"Ada"}"#.into(),
        };
        let value = resp.into_result().unwrap();
        assert_eq!(value["name"], "Ada");

        let empty = GraphResponse {
            status: 204,
            body: String::new(),
        };
        assert_eq!(empty.into_result().unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn failure_status_becomes_graph_error() {
        let resp = GraphResponse {
            status: 403,
            body: String::new(),
        };
        match resp.into_result() {
            Err(OpenFbError::Graph(err)) => {
                assert_eq!(err.status, Some(403));
                assert!(!err.is_auth_rejection());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn method_parsing() {
        assert_eq!("delete".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert_eq!(HttpMethod::default(), HttpMethod::Get);
        assert!("PATCH".parse::<HttpMethod>().is_err());
    }
}

use crate::graph::GraphError;

/// Errors from client operations.
///
/// Login outcomes (cancellation, provider rejection, ...) are reported as
/// [`crate::LoginOutcome`] values. This type covers failures that stop an
/// operation before it can produce an outcome.
#[derive(Debug, thiserror::Error)]
pub enum OpenFbError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Login surface error: {0}")]
    Surface(String),

    #[error("Graph API error: {0}")]
    Graph(GraphError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Query encoding error: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),

    #[error("{0}")]
    Other(String),
}

impl OpenFbError {
    /// True when the provider refused the access token itself (expired,
    /// revoked, or never valid), as opposed to a transport failure.
    pub fn is_auth_rejection(&self) -> bool {
        match self {
            OpenFbError::Graph(err) => err.is_auth_rejection(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, OpenFbError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_err(status: u16, error_type: Option<&str>, code: Option<i64>) -> OpenFbError {
        OpenFbError::Graph(GraphError {
            message: "boom".into(),
            error_type: error_type.map(String::from),
            code,
            status: Some(status),
        })
    }

    #[test]
    fn auth_rejection_for_invalid_token() {
        assert!(graph_err(400, Some("OAuthException"), Some(190)).is_auth_rejection());
        assert!(graph_err(401, None, None).is_auth_rejection());
        assert!(!graph_err(400, Some("OAuthException"), Some(4)).is_auth_rejection());
    }

    #[test]
    fn server_errors_are_not_auth_rejections() {
        assert!(!graph_err(500, None, None).is_auth_rejection());
        assert!(!OpenFbError::Surface("gone".into()).is_auth_rejection());
        assert!(!OpenFbError::Other("401 Unauthorized".into()).is_auth_rejection());
    }
}

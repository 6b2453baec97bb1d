use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error code reported when the user closes the login window.
pub const USER_CANCELLED: &str = "user_cancelled";
/// Error code reported when a stored token was refused by the provider.
pub const REVOKED_ACCESS: &str = "revoked_access";

/// Token data extracted from a successful redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    /// Lifetime reported by the provider, in seconds on the wire.
    #[serde(default, with = "duration_secs", skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<Duration>,
    /// User identifier taken from the signed request, when one was returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl AuthResponse {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in: None,
            user_id: None,
        }
    }

    /// Absolute expiry given the moment the token was received.
    pub fn expires_at(&self, received_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let lifetime = chrono::Duration::from_std(self.expires_in?).ok()?;
        received_at.checked_add_signed(lifetime)
    }
}

/// Result of a single login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Connected(AuthResponse),
    NotAuthorized { provider_error: Option<String> },
    UserCancelled,
    /// The network went away while the embedded login view was open.
    Disconnected,
    ConfigurationError { message: String },
}

impl LoginOutcome {
    pub fn not_authorized(provider_error: impl Into<String>) -> Self {
        LoginOutcome::NotAuthorized {
            provider_error: Some(provider_error.into()),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, LoginOutcome::Connected(_))
    }

    pub fn access_token(&self) -> Option<&str> {
        match self {
            LoginOutcome::Connected(auth) => Some(&auth.access_token),
            _ => None,
        }
    }

    /// Provider-style error code (`error` / `error_reason`).
    pub fn error_code(&self) -> Option<&str> {
        match self {
            LoginOutcome::Connected(_) => None,
            LoginOutcome::NotAuthorized { provider_error } => provider_error.as_deref(),
            LoginOutcome::UserCancelled => Some(USER_CANCELLED),
            LoginOutcome::Disconnected => Some("disconnected"),
            LoginOutcome::ConfigurationError { .. } => Some("configuration_error"),
        }
    }

    pub fn error_description(&self) -> Option<String> {
        match self {
            LoginOutcome::Connected(_) => None,
            LoginOutcome::NotAuthorized { provider_error: Some(e) } => {
                Some(format!("Login was not authorized: {}", e))
            }
            LoginOutcome::NotAuthorized { provider_error: None } => {
                Some("Login was not authorized".into())
            }
            LoginOutcome::UserCancelled => Some("User cancelled login process".into()),
            LoginOutcome::Disconnected => Some("Network connection lost during login".into()),
            LoginOutcome::ConfigurationError { message } => Some(message.clone()),
        }
    }

    /// Status view of this outcome, as returned by the provider's own SDK.
    pub fn to_status(&self) -> LoginStatus {
        match self {
            LoginOutcome::Connected(auth) => LoginStatus::Connected {
                auth_response: auth.clone(),
            },
            LoginOutcome::ConfigurationError { .. } => LoginStatus::Unknown,
            other => LoginStatus::NotAuthorized {
                error: other.error_code().map(String::from),
            },
        }
    }
}

/// Login status of the session, serialized the way the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginStatus {
    Connected {
        #[serde(rename = "authResponse")]
        auth_response: AuthResponse,
    },
    NotAuthorized {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Unknown,
}

impl LoginStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, LoginStatus::Connected { .. })
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_u64(d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

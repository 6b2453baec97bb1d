use crate::error::{OpenFbError, Result};
use crate::oauth::WEBVIEW_REDIRECT_URI;
use crate::surface::SurfaceKind;
use serde::{Deserialize, Serialize};

/// Where the login page is shown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Platform {
    /// A popup window in a browser; the redirect lands on a page under `origin`.
    Browser {
        /// Scheme, host and port, e.g. `http://localhost:8100`.
        origin: String,
        /// Application path prefix, e.g. `/myapp`. Empty for the root.
        #[serde(default)]
        context_path: String,
    },
    /// An embedded browser view that reports navigation events.
    #[default]
    Webview,
}

impl Platform {
    pub fn surface_kind(&self) -> SurfaceKind {
        match self {
            Platform::Browser { .. } => SurfaceKind::Popup,
            Platform::Webview => SurfaceKind::Webview,
        }
    }
}

/// Parameters accepted by [`crate::OpenFb::configure`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigureParams {
    #[serde(default)]
    pub app_id: String,
    /// Default permission scope, e.g. `email,public_profile`.
    #[serde(default)]
    pub scope: Option<String>,
    /// Explicit redirect URI; overrides the per-platform defaults below.
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub browser_redirect_uri: Option<String>,
    #[serde(default)]
    pub webview_redirect_uri: Option<String>,
    /// Target of the provider-side logout redirect. Provider logout is
    /// skipped when unset.
    #[serde(default)]
    pub logout_redirect_uri: Option<String>,
    #[serde(default)]
    pub platform: Platform,
    /// Extra parameters appended to the authorization URL.
    #[serde(default)]
    pub extra_params: Vec<(String, String)>,
    /// `response_type` sent to the provider; defaults to `token`.
    #[serde(default)]
    pub response_type: Option<String>,
    /// Graph API version prefix, e.g. `v19.0`.
    #[serde(default)]
    pub graph_version: Option<String>,
    /// Check stored tokens against the provider in `get_login_status`.
    #[serde(default)]
    pub validate_status: bool,
}

impl ConfigureParams {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            ..Default::default()
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_logout_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.logout_redirect_uri = Some(uri.into());
        self
    }

    pub fn with_extra_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((key.into(), value.into()));
        self
    }

    pub fn with_graph_version(mut self, version: impl Into<String>) -> Self {
        self.graph_version = Some(version.into());
        self
    }

    pub fn with_validate_status(mut self, validate: bool) -> Self {
        self.validate_status = validate;
        self
    }
}

/// Validated configuration held by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub app_id: String,
    pub scope: String,
    pub redirect_uri: String,
    pub logout_redirect_uri: Option<String>,
    pub platform: Platform,
    pub extra_params: Vec<(String, String)>,
    pub response_type: String,
    pub graph_version: Option<String>,
    pub validate_status: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_absolute(field: &str, value: &str) -> Result<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| OpenFbError::Configuration(format!("{} is not an absolute URL ({}): {}", field, e, value)))
}

impl ClientConfig {
    pub fn from_params(params: ConfigureParams) -> Result<Self> {
        let app_id = params.app_id.trim().to_string();
        if app_id.is_empty() {
            return Err(OpenFbError::Configuration("appId parameter not set".into()));
        }

        let redirect_uri = match non_empty(params.redirect_uri) {
            Some(uri) => uri,
            None => match &params.platform {
                Platform::Browser {
                    origin,
                    context_path,
                } => non_empty(params.browser_redirect_uri).unwrap_or_else(|| {
                    format!(
                        "{}{}/oauthcallback.html",
                        origin.trim_end_matches('/'),
                        context_path.trim_end_matches('/')
                    )
                }),
                Platform::Webview => non_empty(params.webview_redirect_uri)
                    .unwrap_or_else(|| WEBVIEW_REDIRECT_URI.to_string()),
            },
        };
        check_absolute("redirect_uri", &redirect_uri)?;

        let logout_redirect_uri = non_empty(params.logout_redirect_uri);
        if let Some(uri) = &logout_redirect_uri {
            check_absolute("logout_redirect_uri", uri)?;
        }

        Ok(Self {
            app_id,
            scope: non_empty(params.scope).unwrap_or_default(),
            redirect_uri,
            logout_redirect_uri,
            platform: params.platform,
            extra_params: params.extra_params,
            response_type: non_empty(params.response_type).unwrap_or_else(|| "token".into()),
            graph_version: non_empty(params.graph_version)
                .map(|v| v.trim_matches('/').to_string()),
            validate_status: params.validate_status,
        })
    }

    pub fn surface_kind(&self) -> SurfaceKind {
        self.platform.surface_kind()
    }
}

/// Per-call login options.
#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    /// Overrides the configured scope for this attempt.
    pub scope: Option<String>,
    /// Show the location bar in the login window. Defaults to shown.
    pub show_location: Option<bool>,
    pub extra_params: Vec<(String, String)>,
}

impl LoginOptions {
    pub fn with_scope(scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            ..Default::default()
        }
    }

    pub fn resolved_scope<'a>(&'a self, config: &'a ClientConfig) -> &'a str {
        self.scope.as_deref().unwrap_or(&config.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_app_id_is_a_configuration_error() {
        let err = ClientConfig::from_params(ConfigureParams::new("   ")).unwrap_err();
        assert!(matches!(err, OpenFbError::Configuration(_)));
    }

    #[test]
    fn webview_defaults_to_provider_hosted_page() {
        let cfg = ClientConfig::from_params(ConfigureParams::new("123")).unwrap();
        assert_eq!(cfg.redirect_uri, WEBVIEW_REDIRECT_URI);
        assert_eq!(cfg.response_type, "token");
        assert_eq!(cfg.surface_kind(), SurfaceKind::Webview);
    }

    #[test]
    fn browser_default_is_derived_from_origin() {
        let cfg = ClientConfig::from_params(ConfigureParams::new("123").with_platform(
            Platform::Browser {
                origin: "http://localhost:8100/".into(),
                context_path: "/app".into(),
            },
        ))
        .unwrap();
        assert_eq!(cfg.redirect_uri, "http://localhost:8100/app/oauthcallback.html");
        assert_eq!(cfg.surface_kind(), SurfaceKind::Popup);
    }

    #[test]
    fn explicit_redirect_wins() {
        let mut params = ConfigureParams::new("123").with_redirect_uri("https://example.com/cb");
        params.webview_redirect_uri = Some("https://other.example.com/cb".into());
        let cfg = ClientConfig::from_params(params).unwrap();
        assert_eq!(cfg.redirect_uri, "https://example.com/cb");
    }

    #[test]
    fn relative_redirect_is_rejected() {
        let err = ClientConfig::from_params(ConfigureParams::new("123").with_redirect_uri("/cb"))
            .unwrap_err();
        assert!(matches!(err, OpenFbError::Configuration(_)));
    }

    #[test]
    fn login_scope_falls_back_to_configured() {
        let cfg = ClientConfig::from_params(ConfigureParams::new("1").with_scope("email")).unwrap();
        assert_eq!(LoginOptions::default().resolved_scope(&cfg), "email");
        assert_eq!(
            LoginOptions::with_scope("user_friends").resolved_scope(&cfg),
            "user_friends"
        );
    }

    #[test]
    fn params_deserialize_from_json() {
        let params: ConfigureParams = serde_json::from_str(
            r#"{"app_id":"42","scope":"email","platform":{"kind":"browser","origin":"https://app.example.com"}}"#,
        )
        .unwrap();
        let cfg = ClientConfig::from_params(params).unwrap();
        assert_eq!(cfg.redirect_uri, "https://app.example.com/oauthcallback.html");
    }
}

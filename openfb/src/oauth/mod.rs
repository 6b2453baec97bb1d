pub mod redirect;
pub mod signed_request;

use crate::config::{ClientConfig, LoginOptions};
use crate::error::Result;
use crate::query::to_query_string;
use crate::surface::SurfaceKind;

pub use redirect::{classify_redirect, is_terminal_redirect};
pub use signed_request::{SignedRequest, SignedRequestPayload, decode_signed_request};

pub const FB_LOGIN_URL: &str = "https://www.facebook.com/dialog/oauth";
pub const FB_LOGOUT_URL: &str = "https://www.facebook.com/logout.php";
pub const GRAPH_BASE_URL: &str = "https://graph.facebook.com";
/// Provider-hosted landing page used as redirect target inside embedded views.
pub const WEBVIEW_REDIRECT_URI: &str = "https://www.facebook.com/connect/login_success.html";

/// Build the authorization dialog URL for one login attempt.
pub fn authorize_url(config: &ClientConfig, options: &LoginOptions, kind: SurfaceKind) -> Result<String> {
    let mut params: Vec<(&str, &str)> = vec![
        ("client_id", config.app_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("response_type", config.response_type.as_str()),
    ];
    if kind == SurfaceKind::Popup {
        params.push(("display", "popup"));
    }
    params.push(("scope", options.resolved_scope(config)));
    for (k, v) in config.extra_params.iter().chain(options.extra_params.iter()) {
        params.push((k.as_str(), v.as_str()));
    }

    Ok(format!("{}?{}", FB_LOGIN_URL, to_query_string(&params)?))
}

/// Provider-side logout URL that redirects to `next` afterwards.
pub fn logout_url(access_token: &str, next: &str) -> Result<String> {
    let params = [("access_token", access_token), ("next", next)];
    Ok(format!("{}?{}", FB_LOGOUT_URL, to_query_string(&params)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigureParams, Platform};

    fn config(params: ConfigureParams) -> ClientConfig {
        ClientConfig::from_params(params).unwrap()
    }

    #[test]
    fn webview_authorize_url() {
        let cfg = config(ConfigureParams::new("APPID"));
        let url = authorize_url(&cfg, &LoginOptions::with_scope("email"), SurfaceKind::Webview).unwrap();
        assert_eq!(
            url,
            "https://www.facebook.com/dialog/oauth?client_id=APPID\
             &redirect_uri=https%3A%2F%2Fwww.facebook.com%2Fconnect%2Flogin_success.html\
             &response_type=token&scope=email"
        );
    }

    #[test]
    fn popup_adds_display_and_extra_params() {
        let cfg = config(
            ConfigureParams::new("APPID")
                .with_platform(Platform::Browser {
                    origin: "http://localhost:8100".into(),
                    context_path: String::new(),
                })
                .with_extra_param("auth_type", "rerequest"),
        );
        let url = authorize_url(&cfg, &LoginOptions::with_scope("email,user_friends"), SurfaceKind::Popup)
            .unwrap();
        assert!(url.contains("&display=popup&scope=email%2Cuser_friends&auth_type=rerequest"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8100%2Foauthcallback.html"));
    }

    #[test]
    fn logout_url_encodes_next() {
        let url = logout_url("TOKEN", "https://app.example.com/bye").unwrap();
        assert_eq!(
            url,
            "https://www.facebook.com/logout.php?access_token=TOKEN&next=https%3A%2F%2Fapp.example.com%2Fbye"
        );
    }
}

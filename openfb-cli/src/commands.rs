use openfb::{
    ConfigureParams, GraphRequest, HttpMethod, LoginOptions, LoginOutcome, OpenFb, OpenFbError,
    SystemBrowserSurface, TokenStore, flow::LOGOUT_CLOSE_DELAY,
};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Session wired to a token store and the system browser.
pub struct Session {
    pub client: OpenFb,
    pub browser: Arc<SystemBrowserSurface>,
    /// Why `configure` failed, if it did. Only `login` needs a configured
    /// session; the other commands work on the stored token alone.
    config_error: Option<OpenFbError>,
}

impl Session {
    pub fn new(params: ConfigureParams, store: Arc<dyn TokenStore>) -> Self {
        Self::with_browser(params, store, Arc::new(SystemBrowserSurface::new()))
    }

    pub fn with_browser(
        params: ConfigureParams,
        store: Arc<dyn TokenStore>,
        browser: Arc<SystemBrowserSurface>,
    ) -> Self {
        let client = OpenFb::builder()
            .store(store)
            .surface(browser.clone())
            .build();
        let config_error = client.configure(params).err();
        if let Some(e) = &config_error {
            tracing::debug!("Session left unconfigured: {}", e);
        }
        Self {
            client,
            browser,
            config_error,
        }
    }
}

/// Open the login dialog and wait for the user to paste the final URL.
pub async fn run_login(
    session: &Session,
    scope: Option<String>,
    show_location: bool,
) -> anyhow::Result<()> {
    let options = LoginOptions {
        scope,
        show_location: Some(show_location),
        ..Default::default()
    };

    println!("A browser window will open for login.");
    println!("After signing in, paste the address of the page you land on (empty line to cancel):");

    let outcome = login_with_input(session, options, BufReader::new(tokio::io::stdin())).await?;
    print_outcome(&outcome);
    Ok(())
}

/// Drive one login, taking the landing URL from the first line of `input`.
/// An empty line (or end of input) closes the login window.
async fn login_with_input<R: AsyncBufRead + Unpin>(
    session: &Session,
    options: LoginOptions,
    input: R,
) -> anyhow::Result<LoginOutcome> {
    if let Some(e) = &session.config_error {
        anyhow::bail!("{}", e);
    }
    let login = session.client.login(options)?;
    tokio::pin!(login);
    let mut lines = input.lines();

    // The login future goes first so the window is open before input is read.
    let outcome = tokio::select! {
        biased;
        outcome = &mut login => outcome,
        line = lines.next_line() => {
            match line? {
                Some(url) if !url.trim().is_empty() => {
                    session.client.oauth_callback(url.trim());
                }
                _ => session.browser.mark_closed(),
            }
            login.await
        }
    };
    Ok(outcome)
}

fn print_outcome(outcome: &LoginOutcome) {
    match outcome {
        LoginOutcome::Connected(auth) => {
            println!("Logged in.");
            if let Some(user_id) = &auth.user_id {
                println!("  user id: {}", user_id);
            }
            if let Some(expires_at) = auth.expires_at(chrono::Utc::now()) {
                println!("  expires: {}", expires_at.to_rfc3339());
            }
        }
        LoginOutcome::UserCancelled => println!("Login cancelled."),
        LoginOutcome::Disconnected => println!("Login interrupted: connection lost."),
        other => println!(
            "Login failed: {}",
            other.error_description().unwrap_or_else(|| "not authorized".into())
        ),
    }
}

pub async fn run_logout(session: &Session) -> anyhow::Result<()> {
    let provider_logout = session.client.is_logged_in().is_connected()
        && session
            .client
            .config()
            .is_some_and(|c| c.logout_redirect_uri.is_some());

    session.client.logout();
    if provider_logout {
        // Give the provider logout page time to open before the runtime exits.
        tokio::time::sleep(LOGOUT_CLOSE_DELAY).await;
    }
    println!("Logged out.");
    Ok(())
}

pub async fn run_status(session: &Session) -> anyhow::Result<()> {
    let status = session.client.get_login_status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

/// Split `key=value` arguments. The value may itself contain `=`.
fn parse_params(params: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    params
        .iter()
        .map(|param| match param.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => anyhow::bail!("Parameter must be key=value: {}", param),
        })
        .collect()
}

pub async fn run_api(
    session: &Session,
    path: &str,
    method: HttpMethod,
    params: &[String],
) -> anyhow::Result<()> {
    let request = GraphRequest {
        method,
        path: path.to_string(),
        params: parse_params(params)?,
    };

    let result = session.client.api(request).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub async fn run_revoke(session: &Session) -> anyhow::Result<()> {
    session.client.revoke_permissions().await?;
    println!("Permissions revoked.");
    Ok(())
}

use crate::config::{ClientConfig, ConfigureParams, LoginOptions};
use crate::error::{OpenFbError, Result};
use crate::flow::{AttemptId, LOGOUT_CLOSE_DELAY, LoginFlow, POLL_INTERVAL, close_delay};
use crate::graph::{GraphRequest, GraphTransport, ReqwestTransport};
use crate::oauth::{self, classify_redirect, is_terminal_redirect};
use crate::store::{MemoryTokenStore, TOKEN_KEY, TokenStore, read_token};
use crate::surface::{LoginSurface, SurfaceEvent, SurfaceKind, SurfaceOptions, SurfaceWindow, SystemBrowserSurface};
use crate::types::{AuthResponse, LoginOutcome, LoginStatus, REVOKED_ACCESS};
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

/// A login session against the provider.
///
/// Owns the configuration, the single in-flight login attempt, and the
/// collaborators (token store, login surface, graph transport). Share it by
/// reference; nothing here is process global.
pub struct OpenFb {
    config: RwLock<Option<Arc<ClientConfig>>>,
    flow: LoginFlow,
    store: Arc<dyn TokenStore>,
    surface: Arc<dyn LoginSurface>,
    transport: Arc<dyn GraphTransport>,
}

impl OpenFb {
    pub fn builder() -> OpenFbBuilder {
        OpenFbBuilder::new()
    }

    /// Validate and store the configuration used by later `login()` calls.
    pub fn configure(&self, params: ConfigureParams) -> Result<()> {
        let config = ClientConfig::from_params(params)?;
        if config.surface_kind() != self.surface.kind() {
            tracing::debug!(
                "Configured platform expects a {:?} surface but the session uses {:?}",
                config.surface_kind(),
                self.surface.kind()
            );
        }
        tracing::debug!("Configured app {} (redirect {})", config.app_id, config.redirect_uri);
        *self.config.write().unwrap_or_else(|p| p.into_inner()) = Some(Arc::new(config));
        Ok(())
    }

    pub fn config(&self) -> Option<Arc<ClientConfig>> {
        self.config.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// True while a login attempt is waiting for its redirect.
    pub fn login_in_progress(&self) -> bool {
        !self.flow.is_idle()
    }

    fn require_config(&self) -> Result<Arc<ClientConfig>> {
        self.config()
            .ok_or_else(|| OpenFbError::Configuration("appId not set; call configure() first".into()))
    }

    // -----------------------------------------------------------------------
    // Login
    // -----------------------------------------------------------------------

    /// Start a login attempt.
    ///
    /// Configuration problems are reported immediately, before any window is
    /// opened. The returned future resolves exactly once with the attempt's
    /// outcome. Starting another login while one is pending supersedes it
    /// (the earlier future resolves with [`LoginOutcome::UserCancelled`]).
    /// Dropping the future abandons the attempt and closes its window.
    pub fn login(
        &self,
        options: LoginOptions,
    ) -> Result<impl Future<Output = LoginOutcome> + Send + '_> {
        let config = self.require_config()?;
        let kind = self.surface.kind();
        let url = oauth::authorize_url(&config, &options, kind)?;
        let surface_options = SurfaceOptions {
            show_location: options.show_location.unwrap_or(true),
            ..Default::default()
        };

        Ok(async move {
            let (attempt, outcome_rx) = self.flow.begin(Instant::now());
            let _guard = AttemptGuard {
                flow: &self.flow,
                attempt,
            };

            self.store.remove(TOKEN_KEY);

            tracing::info!("Opening login dialog for app {}", config.app_id);
            let window = match self.surface.open(&url, &surface_options).await {
                Ok(window) => OpenWindow(window),
                Err(e) => {
                    tracing::warn!("Could not open login surface: {}", e);
                    self.flow.settle(
                        Some(attempt),
                        LoginOutcome::ConfigurationError {
                            message: e.to_string(),
                        },
                    );
                    return resolved(outcome_rx).await;
                }
            };

            let started_at = self.flow.started_at(attempt).unwrap_or_else(Instant::now);
            self.drive(attempt, window, outcome_rx, started_at, kind).await
        })
    }

    async fn drive(
        &self,
        attempt: AttemptId,
        mut window: OpenWindow,
        mut outcome_rx: oneshot::Receiver<LoginOutcome>,
        started_at: Instant,
        kind: SurfaceKind,
    ) -> LoginOutcome {
        let poll_closed = kind == SurfaceKind::Popup;
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut offline = false;

        loop {
            tokio::select! {
                biased;

                outcome = &mut outcome_rx => {
                    let outcome = outcome.unwrap_or(LoginOutcome::UserCancelled);
                    window.close_after(close_delay(started_at.elapsed()));
                    return outcome;
                }

                event = window.0.next_event() => match event {
                    Some(SurfaceEvent::LoadStart(url)) | Some(SurfaceEvent::LoadStop(url))
                        if is_terminal_redirect(&url) =>
                    {
                        self.complete_redirect(Some(attempt), &url);
                    }
                    Some(SurfaceEvent::LoadError { url, message }) => {
                        if is_terminal_redirect(&url) {
                            self.complete_redirect(Some(attempt), &url);
                        } else {
                            tracing::debug!("Login view load error: {}", message);
                        }
                    }
                    Some(SurfaceEvent::LoadStart(_)) => {}
                    Some(SurfaceEvent::LoadStop(_)) => {
                        // A page finished loading, so the connection is back.
                        if offline {
                            tracing::debug!("Login view loaded a page after connectivity loss");
                            offline = false;
                        }
                    }
                    Some(SurfaceEvent::Offline) => {
                        tracing::debug!("Login view reported connectivity loss");
                        offline = true;
                    }
                    Some(SurfaceEvent::Exit) | None => {
                        let outcome = if offline {
                            LoginOutcome::Disconnected
                        } else {
                            LoginOutcome::UserCancelled
                        };
                        self.flow.settle(Some(attempt), outcome);
                        return resolved(outcome_rx).await;
                    }
                },

                _ = ticker.tick(), if poll_closed => {
                    if window.0.is_closed() {
                        self.flow.settle(Some(attempt), LoginOutcome::UserCancelled);
                        return resolved(outcome_rx).await;
                    }
                }
            }
        }
    }

    /// Report a redirect URL observed by the host (callback page, pasted URL).
    ///
    /// The URL is classified, a token is persisted, and the pending login
    /// attempt (if any) resolves with the returned outcome. A redirect that
    /// arrives after the attempt already ended still persists its token but
    /// resolves nothing.
    pub fn oauth_callback(&self, url: &str) -> LoginOutcome {
        self.complete_redirect(None, url)
    }

    fn complete_redirect(&self, attempt: Option<AttemptId>, url: &str) -> LoginOutcome {
        let outcome = classify_redirect(url);
        let pending = self.flow.take(attempt);
        if attempt.is_some() && pending.is_none() {
            tracing::debug!("Ignoring redirect for an attempt that already ended");
            return outcome;
        }

        match &outcome {
            LoginOutcome::Connected(auth) => {
                self.store.set(TOKEN_KEY, &auth.access_token);
                tracing::info!("Login succeeded");
            }
            other => tracing::info!(
                "Login not authorized: {}",
                other.error_code().unwrap_or("unknown")
            ),
        }

        if let Some(pending) = pending {
            pending.resolve(outcome.clone());
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Session status
    // -----------------------------------------------------------------------

    /// Discard the token. When a logout redirect is configured, the provider
    /// session is ended too by briefly opening the logout page.
    pub fn logout(&self) {
        let token = read_token(self.store.as_ref());
        self.store.remove(TOKEN_KEY);
        tracing::info!("Logged out");

        let (Some(token), Some(config)) = (token, self.config()) else {
            return;
        };
        let Some(next) = config.logout_redirect_uri.as_deref() else {
            return;
        };
        let url = match oauth::logout_url(&token, next) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Could not build logout URL: {}", e);
                return;
            }
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime; skipping provider logout");
            return;
        };

        let surface = Arc::clone(&self.surface);
        runtime.spawn(async move {
            match surface.open(&url, &SurfaceOptions::default()).await {
                Ok(mut window) => {
                    if surface.kind() == SurfaceKind::Webview {
                        tokio::time::sleep(LOGOUT_CLOSE_DELAY).await;
                        window.close();
                    }
                }
                Err(e) => tracing::warn!("Provider logout failed: {}", e),
            }
        });
    }

    /// Status from the token store alone.
    pub fn is_logged_in(&self) -> LoginStatus {
        match read_token(self.store.as_ref()) {
            Some(token) => LoginStatus::Connected {
                auth_response: AuthResponse::new(token),
            },
            None => LoginStatus::Unknown,
        }
    }

    /// Status of the stored token, checked against the provider when the
    /// session is configured with `validate_status`.
    ///
    /// A missing token is the normal signed-out state and yields
    /// [`LoginStatus::Unknown`]. A token the provider refuses is removed and
    /// reported as `not_authorized` / `revoked_access`.
    pub async fn get_login_status(&self) -> Result<LoginStatus> {
        let status = self.is_logged_in();
        if !status.is_connected() {
            return Ok(status);
        }
        let validate = self.config().map(|c| c.validate_status).unwrap_or(false);
        if !validate {
            return Ok(status);
        }

        match self.api(GraphRequest::get("/me").with_param("fields", "id")).await {
            Ok(_) => Ok(status),
            Err(e) if e.is_auth_rejection() => {
                tracing::info!("Stored token was rejected: {}", e);
                self.store.remove(TOKEN_KEY);
                Ok(LoginStatus::NotAuthorized {
                    error: Some(REVOKED_ACCESS.into()),
                })
            }
            Err(e) => Err(e),
        }
    }

    // -----------------------------------------------------------------------
    // Graph API
    // -----------------------------------------------------------------------

    /// Build the full graph URL for `request`, with the stored token appended.
    pub fn graph_url(&self, request: &GraphRequest) -> Result<String> {
        let mut params: Vec<(String, String)> = request
            .params
            .iter()
            .filter(|(k, _)| k != "access_token")
            .cloned()
            .collect();
        if let Some(token) = read_token(self.store.as_ref()) {
            params.push(("access_token".into(), token));
        }

        let path = request.path.trim_start_matches('/');
        let version = self.config().and_then(|c| c.graph_version.clone());
        let base = match version {
            Some(v) => format!("{}/{}/{}", oauth::GRAPH_BASE_URL, v, path),
            None => format!("{}/{}", oauth::GRAPH_BASE_URL, path),
        };

        if params.is_empty() {
            Ok(base)
        } else {
            Ok(format!("{}?{}", base, crate::query::to_query_string(&params)?))
        }
    }

    /// Issue a graph API call with the stored token appended.
    pub async fn api(&self, request: GraphRequest) -> Result<serde_json::Value> {
        let url = self.graph_url(&request)?;
        tracing::debug!("Graph {} {}", request.method, request.path);
        let response = self.transport.send(request.method, &url).await?;
        response.into_result()
    }

    /// De-authorize the app. The stored token is dropped on success.
    pub async fn revoke_permissions(&self) -> Result<serde_json::Value> {
        let result = self.api(GraphRequest::delete("/me/permissions")).await?;
        self.store.remove(TOKEN_KEY);
        tracing::info!("Permissions revoked");
        Ok(result)
    }
}

async fn resolved(outcome_rx: oneshot::Receiver<LoginOutcome>) -> LoginOutcome {
    outcome_rx.await.unwrap_or(LoginOutcome::UserCancelled)
}

/// Returns the flow to idle if the login future is dropped mid-attempt.
struct AttemptGuard<'a> {
    flow: &'a LoginFlow,
    attempt: AttemptId,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.flow.abandon(self.attempt);
    }
}

/// A login window that is closed when dropped.
struct OpenWindow(Box<dyn SurfaceWindow>);

impl OpenWindow {
    /// Close after `delay`, without holding up the caller.
    fn close_after(self, delay: Duration) {
        if self.0.is_closed() {
            return;
        }
        if delay.is_zero() {
            drop(self);
            return;
        }
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            drop(self);
        });
    }
}

impl Drop for OpenWindow {
    fn drop(&mut self) {
        if !self.0.is_closed() {
            self.0.close();
        }
    }
}

/// Builder for [`OpenFb`]. Unset collaborators get defaults: an in-memory
/// token store, the system browser, and a `reqwest` transport.
pub struct OpenFbBuilder {
    store: Option<Arc<dyn TokenStore>>,
    surface: Option<Arc<dyn LoginSurface>>,
    transport: Option<Arc<dyn GraphTransport>>,
}

impl OpenFbBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            surface: None,
            transport: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn surface(mut self, surface: Arc<dyn LoginSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn GraphTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> OpenFb {
        OpenFb {
            config: RwLock::new(None),
            flow: LoginFlow::new(),
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryTokenStore::new())),
            surface: self
                .surface
                .unwrap_or_else(|| Arc::new(SystemBrowserSurface::new())),
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(ReqwestTransport::new())),
        }
    }
}

impl Default for OpenFbBuilder {
    fn default() -> Self {
        Self::new()
    }
}

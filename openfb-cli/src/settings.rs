use openfb::ConfigureParams;
use openfb::oauth::WEBVIEW_REDIRECT_URI;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configured app id.
pub const APP_ID_ENV: &str = "OPENFB_APP_ID";

/// `~/.openfb/config.json`
pub fn default_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".openfb").join("config.json")
}

/// Load session parameters from `path`, then apply environment overrides.
///
/// A missing file is not an error: the app id may come from the environment
/// alone. Without an explicit redirect the provider-hosted landing page is
/// used, since a terminal has no callback page of its own.
pub fn load(path: &Path) -> anyhow::Result<ConfigureParams> {
    let mut params = if path.exists() {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str::<ConfigureParams>(&data)
            .map_err(|e| anyhow::anyhow!("Invalid config file {}: {}", path.display(), e))?
    } else {
        tracing::debug!("No config file at {}", path.display());
        ConfigureParams::default()
    };

    if let Ok(app_id) = std::env::var(APP_ID_ENV) {
        if !app_id.trim().is_empty() {
            params.app_id = app_id;
        }
    }
    if params.redirect_uri.is_none() {
        params.redirect_uri = Some(WEBVIEW_REDIRECT_URI.to_string());
    }
    Ok(params)
}

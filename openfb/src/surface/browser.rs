use super::{LoginSurface, SurfaceKind, SurfaceOptions, SurfaceWindow};
use crate::error::{OpenFbError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Opener = dyn Fn(&str) -> std::io::Result<()> + Send + Sync;

/// Opens the dialog in the user's default browser.
///
/// The browser gives no visibility into the window, so the host reports the
/// redirect through [`crate::OpenFb::oauth_callback`] and a dismissed window
/// through [`SystemBrowserSurface::mark_closed`].
pub struct SystemBrowserSurface {
    opener: Box<Opener>,
    current: Mutex<Option<Arc<AtomicBool>>>,
}

impl SystemBrowserSurface {
    pub fn new() -> Self {
        Self::with_opener(|url| open::that(url))
    }

    /// Use a custom launcher instead of the platform default.
    pub fn with_opener(opener: impl Fn(&str) -> std::io::Result<()> + Send + Sync + 'static) -> Self {
        Self {
            opener: Box::new(opener),
            current: Mutex::new(None),
        }
    }

    /// Report that the user dismissed the current login window.
    pub fn mark_closed(&self) {
        let current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(flag) = current.as_ref() {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

impl Default for SystemBrowserSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LoginSurface for SystemBrowserSurface {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Popup
    }

    async fn open(&self, url: &str, options: &SurfaceOptions) -> Result<Box<dyn SurfaceWindow>> {
        tracing::debug!("Opening browser window ({}, {})", options.target, options.features());
        (self.opener)(url).map_err(|e| OpenFbError::Surface(format!("failed to open browser: {}", e)))?;

        let closed = Arc::new(AtomicBool::new(false));
        {
            let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
            // A previous window, if any, is no longer tracked.
            if let Some(prev) = current.replace(Arc::clone(&closed)) {
                prev.store(true, Ordering::SeqCst);
            }
        }
        Ok(Box::new(BrowserWindow { closed }))
    }
}

struct BrowserWindow {
    closed: Arc<AtomicBool>,
}

impl SurfaceWindow for BrowserWindow {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        // The tab itself belongs to the browser; only stop tracking it.
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mark_closed_reaches_open_window() {
        let opened = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&opened);
        let surface = SystemBrowserSurface::with_opener(move |url| {
            seen.lock().unwrap().push(url.to_string());
            Ok(())
        });

        let window = surface.open("https://example.com/a", &SurfaceOptions::default()).await.unwrap();
        assert!(!window.is_closed());
        surface.mark_closed();
        assert!(window.is_closed());
        assert_eq!(opened.lock().unwrap().as_slice(), ["https://example.com/a"]);
    }

    #[tokio::test]
    async fn opener_failure_is_a_surface_error() {
        let surface = SystemBrowserSurface::with_opener(|_| {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no browser"))
        });
        let err = surface.open("https://example.com", &SurfaceOptions::default()).await.err().unwrap();
        assert!(matches!(err, OpenFbError::Surface(_)));
    }
}

//! Login surfaces: where the provider's dialog is displayed.
//!
//! Two shapes are supported. A popup (a browser window or tab the client can
//! only observe through its closed state) and an embedded webview that
//! reports navigation and lifecycle events.

pub mod browser;
pub mod webview;

pub use browser::SystemBrowserSurface;
pub use webview::{WebviewBridge, WebviewCommand};

use crate::error::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// No navigation visibility; closure is detected by polling.
    Popup,
    /// Navigation and exit events are delivered through [`SurfaceWindow::next_event`].
    Webview,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    LoadStart(String),
    LoadStop(String),
    LoadError { url: String, message: String },
    /// The device lost connectivity while the view was open.
    Offline,
    /// The view was closed, by the user or by the platform.
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceOptions {
    pub target: String,
    pub show_location: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            target: "_blank".into(),
            show_location: true,
        }
    }
}

impl SurfaceOptions {
    /// Window feature string, e.g. `location=no`.
    pub fn features(&self) -> String {
        format!("location={}", if self.show_location { "yes" } else { "no" })
    }
}

/// Opens login windows.
#[async_trait]
pub trait LoginSurface: Send + Sync {
    fn kind(&self) -> SurfaceKind;

    async fn open(&self, url: &str, options: &SurfaceOptions) -> Result<Box<dyn SurfaceWindow>>;
}

/// One open login window.
#[async_trait]
pub trait SurfaceWindow: Send {
    /// Next navigation or lifecycle event. `None` means the event source is
    /// gone, which is treated like [`SurfaceEvent::Exit`]. Popups have no
    /// events and never resolve.
    async fn next_event(&mut self) -> Option<SurfaceEvent> {
        std::future::pending().await
    }

    fn is_closed(&self) -> bool;

    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_string() {
        assert_eq!(SurfaceOptions::default().features(), "location=yes");
        let hidden = SurfaceOptions {
            show_location: false,
            ..Default::default()
        };
        assert_eq!(hidden.features(), "location=no");
    }
}

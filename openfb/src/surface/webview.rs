use super::{LoginSurface, SurfaceEvent, SurfaceKind, SurfaceOptions, SurfaceWindow};
use crate::error::{OpenFbError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Requests sent to the application that owns the embedded view.
#[derive(Debug)]
pub enum WebviewCommand {
    /// Show `url` as view `id`; report navigation and lifecycle events on
    /// `events`.
    Open {
        id: u64,
        url: String,
        target: String,
        features: String,
        events: mpsc::UnboundedSender<SurfaceEvent>,
    },
    /// Close view `id`. Ignore it if that view is already gone.
    Close { id: u64 },
}

/// Channel adapter between the session and a host-owned webview.
///
/// The host drains the receiver returned by [`WebviewBridge::new`], shows the
/// view, and forwards `loadstart`/`exit` (and connectivity loss) as
/// [`SurfaceEvent`]s.
#[derive(Debug, Clone)]
pub struct WebviewBridge {
    commands: mpsc::UnboundedSender<WebviewCommand>,
    next_id: Arc<AtomicU64>,
}

impl WebviewBridge {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WebviewCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (
            Self {
                commands,
                next_id: Arc::new(AtomicU64::new(1)),
            },
            rx,
        )
    }
}

#[async_trait]
impl LoginSurface for WebviewBridge {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Webview
    }

    async fn open(&self, url: &str, options: &SurfaceOptions) -> Result<Box<dyn SurfaceWindow>> {
        let (events_tx, events) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.commands
            .send(WebviewCommand::Open {
                id,
                url: url.to_string(),
                target: options.target.clone(),
                features: options.features(),
                events: events_tx,
            })
            .map_err(|_| OpenFbError::Surface("webview host is not running".into()))?;

        Ok(Box::new(WebviewWindow {
            id,
            events,
            commands: self.commands.clone(),
            closed: false,
        }))
    }
}

struct WebviewWindow {
    id: u64,
    events: mpsc::UnboundedReceiver<SurfaceEvent>,
    commands: mpsc::UnboundedSender<WebviewCommand>,
    closed: bool,
}

#[async_trait]
impl SurfaceWindow for WebviewWindow {
    async fn next_event(&mut self) -> Option<SurfaceEvent> {
        let event = self.events.recv().await;
        if matches!(event, None | Some(SurfaceEvent::Exit)) {
            self.closed = true;
        }
        event
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.commands.send(WebviewCommand::Close { id: self.id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_flow_from_host_to_window() {
        let (bridge, mut host) = WebviewBridge::new();
        let mut window = bridge
            .open("https://example.com/login", &SurfaceOptions::default())
            .await
            .unwrap();

        let events = match host.recv().await.unwrap() {
            WebviewCommand::Open {
                id,
                url,
                features,
                events,
                ..
            } => {
                assert_eq!(url, "https://example.com/login");
                assert_eq!(features, "location=yes");
                assert_eq!(id, 1);
                events
            }
            other => panic!("unexpected command: {:?}", other),
        };

        events.send(SurfaceEvent::LoadStart("https://a".into())).unwrap();
        events.send(SurfaceEvent::Exit).unwrap();
        assert_eq!(window.next_event().await, Some(SurfaceEvent::LoadStart("https://a".into())));
        assert!(!window.is_closed());
        assert_eq!(window.next_event().await, Some(SurfaceEvent::Exit));
        assert!(window.is_closed());

        // Already closed by the host: no Close command is sent.
        window.close();
        assert!(host.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_sends_command_once() {
        let (bridge, mut host) = WebviewBridge::new();
        let mut window = bridge.open("https://x", &SurfaceOptions::default()).await.unwrap();
        let _open = host.recv().await.unwrap();
        let mut second = bridge.open("https://y", &SurfaceOptions::default()).await.unwrap();
        let _open = host.recv().await.unwrap();

        window.close();
        window.close();
        assert!(matches!(host.recv().await, Some(WebviewCommand::Close { id: 1 })));
        assert!(host.try_recv().is_err());
        second.close();
        assert!(matches!(host.recv().await, Some(WebviewCommand::Close { id: 2 })));
        assert!(host.try_recv().is_err());
    }

    #[tokio::test]
    async fn open_fails_without_host() {
        let (bridge, host) = WebviewBridge::new();
        drop(host);
        let err = bridge.open("https://x", &SurfaceOptions::default()).await.err().unwrap();
        assert!(matches!(err, OpenFbError::Surface(_)));
    }
}

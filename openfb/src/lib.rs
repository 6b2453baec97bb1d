pub mod client;
pub mod config;
pub mod error;
pub mod flow;
pub mod graph;
pub mod oauth;
pub mod query;
pub mod store;
pub mod surface;
pub mod types;

// Re-exports for convenience
pub use client::{OpenFb, OpenFbBuilder};
pub use config::{ClientConfig, ConfigureParams, LoginOptions, Platform};
pub use error::{OpenFbError, Result};
pub use graph::{GraphError, GraphRequest, GraphResponse, GraphTransport, HttpMethod, ReqwestTransport};
pub use store::{FileTokenStore, MemoryTokenStore, TOKEN_KEY, TokenStore};
pub use surface::{
    LoginSurface, SurfaceEvent, SurfaceKind, SurfaceOptions, SurfaceWindow, SystemBrowserSurface,
    WebviewBridge, WebviewCommand,
};
pub use types::*;

//! Capability seams for the Mini Program automation backend.
//!
//! The bridge core only ever talks to the backend through the traits in this
//! module, so everything above them is testable with stubs and nothing above
//! them depends on wire details. The default WebSocket-backed implementation
//! lives in [`ws`]; the DevTools CLI runner lives in [`runner`].

pub mod log;
pub mod manager;
pub mod runner;
pub mod ws;

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use weapp_core::Result;

pub use log::{EventLog, LogEntry, LogKind, LOG_CAPACITY};
pub use manager::{ConnState, ConnectionContext, ConnectionManager, LaunchOutcome};
pub use runner::{find_devtools_cli, CliRunner};
pub use ws::WsConnector;

/// Console or exception event emitted by the active session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Console { level: String, text: String },
    Exception { text: String },
}

/// Options for launching a new DevTools instance when attach fails.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub project_path: PathBuf,
    pub cli_path: Option<PathBuf>,
    pub port: u16,
}

/// Establishes automation sessions, either by attaching to a backend already
/// listening on an endpoint or by launching a fresh DevTools instance.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, ws_endpoint: &str) -> Result<Arc<dyn Session>>;
    async fn launch(&self, opts: &LaunchOptions) -> Result<Arc<dyn Session>>;
}

/// One live connection to the remote-controlled Mini Program.
#[async_trait]
pub trait Session: Send + Sync {
    async fn current_page(&self) -> Result<Arc<dyn Page>>;
    async fn navigate_to(&self, url: &str) -> Result<Value>;
    /// Evaluate a script in the app context.
    async fn evaluate(&self, script: &str, args: &[Value]) -> Result<Value>;
    /// Call a `wx.*` API method by name.
    async fn call_wx_method(&self, method: &str, args: &[Value]) -> Result<Value>;
    async fn disconnect(&self) -> Result<()>;
    /// Subscribe to the console/exception event stream. Each call returns an
    /// independent receiver; senders are dropped when the session closes.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent>;
}

/// The page currently on top of the navigation stack.
#[async_trait]
pub trait Page: Send + Sync {
    fn path(&self) -> String;
    /// Page data, optionally narrowed to a dot-path.
    async fn data(&self, path: Option<&str>) -> Result<Value>;
    async fn set_data(&self, data: Value) -> Result<()>;
    /// Resolve a selector to an element, `None` when nothing matches.
    async fn query(&self, selector: &str) -> Result<Option<Arc<dyn Element>>>;
}

/// A resolved element on the current page.
#[async_trait]
pub trait Element: Send + Sync {
    async fn text(&self) -> Result<Value>;
    async fn size(&self) -> Result<Value>;
    async fn offset(&self) -> Result<Value>;
    async fn attribute(&self, name: &str) -> Result<Value>;
    async fn style(&self, name: &str) -> Result<Value>;
    async fn tap(&self) -> Result<()>;
    async fn input(&self, value: &str) -> Result<()>;
    async fn trigger(&self, event_name: &str, detail: Value) -> Result<()>;
}

/// Executes an external binary with an ordered argument list and returns its
/// captured stdout, or a failure wrapping exit code and output.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, program: &Path, args: &[String]) -> Result<String>;
}

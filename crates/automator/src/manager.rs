//! Connection lifecycle for the single automation session.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use weapp_core::{Config, Error, Result};

use crate::log::{EventLog, LogEntry};
use crate::{Connector, LaunchOptions, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
}

/// Defaults retained across calls so later operations (builds, deploys) can
/// omit paths. Survives disconnect; mutated only on successful launch.
#[derive(Debug, Clone, Default)]
pub struct ConnectionContext {
    pub project_path: Option<PathBuf>,
    pub cli_path: Option<PathBuf>,
}

/// Which path of the connect-or-launch policy succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Attached to a backend that was already listening.
    Attached,
    /// Launched a fresh DevTools instance and then attached.
    Launched,
}

/// Owns the one session handle and its lifecycle state. The transport
/// delivers one request at a time, so no internal locking guards the state;
/// only the event log is shared with the forwarder task.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    config: Config,
    state: ConnState,
    session: Option<Arc<dyn Session>>,
    context: ConnectionContext,
    log: Arc<Mutex<EventLog>>,
    forwarder: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, config: Config) -> Self {
        Self {
            connector,
            config,
            state: ConnState::Disconnected,
            session: None,
            context: ConnectionContext::default(),
            log: Arc::new(Mutex::new(EventLog::new())),
            forwarder: None,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnState::Connected
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    pub fn log(&self) -> Arc<Mutex<EventLog>> {
        self.log.clone()
    }

    /// The active session handle, or `NotConnected`.
    pub fn session(&self) -> Result<Arc<dyn Session>> {
        match (&self.state, &self.session) {
            (ConnState::Connected, Some(session)) => Ok(session.clone()),
            _ => Err(Error::NotConnected),
        }
    }

    /// Project path for CLI operations: explicit argument, else the one
    /// recorded by the last successful launch.
    pub fn resolve_project_path(&self, explicit: Option<&str>) -> Option<PathBuf> {
        explicit
            .map(PathBuf::from)
            .or_else(|| self.context.project_path.clone())
    }

    /// DevTools CLI path: explicit argument, then connection context, then
    /// environment override, then the platform default install location.
    /// `None` here only becomes `ToolNotFound` when a spawn actually needs it.
    pub fn resolve_cli_path(&self, explicit: Option<&str>) -> Option<PathBuf> {
        explicit
            .map(PathBuf::from)
            .or_else(|| self.context.cli_path.clone())
            .or_else(|| self.config.cli_path.clone())
            .or_else(crate::runner::find_devtools_cli)
    }

    /// Connect-or-launch: attach to a backend already listening on the
    /// resolved port, falling back to launching a new DevTools instance.
    pub async fn launch(
        &mut self,
        project_path: &str,
        tool_path: Option<&str>,
        port: Option<u16>,
    ) -> Result<LaunchOutcome> {
        if self.state != ConnState::Disconnected {
            return Err(Error::AlreadyConnected);
        }
        self.state = ConnState::Connecting;

        let endpoint = self.config.ws_endpoint(port);
        let resolved_port = port.unwrap_or(self.config.automation_port);

        let (session, outcome) = match self.connector.connect(&endpoint).await {
            Ok(session) => {
                info!(%endpoint, "Attached to running Mini Program backend");
                (session, LaunchOutcome::Attached)
            }
            Err(attach_err) => {
                // Fallback fires on any attach failure; the cause is logged so
                // operators can tell a refused connection from anything else.
                debug!(error = %attach_err, "Attach failed, launching DevTools");
                let opts = LaunchOptions {
                    project_path: PathBuf::from(project_path),
                    cli_path: self.resolve_cli_path(tool_path),
                    port: resolved_port,
                };
                match self.connector.launch(&opts).await {
                    Ok(session) => {
                        info!(project = project_path, port = resolved_port, "Launched DevTools");
                        (session, LaunchOutcome::Launched)
                    }
                    Err(e) => {
                        self.state = ConnState::Disconnected;
                        return Err(e);
                    }
                }
            }
        };

        self.context.project_path = Some(PathBuf::from(project_path));
        if let Some(tool) = tool_path {
            self.context.cli_path = Some(PathBuf::from(tool));
        }
        self.attach_session(session).await;
        Ok(outcome)
    }

    /// Attach-only path; no launch fallback. Returns the endpoint used.
    pub async fn connect(&mut self, ws_endpoint: Option<&str>) -> Result<String> {
        if self.state != ConnState::Disconnected {
            return Err(Error::AlreadyConnected);
        }
        self.state = ConnState::Connecting;

        let endpoint = ws_endpoint
            .map(str::to_string)
            .unwrap_or_else(|| self.config.ws_endpoint(None));

        match self.connector.connect(&endpoint).await {
            Ok(session) => {
                info!(%endpoint, "Connected to Mini Program backend");
                self.attach_session(session).await;
                Ok(endpoint)
            }
            Err(e) => {
                self.state = ConnState::Disconnected;
                Err(e)
            }
        }
    }

    /// Tear down the session handle. Returns `false` when already
    /// disconnected. The connection context is deliberately kept.
    pub async fn disconnect(&mut self) -> Result<bool> {
        if self.state == ConnState::Disconnected {
            return Ok(false);
        }
        if let Some(task) = self.forwarder.take() {
            task.abort();
        }
        if let Some(session) = self.session.take() {
            // Best-effort: the backend may already be gone.
            if let Err(e) = session.disconnect().await {
                debug!(error = %e, "Session teardown reported an error");
            }
        }
        self.state = ConnState::Disconnected;
        Ok(true)
    }

    /// Record the handle, clear prior diagnostics, and route the session's
    /// event stream into the log buffer.
    async fn attach_session(&mut self, session: Arc<dyn Session>) {
        self.log.lock().await.clear();
        if let Some(task) = self.forwarder.take() {
            task.abort();
        }

        let mut rx = session.subscribe();
        let log = self.log.clone();
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                log.lock().await.record(LogEntry::from_event(&event));
            }
        }));

        self.session = Some(session);
        self.state = ConnState::Connected;
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.forwarder.take() {
            task.abort();
        }
    }
}

//! Command dispatch: validates and routes tool invocations against the
//! single automation session, normalizing every outcome into the uniform
//! response envelope. No failure escapes to the transport layer.

pub mod cli;
pub mod health;
pub mod ops;

use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use weapp_automator::{ConnectionManager, Connector, LaunchOutcome, ProcessRunner};
use weapp_core::envelope::render_value;
use weapp_core::{Config, Envelope, Error, Result};

use ops::{
    optional_array, optional_bool, optional_port, optional_str, required_str,
    required_string_array, Operation, ALL_OPERATIONS,
};

pub use health::HealthReport;

pub struct Dispatcher {
    manager: ConnectionManager,
    runner: Arc<dyn ProcessRunner>,
}

impl Dispatcher {
    pub fn new(
        connector: Arc<dyn Connector>,
        runner: Arc<dyn ProcessRunner>,
        config: Config,
    ) -> Self {
        Self {
            manager: ConnectionManager::new(connector, config),
            runner,
        }
    }

    /// Tool descriptors for `tools/list`.
    pub fn tool_schemas() -> Vec<Value> {
        ALL_OPERATIONS.iter().map(|op| op.schema()).collect()
    }

    /// Route one invocation. Always yields a well-formed envelope.
    pub async fn dispatch(&mut self, name: &str, args: &Value) -> Envelope {
        let Some(op) = Operation::from_name(name) else {
            return Envelope::error(format!("Unknown tool: {}", name));
        };
        debug!(tool = name, "Dispatching");
        match self.handle(op, args).await {
            Ok(value) => Envelope::ok(render_value(&value)),
            Err(e) => Envelope::error(e.to_string()),
        }
    }

    async fn handle(&mut self, op: Operation, args: &Value) -> Result<Value> {
        // Connection management and health handle the Disconnected state
        // themselves; everything else fails fast before touching the backend.
        if op.requires_connection() && !self.manager.is_connected() {
            return Err(Error::NotConnected);
        }

        match op {
            Operation::Launch => self.launch(args).await,
            Operation::Connect => self.connect(args).await,
            Operation::Disconnect => self.disconnect().await,
            Operation::CheckHealth => {
                let report = health::evaluate(&self.manager).await;
                Ok(serde_json::to_value(report)?)
            }
            Operation::NavigateTo => {
                let url = required_str(args, "url")?;
                self.manager.session()?.navigate_to(url).await
            }
            Operation::GetPageData => {
                let page = self.manager.session()?.current_page().await?;
                page.data(optional_str(args, "path")).await
            }
            Operation::SetPageData => {
                let data = args
                    .get("data")
                    .filter(|v| v.is_object())
                    .cloned()
                    .ok_or_else(|| {
                        Error::Validation("Missing required parameter: data".to_string())
                    })?;
                let page = self.manager.session()?.current_page().await?;
                page.set_data(data).await?;
                Ok(Value::String("Page data updated".to_string()))
            }
            Operation::GetElement => {
                let selector = required_str(args, "selector")?;
                let action = parse_element_action(args)?;
                self.element_op(selector, action).await
            }
            Operation::TapElement => {
                let selector = required_str(args, "selector")?;
                self.element_op(selector, ElementAction::Tap).await
            }
            Operation::InputText => {
                let selector = required_str(args, "selector")?;
                let value = required_str(args, "value")?.to_string();
                self.element_op(selector, ElementAction::Input(value)).await
            }
            Operation::TriggerEvent => {
                let selector = required_str(args, "selector")?;
                let event = required_str(args, "eventName")?.to_string();
                let detail = args.get("detail").cloned().unwrap_or_else(|| json!({}));
                self.element_op(selector, ElementAction::Trigger { event, detail })
                    .await
            }
            Operation::CallMethod => {
                let method = required_str(args, "method")?;
                let call_args = optional_array(args, "args");
                self.manager.session()?.call_wx_method(method, &call_args).await
            }
            Operation::Evaluate => {
                let script = required_str(args, "script")?;
                let call_args = optional_array(args, "args");
                self.manager.session()?.evaluate(script, &call_args).await
            }
            Operation::CallCloudFunction => {
                let name = required_str(args, "name")?;
                let data = args.get("data").cloned().unwrap_or_else(|| json!({}));
                let mut call = json!({ "name": name, "data": data });
                if let Some(config) = args.get("config").filter(|v| !v.is_null()) {
                    call["config"] = config.clone();
                }
                self.manager
                    .session()?
                    .call_wx_method("cloud.callFunction", &[call])
                    .await
            }
            Operation::BuildNpm => self.run_cli(args, cli::build_npm_args).await,
            Operation::DeployFunctions => {
                let env = required_str(args, "env")?.to_string();
                let names = required_string_array(args, "names")?;
                let remote_install = optional_bool(args, "remoteInstall");
                self.run_cli(args, move |project| {
                    cli::deploy_functions_args(&env, &names, remote_install, project)
                })
                .await
            }
            Operation::ListFunctions => {
                let env = required_str(args, "env")?.to_string();
                self.run_cli(args, move |project| cli::list_functions_args(&env, project))
                    .await
            }
        }
    }

    async fn launch(&mut self, args: &Value) -> Result<Value> {
        let project = required_str(args, "projectPath")?;
        let tool_path = optional_str(args, "toolPath");
        let port = optional_port(args, "port")?;
        let outcome = self.manager.launch(project, tool_path, port).await?;
        let message = match outcome {
            LaunchOutcome::Attached => {
                "Connected to an already-running Mini Program backend".to_string()
            }
            LaunchOutcome::Launched => {
                format!("Launched WeChat DevTools for project {}", project)
            }
        };
        Ok(Value::String(message))
    }

    async fn connect(&mut self, args: &Value) -> Result<Value> {
        let endpoint = self.manager.connect(optional_str(args, "wsEndpoint")).await?;
        Ok(Value::String(format!("Connected to Mini Program at {}", endpoint)))
    }

    async fn disconnect(&mut self) -> Result<Value> {
        let message = if self.manager.disconnect().await? {
            "Disconnected from Mini Program"
        } else {
            "Already disconnected"
        };
        Ok(Value::String(message.to_string()))
    }

    /// Resolve the element first; the requested action never runs against a
    /// missing element.
    async fn element_op(&self, selector: &str, action: ElementAction) -> Result<Value> {
        let page = self.manager.session()?.current_page().await?;
        let element = page
            .query(selector)
            .await?
            .ok_or_else(|| Error::ElementNotFound(selector.to_string()))?;

        match action {
            ElementAction::Info => Ok(json!({
                "text": element.text().await?,
                "size": element.size().await?,
                "offset": element.offset().await?,
            })),
            ElementAction::Attribute(name) => element.attribute(&name).await,
            ElementAction::Style(name) => element.style(&name).await,
            ElementAction::Tap => {
                element.tap().await?;
                Ok(Value::String(format!("Tapped element: {}", selector)))
            }
            ElementAction::Input(value) => {
                element.input(&value).await?;
                Ok(Value::String(format!("Input sent to: {}", selector)))
            }
            ElementAction::Trigger { event, detail } => {
                element.trigger(&event, detail).await?;
                Ok(Value::String(format!("Triggered {} on: {}", event, selector)))
            }
        }
    }

    /// Side operation through the process runner. Project path comes from the
    /// argument or the connection context; neither means no process spawns.
    async fn run_cli<F>(&self, args: &Value, build_args: F) -> Result<Value>
    where
        F: FnOnce(&Path) -> Vec<String>,
    {
        let project = self
            .manager
            .resolve_project_path(optional_str(args, "projectPath"))
            .ok_or_else(|| {
                Error::Validation(
                    "Project path is required: pass projectPath or launch a project first."
                        .to_string(),
                )
            })?;
        let program = self
            .manager
            .resolve_cli_path(optional_str(args, "toolPath"))
            .ok_or(Error::ToolNotFound)?;
        let cli_args = build_args(&project);
        let stdout = self.runner.run(&program, &cli_args).await?;
        Ok(Value::String(stdout))
    }
}

#[derive(Debug)]
enum ElementAction {
    Info,
    Attribute(String),
    Style(String),
    Tap,
    Input(String),
    Trigger { event: String, detail: Value },
}

/// Operation-specific argument shapes, checked before any backend call.
fn parse_element_action(args: &Value) -> Result<ElementAction> {
    match optional_str(args, "action").unwrap_or("info") {
        "info" => Ok(ElementAction::Info),
        "attribute" => Ok(ElementAction::Attribute(
            required_str(args, "attributeName")?.to_string(),
        )),
        "style" => Ok(ElementAction::Style(
            required_str(args, "styleName")?.to_string(),
        )),
        "tap" => Ok(ElementAction::Tap),
        "input" => Ok(ElementAction::Input(
            optional_str(args, "value").unwrap_or_default().to_string(),
        )),
        "trigger" => Ok(ElementAction::Trigger {
            event: required_str(args, "eventName")?.to_string(),
            detail: args.get("detail").cloned().unwrap_or_else(|| json!({})),
        }),
        other => Err(Error::Validation(format!("Unknown element action: {}", other))),
    }
}
